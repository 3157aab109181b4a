//! Two calibrators, same seed, same inputs — they must produce
//! bit-identical weight vectors. Any divergence means platform or
//! ambient randomness leaked into the core.

use reweight_core::types::HouseholdId;
use reweight_core::{
    CalibrationConfig, CalibResult, Calibrator, DiagStore, FilingStatus, FirstPersonMapping,
    PeriodSource, RecordTable, TargetRow,
};
use std::collections::BTreeMap;

struct SyntheticSource {
    households: usize,
}

impl SyntheticSource {
    /// Deterministic spread of AGIs and incomes; no RNG here so the
    /// only randomness under test is the calibrator's own noise stream.
    fn table(&self) -> RecordTable {
        let mut table = RecordTable::new();
        let mut employment = Vec::new();
        for i in 0..self.households {
            let agi = 10_000.0 + (i as f64 * 7_919.0) % 190_000.0;
            let status = match i % 4 {
                0 => FilingStatus::Single,
                1 => FilingStatus::Joint,
                2 => FilingStatus::HeadOfHousehold,
                _ => FilingStatus::Separate,
            };
            table.push_row(i as u64, agi, true, status);
            employment.push(agi * 0.8);
        }
        table
            .with_column("employment_income", employment)
            .expect("column")
    }
}

impl PeriodSource for SyntheticSource {
    fn records(&self, _year: i32) -> CalibResult<RecordTable> {
        Ok(self.table())
    }

    fn targets(&self, _year: i32) -> CalibResult<Vec<TargetRow>> {
        Ok(vec![
            TargetRow {
                variable: "count".into(),
                agi_lower: 0.0,
                agi_upper: 100_000.0,
                filing_status: "All".into(),
                count: true,
                taxable_only: false,
                value: 3_200.0,
            },
            TargetRow {
                variable: "employment_income".into(),
                agi_lower: 0.0,
                agi_upper: 100_000.0,
                filing_status: "All".into(),
                count: false,
                taxable_only: false,
                value: 3.0e8,
            },
        ])
    }

    fn household_weights(&self) -> CalibResult<BTreeMap<HouseholdId, f64>> {
        Ok((0..self.households).map(|i| (i as u64, 100.0)).collect())
    }
}

fn run_weights(seed: u64) -> Vec<f64> {
    let store = DiagStore::in_memory().expect("in-memory store");
    let config = CalibrationConfig::new(2024, 2024, seed);
    let cal = Calibrator::new(format!("det-test-{seed}"), config, store).expect("calibrator");
    let source = SyntheticSource { households: 80 };
    let mapping = FirstPersonMapping::from_parts(
        (0..80u64).collect(),
        (0..80u64).collect(),
    );
    let results = cal.run(&source, &mapping).expect("run");
    results.into_iter().next().expect("one year").household
}

#[test]
fn same_seed_produces_identical_weights() {
    const SEED: u64 = 0xDEAD_BEEF_CAFE_1234;

    let weights_a = run_weights(SEED);
    let weights_b = run_weights(SEED);

    assert_eq!(weights_a.len(), weights_b.len());
    for (i, (a, b)) in weights_a.iter().zip(weights_b.iter()).enumerate() {
        assert!(
            a.to_bits() == b.to_bits(),
            "weights diverged at household {i}: {a} vs {b}"
        );
    }
}

#[test]
fn different_seeds_produce_different_weights() {
    let weights_a = run_weights(42);
    let weights_b = run_weights(99);

    let any_different = weights_a
        .iter()
        .zip(weights_b.iter())
        .any(|(a, b)| a != b);
    assert!(
        any_different,
        "different seeds produced identical weights — the seed is not being used"
    );
}
