//! calib-runner: headless calibration runner over a synthetic survey.
//!
//! Usage:
//!   calib-runner --seed 12345 --start-year 2024 --end-year 2025
//!   calib-runner --seed 12345 --households 500 --db diag.db
//!
//! Synthesizes a demonstration record table, derives target values from
//! a known reference weighting, then lets the calibrator recover those
//! weights from a perturbed start. End-of-run output shows per-year
//! loss and the worst per-target residuals.

use anyhow::Result;
use reweight_core::types::{HouseholdId, Year};
use reweight_core::{
    build_loss_matrix, CalibrationConfig, Calibrator, CalibResult, DiagStore, FilingStatus,
    FirstPersonMapping, NoiseStream, PeriodSource, RecordTable, TargetRow,
};
use std::collections::BTreeMap;
use std::env;

/// Reference weight every synthetic household starts from; target
/// values are exact under this weighting.
const REFERENCE_WEIGHT: f64 = 100.0;

struct DemoSource {
    records: RecordTable,
    catalog: Vec<TargetRow>,
    weights: BTreeMap<HouseholdId, f64>,
}

impl PeriodSource for DemoSource {
    fn records(&self, _year: Year) -> CalibResult<RecordTable> {
        Ok(self.records.clone())
    }

    fn targets(&self, _year: Year) -> CalibResult<Vec<TargetRow>> {
        Ok(self.catalog.clone())
    }

    fn household_weights(&self) -> CalibResult<BTreeMap<HouseholdId, f64>> {
        Ok(self.weights.clone())
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let start_year = parse_arg(&args, "--start-year", 2024i32);
    let end_year = parse_arg(&args, "--end-year", start_year);
    let households = parse_arg(&args, "--households", 200usize);
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");

    println!("calib-runner");
    println!("  seed:        {seed}");
    println!("  years:       {start_year}-{end_year}");
    println!("  households:  {households}");
    println!("  db:          {db}");
    println!();

    let store = if db == ":memory:" {
        DiagStore::in_memory()?
    } else {
        DiagStore::open(db)?
    };

    let run_id = format!("calib-{seed}-{}", chrono::Utc::now().timestamp());
    let config = CalibrationConfig::new(start_year, end_year, seed);
    let calibrator = Calibrator::new(run_id.clone(), config, store)?;

    let (source, mapping) = build_demo(households, seed)?;
    let results = calibrator.run(&source, &mapping)?;

    println!("=== CALIBRATION SUMMARY ===");
    println!("  run_id: {run_id}");
    for result in &results {
        println!();
        println!(
            "  {} | households: {} | persons: {} | final loss: {:.6}",
            result.column_name,
            result.household.len(),
            result.person.len(),
            result.final_loss,
        );
        let worst = calibrator
            .store()
            .worst_residuals(&run_id, result.year, 5)?;
        println!("  worst residuals:");
        for r in worst {
            println!(
                "    {:+.2}%  target {:>14.0}  estimate {:>14.0}  {}",
                r.rel_error * 100.0,
                r.target,
                r.estimate,
                r.label,
            );
        }
    }

    Ok(())
}

/// Synthesize the demonstration population and its target catalog.
/// Targets are computed exactly under the reference weighting, so the
/// calibrator's job is to walk the perturbed weights back.
fn build_demo(households: usize, seed: u64) -> Result<(DemoSource, FirstPersonMapping)> {
    // Stream index 1 000 keeps demo-data draws clear of the core's
    // NoiseSlot assignments.
    let mut rng = NoiseStream::new(seed, 1_000).with_name("demo_records");

    let mut table = RecordTable::new();
    let mut employment = Vec::with_capacity(households);
    let mut interest = Vec::with_capacity(households);
    let mut unemployment = Vec::with_capacity(households);

    for i in 0..households {
        // Squaring a uniform draw skews AGI low, like a real survey.
        let u = rng.next_f64();
        let agi = 250_000.0 * u * u;
        let status = match (rng.next_f64() * 4.0) as u32 {
            0 => FilingStatus::Single,
            1 => FilingStatus::Joint,
            2 => FilingStatus::HeadOfHousehold,
            _ => FilingStatus::Separate,
        };
        let is_filer = agi >= 5_000.0;
        table.push_row(i as u64, agi, is_filer, status);

        employment.push(agi * 0.75);
        interest.push(agi * 0.02);
        unemployment.push(if rng.next_f64() < 0.08 { 4_000.0 } else { 0.0 });
    }

    let records = table
        .with_column("employment_income", employment)?
        .with_column("taxable_interest_income", interest)?
        .with_column("unemployment_compensation", unemployment)?;

    // One tax unit per household, two persons per household.
    let tax_unit_households: Vec<HouseholdId> = (0..households as u64).collect();
    let person_households: Vec<HouseholdId> = (0..households as u64)
        .flat_map(|hh| [hh, hh])
        .collect();
    let mapping = FirstPersonMapping::from_parts(tax_unit_households, person_households);

    let mut catalog = Vec::new();
    let bands: [(f64, f64); 4] = [
        (0.0, 25_000.0),
        (25_000.0, 50_000.0),
        (50_000.0, 100_000.0),
        (100_000.0, f64::INFINITY),
    ];
    for (lower, upper) in bands {
        catalog.push(demo_target("count", lower, upper, true));
        catalog.push(demo_target("employment_income", lower, upper, false));
    }
    catalog.push(demo_target(
        "unemployment_compensation",
        f64::NEG_INFINITY,
        f64::INFINITY,
        false,
    ));

    // Fill in target values: exact aggregates under the reference
    // weighting. Every demo row is retained and unique, so catalog
    // order matches column order.
    let lm = build_loss_matrix(&records, &catalog, &mapping)?;
    let reference = ndarray::Array1::from_elem(lm.household_count(), REFERENCE_WEIGHT);
    let exact = reference.dot(&lm.matrix);
    for (row, value) in catalog.iter_mut().zip(exact.iter()) {
        row.value = *value;
    }

    let weights = (0..households as u64)
        .map(|hh| (hh, REFERENCE_WEIGHT))
        .collect();

    Ok((
        DemoSource {
            records,
            catalog,
            weights,
        },
        mapping,
    ))
}

fn demo_target(variable: &str, lower: f64, upper: f64, count: bool) -> TargetRow {
    TargetRow {
        variable: variable.to_string(),
        agi_lower: lower,
        agi_upper: upper,
        filing_status: "All".to_string(),
        count,
        taxable_only: false,
        value: 0.0,
    }
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
