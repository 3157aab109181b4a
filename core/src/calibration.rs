//! The calibration orchestrator — drives one reweighting run.
//!
//! EXECUTION ORDER per year (fixed, documented, never reordered):
//!   1. Build the loss matrix from the year's records and catalog slice.
//!   2. Look up the perturbed original weight of every household present.
//!   3. Optimize weights against the target vector.
//!   4. Record per-target residuals and the loss curve to the store.
//!   5. Distribute household weights down to person rows.
//!
//! RULES:
//!   - Original weights are perturbed once per run, before the year
//!     loop, from an explicit seeded noise stream.
//!   - Each year owns its own record slice, matrix, and weight vector;
//!     nothing is shared between years.
//!   - All state changes worth observing land in the diagnostics store.

use crate::{
    catalog::TargetRow,
    error::{CalibError, CalibResult},
    loss_matrix::build_loss_matrix,
    mapping::UnitMapping,
    optimizer::{reweight, target_residuals, ReweightConfig},
    records::RecordTable,
    rng::{NoiseBank, NoiseConfig, NoiseSlot},
    store::DiagStore,
    types::{HouseholdId, RunId, Year},
};
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
pub struct CalibrationConfig {
    pub start_year: Year,
    pub end_year:   Year,
    pub seed:       u64,
    pub noise:      NoiseConfig,
    pub reweight:   ReweightConfig,
    /// Persist every n-th loss sample (plus the final one).
    pub loss_sample_every: usize,
}

impl CalibrationConfig {
    pub fn new(start_year: Year, end_year: Year, seed: u64) -> Self {
        Self {
            start_year,
            end_year,
            seed,
            noise: NoiseConfig::default(),
            reweight: ReweightConfig::default(),
            loss_sample_every: 50,
        }
    }
}

/// Supplies the per-period inputs. Implemented by the surrounding
/// dataset pipeline; the core never materializes raw data itself.
pub trait PeriodSource {
    /// Tax-unit record table for one calibration year, already carrying
    /// AGI, the filer flag, filing status, and every income-component
    /// variable the catalog references.
    fn records(&self, year: Year) -> CalibResult<RecordTable>;

    /// The period-appropriate slice of the target-statistic catalog.
    fn targets(&self, year: Year) -> CalibResult<Vec<TargetRow>>;

    /// Original survey weight per household.
    fn household_weights(&self) -> CalibResult<BTreeMap<HouseholdId, f64>>;
}

/// Calibrated weights for one year, at both output granularities.
#[derive(Debug, Clone)]
pub struct CalibratedWeights {
    pub year:          Year,
    /// Conventional output column name, `household_weight__{year}`.
    pub column_name:   String,
    pub household_ids: Vec<HouseholdId>,
    pub household:     Vec<f64>,
    pub person:        Vec<f64>,
    pub final_loss:    f64,
}

/// Conventional name of the output weight column for a year.
pub fn weight_column_name(year: Year) -> String {
    format!("household_weight__{year}")
}

pub struct Calibrator {
    run_id: RunId,
    config: CalibrationConfig,
    store:  DiagStore,
}

impl Calibrator {
    /// Create a calibrator, migrating the store and registering the run.
    pub fn new(run_id: RunId, config: CalibrationConfig, store: DiagStore) -> CalibResult<Self> {
        store.migrate()?;
        store.insert_run(&run_id, config.seed, env!("CARGO_PKG_VERSION"))?;
        Ok(Self { run_id, config, store })
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn store(&self) -> &DiagStore {
        &self.store
    }

    /// Calibrate every year in the configured range. Years are
    /// independent and processed sequentially.
    pub fn run(
        &self,
        source: &dyn PeriodSource,
        mapping: &dyn UnitMapping,
    ) -> CalibResult<Vec<CalibratedWeights>> {
        let perturbed = self.perturb_weights(&source.household_weights()?)?;

        let mut out = Vec::new();
        for year in self.config.start_year..=self.config.end_year {
            log::info!("calibrating year {year}");
            let records = source.records(year)?;
            let catalog = source.targets(year)?;
            out.push(self.calibrate_year(year, &records, &catalog, &perturbed, mapping)?);
        }
        Ok(out)
    }

    /// Add independent Normal noise to every household's original
    /// weight, in ascending household-id order, from the run's
    /// deterministic perturbation stream.
    pub fn perturb_weights(
        &self,
        original: &BTreeMap<HouseholdId, f64>,
    ) -> CalibResult<BTreeMap<HouseholdId, f64>> {
        let mut stream = NoiseBank::new(self.config.seed).for_slot(NoiseSlot::WeightPerturbation);
        let mut perturbed = BTreeMap::new();
        for (&hh, &weight) in original {
            perturbed.insert(hh, weight + stream.normal(self.config.noise)?);
        }
        Ok(perturbed)
    }

    /// Calibrate a single year. `weights_by_household` holds the
    /// (already perturbed) starting weights.
    pub fn calibrate_year(
        &self,
        year: Year,
        records: &RecordTable,
        catalog: &[TargetRow],
        weights_by_household: &BTreeMap<HouseholdId, f64>,
        mapping: &dyn UnitMapping,
    ) -> CalibResult<CalibratedWeights> {
        let loss_matrix = build_loss_matrix(records, catalog, mapping)?;

        let initial: Vec<f64> = loss_matrix
            .household_ids
            .iter()
            .map(|hh| {
                weights_by_household.get(hh).copied().ok_or_else(|| {
                    CalibError::Other(anyhow::anyhow!(
                        "no original weight for household {hh}"
                    ))
                })
            })
            .collect::<CalibResult<_>>()?;

        let outcome = reweight(
            &initial,
            &loss_matrix.matrix,
            &loss_matrix.targets,
            &self.config.reweight,
        )?;

        // Diagnostics: residual per retained target plus the sampled
        // loss trajectory. Coverage gaps show up here as persistent
        // large residuals — observable, never fatal.
        let residuals = target_residuals(
            &outcome.weights,
            &loss_matrix.matrix,
            &loss_matrix.targets,
            &loss_matrix.labels,
            self.config.reweight.zero_target_epsilon,
        );
        self.store.insert_residuals(&self.run_id, year, &residuals)?;

        let every = self.config.loss_sample_every.max(1);
        for (iteration, &loss) in outcome.loss_history.iter().enumerate() {
            let last = iteration + 1 == outcome.loss_history.len();
            if iteration % every == 0 || last {
                self.store.insert_loss_sample(&self.run_id, year, iteration, loss)?;
            }
        }

        log::info!(
            "year={year}: {} households, {} targets, final loss {:.6}",
            loss_matrix.household_count(),
            loss_matrix.target_count(),
            outcome.final_loss,
        );

        // Household → person distribution: each person row inherits its
        // household's calibrated weight. Households outside this year's
        // matrix keep their perturbed original weight.
        let calibrated: BTreeMap<HouseholdId, f64> = loss_matrix
            .household_ids
            .iter()
            .copied()
            .zip(outcome.weights.iter().copied())
            .collect();
        let person = mapping
            .person_households()
            .iter()
            .map(|hh| {
                calibrated
                    .get(hh)
                    .or_else(|| weights_by_household.get(hh))
                    .copied()
                    .ok_or_else(|| {
                        CalibError::Other(anyhow::anyhow!(
                            "person row references unknown household {hh}"
                        ))
                    })
            })
            .collect::<CalibResult<Vec<f64>>>()?;

        Ok(CalibratedWeights {
            year,
            column_name: weight_column_name(year),
            household_ids: loss_matrix.household_ids,
            household: outcome.weights.to_vec(),
            person,
            final_loss: outcome.final_loss,
        })
    }
}
