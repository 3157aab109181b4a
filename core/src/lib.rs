//! reweight-core — survey weight calibration.
//!
//! Calibrates a household survey's sample weights so that weighted
//! aggregates match independently known administrative totals. Two
//! components do the work, consumed leaf-first:
//!
//!   1. Target-Matrix Builder (`loss_matrix`) — turns a tax-unit record
//!      table and a target-statistic catalog into a design matrix and
//!      paired target vector.
//!   2. Weight Optimizer (`optimizer`) — gradient descent on log-weights
//!      minimizing mean relative squared error against the targets.
//!
//! The `calibration` orchestrator drives both per year, perturbs the
//! starting weights from a seeded noise stream, and records per-target
//! diagnostics to the SQLite store. Record acquisition, variable
//! derivation, and persistence of the reweighted extract stay with the
//! surrounding pipeline behind the `PeriodSource` and `UnitMapping`
//! seams.

pub mod calibration;
pub mod catalog;
pub mod error;
pub mod loss_matrix;
pub mod mapping;
pub mod optimizer;
pub mod records;
pub mod rng;
pub mod store;
pub mod types;

pub use calibration::{
    weight_column_name, CalibratedWeights, CalibrationConfig, Calibrator, PeriodSource,
};
pub use catalog::{fmt_bound, parse_catalog, TargetRow};
pub use error::{CalibError, CalibResult};
pub use loss_matrix::{build_loss_matrix, LossMatrix};
pub use mapping::{FirstPersonMapping, UnitMapping};
pub use optimizer::{reweight, target_residuals, ReweightConfig, ReweightOutcome, TargetResidual};
pub use records::{FilingStatus, RecordTable};
pub use rng::{NoiseBank, NoiseConfig, NoiseSlot, NoiseStream};
pub use store::DiagStore;
