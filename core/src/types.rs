//! Shared primitive types used across the calibration core.

/// A calibration period. One period = one calendar year.
pub type Year = i32;

/// Stable identifier of a tax-filing unit in the record table.
pub type TaxUnitId = u64;

/// Stable identifier of a household — the aggregation unit targets
/// are evaluated at after level conversion.
pub type HouseholdId = u64;

/// The canonical calibration-run identifier.
pub type RunId = String;
