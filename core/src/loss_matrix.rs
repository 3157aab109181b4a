//! Target-matrix construction — the linear "loss matrix" mapping every
//! aggregation unit to its contribution toward each retained target.
//!
//! Construction steps (fixed, documented, never reordered):
//!   1. Partition catalog variables into AGI-level and aggregate-level
//!      regimes; retain rows per the regime rule.
//!   2. Drop taxable-only rows.
//!   3. Evaluate each row's membership mask over tax units.
//!   4. Fetch values, binarizing count-type targets.
//!   5. Derive the unique column label; first occurrence wins.
//!   6. Aggregate tax-unit columns up to households.
//!
//! RULES:
//!   - AGI intervals are half-open: lower-inclusive, upper-exclusive.
//!   - A mask that selects zero units is a coverage gap, not an error.
//!   - Household rows are ordered by ascending household id.

use crate::{
    catalog::TargetRow,
    error::{CalibError, CalibResult},
    mapping::UnitMapping,
    records::{FilingStatus, RecordTable},
    types::HouseholdId,
};
use ndarray::{Array1, Array2};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// The design matrix and its paired target vector for one calibration
/// period. Rows are households, columns are retained targets in catalog
/// encounter order. Built fresh per period and consumed immediately.
#[derive(Debug, Clone)]
pub struct LossMatrix {
    pub matrix:        Array2<f64>,
    pub targets:       Array1<f64>,
    pub labels:        Vec<String>,
    pub household_ids: Vec<HouseholdId>,
}

impl LossMatrix {
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    pub fn household_count(&self) -> usize {
        self.household_ids.len()
    }
}

/// Build the loss matrix for one period's record table and catalog
/// slice. `mapping` supplies the tax-unit → household assignment.
pub fn build_loss_matrix(
    records: &RecordTable,
    catalog: &[TargetRow],
    mapping: &dyn UnitMapping,
) -> CalibResult<LossMatrix> {
    let unit_households = mapping.tax_unit_households();
    if unit_households.len() != records.len() {
        return Err(CalibError::MappingLengthMismatch {
            mapping: unit_households.len(),
            records: records.len(),
        });
    }

    let agi = records.adjusted_gross_income();
    let filer = records.is_tax_filer();
    let status = records.filing_status();

    let mut unit_columns: Vec<Vec<f64>> = Vec::new();
    let mut labels: Vec<String> = Vec::new();
    let mut targets: Vec<f64> = Vec::new();
    let mut seen_labels: HashSet<String> = HashSet::new();

    for row in catalog {
        if !row.is_retained(|name| records.has_column(name)) {
            continue;
        }
        if row.taxable_only {
            continue; // taxable-return breakdowns are never targeted
        }

        let restriction = FilingStatus::from_catalog_label(&row.filing_status);

        let values = records.column(&row.variable)?;

        let label = row.label();
        if !seen_labels.insert(label.clone()) {
            // Duplicate catalog row: keep the first column, drop the
            // later row's target value entirely.
            log::debug!("duplicate target label skipped: {label}");
            continue;
        }

        let column: Vec<f64> = (0..records.len())
            .map(|i| {
                let member = agi[i] >= row.agi_lower
                    && agi[i] < row.agi_upper
                    && filer[i]
                    && restriction.map_or(true, |r| status[i] == r);
                if !member {
                    return 0.0;
                }
                if row.count {
                    if values[i] > 0.0 { 1.0 } else { 0.0 }
                } else {
                    values[i]
                }
            })
            .collect();

        unit_columns.push(column);
        labels.push(label);
        targets.push(row.value);
    }

    // Tax-unit → household aggregation. Household rows come out in
    // ascending id order.
    let household_ids: Vec<HouseholdId> = unit_households
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let household_index: BTreeMap<HouseholdId, usize> = household_ids
        .iter()
        .enumerate()
        .map(|(i, &hh)| (hh, i))
        .collect();

    let mut matrix = Array2::<f64>::zeros((household_ids.len(), labels.len()));
    for (unit, &hh) in unit_households.iter().enumerate() {
        let r = household_index[&hh];
        for (j, column) in unit_columns.iter().enumerate() {
            matrix[[r, j]] += column[unit];
        }
    }

    log::debug!(
        "loss matrix built: {} households x {} targets ({} catalog rows)",
        household_ids.len(),
        labels.len(),
        catalog.len(),
    );

    Ok(LossMatrix {
        matrix,
        targets: Array1::from(targets),
        labels,
        household_ids,
    })
}
