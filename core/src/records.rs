//! The tax-unit record table — a columnar, randomly-addressable view
//! of the survey microdata after variable derivation.
//!
//! RULES:
//!   - One row per tax unit per calibration year.
//!   - `adjusted_gross_income` and `filing_status` are always populated
//!     for filers; the upstream derivation engine guarantees this.
//!   - Income-component columns are name-keyed; a lookup of a column the
//!     catalog references but the table lacks is a schema error, never a
//!     silent default.

use crate::{
    error::{CalibError, CalibResult},
    types::TaxUnitId,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Categorical filing status of a tax unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FilingStatus {
    Single,
    Joint,
    HeadOfHousehold,
    Separate,
}

impl FilingStatus {
    /// Map an administrative catalog's filing-status label onto a record
    /// category. Labels outside the four recognized categories (e.g. an
    /// "All" breakdown) impose no restriction and map to None.
    pub fn from_catalog_label(label: &str) -> Option<Self> {
        match label {
            "Single" => Some(Self::Single),
            "Married Filing Jointly/Surviving Spouse" => Some(Self::Joint),
            "Head of Household" => Some(Self::HeadOfHousehold),
            "Married Filing Separately" => Some(Self::Separate),
            _ => None,
        }
    }
}

/// Sentinel variable name for count-of-returns targets. Every record
/// contributes 1.0 to it, so the table synthesizes the column itself.
pub const COUNT_VARIABLE: &str = "count";

/// Columnar tax-unit record table (struct-of-arrays).
#[derive(Debug, Clone, Default)]
pub struct RecordTable {
    tax_unit_ids:          Vec<TaxUnitId>,
    adjusted_gross_income: Vec<f64>,
    is_tax_filer:          Vec<bool>,
    filing_status:         Vec<FilingStatus>,
    // Income-component variables, keyed by name. BTreeMap so iteration
    // order (and thus error reporting) is deterministic.
    columns:               BTreeMap<String, Vec<f64>>,
}

impl RecordTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one tax-unit row. Component values for columns this row
    /// does not carry are filled via `with_column` afterwards; mixing
    /// row-wise and column-wise construction is not supported.
    pub fn push_row(
        &mut self,
        tax_unit_id: TaxUnitId,
        agi: f64,
        is_filer: bool,
        filing_status: FilingStatus,
    ) {
        self.tax_unit_ids.push(tax_unit_id);
        self.adjusted_gross_income.push(agi);
        self.is_tax_filer.push(is_filer);
        self.filing_status.push(filing_status);
    }

    /// Attach a named income-component column. The column must match the
    /// current row count exactly.
    pub fn with_column(mut self, name: &str, values: Vec<f64>) -> CalibResult<Self> {
        if values.len() != self.len() {
            return Err(CalibError::ColumnLengthMismatch {
                name:     name.to_string(),
                expected: self.len(),
                actual:   values.len(),
            });
        }
        self.columns.insert(name.to_string(), values);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.tax_unit_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tax_unit_ids.is_empty()
    }

    pub fn tax_unit_ids(&self) -> &[TaxUnitId] {
        &self.tax_unit_ids
    }

    pub fn adjusted_gross_income(&self) -> &[f64] {
        &self.adjusted_gross_income
    }

    pub fn is_tax_filer(&self) -> &[bool] {
        &self.is_tax_filer
    }

    pub fn filing_status(&self) -> &[FilingStatus] {
        &self.filing_status
    }

    pub fn has_column(&self, name: &str) -> bool {
        name == COUNT_VARIABLE
            || name == "adjusted_gross_income"
            || self.columns.contains_key(name)
    }

    /// Fetch a variable's values by name. The `count` sentinel yields a
    /// ones vector; `adjusted_gross_income` aliases the fixed AGI column.
    /// Anything else must have been attached with `with_column`.
    pub fn column(&self, name: &str) -> CalibResult<Vec<f64>> {
        if name == COUNT_VARIABLE {
            return Ok(vec![1.0; self.len()]);
        }
        if name == "adjusted_gross_income" {
            return Ok(self.adjusted_gross_income.clone());
        }
        self.columns
            .get(name)
            .cloned()
            .ok_or_else(|| CalibError::MissingColumn {
                name: name.to_string(),
            })
    }

    /// Names of all attached income-component columns.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }
}
