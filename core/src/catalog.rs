//! The target-statistic catalog — externally supplied administrative
//! aggregates the calibrated weights must approximately reproduce.
//!
//! Each row defines one scalar target: a variable, an AGI interval
//! `[lower, upper)`, a filing-status breakdown, a count-vs-total flag,
//! and the target magnitude. Rows flagged taxable-only are never
//! targeted.

use crate::error::CalibResult;
use serde::{Deserialize, Serialize};

/// One row of the administrative target table. Field names mirror the
/// source table's column headers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetRow {
    #[serde(rename = "Variable")]
    pub variable: String,

    #[serde(rename = "AGI lower bound")]
    pub agi_lower: f64,

    #[serde(rename = "AGI upper bound")]
    pub agi_upper: f64,

    #[serde(rename = "Filing status")]
    pub filing_status: String,

    #[serde(rename = "Count")]
    pub count: bool,

    #[serde(rename = "Taxable only")]
    pub taxable_only: bool,

    #[serde(rename = "Value")]
    pub value: f64,
}

/// Variables targeted per AGI band. Their rows must carry a genuinely
/// bounded interval to be retained.
pub const AGI_LEVEL_VARIABLES: &[&str] = &[
    "adjusted_gross_income",
    "count",
    "employment_income",
    "business_net_profits",
    "capital_gains_gross",
    "ordinary_dividends",
    "partnership_and_s_corp_income",
    "qualified_dividends",
    "taxable_interest_income",
    "total_pension_income",
    "total_social_security",
];

/// Variables targeted only as a single nationwide total. Their rows must
/// span the full unbounded interval to be retained, and the variable must
/// exist as a record-table column.
pub const AGGREGATE_LEVEL_VARIABLES: &[&str] = &[
    "business_net_losses",
    "capital_gains_distributions",
    "capital_gains_losses",
    "estate_income",
    "estate_losses",
    "exempt_interest",
    "ira_distributions",
    "partnership_and_s_corp_losses",
    "rent_and_royalty_net_income",
    "rent_and_royalty_net_losses",
    "taxable_pension_income",
    "taxable_social_security",
    "unemployment_compensation",
];

impl TargetRow {
    /// True when the AGI interval is bounded on at least one side.
    pub fn is_banded(&self) -> bool {
        self.agi_lower != f64::NEG_INFINITY || self.agi_upper != f64::INFINITY
    }

    /// True when the AGI interval spans the whole real line.
    pub fn is_unbounded(&self) -> bool {
        self.agi_lower == f64::NEG_INFINITY && self.agi_upper == f64::INFINITY
    }

    /// The retention rule: an AGI-level variable with a banded interval,
    /// or an aggregate-level variable (present in the record table) with
    /// a fully unbounded interval. Anything else would double-count a
    /// variable against both a bucketed and an unbucketed target.
    pub fn is_retained(&self, has_column: impl Fn(&str) -> bool) -> bool {
        let agi_level = AGI_LEVEL_VARIABLES.contains(&self.variable.as_str());
        let aggregate_level = AGGREGATE_LEVEL_VARIABLES.contains(&self.variable.as_str())
            && has_column(&self.variable);
        (agi_level && self.is_banded()) || (aggregate_level && self.is_unbounded())
    }

    /// Unique, human-readable label for the target column this row
    /// produces. Duplicate labels mark duplicate catalog rows; the first
    /// occurrence wins.
    pub fn label(&self) -> String {
        let variable_label = self.variable.replace('_', " ");
        let kind = if self.count || self.variable == "count" {
            "count"
        } else {
            "total"
        };
        let returns = if self.taxable_only { "taxable" } else { "all" };
        format!(
            "{variable_label}/{kind}/AGI in {}-{}/{returns} returns/{}",
            fmt_bound(self.agi_lower),
            fmt_bound(self.agi_upper),
            self.filing_status,
        )
    }
}

/// Internal shape of a serialized catalog slice.
#[derive(Debug, Clone, Deserialize)]
struct CatalogFile {
    targets: Vec<TargetRow>,
}

/// Parse a catalog slice from its JSON interchange form
/// (`{"targets": [...]}` with the administrative column headers).
pub fn parse_catalog(json: &str) -> CalibResult<Vec<TargetRow>> {
    let file: CatalogFile = serde_json::from_str(json)?;
    Ok(file.targets)
}

/// Abbreviate an AGI bound for target labels. Rounds half away from
/// zero: `fmt_bound(2_500.0) == "3k"`.
pub fn fmt_bound(x: f64) -> String {
    if x == f64::NEG_INFINITY {
        return "-inf".to_string();
    }
    if x == f64::INFINITY {
        return "inf".to_string();
    }
    if x < 1e3 {
        format!("{:.0}", x.round())
    } else if x < 1e6 {
        format!("{:.0}k", (x / 1e3).round())
    } else if x < 1e9 {
        format!("{:.0}m", (x / 1e6).round())
    } else {
        format!("{:.1}bn", x / 1e9)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_formatting_pins_rounding() {
        assert_eq!(fmt_bound(f64::NEG_INFINITY), "-inf");
        assert_eq!(fmt_bound(f64::INFINITY), "inf");
        assert_eq!(fmt_bound(500.0), "500");
        assert_eq!(fmt_bound(0.0), "0");
        assert_eq!(fmt_bound(2_500.0), "3k");
        assert_eq!(fmt_bound(50_000.0), "50k");
        assert_eq!(fmt_bound(1_500_000.0), "2m");
        assert_eq!(fmt_bound(2_300_000_000.0), "2.3bn");
    }

    #[test]
    fn negative_bounds_print_as_plain_integers() {
        // Negative magnitudes fall through to the sub-1e3 branch, as the
        // administrative table formats them.
        assert_eq!(fmt_bound(-5_000.0), "-5000");
    }

    #[test]
    fn catalog_rows_parse_from_administrative_headers() {
        let json = r#"{"targets": [{
            "Variable": "employment_income",
            "AGI lower bound": 0.0,
            "AGI upper bound": 50000.0,
            "Filing status": "Single",
            "Count": false,
            "Taxable only": false,
            "Value": 1.5e9
        }]}"#;
        let rows = parse_catalog(json).expect("parse");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].variable, "employment_income");
        assert_eq!(rows[0].agi_upper, 50_000.0);
        assert!(!rows[0].taxable_only);
    }

    #[test]
    fn label_shape() {
        let row = TargetRow {
            variable:      "employment_income".into(),
            agi_lower:     0.0,
            agi_upper:     50_000.0,
            filing_status: "Single".into(),
            count:         false,
            taxable_only:  false,
            value:         1.0e9,
        };
        assert_eq!(
            row.label(),
            "employment income/total/AGI in 0-50k/all returns/Single"
        );
    }
}
