//! Target-matrix construction against hand-built record tables.
//!
//! Every test here builds its table row by row so the expected
//! contributions can be checked exactly.

use reweight_core::{
    build_loss_matrix, CalibError, FilingStatus, FirstPersonMapping, RecordTable, TargetRow,
};

fn target(
    variable: &str,
    lower: f64,
    upper: f64,
    filing_status: &str,
    count: bool,
    value: f64,
) -> TargetRow {
    TargetRow {
        variable: variable.to_string(),
        agi_lower: lower,
        agi_upper: upper,
        filing_status: filing_status.to_string(),
        count,
        taxable_only: false,
        value,
    }
}

/// Three filers in two households; employment income attached.
fn three_filer_table() -> RecordTable {
    let mut table = RecordTable::new();
    table.push_row(1, 20_000.0, true, FilingStatus::Single);
    table.push_row(2, 80_000.0, true, FilingStatus::Joint);
    table.push_row(3, 20_000.0, true, FilingStatus::Single);
    table
        .with_column("employment_income", vec![18_000.0, 75_000.0, 0.0])
        .expect("column")
}

/// Units 1 and 2 share household 10; unit 3 lives in household 20.
fn two_household_mapping() -> FirstPersonMapping {
    FirstPersonMapping::from_parts(vec![10, 10, 20], vec![10, 10, 20])
}

#[test]
fn single_filer_contributes_its_value() {
    let records = three_filer_table();
    let mapping = two_household_mapping();
    let catalog = vec![target(
        "employment_income",
        0.0,
        50_000.0,
        "Single",
        false,
        1.0e9,
    )];

    let lm = build_loss_matrix(&records, &catalog, &mapping).expect("build");
    assert_eq!(lm.household_ids, vec![10, 20]);
    assert_eq!(lm.labels.len(), 1);
    // Unit 1 (AGI 20k, Single) contributes 18 000 to household 10.
    // Unit 2 fails the band and status; unit 3 is in band but its
    // employment income is 0 — a total target still sums the raw value.
    assert_eq!(lm.matrix[[0, 0]], 18_000.0);
    assert_eq!(lm.matrix[[1, 0]], 0.0);
    assert_eq!(lm.targets[0], 1.0e9);
}

#[test]
fn count_targets_binarize_to_qualifying_nonzero_records() {
    let records = three_filer_table();
    let mapping = two_household_mapping();
    let catalog = vec![target(
        "employment_income",
        0.0,
        50_000.0,
        "Single",
        true,
        123.0,
    )];

    let lm = build_loss_matrix(&records, &catalog, &mapping).expect("build");
    // Unit 1 has income > 0 so counts 1.0; unit 3 qualifies on the mask
    // but has a zero value, so it is not a qualifying nonzero record.
    assert_eq!(lm.matrix[[0, 0]], 1.0);
    assert_eq!(lm.matrix[[1, 0]], 0.0);
}

#[test]
fn agi_interval_is_lower_inclusive_upper_exclusive() {
    let mut table = RecordTable::new();
    table.push_row(1, 0.0, true, FilingStatus::Single); // exactly lower
    table.push_row(2, 50_000.0, true, FilingStatus::Single); // exactly upper
    let records = table;
    let mapping = FirstPersonMapping::from_parts(vec![1, 2], vec![1, 2]);
    let catalog = vec![target("count", 0.0, 50_000.0, "Single", true, 2.0)];

    let lm = build_loss_matrix(&records, &catalog, &mapping).expect("build");
    assert_eq!(lm.matrix[[0, 0]], 1.0, "AGI == lower bound must be in");
    assert_eq!(lm.matrix[[1, 0]], 0.0, "AGI == upper bound must be out");
}

#[test]
fn non_filers_are_masked_out() {
    let mut table = RecordTable::new();
    table.push_row(1, 20_000.0, false, FilingStatus::Single);
    let records = table;
    let mapping = FirstPersonMapping::from_parts(vec![1], vec![1]);
    let catalog = vec![target("count", 0.0, 50_000.0, "Single", true, 1.0)];

    let lm = build_loss_matrix(&records, &catalog, &mapping).expect("build");
    assert_eq!(lm.matrix[[0, 0]], 0.0);
}

#[test]
fn unrecognized_filing_status_label_imposes_no_restriction() {
    let records = three_filer_table();
    let mapping = two_household_mapping();
    let catalog = vec![target("count", 0.0, 100_000.0, "All", true, 3.0)];

    let lm = build_loss_matrix(&records, &catalog, &mapping).expect("build");
    // All three filers qualify; units 1 and 2 aggregate into household 10.
    assert_eq!(lm.matrix[[0, 0]], 2.0);
    assert_eq!(lm.matrix[[1, 0]], 1.0);
}

#[test]
fn taxable_only_rows_never_produce_columns() {
    let records = three_filer_table();
    let mapping = two_household_mapping();
    let mut row = target("employment_income", 0.0, 50_000.0, "Single", false, 5.0);
    row.taxable_only = true;
    let catalog = vec![row];

    let lm = build_loss_matrix(&records, &catalog, &mapping).expect("build");
    assert_eq!(lm.labels.len(), 0);
    assert_eq!(lm.targets.len(), 0);
}

#[test]
fn duplicate_labels_keep_first_occurrence_only() {
    let records = three_filer_table();
    let mapping = two_household_mapping();
    let catalog = vec![
        target("employment_income", 0.0, 50_000.0, "Single", false, 111.0),
        target("employment_income", 0.0, 50_000.0, "Single", false, 999.0),
    ];

    let lm = build_loss_matrix(&records, &catalog, &mapping).expect("build");
    assert_eq!(lm.labels.len(), 1, "duplicate row must not add a column");
    assert_eq!(lm.targets.len(), 1);
    assert_eq!(lm.targets[0], 111.0, "first occurrence's value wins");
}

#[test]
fn labels_are_unique_across_the_matrix() {
    let records = three_filer_table();
    let mapping = two_household_mapping();
    let catalog = vec![
        target("employment_income", 0.0, 50_000.0, "Single", false, 1.0),
        target("employment_income", 0.0, 50_000.0, "Single", true, 2.0),
        target("employment_income", 50_000.0, f64::INFINITY, "Single", false, 3.0),
        target("count", 0.0, 50_000.0, "Single", true, 4.0),
    ];

    let lm = build_loss_matrix(&records, &catalog, &mapping).expect("build");
    let mut labels = lm.labels.clone();
    labels.sort();
    labels.dedup();
    assert_eq!(labels.len(), lm.labels.len());
    assert_eq!(lm.labels.len(), 4);
}

#[test]
fn regime_rule_rejects_unbounded_banded_variables_and_banded_aggregates() {
    let mut table = RecordTable::new();
    table.push_row(1, 20_000.0, true, FilingStatus::Single);
    let records = table
        .with_column("employment_income", vec![10_000.0])
        .expect("column")
        .with_column("unemployment_compensation", vec![500.0])
        .expect("column");
    let mapping = FirstPersonMapping::from_parts(vec![1], vec![1]);

    let catalog = vec![
        // AGI-level variable with a fully unbounded interval: dropped —
        // it would double-count against its banded rows.
        target(
            "employment_income",
            f64::NEG_INFINITY,
            f64::INFINITY,
            "All",
            false,
            1.0,
        ),
        // Aggregate-level variable with a banded interval: dropped.
        target("unemployment_compensation", 0.0, 50_000.0, "All", false, 2.0),
        // Aggregate-level variable, unbounded: retained.
        target(
            "unemployment_compensation",
            f64::NEG_INFINITY,
            f64::INFINITY,
            "All",
            false,
            3.0,
        ),
        // Aggregate-level variable missing from the record table: dropped.
        target(
            "estate_income",
            f64::NEG_INFINITY,
            f64::INFINITY,
            "All",
            false,
            4.0,
        ),
    ];

    let lm = build_loss_matrix(&records, &catalog, &mapping).expect("build");
    assert_eq!(lm.labels.len(), 1);
    assert_eq!(lm.targets[0], 3.0);
    assert_eq!(lm.matrix[[0, 0]], 500.0);
}

#[test]
fn empty_mask_still_produces_a_zero_column() {
    let records = three_filer_table();
    let mapping = two_household_mapping();
    // Nobody has AGI above 1m — a data coverage gap, not an error.
    let catalog = vec![target("count", 1_000_000.0, f64::INFINITY, "All", true, 42.0)];

    let lm = build_loss_matrix(&records, &catalog, &mapping).expect("build");
    assert_eq!(lm.labels.len(), 1);
    assert_eq!(lm.matrix[[0, 0]], 0.0);
    assert_eq!(lm.matrix[[1, 0]], 0.0);
    assert_eq!(lm.targets[0], 42.0);
}

#[test]
fn empty_catalog_yields_empty_matrix_and_vector() {
    let records = three_filer_table();
    let mapping = two_household_mapping();

    let lm = build_loss_matrix(&records, &[], &mapping).expect("build");
    assert_eq!(lm.targets.len(), 0);
    assert_eq!(lm.labels.len(), 0);
    assert_eq!(lm.matrix.ncols(), 0);
}

#[test]
fn missing_catalog_variable_is_a_schema_error() {
    let mut table = RecordTable::new();
    table.push_row(1, 20_000.0, true, FilingStatus::Single);
    let records = table;
    let mapping = FirstPersonMapping::from_parts(vec![1], vec![1]);
    let catalog = vec![target("qualified_dividends", 0.0, 50_000.0, "All", false, 1.0)];

    let err = build_loss_matrix(&records, &catalog, &mapping).unwrap_err();
    match err {
        CalibError::MissingColumn { name } => assert_eq!(name, "qualified_dividends"),
        other => panic!("expected MissingColumn, got {other}"),
    }
}

#[test]
fn tax_units_aggregate_into_households() {
    let records = three_filer_table();
    let mapping = two_household_mapping();
    let catalog = vec![target(
        "adjusted_gross_income",
        0.0,
        f64::INFINITY,
        "All",
        false,
        1.0e6,
    )];

    let lm = build_loss_matrix(&records, &catalog, &mapping).expect("build");
    // Household 10 holds units 1 (20k) and 2 (80k); household 20 holds
    // unit 3 (20k).
    assert_eq!(lm.matrix[[0, 0]], 100_000.0);
    assert_eq!(lm.matrix[[1, 0]], 20_000.0);
}
