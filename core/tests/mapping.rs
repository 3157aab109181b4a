//! Unit-mapping derivation from person-level rows.

use reweight_core::{FirstPersonMapping, UnitMapping};

#[test]
fn tax_unit_takes_household_of_first_constituent_person() {
    // Persons 0 and 1 belong to tax unit 0 but different households
    // (a shared-dwelling edge case); the first person wins.
    let person_households = vec![10, 20, 30];
    let person_tax_units = vec![0, 0, 1];

    let mapping = FirstPersonMapping::from_person_rows(person_households, &person_tax_units, 2)
        .expect("mapping");
    assert_eq!(mapping.tax_unit_households(), &[10, 30]);
    assert_eq!(mapping.person_households(), &[10, 20, 30]);
}

#[test]
fn tax_unit_without_a_person_is_rejected() {
    // Three tax units claimed but persons only cover two of them.
    let err = FirstPersonMapping::from_person_rows(vec![10, 30], &[0, 1], 3).unwrap_err();
    assert!(err.to_string().contains("no constituent person"));
}

#[test]
fn person_column_length_mismatch_is_rejected() {
    let err = FirstPersonMapping::from_person_rows(vec![10, 30], &[0], 2).unwrap_err();
    assert!(err.to_string().contains("2"));
}
