//! Observation-level mapping — the collaborator that converts between
//! tax-unit, household, and person granularities.
//!
//! RULE: The calibration core never derives these mappings itself.
//! The upstream microsimulation engine knows which persons make up each
//! tax unit and household; this trait is the seam it plugs into.

use crate::{
    error::{CalibError, CalibResult},
    types::HouseholdId,
};

/// The contract a unit-mapping collaborator must fulfill.
pub trait UnitMapping {
    /// Household owning each tax-unit row, parallel to the record table.
    /// A tax unit belongs to the household of its first constituent
    /// person.
    fn tax_unit_households(&self) -> &[HouseholdId];

    /// Household owning each person row of the output extract.
    fn person_households(&self) -> &[HouseholdId];
}

/// Mapping materialized from person-level microdata: each person row
/// carries its household id and its tax-unit index, and a tax unit is
/// assigned the household of its first constituent person.
#[derive(Debug, Clone)]
pub struct FirstPersonMapping {
    tax_unit_households: Vec<HouseholdId>,
    person_households:   Vec<HouseholdId>,
}

impl FirstPersonMapping {
    /// Build from person-level rows. `person_households[p]` is person
    /// p's household; `person_tax_units[p]` is the index of person p's
    /// tax unit in the record table; `tax_unit_count` is the record
    /// table's row count.
    pub fn from_person_rows(
        person_households: Vec<HouseholdId>,
        person_tax_units: &[usize],
        tax_unit_count: usize,
    ) -> CalibResult<Self> {
        if person_tax_units.len() != person_households.len() {
            return Err(CalibError::MappingLengthMismatch {
                mapping: person_tax_units.len(),
                records: person_households.len(),
            });
        }

        // First person encountered per tax unit decides its household.
        let mut tax_unit_households = vec![None; tax_unit_count];
        for (person, &tax_unit) in person_tax_units.iter().enumerate() {
            if tax_unit >= tax_unit_count {
                return Err(CalibError::MappingLengthMismatch {
                    mapping: tax_unit + 1,
                    records: tax_unit_count,
                });
            }
            if tax_unit_households[tax_unit].is_none() {
                tax_unit_households[tax_unit] = Some(person_households[person]);
            }
        }

        let tax_unit_households = tax_unit_households
            .into_iter()
            .enumerate()
            .map(|(i, hh)| {
                hh.ok_or_else(|| {
                    CalibError::Other(anyhow::anyhow!(
                        "tax unit at index {i} has no constituent person"
                    ))
                })
            })
            .collect::<CalibResult<Vec<_>>>()?;

        Ok(Self {
            tax_unit_households,
            person_households,
        })
    }

    /// Direct construction when the caller already holds both mappings
    /// (used in tests and by upstream engines that precompute them).
    pub fn from_parts(
        tax_unit_households: Vec<HouseholdId>,
        person_households: Vec<HouseholdId>,
    ) -> Self {
        Self {
            tax_unit_households,
            person_households,
        }
    }
}

impl UnitMapping for FirstPersonMapping {
    fn tax_unit_households(&self) -> &[HouseholdId] {
        &self.tax_unit_households
    }

    fn person_households(&self) -> &[HouseholdId] {
        &self.person_households
    }
}
