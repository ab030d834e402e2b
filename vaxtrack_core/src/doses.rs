//! Dose tracking: booster progression and maximum-dose limits.
//!
//! A `DoseTracker` answers point queries against one ledger snapshot. The
//! write path lives in [`crate::engine`], which re-runs these checks inside
//! the store transaction so check and append see the same rows.

use crate::{AdministrationLedger, Catalog, Error, RappelTarget, Result, VaccineId};
use chrono::NaiveDate;
use serde::Serialize;

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct MaxDosesCheck {
    pub vaccine_id: VaccineId,
    pub max_reached: bool,
    pub current_count: usize,
    pub max_allowed: usize,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct RappelStatus {
    pub is_rappel: bool,
    pub parent_vaccine_id: Option<VaccineId>,
}

pub struct DoseTracker<'a> {
    catalog: &'a Catalog,
    ledger: &'a AdministrationLedger,
}

impl<'a> DoseTracker<'a> {
    pub fn new(catalog: &'a Catalog, ledger: &'a AdministrationLedger) -> Self {
        Self { catalog, ledger }
    }

    pub fn max_doses_check(&self, vaccine_id: &str) -> Result<MaxDosesCheck> {
        let vaccine = self.catalog.require_vaccine(vaccine_id)?;
        let current_count = self.ledger.dose_count(vaccine_id);
        let max_allowed = self.catalog.max_doses(vaccine_id);
        Ok(MaxDosesCheck {
            vaccine_id: vaccine.id.clone(),
            max_reached: current_count >= max_allowed,
            current_count,
            max_allowed,
        })
    }

    /// Index of the next rappel to give; -1 while the initial dose is pending
    pub fn next_expected_rappel_index(&self, vaccine_id: &str) -> i64 {
        self.ledger.dose_count(vaccine_id) as i64 - 1
    }

    pub fn is_fully_administered(&self, vaccine_id: &str) -> Result<bool> {
        let check = self.max_doses_check(vaccine_id)?;
        Ok(check.current_count == check.max_allowed)
    }

    /// Whether `candidate` is a booster SKU of a vaccine this child has
    /// already started. The first rappel edge in catalog order decides the
    /// parent.
    pub fn rappel_status(&self, candidate: &str) -> Result<RappelStatus> {
        self.catalog.require_vaccine(candidate)?;
        match self.catalog.rappel_parent_of(candidate) {
            Some(parent) if self.ledger.has_any_dose(parent) => Ok(RappelStatus {
                is_rappel: true,
                parent_vaccine_id: Some(parent.clone()),
            }),
            _ => Ok(RappelStatus {
                is_rappel: false,
                parent_vaccine_id: None,
            }),
        }
    }

    /// Fails with `MaxDoseReached` when no further dose may be recorded
    pub fn ensure_dose_available(&self, vaccine_id: &str) -> Result<MaxDosesCheck> {
        let check = self.max_doses_check(vaccine_id)?;
        if check.max_reached {
            return Err(Error::MaxDoseReached {
                vaccine_id: check.vaccine_id,
                current: check.current_count,
                allowed: check.max_allowed,
            });
        }
        Ok(check)
    }

    /// Map a caller's rappel reference to its position in the parent's list.
    ///
    /// When several positions match, the lowest one not yet fulfilled wins,
    /// falling back to the lowest match.
    pub fn resolve_rappel_index(&self, parent_id: &str, target: &RappelTarget) -> Result<usize> {
        self.catalog.require_vaccine(parent_id)?;
        let rappels = self.catalog.rappels_of(parent_id);
        let count = self.ledger.dose_count(parent_id);

        let matches: Vec<usize> = rappels
            .iter()
            .filter(|r| match target {
                RappelTarget::Vaccine(id) => r.linked_vaccine_id.as_ref() == Some(id),
                RappelTarget::Index(index) => r.index() == *index,
                RappelTarget::DelayDays(delay) => r.delay_days == *delay,
            })
            .map(|r| r.index())
            .collect();

        matches
            .iter()
            .copied()
            .find(|&index| count <= index + 1)
            .or_else(|| matches.first().copied())
            .ok_or_else(|| {
                Error::NotFound(format!("rappel {:?} of vaccine '{}'", target, parent_id))
            })
    }

    /// A further dose may not be dated before the latest dose on record,
    /// otherwise re-sorting would shift which dose fills which ordinal
    pub fn ensure_dated_after_last(&self, vaccine_id: &str, date: NaiveDate) -> Result<()> {
        if let Some(latest) = self.ledger.doses_of(vaccine_id).last() {
            if date < latest.date_administered {
                return Err(Error::DoseDateOutOfOrder {
                    vaccine_id: vaccine_id.to_string(),
                    date,
                    latest: latest.date_administered,
                });
            }
        }
        Ok(())
    }

    /// Rappel `index` may only be given when exactly `index + 1` doses exist
    pub fn ensure_rappel_order(&self, parent_id: &str, index: usize) -> Result<()> {
        let expected = self.next_expected_rappel_index(parent_id);
        if expected != index as i64 {
            return Err(Error::InvalidRappelOrder {
                vaccine_id: parent_id.to_string(),
                expected,
                requested: index,
            });
        }
        Ok(())
    }
}
