//! Vaccination engine: the command/query surface over catalog, children and
//! administration ledger.
//!
//! Queries read a fresh ledger snapshot on every call. Commands run their
//! rule checks inside [`LedgerStore::transact`], so the check and the write
//! see the same rows and concurrent commands for the same child cannot both
//! pass a rule that the other would have broken.

use crate::catalog::get_default_catalog;
use crate::doses::{DoseTracker, MaxDosesCheck, RappelStatus};
use crate::eligibility::{check_age, check_prerequisites, AgeCheck, PrerequisiteCheck};
use crate::projector::{AdministeredVaccine, OverdueEntry, ScheduleProjector, UpcomingEntry};
use crate::store::{JsonlLedgerStore, LedgerChange, LedgerStore};
use crate::{
    AdministrationLedger, AdministrationRecord, Catalog, Child, ChildId, ChildRegistry, Config,
    Error, RappelTarget, Result, VaccineId,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

/// Caller decisions for an administration
#[derive(Clone, Copy, Debug, Default)]
pub struct AdministerOptions {
    /// Proceed even when recommended prerequisites are missing
    pub accept_missing_recommended: bool,
}

/// Booster completion for one vaccine
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct RappelCompletion {
    pub vaccine_id: VaccineId,
    pub administered_doses: usize,
    pub total_allowed_doses: usize,
    pub all_administered: bool,
}

impl From<MaxDosesCheck> for RappelCompletion {
    fn from(check: MaxDosesCheck) -> Self {
        Self {
            vaccine_id: check.vaccine_id,
            administered_doses: check.current_count,
            total_allowed_doses: check.max_allowed,
            all_administered: check.current_count >= check.max_allowed,
        }
    }
}

/// Overdue list of one child in a batch view
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct ChildOverdue {
    pub child_id: ChildId,
    pub overdue: Vec<OverdueEntry>,
}

pub struct VaccinationEngine<S: LedgerStore> {
    catalog: Arc<Catalog>,
    children: ChildRegistry,
    store: S,
}

impl VaccinationEngine<JsonlLedgerStore> {
    /// Open the file-backed engine described by `config`.
    ///
    /// The catalog file is optional only at its default location; a
    /// configured path that does not exist is an error.
    pub fn open(config: &Config) -> Result<Self> {
        let catalog_path = config.catalog_path();
        let catalog = if catalog_path.exists() {
            Catalog::load_from(&catalog_path)?
        } else if config.catalog.path.is_some() {
            return Err(Error::Config(format!(
                "catalog file {:?} does not exist",
                catalog_path
            )));
        } else {
            tracing::info!("No catalog at {:?}, using built-in schedule", catalog_path);
            get_default_catalog()?.clone()
        };

        for warning in catalog.warnings() {
            tracing::warn!("Catalog: {}", warning);
        }

        let children = ChildRegistry::load_csv(&config.children_path())?;
        let store = JsonlLedgerStore::new(config.ledger_path());
        Ok(Self::new(Arc::new(catalog), children, store))
    }
}

impl<S: LedgerStore> VaccinationEngine<S> {
    pub fn new(catalog: Arc<Catalog>, children: ChildRegistry, store: S) -> Self {
        Self {
            catalog,
            children,
            store,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn children(&self) -> &ChildRegistry {
        &self.children
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn child(&self, child_id: &str) -> Result<&Child> {
        self.children.get(child_id)
    }

    fn ledger(&self, child_id: &str) -> Result<AdministrationLedger> {
        self.child(child_id)?;
        self.store.ledger(child_id)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn check_prerequisites(&self, child_id: &str, vaccine_id: &str) -> Result<PrerequisiteCheck> {
        let ledger = self.ledger(child_id)?;
        check_prerequisites(&self.catalog, &ledger, vaccine_id)
    }

    pub fn check_age(&self, child_id: &str, vaccine_id: &str, as_of: NaiveDate) -> Result<AgeCheck> {
        let child = self.child(child_id)?;
        check_age(&self.catalog, child, vaccine_id, as_of)
    }

    pub fn check_max_doses(&self, child_id: &str, vaccine_id: &str) -> Result<MaxDosesCheck> {
        let ledger = self.ledger(child_id)?;
        DoseTracker::new(&self.catalog, &ledger).max_doses_check(vaccine_id)
    }

    pub fn check_all_rappels_administered(
        &self,
        child_id: &str,
        vaccine_id: &str,
    ) -> Result<RappelCompletion> {
        self.check_max_doses(child_id, vaccine_id).map(RappelCompletion::from)
    }

    pub fn check_rappel_status(&self, child_id: &str, candidate: &str) -> Result<RappelStatus> {
        let ledger = self.ledger(child_id)?;
        DoseTracker::new(&self.catalog, &ledger).rappel_status(candidate)
    }

    pub fn next_expected_rappel_index(&self, child_id: &str, vaccine_id: &str) -> Result<i64> {
        self.catalog.require_vaccine(vaccine_id)?;
        let ledger = self.ledger(child_id)?;
        Ok(DoseTracker::new(&self.catalog, &ledger).next_expected_rappel_index(vaccine_id))
    }

    /// Whether a dose of `vaccine_id` dated on or after `since` exists
    pub fn rappel_administered_since(
        &self,
        child_id: &str,
        vaccine_id: &str,
        since: NaiveDate,
    ) -> Result<bool> {
        self.catalog.require_vaccine(vaccine_id)?;
        let ledger = self.ledger(child_id)?;
        Ok(ledger
            .doses_of(vaccine_id)
            .iter()
            .any(|r| r.date_administered >= since))
    }

    pub fn overdue(&self, child_id: &str, as_of: NaiveDate) -> Result<Vec<OverdueEntry>> {
        let child = self.child(child_id)?;
        let ledger = self.store.ledger(child_id)?;
        Ok(ScheduleProjector::new(&self.catalog, child, &ledger).overdue(as_of))
    }

    pub fn upcoming(
        &self,
        child_id: &str,
        as_of: NaiveDate,
        horizon_days: u32,
    ) -> Result<Vec<UpcomingEntry>> {
        let child = self.child(child_id)?;
        let ledger = self.store.ledger(child_id)?;
        Ok(ScheduleProjector::new(&self.catalog, child, &ledger).upcoming(as_of, horizon_days))
    }

    pub fn administered(&self, child_id: &str) -> Result<Vec<AdministeredVaccine>> {
        let child = self.child(child_id)?;
        let ledger = self.store.ledger(child_id)?;
        Ok(ScheduleProjector::new(&self.catalog, child, &ledger).administered())
    }

    /// Distinct children holding at least one dose of `vaccine_id`
    pub fn count_children_vaccinated(&self, vaccine_id: &str) -> Result<usize> {
        self.catalog.require_vaccine(vaccine_id)?;
        let records = self.store.all_records()?;
        let children: HashSet<&str> = records
            .iter()
            .filter(|r| r.vaccine_id == vaccine_id)
            .map(|r| r.child_id.as_str())
            .collect();
        Ok(children.len())
    }

    /// Every registered child with something overdue, in child id order
    pub fn children_with_overdue(&self, as_of: NaiveDate) -> Result<Vec<ChildOverdue>> {
        let mut by_child: HashMap<String, Vec<AdministrationRecord>> = HashMap::new();
        for record in self.store.all_records()? {
            by_child.entry(record.child_id.clone()).or_default().push(record);
        }

        let mut out = Vec::new();
        for child in self.children.iter() {
            let records = by_child.remove(&child.id).unwrap_or_default();
            let ledger = AdministrationLedger::from_records(&child.id, records);
            let overdue = ScheduleProjector::new(&self.catalog, child, &ledger).overdue(as_of);
            if !overdue.is_empty() {
                out.push(ChildOverdue {
                    child_id: child.id.clone(),
                    overdue,
                });
            }
        }
        Ok(out)
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Record a dose of `vaccine_id`.
    ///
    /// A booster SKU of a vaccine the child has already started is recorded
    /// against the parent's rappel sequence instead.
    pub fn administer_vaccine(
        &self,
        child_id: &str,
        vaccine_id: &str,
        date: NaiveDate,
        options: AdministerOptions,
    ) -> Result<AdministrationRecord> {
        let child = self.child(child_id)?;
        self.catalog.require_vaccine(vaccine_id)?;

        let status = self.check_rappel_status(child_id, vaccine_id)?;
        if let Some(parent) = status.parent_vaccine_id {
            tracing::info!(
                "{} is a rappel of {} for child {}, recording as booster",
                vaccine_id,
                parent,
                child_id
            );
            return self.mark_rappel_administered(
                child_id,
                &parent,
                &RappelTarget::Vaccine(vaccine_id.to_string()),
                date,
            );
        }

        let age = check_age(&self.catalog, child, vaccine_id, date)?;
        if !age.eligible {
            tracing::warn!(
                "Child {} is under the minimum age for {} ({} required, eligible from {})",
                child_id,
                vaccine_id,
                age.min_age,
                age.eligible_from
            );
        }

        let catalog: &Catalog = &self.catalog;
        let change = self.store.transact(
            child_id,
            vaccine_id,
            &mut |ledger: &AdministrationLedger| -> Result<LedgerChange> {
                check_prerequisites(catalog, ledger, vaccine_id)?
                    .enforce(options.accept_missing_recommended)?;
                let tracker = DoseTracker::new(catalog, ledger);
                tracker.ensure_dose_available(vaccine_id)?;
                tracker.ensure_dated_after_last(vaccine_id, date)?;
                Ok(LedgerChange::Append(AdministrationRecord::new(
                    child_id, vaccine_id, date,
                )))
            },
        )?;

        tracing::info!("Administered {} to child {} on {}", vaccine_id, child_id, date);
        Ok(change.into_record())
    }

    /// Record rappel `target` of `parent_id`. The rappel must be the next
    /// one in sequence.
    pub fn mark_rappel_administered(
        &self,
        child_id: &str,
        parent_id: &str,
        target: &RappelTarget,
        date: NaiveDate,
    ) -> Result<AdministrationRecord> {
        self.child(child_id)?;
        self.catalog.require_vaccine(parent_id)?;

        let catalog: &Catalog = &self.catalog;
        let mut resolved = 0;
        let change = self.store.transact(
            child_id,
            parent_id,
            &mut |ledger: &AdministrationLedger| -> Result<LedgerChange> {
                let tracker = DoseTracker::new(catalog, ledger);
                let index = tracker.resolve_rappel_index(parent_id, target)?;
                tracker.ensure_rappel_order(parent_id, index)?;
                tracker.ensure_dose_available(parent_id)?;
                tracker.ensure_dated_after_last(parent_id, date)?;
                resolved = index;
                Ok(LedgerChange::Append(AdministrationRecord::new(
                    child_id, parent_id, date,
                )))
            },
        )?;

        tracing::info!(
            "Administered rappel {} of {} to child {} on {}",
            resolved,
            parent_id,
            child_id,
            date
        );
        Ok(change.into_record())
    }

    /// Remove an administration record.
    ///
    /// The last dose of a vaccine cannot be removed while the child holds a
    /// dose of something that requires it strictly.
    pub fn revoke_administration(&self, child_id: &str, record_id: &Uuid) -> Result<AdministrationRecord> {
        let ledger = self.ledger(child_id)?;
        let vaccine_id = ledger
            .find_record(record_id)
            .map(|r| r.vaccine_id.clone())
            .ok_or_else(|| Error::NotFound(format!("administration record '{}'", record_id)))?;

        let catalog: &Catalog = &self.catalog;
        let change = self.store.transact(
            child_id,
            &vaccine_id,
            &mut |ledger: &AdministrationLedger| -> Result<LedgerChange> {
                let record = ledger.find_record(record_id).cloned().ok_or_else(|| {
                    Error::NotFound(format!("administration record '{}'", record_id))
                })?;

                if ledger.dose_count(&record.vaccine_id) == 1 {
                    let dependents: Vec<String> = catalog
                        .strict_dependents_of(&record.vaccine_id)
                        .into_iter()
                        .filter(|d| ledger.has_any_dose(d))
                        .cloned()
                        .collect();
                    if !dependents.is_empty() {
                        return Err(Error::PrerequisiteInUse {
                            vaccine_id: record.vaccine_id,
                            dependents,
                        });
                    }
                }
                Ok(LedgerChange::Remove(record))
            },
        )?;

        tracing::info!(
            "Revoked {} ({}) for child {}",
            change.record().vaccine_id,
            record_id,
            child_id
        );
        Ok(change.into_record())
    }
}
