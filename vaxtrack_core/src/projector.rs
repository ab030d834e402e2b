//! Schedule projection: overdue and upcoming doses, administered history.
//!
//! Every view is computed from one catalog and one ledger snapshot with the
//! reference date passed in by the caller. Nothing here reads the clock.
//!
//! Due dates:
//! - first dose of a never-administered vaccine: birth date + minimum age
//! - suite target: first dose of the source vaccine + suite delay
//! - rappel k: initial dose of the parent + rappel delay
//!
//! Rappel k fills ordinal k + 1 and is fulfilled once the ledger holds more
//! than k + 1 doses of the parent, whatever the dates say.

use crate::age::eligible_from;
use crate::{
    AdministrationLedger, AdministrationRecord, Catalog, Child, Requirement, SuiteKind, VaccineId,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;

/// Why a dose is due
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DueReason {
    /// Child has reached the vaccine's minimum age
    AgeThreshold,
    /// Follow-up of an administered vaccine
    Suite { from_vaccine_id: VaccineId },
    /// Booster of an administered vaccine
    Rappel { index: usize },
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct OverdueEntry {
    pub vaccine_id: VaccineId,
    pub name: String,
    pub due_date: NaiveDate,
    pub days_overdue: i64,
    pub reason: DueReason,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct UpcomingEntry {
    pub vaccine_id: VaccineId,
    pub name: String,
    pub due_date: NaiveDate,
    pub days_remaining: i64,
    pub delay_days: i64,
    pub requirement: Requirement,
    pub reason: DueReason,
}

/// Per-rappel progress within an administered vaccine
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct RappelProgress {
    pub index: usize,
    pub delay_days: u32,
    pub description: String,
    pub due_date: NaiveDate,
    pub administered: bool,
    pub administered_on: Option<NaiveDate>,
}

/// Grouped administration history for one vaccine
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct AdministeredVaccine {
    pub vaccine_id: VaccineId,
    pub name: String,
    pub doses: Vec<AdministrationRecord>,
    pub rappels: Vec<RappelProgress>,
    pub fully_administered: bool,
}

/// A dose that could fall due, before filtering by date
struct Candidate<'a> {
    vaccine_id: &'a str,
    name: &'a str,
    reference: NaiveDate,
    delay_days: i64,
    requirement: Requirement,
    reason: DueReason,
}

impl Candidate<'_> {
    fn due_date(&self) -> NaiveDate {
        add_days(self.reference, self.delay_days)
    }
}

/// `reference + days`, saturating at the last representable date
fn add_days(reference: NaiveDate, days: i64) -> NaiveDate {
    chrono::Duration::try_days(days)
        .and_then(|delta| reference.checked_add_signed(delta))
        .unwrap_or(NaiveDate::MAX)
}

pub struct ScheduleProjector<'a> {
    catalog: &'a Catalog,
    child: &'a Child,
    ledger: &'a AdministrationLedger,
}

impl<'a> ScheduleProjector<'a> {
    pub fn new(catalog: &'a Catalog, child: &'a Child, ledger: &'a AdministrationLedger) -> Self {
        Self {
            catalog,
            child,
            ledger,
        }
    }

    fn candidates(&self) -> Vec<Candidate<'a>> {
        let catalog = self.catalog;
        let ledger = self.ledger;
        let mut out = Vec::new();

        for vaccine in catalog.vaccines() {
            let Some(first_dose) = ledger.first_dose_date(&vaccine.id) else {
                // Booster SKUs fall due through the parent's rappel entries
                if catalog.rappel_parent_of(&vaccine.id).is_some() {
                    continue;
                }
                let due = eligible_from(self.child.birth_date, &vaccine.min_age);
                out.push(Candidate {
                    vaccine_id: &vaccine.id,
                    name: &vaccine.name,
                    reference: self.child.birth_date,
                    delay_days: (due - self.child.birth_date).num_days(),
                    requirement: Requirement::Strict,
                    reason: DueReason::AgeThreshold,
                });
                continue;
            };

            let count = ledger.dose_count(&vaccine.id);
            for rappel in catalog.rappels_of(&vaccine.id) {
                if count > rappel.ordinal() {
                    continue;
                }
                out.push(Candidate {
                    vaccine_id: &vaccine.id,
                    name: &vaccine.name,
                    reference: first_dose,
                    delay_days: i64::from(rappel.delay_days),
                    requirement: Requirement::Strict,
                    reason: DueReason::Rappel {
                        index: rappel.index(),
                    },
                });
            }

            for edge in catalog.suites_from(&vaccine.id) {
                if edge.kind == SuiteKind::Rappel || ledger.has_any_dose(&edge.next_vaccine_id) {
                    continue;
                }
                let Some(next) = catalog.vaccine(&edge.next_vaccine_id) else {
                    continue;
                };
                out.push(Candidate {
                    vaccine_id: &next.id,
                    name: &next.name,
                    reference: first_dose,
                    delay_days: edge.delay_days,
                    requirement: edge.requirement,
                    reason: DueReason::Suite {
                        from_vaccine_id: vaccine.id.clone(),
                    },
                });
            }
        }
        out
    }

    /// Strict deadlines that have passed without the corresponding dose.
    ///
    /// An unadministered vaccine appears once, under its earliest deadline.
    /// Sorted most overdue first.
    pub fn overdue(&self, as_of: NaiveDate) -> Vec<OverdueEntry> {
        let mut entries: Vec<OverdueEntry> = Vec::new();
        let mut first_dose_slot: HashMap<&str, usize> = HashMap::new();

        for candidate in self.candidates() {
            if !candidate.requirement.is_strict() {
                continue;
            }
            let due_date = candidate.due_date();
            let passed = match candidate.reason {
                DueReason::AgeThreshold => as_of >= due_date,
                DueReason::Suite { .. } | DueReason::Rappel { .. } => due_date < as_of,
            };
            if !passed {
                continue;
            }

            let entry = OverdueEntry {
                vaccine_id: candidate.vaccine_id.to_string(),
                name: candidate.name.to_string(),
                due_date,
                days_overdue: (as_of - due_date).num_days(),
                reason: candidate.reason,
            };

            if matches!(entry.reason, DueReason::Rappel { .. }) {
                entries.push(entry);
                continue;
            }
            match first_dose_slot.get(candidate.vaccine_id) {
                Some(&slot) if entries[slot].due_date <= entry.due_date => {}
                Some(&slot) => entries[slot] = entry,
                None => {
                    first_dose_slot.insert(candidate.vaccine_id, entries.len());
                    entries.push(entry);
                }
            }
        }

        entries.sort_by(|a, b| {
            b.days_overdue
                .cmp(&a.days_overdue)
                .then_with(|| a.vaccine_id.cmp(&b.vaccine_id))
        });
        entries
    }

    /// Doses falling due within `horizon_days` of `as_of` (inclusive).
    /// Sorted by due date; rappels of one vaccine by ascending delay.
    pub fn upcoming(&self, as_of: NaiveDate, horizon_days: u32) -> Vec<UpcomingEntry> {
        let horizon = i64::from(horizon_days);
        let mut entries: Vec<UpcomingEntry> = self
            .candidates()
            .into_iter()
            .filter_map(|candidate| {
                let due_date = candidate.due_date();
                let days_remaining = (due_date - as_of).num_days();
                if !(0..=horizon).contains(&days_remaining) {
                    return None;
                }
                Some(UpcomingEntry {
                    vaccine_id: candidate.vaccine_id.to_string(),
                    name: candidate.name.to_string(),
                    due_date,
                    days_remaining,
                    delay_days: candidate.delay_days,
                    requirement: candidate.requirement,
                    reason: candidate.reason,
                })
            })
            .collect();

        entries.sort_by(|a, b| {
            a.due_date
                .cmp(&b.due_date)
                .then_with(|| a.vaccine_id.cmp(&b.vaccine_id))
                .then_with(|| a.delay_days.cmp(&b.delay_days))
        });
        entries
    }

    /// Every administered vaccine with its doses and per-rappel flags
    pub fn administered(&self) -> Vec<AdministeredVaccine> {
        self.ledger
            .administered_vaccines()
            .into_iter()
            .map(|vaccine_id| {
                let doses = self.ledger.doses_of(vaccine_id).to_vec();
                let initial = doses[0].date_administered;
                let rappels: Vec<RappelProgress> = self
                    .catalog
                    .rappels_of(vaccine_id)
                    .iter()
                    .map(|rappel| {
                        let administered_on = doses.get(rappel.ordinal()).map(|r| r.date_administered);
                        RappelProgress {
                            index: rappel.index(),
                            delay_days: rappel.delay_days,
                            description: rappel.description.clone(),
                            due_date: add_days(initial, i64::from(rappel.delay_days)),
                            administered: administered_on.is_some(),
                            administered_on,
                        }
                    })
                    .collect();
                let name = self
                    .catalog
                    .vaccine(vaccine_id)
                    .map(|v| v.name.clone())
                    .unwrap_or_else(|| vaccine_id.to_string());
                AdministeredVaccine {
                    vaccine_id: vaccine_id.to_string(),
                    name,
                    fully_administered: doses.len() >= self.catalog.max_doses(vaccine_id),
                    doses,
                    rappels,
                }
            })
            .collect()
    }
}
