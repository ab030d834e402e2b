//! Per-child administration ledger.
//!
//! Groups a child's administration records by vaccine, each group sorted by
//! date. Position in a group is the dose ordinal: 0 is the initial dose and
//! ordinal k + 1 is rappel k.

use crate::{AdministrationRecord, ChildId};
use chrono::NaiveDate;
use std::collections::HashMap;

#[derive(Clone, Debug, Default)]
pub struct AdministrationLedger {
    child_id: ChildId,
    by_vaccine: HashMap<String, Vec<AdministrationRecord>>,
}

impl AdministrationLedger {
    /// Build a ledger from raw rows. Rows belonging to other children are
    /// ignored.
    pub fn from_records(child_id: &str, records: impl IntoIterator<Item = AdministrationRecord>) -> Self {
        let mut by_vaccine: HashMap<String, Vec<AdministrationRecord>> = HashMap::new();
        let mut foreign = 0usize;
        for record in records {
            if record.child_id != child_id {
                foreign += 1;
                continue;
            }
            by_vaccine
                .entry(record.vaccine_id.clone())
                .or_default()
                .push(record);
        }
        if foreign > 0 {
            tracing::warn!("Ignored {} records not belonging to child {}", foreign, child_id);
        }

        // Same-day doses keep their id order so ordinals are stable
        for doses in by_vaccine.values_mut() {
            doses.sort_by(|a, b| {
                a.date_administered
                    .cmp(&b.date_administered)
                    .then_with(|| a.id.cmp(&b.id))
            });
        }

        Self {
            child_id: child_id.to_string(),
            by_vaccine,
        }
    }

    pub fn child_id(&self) -> &str {
        &self.child_id
    }

    /// Doses of a vaccine in ordinal order
    pub fn doses_of(&self, vaccine_id: &str) -> &[AdministrationRecord] {
        self.by_vaccine
            .get(vaccine_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_any_dose(&self, vaccine_id: &str) -> bool {
        !self.doses_of(vaccine_id).is_empty()
    }

    pub fn dose_count(&self, vaccine_id: &str) -> usize {
        self.doses_of(vaccine_id).len()
    }

    /// Date of the initial dose, if any
    pub fn first_dose_date(&self, vaccine_id: &str) -> Option<NaiveDate> {
        self.doses_of(vaccine_id).first().map(|r| r.date_administered)
    }

    /// Vaccine ids with at least one dose, sorted
    pub fn administered_vaccines(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.by_vaccine.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    pub fn find_record(&self, record_id: &uuid::Uuid) -> Option<&AdministrationRecord> {
        self.by_vaccine
            .values()
            .flat_map(|doses| doses.iter())
            .find(|r| &r.id == record_id)
    }

    pub fn total_doses(&self) -> usize {
        self.by_vaccine.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_groups_and_sorts_by_date() {
        let records = vec![
            AdministrationRecord::new("c1", "penta1", date(2025, 3, 1)),
            AdministrationRecord::new("c1", "bcg", date(2025, 1, 1)),
            AdministrationRecord::new("c1", "penta1", date(2025, 2, 1)),
        ];
        let ledger = AdministrationLedger::from_records("c1", records);

        assert_eq!(ledger.dose_count("penta1"), 2);
        assert_eq!(ledger.first_dose_date("penta1"), Some(date(2025, 2, 1)));
        assert_eq!(ledger.doses_of("penta1")[1].date_administered, date(2025, 3, 1));
        assert_eq!(ledger.administered_vaccines(), vec!["bcg", "penta1"]);
        assert_eq!(ledger.total_doses(), 3);
    }

    #[test]
    fn test_unknown_vaccine_has_no_doses() {
        let ledger = AdministrationLedger::from_records("c1", Vec::new());
        assert!(!ledger.has_any_dose("bcg"));
        assert_eq!(ledger.dose_count("bcg"), 0);
        assert!(ledger.doses_of("bcg").is_empty());
    }

    #[test]
    fn test_other_children_are_ignored() {
        let records = vec![
            AdministrationRecord::new("c1", "bcg", date(2025, 1, 1)),
            AdministrationRecord::new("c2", "bcg", date(2025, 1, 1)),
        ];
        let ledger = AdministrationLedger::from_records("c1", records);
        assert_eq!(ledger.dose_count("bcg"), 1);
        assert_eq!(ledger.child_id(), "c1");
    }

    #[test]
    fn test_find_record() {
        let record = AdministrationRecord::new("c1", "bcg", date(2025, 1, 1));
        let id = record.id;
        let ledger = AdministrationLedger::from_records("c1", vec![record]);
        assert_eq!(ledger.find_record(&id).unwrap().vaccine_id, "bcg");
        assert!(ledger.find_record(&uuid::Uuid::new_v4()).is_none());
    }
}
