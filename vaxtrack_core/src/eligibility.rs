//! Eligibility checks: prerequisite gate and advisory age check.

use crate::age::{eligible_from, AgeBreakdown};
use crate::{AdministrationLedger, Catalog, Child, Error, MinAge, Requirement, Result, VaccineId};
use chrono::NaiveDate;
use serde::Serialize;

/// An unmet prerequisite edge
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct MissingPrerequisite {
    pub vaccine_id: VaccineId,
    pub name: String,
    pub requirement: Requirement,
}

/// Outcome of a prerequisite check for one candidate vaccine
#[derive(Clone, Debug, Serialize)]
pub struct PrerequisiteCheck {
    pub vaccine_id: VaccineId,
    pub can_be_administered: bool,
    pub missing: Vec<MissingPrerequisite>,
    pub message: String,
}

impl PrerequisiteCheck {
    pub fn strict_missing(&self) -> Vec<VaccineId> {
        self.missing_with(Requirement::Strict)
    }

    pub fn recommended_missing(&self) -> Vec<VaccineId> {
        self.missing_with(Requirement::Recommended)
    }

    fn missing_with(&self, requirement: Requirement) -> Vec<VaccineId> {
        self.missing
            .iter()
            .filter(|m| m.requirement == requirement)
            .map(|m| m.vaccine_id.clone())
            .collect()
    }

    /// Turn the check into a gate. Missing recommended prerequisites only
    /// pass when the caller has accepted them.
    pub fn enforce(&self, accept_missing_recommended: bool) -> Result<()> {
        let strict = self.strict_missing();
        if !strict.is_empty() {
            return Err(Error::StrictPrerequisiteMissing {
                vaccine_id: self.vaccine_id.clone(),
                missing: strict,
            });
        }
        let recommended = self.recommended_missing();
        if !recommended.is_empty() && !accept_missing_recommended {
            return Err(Error::RecommendedPrerequisiteMissing {
                vaccine_id: self.vaccine_id.clone(),
                missing: recommended,
            });
        }
        Ok(())
    }
}

/// Check every prerequisite edge of `candidate` against the child's ledger
pub fn check_prerequisites(
    catalog: &Catalog,
    ledger: &AdministrationLedger,
    candidate: &str,
) -> Result<PrerequisiteCheck> {
    let vaccine = catalog.require_vaccine(candidate)?;

    let missing: Vec<MissingPrerequisite> = catalog
        .prerequisites_of(candidate)
        .filter(|edge| !ledger.has_any_dose(&edge.prerequisite_id))
        .map(|edge| MissingPrerequisite {
            vaccine_id: edge.prerequisite_id.clone(),
            name: catalog
                .vaccine(&edge.prerequisite_id)
                .map(|v| v.name.clone())
                .unwrap_or_default(),
            requirement: edge.requirement,
        })
        .collect();

    let first_strict = missing.iter().find(|m| m.requirement.is_strict());
    let (can_be_administered, message) = match first_strict {
        Some(blocking) => (
            false,
            format!(
                "{} cannot be administered: strict prerequisite {} has not been given",
                vaccine.name, blocking.name
            ),
        ),
        None if !missing.is_empty() => {
            let names: Vec<&str> = missing.iter().map(|m| m.name.as_str()).collect();
            (
                true,
                format!(
                    "{} can be administered, but recommended prerequisite(s) are missing: {}",
                    vaccine.name,
                    names.join(", ")
                ),
            )
        }
        None => (true, format!("{} can be administered", vaccine.name)),
    };

    tracing::debug!(
        "Prerequisite check for {} on child {}: {} ({} missing)",
        candidate,
        ledger.child_id(),
        can_be_administered,
        missing.len()
    );

    Ok(PrerequisiteCheck {
        vaccine_id: vaccine.id.clone(),
        can_be_administered,
        missing,
        message,
    })
}

/// Advisory age check; never blocks administration
#[derive(Clone, Debug, Serialize)]
pub struct AgeCheck {
    pub vaccine_id: VaccineId,
    pub eligible: bool,
    pub eligible_from: NaiveDate,
    pub min_age: MinAge,
    pub age: AgeBreakdown,
}

pub fn check_age(catalog: &Catalog, child: &Child, vaccine_id: &str, as_of: NaiveDate) -> Result<AgeCheck> {
    let vaccine = catalog.require_vaccine(vaccine_id)?;
    Ok(AgeCheck {
        vaccine_id: vaccine.id.clone(),
        eligible: child.has_reached(&vaccine.min_age, as_of),
        eligible_from: eligible_from(child.birth_date, &vaccine.min_age),
        min_age: vaccine.min_age,
        age: child.age_at(as_of),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::build_default_catalog;
    use crate::AdministrationRecord;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ledger(doses: &[&str]) -> AdministrationLedger {
        AdministrationLedger::from_records(
            "c1",
            doses
                .iter()
                .map(|v| AdministrationRecord::new("c1", v, date(2025, 1, 1))),
        )
    }

    #[test]
    fn test_strict_prerequisite_blocks() {
        let catalog = build_default_catalog().unwrap();
        let check = check_prerequisites(&catalog, &ledger(&[]), "penta1").unwrap();

        assert!(!check.can_be_administered);
        assert_eq!(check.strict_missing(), vec!["bcg"]);
        assert!(check.message.contains("BCG"));
        assert!(matches!(
            check.enforce(true),
            Err(Error::StrictPrerequisiteMissing { .. })
        ));
    }

    #[test]
    fn test_satisfied_prerequisite_passes() {
        let catalog = build_default_catalog().unwrap();
        let check = check_prerequisites(&catalog, &ledger(&["bcg"]), "penta1").unwrap();

        assert!(check.can_be_administered);
        assert!(check.missing.is_empty());
        assert!(check.enforce(false).is_ok());
    }

    #[test]
    fn test_recommended_prerequisite_warns() {
        let catalog = build_default_catalog().unwrap();
        let check = check_prerequisites(&catalog, &ledger(&[]), "vpo1").unwrap();

        assert!(check.can_be_administered);
        assert_eq!(check.recommended_missing(), vec!["vpo0"]);
        assert!(check.message.contains("recommended"));
        assert!(matches!(
            check.enforce(false),
            Err(Error::RecommendedPrerequisiteMissing { .. })
        ));
        assert!(check.enforce(true).is_ok());
    }

    #[test]
    fn test_unknown_candidate() {
        let catalog = build_default_catalog().unwrap();
        assert!(matches!(
            check_prerequisites(&catalog, &ledger(&[]), "nope"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_age_check_is_advisory() {
        let catalog = build_default_catalog().unwrap();
        let child = Child {
            id: "c1".into(),
            birth_date: date(2025, 1, 1),
        };
        let early = check_age(&catalog, &child, "rr1", date(2025, 6, 1)).unwrap();
        assert!(!early.eligible);
        assert_eq!(early.eligible_from, date(2025, 10, 1));

        let later = check_age(&catalog, &child, "rr1", date(2025, 10, 1)).unwrap();
        assert!(later.eligible);
        assert_eq!(later.age.months, 9);
    }
}
