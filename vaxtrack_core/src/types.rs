//! Core domain types for the vaccination scheduling engine.
//!
//! This module defines the fundamental types used throughout the system:
//! - Vaccines and their minimum eligible age
//! - Prerequisite and suite edges between vaccines
//! - Rappel (booster) schedule entries
//! - Administration records and children

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type VaccineId = String;
pub type ChildId = String;

// ============================================================================
// Vaccine Types
// ============================================================================

/// Minimum age at which a vaccine may be given, as one composite threshold
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MinAge {
    #[serde(default)]
    pub years: u32,
    #[serde(default)]
    pub months: u32,
    #[serde(default)]
    pub days: u32,
}

impl MinAge {
    pub fn new(years: u32, months: u32, days: u32) -> Self {
        Self {
            years,
            months,
            days,
        }
    }
}

impl fmt::Display for MinAge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}y {}m {}d", self.years, self.months, self.days)
    }
}

/// A vaccine definition from the catalog
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vaccine {
    pub id: VaccineId,
    pub name: String,
    #[serde(default)]
    pub antigen_duration_days: u32,
    // Stock attributes, never used for scheduling
    #[serde(default)]
    pub arrival_date: Option<NaiveDate>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    #[serde(default)]
    pub lot: Option<String>,
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default)]
    pub min_age: MinAge,
    #[serde(default)]
    pub description: String,
}

// ============================================================================
// Edge Types
// ============================================================================

/// Whether an edge blocks (strict) or only warns (recommended)
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    Strict,
    Recommended,
}

impl Requirement {
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            Requirement::Strict
        } else {
            Requirement::Recommended
        }
    }

    pub fn is_strict(self) -> bool {
        matches!(self, Requirement::Strict)
    }
}

/// Kind of a suite edge
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuiteKind {
    /// A different vaccine that should follow
    #[default]
    FollowUp,
    /// The next vaccine is a booster SKU of the source vaccine
    Rappel,
}

/// `vaccine_id` may only be given once `prerequisite_id` has been
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrerequisiteEdge {
    pub vaccine_id: VaccineId,
    pub prerequisite_id: VaccineId,
    pub requirement: Requirement,
}

/// `next_vaccine_id` should follow `vaccine_id` after `delay_days`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuiteEdge {
    pub vaccine_id: VaccineId,
    pub next_vaccine_id: VaccineId,
    pub requirement: Requirement,
    /// Signed so that negative values from a source can be reported at load
    pub delay_days: i64,
    #[serde(default)]
    pub kind: SuiteKind,
}

// ============================================================================
// Rappel Types
// ============================================================================

/// Rappel entry as supplied to the catalog loader
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RappelDef {
    pub delay_days: i64,
    #[serde(default)]
    pub description: String,
    /// Catalog vaccine id when boosters are modelled as their own SKU
    #[serde(default)]
    pub vaccine_id: Option<VaccineId>,
}

/// Identity of a rappel: its parent vaccine and 0-based position
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct RappelKey {
    pub parent_vaccine_id: VaccineId,
    pub index: usize,
}

impl fmt::Display for RappelKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#rappel{}", self.parent_vaccine_id, self.index)
    }
}

/// A validated rappel owned by a catalog vaccine
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Rappel {
    pub key: RappelKey,
    pub delay_days: u32,
    pub description: String,
    pub linked_vaccine_id: Option<VaccineId>,
}

impl Rappel {
    pub fn index(&self) -> usize {
        self.key.index
    }

    /// Ledger ordinal this rappel fills (0 is the initial dose)
    pub fn ordinal(&self) -> usize {
        self.key.index + 1
    }
}

/// How a caller names the rappel being fulfilled
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RappelTarget {
    /// Booster SKU id linked from the parent's rappel list
    Vaccine(VaccineId),
    /// Explicit position in the parent's rappel list
    Index(usize),
    /// Match by delay when boosters are not modelled as vaccines
    DelayDays(u32),
}

// ============================================================================
// Ledger and Child Types
// ============================================================================

/// One administered dose. The Nth record (by date) for a (child, vaccine)
/// pair is dose ordinal N-1.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdministrationRecord {
    pub id: Uuid,
    pub child_id: ChildId,
    pub vaccine_id: VaccineId,
    pub date_administered: NaiveDate,
}

impl AdministrationRecord {
    pub fn new(child_id: &str, vaccine_id: &str, date_administered: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            child_id: child_id.to_string(),
            vaccine_id: vaccine_id.to_string(),
            date_administered,
        }
    }
}

/// A child as seen by the engine: an id and a birth date for age arithmetic
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Child {
    pub id: ChildId,
    pub birth_date: NaiveDate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requirement_from_loose_boolean() {
        assert_eq!(Requirement::from_strict(true), Requirement::Strict);
        assert_eq!(Requirement::from_strict(false), Requirement::Recommended);
        assert!(!Requirement::Recommended.is_strict());
    }

    #[test]
    fn test_suite_kind_defaults_to_follow_up() {
        let edge: SuiteEdge = serde_json::from_str(
            r#"{"vaccine_id":"rr1","next_vaccine_id":"rr2","requirement":"strict","delay_days":180}"#,
        )
        .unwrap();
        assert_eq!(edge.kind, SuiteKind::FollowUp);
    }

    #[test]
    fn test_rappel_ordinal_follows_initial_dose() {
        let rappel = Rappel {
            key: RappelKey {
                parent_vaccine_id: "penta1".into(),
                index: 0,
            },
            delay_days: 30,
            description: String::new(),
            linked_vaccine_id: None,
        };
        assert_eq!(rappel.ordinal(), 1);
        assert_eq!(rappel.key.to_string(), "penta1#rappel0");
    }
}
