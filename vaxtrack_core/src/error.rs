//! Error types for the vaxtrack_core library.

use chrono::NaiveDate;
use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for vaxtrack_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Catalog rejected at load time (cycles, dangling references, bad values)
    #[error("Invalid catalog: {}", .0.join("; "))]
    InvalidCatalog(Vec<String>),

    /// A strict prerequisite has not been administered to the child
    #[error("Vaccine '{vaccine_id}' requires strict prerequisite(s) {}", .missing.join(", "))]
    StrictPrerequisiteMissing {
        vaccine_id: String,
        missing: Vec<String>,
    },

    /// A recommended prerequisite is missing and the caller did not accept it
    #[error("Vaccine '{vaccine_id}' is missing recommended prerequisite(s) {}", .missing.join(", "))]
    RecommendedPrerequisiteMissing {
        vaccine_id: String,
        missing: Vec<String>,
    },

    /// Initial dose and every rappel are already recorded
    #[error("Vaccine '{vaccine_id}' already has {current} of {allowed} allowed doses")]
    MaxDoseReached {
        vaccine_id: String,
        current: usize,
        allowed: usize,
    },

    /// A rappel was administered out of sequence
    #[error("Rappel {requested} of vaccine '{vaccine_id}' is out of order (next expected: {expected})")]
    InvalidRappelOrder {
        vaccine_id: String,
        expected: i64,
        requested: usize,
    },

    /// A further dose dated before a dose already on record
    #[error("Dose of '{vaccine_id}' dated {date} is earlier than the last recorded dose ({latest})")]
    DoseDateOutOfOrder {
        vaccine_id: String,
        date: NaiveDate,
        latest: NaiveDate,
    },

    /// Removing a dose would orphan a vaccine that strictly depends on it
    #[error("Cannot remove last dose of '{vaccine_id}': required by {}", .dependents.join(", "))]
    PrerequisiteInUse {
        vaccine_id: String,
        dependents: Vec<String>,
    },

    /// Unknown child, vaccine, rappel or record
    #[error("Not found: {0}")]
    NotFound(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for per-request business-rule outcomes, false for operator faults
    /// (bad catalog, storage or parse failures).
    pub fn is_rule_violation(&self) -> bool {
        matches!(
            self,
            Error::StrictPrerequisiteMissing { .. }
                | Error::RecommendedPrerequisiteMissing { .. }
                | Error::MaxDoseReached { .. }
                | Error::InvalidRappelOrder { .. }
                | Error::DoseDateOutOfOrder { .. }
                | Error::PrerequisiteInUse { .. }
                | Error::NotFound(_)
        )
    }
}
