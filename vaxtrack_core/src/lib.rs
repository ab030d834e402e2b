#![forbid(unsafe_code)]

//! Core domain model and business logic for vaxtrack, a pediatric
//! vaccination eligibility and scheduling engine.
//!
//! This crate provides:
//! - Domain types (vaccines, prerequisite and suite edges, rappels, records)
//! - Catalog loading and validation
//! - Eligibility, dose tracking and schedule projection
//! - Persistence (JSONL ledger, CSV child registry)
//! - The `VaccinationEngine` command/query surface

pub mod types;
pub mod error;
pub mod age;
pub mod catalog;
pub mod config;
pub mod logging;
pub mod ledger;
pub mod eligibility;
pub mod doses;
pub mod projector;
pub mod store;
pub mod children;
pub mod engine;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use catalog::{build_default_catalog, get_default_catalog, Catalog};
pub use config::Config;
pub use ledger::AdministrationLedger;
pub use children::ChildRegistry;
pub use store::{JsonlLedgerStore, LedgerStore, MemoryLedgerStore};
pub use engine::{AdministerOptions, ChildOverdue, RappelCompletion, VaccinationEngine};
