//! Child registry loaded from CSV.
//!
//! The record store owns children; the engine only needs an id and a birth
//! date, read from an `id,birth_date` CSV export.

use crate::{Child, ChildId, Error, Result};
use chrono::NaiveDate;
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// CSV row format for reading children
#[derive(Debug, Deserialize)]
struct CsvRow {
    id: String,
    birth_date: String,
}

impl TryFrom<CsvRow> for Child {
    type Error = Error;

    fn try_from(row: CsvRow) -> Result<Self> {
        let id = row.id.trim().to_string();
        if id.is_empty() {
            return Err(Error::Other("Empty child id".into()));
        }
        let birth_date = NaiveDate::parse_from_str(row.birth_date.trim(), "%Y-%m-%d")
            .map_err(|e| Error::Other(format!("Invalid birth date for {}: {}", id, e)))?;
        Ok(Child { id, birth_date })
    }
}

#[derive(Clone, Debug, Default)]
pub struct ChildRegistry {
    children: BTreeMap<ChildId, Child>,
}

impl ChildRegistry {
    pub fn new(children: impl IntoIterator<Item = Child>) -> Self {
        Self {
            children: children.into_iter().map(|c| (c.id.clone(), c)).collect(),
        }
    }

    /// Load children from a CSV file. Returns an empty registry if the file
    /// doesn't exist; malformed rows are skipped with a warning.
    pub fn load_csv(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!("No children file at {:?}, registry is empty", path);
            return Ok(Self::default());
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let mut children = Vec::new();
        for result in reader.deserialize::<CsvRow>() {
            match result {
                Ok(row) => match Child::try_from(row) {
                    Ok(child) => children.push(child),
                    Err(e) => tracing::warn!("Failed to parse child row: {}", e),
                },
                Err(e) => tracing::warn!("Failed to deserialize child row: {}", e),
            }
        }

        tracing::debug!("Loaded {} children from {:?}", children.len(), path);
        Ok(Self::new(children))
    }

    pub fn get(&self, id: &str) -> Result<&Child> {
        self.children
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("child '{}'", id)))
    }

    /// Children ordered by id
    pub fn iter(&self) -> impl Iterator<Item = &Child> {
        self.children.values()
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_csv_skips_bad_rows() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("children.csv");
        std::fs::write(
            &path,
            "id,birth_date\nc1,2025-01-01\nc2,not-a-date\n,2025-02-01\nc3, 2024-06-15\n",
        )
        .unwrap();

        let registry = ChildRegistry::load_csv(&path).unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(
            registry.get("c3").unwrap().birth_date,
            NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
        );
    }

    #[test]
    fn test_missing_file_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let registry = ChildRegistry::load_csv(&temp_dir.path().join("none.csv")).unwrap();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_unknown_child_is_not_found() {
        let registry = ChildRegistry::default();
        assert!(matches!(registry.get("c9"), Err(Error::NotFound(_))));
    }
}
