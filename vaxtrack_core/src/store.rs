//! Administration record stores.
//!
//! A store hands out consistent per-child snapshots and runs
//! check-then-act transactions that are serialized per child, since a
//! decision may read any of the child's rows (prerequisites, dependents).
//! Two implementations are provided:
//! - `MemoryLedgerStore`: in-process, per-child mutexes
//! - `JsonlLedgerStore`: JSON Lines file guarded by an `fs2` lock file, safe
//!   across threads and processes

use crate::{AdministrationLedger, AdministrationRecord, Error, Result};
use fs2::FileExt;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};
use tempfile::NamedTempFile;
use uuid::Uuid;

/// Mutation decided inside a transaction
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerChange {
    Append(AdministrationRecord),
    Remove(AdministrationRecord),
}

impl LedgerChange {
    pub fn record(&self) -> &AdministrationRecord {
        match self {
            LedgerChange::Append(record) | LedgerChange::Remove(record) => record,
        }
    }

    pub fn into_record(self) -> AdministrationRecord {
        match self {
            LedgerChange::Append(record) | LedgerChange::Remove(record) => record,
        }
    }
}

pub type Decision<'a> = dyn FnMut(&AdministrationLedger) -> Result<LedgerChange> + 'a;

/// Ledger provider
pub trait LedgerStore: Send + Sync {
    /// All rows for one child, read as one consistent snapshot
    fn snapshot(&self, child_id: &str) -> Result<Vec<AdministrationRecord>>;

    /// All rows for every child
    fn all_records(&self) -> Result<Vec<AdministrationRecord>>;

    /// Serialize on the child, re-read the child's rows, let `decide`
    /// pick a change (or refuse with an error) and apply it before releasing.
    fn transact(&self, child_id: &str, vaccine_id: &str, decide: &mut Decision<'_>) -> Result<LedgerChange>;

    fn ledger(&self, child_id: &str) -> Result<AdministrationLedger> {
        Ok(AdministrationLedger::from_records(child_id, self.snapshot(child_id)?))
    }
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Default)]
pub struct MemoryLedgerStore {
    records: RwLock<Vec<AdministrationRecord>>,
    child_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<AdministrationRecord>) -> Self {
        Self {
            records: RwLock::new(records),
            child_locks: Mutex::new(HashMap::new()),
        }
    }

    fn child_lock(&self, child_id: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .child_locks
            .lock()
            .map_err(|_| Error::Other("ledger child lock poisoned".into()))?;
        Ok(locks.entry(child_id.to_string()).or_default().clone())
    }
}

impl LedgerStore for MemoryLedgerStore {
    fn snapshot(&self, child_id: &str) -> Result<Vec<AdministrationRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| Error::Other("ledger poisoned".into()))?;
        Ok(records
            .iter()
            .filter(|r| r.child_id == child_id)
            .cloned()
            .collect())
    }

    fn all_records(&self) -> Result<Vec<AdministrationRecord>> {
        let records = self
            .records
            .read()
            .map_err(|_| Error::Other("ledger poisoned".into()))?;
        Ok(records.clone())
    }

    fn transact(&self, child_id: &str, vaccine_id: &str, decide: &mut Decision<'_>) -> Result<LedgerChange> {
        let child_lock = self.child_lock(child_id)?;
        let _guard = child_lock
            .lock()
            .map_err(|_| Error::Other("ledger child lock poisoned".into()))?;

        let ledger = self.ledger(child_id)?;
        let change = decide(&ledger)?;

        let mut records = self
            .records
            .write()
            .map_err(|_| Error::Other("ledger poisoned".into()))?;
        match &change {
            LedgerChange::Append(record) => records.push(record.clone()),
            LedgerChange::Remove(record) => records.retain(|r| r.id != record.id),
        }
        tracing::debug!("Committed {:?} for ({}, {})", change, child_id, vaccine_id);
        Ok(change)
    }
}

// ============================================================================
// JSON Lines store
// ============================================================================

/// JSONL-backed store. Writers hold an exclusive lock on a sidecar
/// `.lock` file for the whole transaction; readers hold a shared one.
pub struct JsonlLedgerStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonlLedgerStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = path.with_extension("lock");
        Self { path, lock_path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn open_lock(&self) -> Result<File> {
        self.ensure_parent_dir()?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)?;
        Ok(file)
    }

    fn with_shared_lock<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self.open_lock()?;
        lock.lock_shared()?;
        let result = f();
        lock.unlock()?;
        result
    }

    fn append_line(&self, record: &AdministrationRecord) -> Result<()> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = BufWriter::new(&file);
        let line = serde_json::to_string(record)?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        drop(writer);
        file.sync_all()?;
        tracing::debug!("Appended administration {} to {:?}", record.id, self.path);
        Ok(())
    }

    /// Atomically replace the file without the given record
    fn rewrite_without(&self, record_id: &Uuid) -> Result<()> {
        let remaining: Vec<AdministrationRecord> = read_records(&self.path)?
            .into_iter()
            .filter(|r| &r.id != record_id)
            .collect();

        let parent = self.path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "ledger path missing parent")
        })?;
        let temp = NamedTempFile::new_in(parent)?;
        {
            let mut writer = BufWriter::new(temp.as_file());
            for record in &remaining {
                writer.write_all(serde_json::to_string(record)?.as_bytes())?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        temp.as_file().sync_all()?;
        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Removed administration {} from {:?}", record_id, self.path);
        Ok(())
    }
}

impl LedgerStore for JsonlLedgerStore {
    fn snapshot(&self, child_id: &str) -> Result<Vec<AdministrationRecord>> {
        self.with_shared_lock(|| {
            Ok(read_records(&self.path)?
                .into_iter()
                .filter(|r| r.child_id == child_id)
                .collect())
        })
    }

    fn all_records(&self) -> Result<Vec<AdministrationRecord>> {
        self.with_shared_lock(|| read_records(&self.path))
    }

    fn transact(&self, child_id: &str, vaccine_id: &str, decide: &mut Decision<'_>) -> Result<LedgerChange> {
        let lock = self.open_lock()?;
        // Single writer across threads and processes; covers every key
        lock.lock_exclusive()?;

        let result = (|| -> Result<LedgerChange> {
            let rows: Vec<AdministrationRecord> = read_records(&self.path)?
                .into_iter()
                .filter(|r| r.child_id == child_id)
                .collect();
            let ledger = AdministrationLedger::from_records(child_id, rows);
            let change = decide(&ledger)?;
            match &change {
                LedgerChange::Append(record) => self.append_line(record)?,
                LedgerChange::Remove(record) => self.rewrite_without(&record.id)?,
            }
            tracing::debug!("Committed {:?} for ({}, {})", change, child_id, vaccine_id);
            Ok(change)
        })();

        lock.unlock()?;
        result
    }
}

/// Read every record from a JSONL file. Malformed lines are skipped.
pub fn read_records(path: &Path) -> Result<Vec<AdministrationRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    let reader = BufReader::new(&file);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<AdministrationRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Failed to parse administration at line {}: {}", line_num + 1, e);
            }
        }
    }

    tracing::debug!("Read {} administrations from {:?}", records.len(), path);
    Ok(records)
}
