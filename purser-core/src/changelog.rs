//! Append-only audit trail of guest and table mutations.
//!
//! Entries are kept newest first and bounded to the most recent
//! `retention.change_log` records. Every mutation is written through to a
//! [`ChangeStore`]; a failed write is logged and never reaches the caller,
//! since recording the change must not block the guest action itself.

use crate::clock::Clock;
use crate::db::{Database, CHANGE_HISTORY_KEY};
use crate::error::Result;
use crate::types::{ChangeLogEntry, NewChangeLogEntry};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Default number of entries kept.
pub const DEFAULT_CHANGE_LOG_LIMIT: usize = 1000;

/// Durable backing for the change log.
pub trait ChangeStore: Send + Sync {
    /// Entries newest first.
    fn load_entries(&self) -> Result<Vec<ChangeLogEntry>>;

    /// Replace the stored entries with `entries` (newest first).
    fn save_entries(&self, entries: &[ChangeLogEntry]) -> Result<()>;
}

impl ChangeStore for Database {
    fn load_entries(&self) -> Result<Vec<ChangeLogEntry>> {
        self.load_change_history()
    }

    /// An empty history removes the stored blob.
    fn save_entries(&self, entries: &[ChangeLogEntry]) -> Result<()> {
        if entries.is_empty() {
            self.delete_value(CHANGE_HISTORY_KEY)?;
            return Ok(());
        }
        self.save_change_history(entries)
    }
}

/// Process-local store, used in tests and throwaway runs.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<Vec<ChangeLogEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChangeStore for MemoryStore {
    fn load_entries(&self) -> Result<Vec<ChangeLogEntry>> {
        Ok(self.entries.lock().unwrap().clone())
    }

    fn save_entries(&self, entries: &[ChangeLogEntry]) -> Result<()> {
        *self.entries.lock().unwrap() = entries.to_vec();
        Ok(())
    }
}

/// Read side of the change log as seen by the analytics engine.
pub trait ChangeHistory: Send + Sync {
    /// Entries newest first.
    fn change_history(&self) -> Vec<ChangeLogEntry>;
}

pub struct ChangeLog {
    entries: Mutex<VecDeque<ChangeLogEntry>>,
    store: Arc<dyn ChangeStore>,
    clock: Arc<dyn Clock>,
    limit: usize,
}

impl ChangeLog {
    /// Open the log, loading whatever the store already holds.
    ///
    /// A store that cannot be read yields an empty log.
    pub fn open(store: Arc<dyn ChangeStore>, clock: Arc<dyn Clock>, limit: usize) -> Self {
        let limit = limit.max(1);
        let mut entries: VecDeque<ChangeLogEntry> = match store.load_entries() {
            Ok(entries) => entries.into(),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to load change history; starting empty");
                VecDeque::new()
            }
        };
        entries.truncate(limit);

        tracing::debug!(entries = entries.len(), limit, "Opened change log");

        Self {
            entries: Mutex::new(entries),
            store,
            clock,
            limit,
        }
    }

    /// Record a change. Assigns the id and timestamp.
    ///
    /// The store write happens under the entries lock, so concurrent appends
    /// reach the store in the same order they reach the log.
    pub fn append(&self, new: NewChangeLogEntry) -> ChangeLogEntry {
        let entry = ChangeLogEntry::from_new(uuid::Uuid::new_v4().to_string(), self.clock.now(), new);

        let mut entries = self.entries.lock().unwrap();
        entries.push_front(entry.clone());
        entries.truncate(self.limit);

        tracing::debug!(
            id = %entry.id,
            operation = %entry.operation,
            action = entry.action_type.as_str(),
            "Appended change log entry"
        );

        self.persist(entries.make_contiguous());
        entry
    }

    /// All entries, newest first.
    pub fn read_all(&self) -> Vec<ChangeLogEntry> {
        self.entries.lock().unwrap().iter().cloned().collect()
    }

    /// Entries with `timestamp >= cutoff`, newest first.
    pub fn entries_since(&self, cutoff: DateTime<Utc>) -> Vec<ChangeLogEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut entries = self.entries.lock().unwrap();
        entries.clear();
        tracing::info!("Cleared change log");
        self.persist(&[]);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn persist(&self, entries: &[ChangeLogEntry]) {
        if let Err(e) = self.store.save_entries(entries) {
            tracing::warn!(error = %e, entries = entries.len(), "Failed to persist change log");
        }
    }
}

impl ChangeHistory for ChangeLog {
    fn change_history(&self) -> Vec<ChangeLogEntry> {
        self.read_all()
    }
}
