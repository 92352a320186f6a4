//! Database repository layer
//!
//! The analytics core only needs durable key-value blobs, so the repository
//! exposes a small get/set/delete surface plus typed helpers for the change
//! history blob.

use crate::error::{Error, Result};
use crate::types::ChangeLogEntry;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Mutex;

/// Key under which the change history is stored.
pub const CHANGE_HISTORY_KEY: &str = "change_history";

/// Database handle with connection pooling (single connection for now)
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    // ============================================
    // Key-value operations
    // ============================================

    /// Read the raw JSON stored under `key`
    pub fn get_value(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let conn = self.conn.lock().unwrap();
        let raw: Option<String> = conn
            .query_row("SELECT value FROM kv_store WHERE key = ?", [key], |row| {
                row.get(0)
            })
            .optional()?;

        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    /// Insert or replace the JSON stored under `key`
    pub fn set_value(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO kv_store (key, value, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value.to_string(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Remove `key`, returning whether it existed
    pub fn delete_value(&self, key: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let removed = conn.execute("DELETE FROM kv_store WHERE key = ?", [key])?;
        Ok(removed > 0)
    }

    // ============================================
    // Change history
    // ============================================

    /// Load the persisted change history (newest first)
    pub fn load_change_history(&self) -> Result<Vec<ChangeLogEntry>> {
        match self.get_value(CHANGE_HISTORY_KEY)? {
            Some(value) => serde_json::from_value(value).map_err(Error::from),
            None => Ok(Vec::new()),
        }
    }

    /// Replace the persisted change history
    pub fn save_change_history(&self, entries: &[ChangeLogEntry]) -> Result<()> {
        let value = serde_json::to_value(entries)?;
        self.set_value(CHANGE_HISTORY_KEY, &value)
    }
}
