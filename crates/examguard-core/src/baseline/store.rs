//! SQLite-backed key-value store for baseline anchors.
//!
//! The reference head position and the captured landmark snapshot are
//! externalized here so they survive a process reload mid-session. The
//! store is a plain key-value table with JSON-encoded values; it is not
//! transactional and does not need to be.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Persistent key-value storage for baseline anchors.
pub struct BaselineStore {
    conn: Connection,
}

impl BaselineStore {
    /// Open or create the baseline database at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Creating directory for {}", db_path.display()))?;
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("Opening baseline database at {}", db_path.display()))?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (useful for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self { conn };
        store.init_schema()?;
        Ok(store)
    }

    /// Default database path.
    pub fn default_path() -> PathBuf {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
        PathBuf::from(home).join(".local/share/examguard/baseline.db")
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS baseline (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Store a value under a key (insert or replace).
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO baseline (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, json],
        )?;
        Ok(())
    }

    /// Fetch and decode the value under a key, if present.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM baseline WHERE key = ?1")?;
        let json: Option<String> = stmt
            .query_row(rusqlite::params![key], |row| row.get(0))
            .ok();
        match json {
            Some(json) => {
                let value = serde_json::from_str(&json)
                    .with_context(|| format!("Decoding stored value for key '{key}'"))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Remove a key; removing an absent key is a no-op.
    pub fn delete(&self, key: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM baseline WHERE key = ?1",
            rusqlite::params![key],
        )?;
        Ok(())
    }
}
