//! Flat key-value storage for saved documents.
//!
//! Two backends share the [`KeyValueStore`] trait:
//!
//! - [`MemoryStore`]: in-process map with a byte quota, the same budget model
//!   as browser local storage (key + value length counted per entry).
//! - [`SqliteStore`]: one `entries` table in a SQLite file, optionally capped
//!   with the same quota rule.
//!
//! Writes that would cross the quota fail with
//! [`StorageError::QuotaExceeded`] and leave the previous value in place.

use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StorageError};

/// Browser local storage budget.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    /// Returns whether the key existed.
    fn remove(&mut self, key: &str) -> Result<bool>;
    /// All keys, sorted.
    fn keys(&self) -> Result<Vec<String>>;
}

fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

/// Fail if replacing `key` (currently `existing` bytes) with `incoming` bytes
/// would take `used` past `quota`.
fn check_quota(key: &str, used: usize, existing: usize, incoming: usize, quota: Option<usize>) -> Result<()> {
    let Some(quota) = quota else {
        return Ok(());
    };
    let after = used - existing + incoming;
    if after > quota {
        return Err(StorageError::QuotaExceeded {
            key: key.to_string(),
            needed: incoming,
            available: quota.saturating_sub(used - existing),
        });
    }
    Ok(())
}

// ============================================================================
// In-memory
// ============================================================================

#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
    quota: Option<usize>,
    used: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_quota(DEFAULT_QUOTA_BYTES)
    }
}

impl MemoryStore {
    pub fn with_quota(bytes: usize) -> Self {
        Self { entries: BTreeMap::new(), quota: Some(bytes), used: 0 }
    }

    pub fn unlimited() -> Self {
        Self { entries: BTreeMap::new(), quota: None, used: 0 }
    }

    /// Bytes currently counted against the quota.
    pub fn used_bytes(&self) -> usize {
        self.used
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let existing = self.entries.get(key).map(|v| entry_size(key, v)).unwrap_or(0);
        let incoming = entry_size(key, value);
        check_quota(key, self.used, existing, incoming, self.quota)?;

        self.entries.insert(key.to_string(), value.to_string());
        self.used = self.used - existing + incoming;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        match self.entries.remove(key) {
            Some(value) => {
                self.used -= entry_size(key, &value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.entries.keys().cloned().collect())
    }
}

// ============================================================================
// SQLite
// ============================================================================

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    quota: Option<usize>,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn, quota: None })
    }

    pub fn with_quota(mut self, quota: Option<usize>) -> Self {
        self.quota = quota;
        self
    }

    pub fn used_bytes(&self) -> Result<usize> {
        let used: i64 = self.conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0) FROM entries",
            [],
            |row| row.get(0),
        )?;
        Ok(used.max(0) as usize)
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM entries WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        if self.quota.is_some() {
            let existing = self.get(key)?.map(|v| entry_size(key, &v)).unwrap_or(0);
            check_quota(key, self.used_bytes()?, existing, entry_size(key, value), self.quota)?;
        }
        self.conn.execute(
            "INSERT INTO entries (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<bool> {
        let removed = self.conn.execute("DELETE FROM entries WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    fn keys(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT key FROM entries ORDER BY key")?;
        let keys = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn exercise(store: &mut dyn KeyValueStore) {
        assert_eq!(store.get("a").unwrap(), None);
        store.set("a", "1").unwrap();
        store.set("b", "2").unwrap();
        store.set("a", "3").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("3"));
        assert_eq!(store.keys().unwrap(), vec!["a", "b"]);
        assert!(store.remove("a").unwrap());
        assert!(!store.remove("a").unwrap());
        assert_eq!(store.keys().unwrap(), vec!["b"]);
    }

    #[test]
    fn test_memory_store_basics() {
        exercise(&mut MemoryStore::default());
    }

    #[test]
    fn test_sqlite_store_basics() {
        exercise(&mut SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_memory_quota_rejects_and_keeps_old_value() {
        let mut store = MemoryStore::with_quota(10);
        store.set("k", "12345").unwrap();
        assert_eq!(store.used_bytes(), 6);

        let err = store.set("k", "1234567890").unwrap_err();
        assert!(matches!(err, StorageError::QuotaExceeded { available: 10, .. }));
        assert_eq!(store.get("k").unwrap().as_deref(), Some("12345"));

        // Overwriting frees the old entry's bytes first
        store.set("k", "123456789").unwrap();
        assert_eq!(store.used_bytes(), 10);
    }

    #[test]
    fn test_sqlite_quota() {
        let mut store = SqliteStore::open_in_memory().unwrap().with_quota(Some(8));
        store.set("a", "1234").unwrap();
        assert!(matches!(store.set("b", "1234"), Err(StorageError::QuotaExceeded { .. })));
        assert_eq!(store.get("b").unwrap(), None);
    }

    #[test]
    fn test_sqlite_store_persists_across_opens() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.sqlite3");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.set("greeting", "hello").unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("greeting").unwrap().as_deref(), Some("hello"));
    }
}
