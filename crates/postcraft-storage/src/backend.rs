//! Raw string backends for the key-value store

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rusqlite::{Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::StorageError;
use crate::Result;

/// Default quota, matching the usual per-origin browser limit.
pub const DEFAULT_QUOTA_BYTES: usize = 5 * 1024 * 1024;

/// Synchronous string storage under arbitrary keys.
///
/// Implementations report failures as errors; the [`crate::KeyValueStore`]
/// wrapper is responsible for turning them into safe defaults.
pub trait KvBackend: Send + Sync {
    fn get_raw(&self, key: &str) -> Result<Option<String>>;
    fn set_raw(&self, key: &str, value: &str) -> Result<()>;
    fn remove_raw(&self, key: &str) -> Result<()>;
    /// Every stored key with its size in bytes (key plus value).
    fn entries(&self) -> Result<Vec<(String, usize)>>;
    fn quota_bytes(&self) -> Option<usize>;
}

fn check_quota(quota: Option<usize>, used_by_others: usize, key: &str, value: &str) -> Result<()> {
    if let Some(quota) = quota {
        let needed = used_by_others + key.len() + value.len();
        if needed > quota {
            return Err(StorageError::QuotaExceeded(format!(
                "writing {key} needs {needed} bytes, quota is {quota}"
            )));
        }
    }
    Ok(())
}

/// SQLite-backed key-value storage, one row per key.
pub struct SqliteKvBackend {
    conn: Mutex<Connection>,
    quota: Option<usize>,
}

impl SqliteKvBackend {
    pub fn open<P: AsRef<Path>>(path: P, quota: Option<usize>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let _: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        Self::init(conn, quota)
    }

    pub fn open_in_memory(quota: Option<usize>) -> Result<Self> {
        Self::init(Connection::open_in_memory()?, quota)
    }

    fn init(conn: Connection, quota: Option<usize>) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            quota,
        })
    }
}

impl KvBackend for SqliteKvBackend {
    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();

        if self.quota.is_some() {
            let used: i64 = conn.query_row(
                "SELECT COALESCE(SUM(LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))), 0)
                 FROM settings WHERE key != ?1",
                [key],
                |row| row.get(0),
            )?;
            check_quota(self.quota, used.max(0) as usize, key, value)?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove_raw(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM settings WHERE key = ?1", [key])?;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(String, usize)>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT key, LENGTH(CAST(key AS BLOB)) + LENGTH(CAST(value AS BLOB))
             FROM settings ORDER BY key",
        )?;

        let entries = stmt
            .query_map([], |row| {
                let size: i64 = row.get(1)?;
                Ok((row.get::<_, String>(0)?, size.max(0) as usize))
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(entries)
    }

    fn quota_bytes(&self) -> Option<usize> {
        self.quota
    }
}

/// In-process backend. Availability can be switched off to simulate a
/// disabled mechanism.
pub struct MemoryKvBackend {
    entries: RwLock<HashMap<String, String>>,
    available: AtomicBool,
    quota: Option<usize>,
}

impl MemoryKvBackend {
    pub fn new() -> Self {
        Self::with_quota(None)
    }

    pub fn with_quota(quota: Option<usize>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
            quota,
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageError::Unavailable(
                "key-value storage is disabled".to_string(),
            ))
        }
    }
}

impl Default for MemoryKvBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl KvBackend for MemoryKvBackend {
    fn get_raw(&self, key: &str) -> Result<Option<String>> {
        self.ensure_available()?;
        Ok(self.entries.read().get(key).cloned())
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<()> {
        self.ensure_available()?;
        let mut entries = self.entries.write();
        let used = entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum();
        check_quota(self.quota, used, key, value)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_raw(&self, key: &str) -> Result<()> {
        self.ensure_available()?;
        self.entries.write().remove(key);
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(String, usize)>> {
        self.ensure_available()?;
        let mut entries: Vec<(String, usize)> = self
            .entries
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), k.len() + v.len()))
            .collect();
        entries.sort();
        Ok(entries)
    }

    fn quota_bytes(&self) -> Option<usize> {
        self.quota
    }
}
