//! Shared document-store connection
//!
//! The connection is opened lazily on first use and kept for the lifetime of
//! the [`Database`]. If it is dropped, explicitly or after an I/O failure,
//! the next call opens a fresh one. A failed schema upgrade is permanent:
//! every later call fails with the same error without touching the file.

use parking_lot::Mutex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::StorageError;
use crate::migrations::run_migrations;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "camelCase")]
pub enum DocumentLocation {
    Disk(PathBuf),
    /// Private in-memory database. Contents do not survive a re-open.
    Memory,
    Disabled,
}

pub struct Database {
    location: DocumentLocation,
    conn: Arc<Mutex<Option<Connection>>>,
    fatal: Arc<Mutex<Option<String>>>,
}

impl Database {
    pub fn new(location: DocumentLocation) -> Self {
        Self {
            location,
            conn: Arc::new(Mutex::new(None)),
            fatal: Arc::new(Mutex::new(None)),
        }
    }

    pub fn location(&self) -> &DocumentLocation {
        &self.location
    }

    pub fn is_open(&self) -> bool {
        self.conn.lock().is_some()
    }

    /// Why the store is unusable for the rest of this session, if it is.
    pub fn fatal_error(&self) -> Option<String> {
        self.fatal.lock().clone()
    }

    /// Open the connection now instead of on first use.
    pub async fn open(&self) -> Result<()> {
        self.call(|_| Ok(())).await
    }

    /// Drop the shared connection. The next call re-opens it.
    pub fn close(&self) {
        if self.conn.lock().take().is_some() {
            tracing::debug!("Closed document store connection");
        }
    }

    /// Run `f` against the shared connection on the blocking pool.
    pub async fn call<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let shared = Arc::clone(&self.conn);
        let fatal = Arc::clone(&self.fatal);
        let location = self.location.clone();

        tokio::task::spawn_blocking(move || {
            if let Some(reason) = fatal.lock().clone() {
                return Err(StorageError::SchemaUpgradeFailed(reason));
            }

            let mut guard = shared.lock();
            let mut conn = match guard.take() {
                Some(conn) => conn,
                None => match open_connection(&location) {
                    Ok(conn) => conn,
                    Err(StorageError::SchemaUpgradeFailed(reason)) => {
                        tracing::error!("Document store disabled for this session: {}", reason);
                        *fatal.lock() = Some(reason.clone());
                        return Err(StorageError::SchemaUpgradeFailed(reason));
                    }
                    Err(e) => return Err(e),
                },
            };

            let result = f(&mut conn);
            match &result {
                Err(e) if e.is_connection_lost() => {
                    tracing::warn!("Dropping document store connection: {}", e);
                }
                _ => *guard = Some(conn),
            }
            result
        })
        .await?
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            location: self.location.clone(),
            conn: Arc::clone(&self.conn),
            fatal: Arc::clone(&self.fatal),
        }
    }
}

fn open_connection(location: &DocumentLocation) -> Result<Connection> {
    let mut conn = match location {
        DocumentLocation::Disabled => {
            return Err(StorageError::Unavailable(
                "document storage is disabled".to_string(),
            ))
        }
        DocumentLocation::Memory => Connection::open_in_memory()?,
        DocumentLocation::Disk(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Unavailable(format!("{}: {}", parent.display(), e))
                })?;
            }
            let conn = Connection::open(path)?;

            // WAL mode for better concurrent performance
            let _: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            conn
        }
    };

    run_migrations(&mut conn)?;
    tracing::info!(location = ?location, "Opened document store");

    Ok(conn)
}
