//! Storage error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Schema upgrade failed: {0}")]
    SchemaUpgradeFailed(String),

    #[error("Database error: {0}")]
    Sqlite(#[source] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    #[error("Storage task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match sqlite_code(&err) {
            Some(rusqlite::ErrorCode::DiskFull) => StorageError::QuotaExceeded(err.to_string()),
            Some(rusqlite::ErrorCode::CannotOpen) => StorageError::Unavailable(err.to_string()),
            _ => StorageError::Sqlite(err),
        }
    }
}

fn sqlite_code(err: &rusqlite::Error) -> Option<rusqlite::ErrorCode> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => Some(e.code),
        _ => None,
    }
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::Unavailable(_) => ErrorKind::Unavailable,
            StorageError::QuotaExceeded(_) => ErrorKind::QuotaExceeded,
            StorageError::SchemaUpgradeFailed(_) => ErrorKind::SchemaUpgradeFailed,
            _ => ErrorKind::Other,
        }
    }

    /// Whether the shared connection should be dropped and re-opened on the
    /// next call.
    pub(crate) fn is_connection_lost(&self) -> bool {
        match self {
            StorageError::Unavailable(_) => true,
            StorageError::Sqlite(err) => matches!(
                sqlite_code(err),
                Some(
                    rusqlite::ErrorCode::SystemIoFailure
                        | rusqlite::ErrorCode::NotADatabase
                        | rusqlite::ErrorCode::DatabaseCorrupt
                )
            ),
            _ => false,
        }
    }
}

/// Failure taxonomy shared by every storage path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Unavailable,
    QuotaExceeded,
    NotFound,
    SchemaUpgradeFailed,
    RemoteUnreachable,
    Other,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Unavailable => "unavailable",
            ErrorKind::QuotaExceeded => "quota exceeded",
            ErrorKind::NotFound => "not found",
            ErrorKind::SchemaUpgradeFailed => "schema upgrade failed",
            ErrorKind::RemoteUnreachable => "remote unreachable",
            ErrorKind::Other => "other",
        };
        f.write_str(name)
    }
}
