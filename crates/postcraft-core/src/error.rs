//! Core error types

use postcraft_storage::{ErrorKind, StorageError, StorageKey};
use thiserror::Error;

const QUOTA_REMEDIATION: &str = "export your data or run maintenance to free space";

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Remote storage unreachable: {0}")]
    RemoteUnreachable(String),

    #[error("Remote storage returned {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Could not save {key}: {kind}")]
    SettingsNotSaved { key: StorageKey, kind: ErrorKind },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Storage(e) => e.kind(),
            CoreError::RemoteUnreachable(_) | CoreError::Remote { .. } => {
                ErrorKind::RemoteUnreachable
            }
            CoreError::SettingsNotSaved { kind, .. } => *kind,
            _ => ErrorKind::Other,
        }
    }

    /// What the user can do about this failure, when there is something.
    pub fn remediation(&self) -> Option<&'static str> {
        match self.kind() {
            ErrorKind::QuotaExceeded => Some(QUOTA_REMEDIATION),
            _ => None,
        }
    }
}
