//! Bounded diagnostic log
//!
//! Storage failures are appended here for later inspection. The log is kept
//! under [`StorageKey::DiagnosticLog`] and written straight to the backend so
//! that a failing write never feeds back into error reporting.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::backend::KvBackend;
use crate::error::{ErrorKind, StorageError};
use crate::keys::StorageKey;

pub const DEFAULT_DIAGNOSTIC_CAPACITY: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticEntry {
    pub at: DateTime<Utc>,
    pub operation: String,
    #[serde(default)]
    pub key: Option<String>,
    pub kind: ErrorKind,
    pub message: String,
}

impl DiagnosticEntry {
    pub fn new(operation: &str, key: Option<&str>, kind: ErrorKind, message: String) -> Self {
        Self {
            at: Utc::now(),
            operation: operation.to_string(),
            key: key.map(str::to_string),
            kind,
            message,
        }
    }

    pub fn from_error(operation: &str, key: Option<&str>, err: &StorageError) -> Self {
        Self::new(operation, key, err.kind(), err.to_string())
    }
}

/// Receives failure reports. Implementations must not fail.
pub trait DiagnosticSink: Send + Sync {
    fn record(&self, entry: DiagnosticEntry);
}

pub struct DiagnosticLog {
    backend: Option<Arc<dyn KvBackend>>,
    capacity: usize,
    write_lock: Mutex<()>,
}

impl DiagnosticLog {
    pub fn new(backend: Arc<dyn KvBackend>, capacity: usize) -> Self {
        Self {
            backend: Some(backend),
            capacity,
            write_lock: Mutex::new(()),
        }
    }

    /// A log with nowhere to persist; entries only reach `tracing`.
    pub fn detached() -> Self {
        Self {
            backend: None,
            capacity: 0,
            write_lock: Mutex::new(()),
        }
    }

    pub fn entries(&self) -> Vec<DiagnosticEntry> {
        let Some(backend) = self.backend.as_ref() else {
            return Vec::new();
        };

        backend
            .get_raw(StorageKey::DiagnosticLog.as_str())
            .ok()
            .flatten()
            .and_then(|raw| serde_json::from_str(&raw).ok())
            .unwrap_or_default()
    }

    fn append(&self, backend: &dyn KvBackend, entry: DiagnosticEntry) -> crate::Result<()> {
        let _guard = self.write_lock.lock();

        let mut entries = self.entries();
        entries.push(entry);
        if entries.len() > self.capacity {
            let overflow = entries.len() - self.capacity;
            entries.drain(0..overflow);
        }

        let raw = serde_json::to_string(&entries)?;
        backend.set_raw(StorageKey::DiagnosticLog.as_str(), &raw)
    }
}

impl DiagnosticSink for DiagnosticLog {
    fn record(&self, entry: DiagnosticEntry) {
        tracing::warn!(
            operation = %entry.operation,
            key = ?entry.key,
            kind = %entry.kind,
            "{}",
            entry.message
        );

        let Some(backend) = self.backend.as_ref() else {
            return;
        };
        if self.capacity == 0 {
            return;
        }

        if let Err(e) = self.append(backend.as_ref(), entry) {
            tracing::debug!("Diagnostic log not persisted: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryKvBackend;

    fn entry(n: usize) -> DiagnosticEntry {
        DiagnosticEntry::new("set", Some("k"), ErrorKind::Other, format!("failure {n}"))
    }

    #[test]
    fn test_evicts_oldest() {
        let backend = Arc::new(MemoryKvBackend::new());
        let log = DiagnosticLog::new(backend, 3);

        for n in 0..5 {
            log.record(entry(n));
        }

        let messages: Vec<String> = log.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["failure 2", "failure 3", "failure 4"]);
    }

    #[test]
    fn test_failed_write_is_swallowed() {
        let backend = Arc::new(MemoryKvBackend::new());
        let log = DiagnosticLog::new(backend.clone(), 3);

        backend.set_available(false);
        log.record(entry(0));

        backend.set_available(true);
        assert!(log.entries().is_empty());
    }
}
