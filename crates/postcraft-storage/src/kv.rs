//! Key-value store
//!
//! Small JSON payloads under a fixed set of logical keys. No operation here
//! returns an error: failures produce the caller's default (reads) or
//! `false` (writes), and are reported to the diagnostic sink.

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::backend::KvBackend;
use crate::diagnostics::{DiagnosticEntry, DiagnosticLog, DiagnosticSink};
use crate::error::{ErrorKind, StorageError};
use crate::keys::StorageKey;

const PROBE_KEY: &str = "postcraft.__probe__";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KvEntryInfo {
    pub key: String,
    pub bytes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KvInfo {
    pub available: bool,
    pub entries: Vec<KvEntryInfo>,
    pub total_bytes: usize,
    pub quota_bytes: Option<usize>,
}

pub struct KeyValueStore {
    backend: Option<Arc<dyn KvBackend>>,
    sink: Arc<dyn DiagnosticSink>,
    diagnostics: Option<Arc<DiagnosticLog>>,
    last_failure: Mutex<Option<ErrorKind>>,
}

impl KeyValueStore {
    /// Store whose failures are logged into a bounded diagnostic log kept
    /// on the same backend.
    pub fn new(backend: Arc<dyn KvBackend>, diagnostic_capacity: usize) -> Self {
        let log = Arc::new(DiagnosticLog::new(Arc::clone(&backend), diagnostic_capacity));
        Self {
            backend: Some(backend),
            sink: log.clone(),
            diagnostics: Some(log),
            last_failure: Mutex::new(None),
        }
    }

    pub fn with_sink(backend: Arc<dyn KvBackend>, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self {
            backend: Some(backend),
            sink,
            diagnostics: None,
            last_failure: Mutex::new(None),
        }
    }

    /// Store with no mechanism behind it. Every read yields the default.
    pub fn unavailable() -> Self {
        Self {
            backend: None,
            sink: Arc::new(DiagnosticLog::detached()),
            diagnostics: None,
            last_failure: Mutex::new(None),
        }
    }

    fn backend(&self) -> Result<&dyn KvBackend, StorageError> {
        self.backend
            .as_deref()
            .ok_or_else(|| StorageError::Unavailable("no key-value mechanism".to_string()))
    }

    fn report(&self, operation: &str, key: Option<&str>, err: &StorageError) {
        *self.last_failure.lock() = Some(err.kind());
        self.sink
            .record(DiagnosticEntry::from_error(operation, key, err));
    }

    /// Probe the mechanism with a throwaway write and delete.
    pub fn is_available(&self) -> bool {
        let probe = self
            .backend()
            .and_then(|backend| {
                backend.set_raw(PROBE_KEY, "1")?;
                backend.remove_raw(PROBE_KEY)
            });

        match probe {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Key-value probe failed: {}", e);
                false
            }
        }
    }

    /// Read and deserialize `key`, falling back to `default` when the key is
    /// absent, the mechanism is unavailable, or the stored text is invalid.
    pub fn get<T: DeserializeOwned>(&self, key: StorageKey, default: T) -> T {
        let raw = match self.backend().and_then(|backend| backend.get_raw(key.as_str())) {
            Ok(Some(raw)) => raw,
            Ok(None) => return default,
            Err(e) => {
                self.report("get", Some(key.as_str()), &e);
                return default;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(value) => value,
            Err(e) => {
                self.report("get", Some(key.as_str()), &StorageError::Json(e));
                default
            }
        }
    }

    pub fn set<T: Serialize + ?Sized>(&self, key: StorageKey, value: &T) -> bool {
        let result = serde_json::to_string(value)
            .map_err(StorageError::from)
            .and_then(|raw| self.backend()?.set_raw(key.as_str(), &raw));

        match result {
            Ok(()) => {
                tracing::debug!(key = %key, "Stored value");
                true
            }
            Err(e) => {
                self.report("set", Some(key.as_str()), &e);
                false
            }
        }
    }

    pub fn remove(&self, key: StorageKey) -> bool {
        match self.backend().and_then(|backend| backend.remove_raw(key.as_str())) {
            Ok(()) => true,
            Err(e) => {
                self.report("remove", Some(key.as_str()), &e);
                false
            }
        }
    }

    /// Remove every key in `keys`, continuing past failures.
    pub fn clear(&self, keys: &[StorageKey]) -> bool {
        keys.iter()
            .fold(true, |ok, key| self.remove(*key) && ok)
    }

    pub fn info(&self) -> KvInfo {
        let quota_bytes = self.backend.as_ref().and_then(|b| b.quota_bytes());
        let entries = match self.backend().and_then(|backend| backend.entries()) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("Key-value info unavailable: {}", e);
                return KvInfo {
                    available: false,
                    entries: Vec::new(),
                    total_bytes: 0,
                    quota_bytes,
                };
            }
        };

        let total_bytes: usize = entries.iter().map(|(_, bytes)| bytes).sum();
        KvInfo {
            available: true,
            entries: entries
                .into_iter()
                .map(|(key, bytes)| KvEntryInfo { key, bytes })
                .collect(),
            total_bytes,
            quota_bytes,
        }
    }

    /// Forward a failure observed outside this store to the diagnostic sink.
    pub fn record_diagnostic(&self, entry: DiagnosticEntry) {
        self.sink.record(entry);
    }

    /// Kind of the most recent failure, if any operation has failed.
    pub fn last_failure(&self) -> Option<ErrorKind> {
        *self.last_failure.lock()
    }

    pub fn diagnostics(&self) -> Vec<DiagnosticEntry> {
        self.diagnostics
            .as_ref()
            .map(|log| log.entries())
            .unwrap_or_default()
    }
}
