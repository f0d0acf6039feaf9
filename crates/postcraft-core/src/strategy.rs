//! Content store strategy
//!
//! The façade talks to exactly one [`ContentStore`] chosen at construction:
//! the local stores, or a remote API with local fallback.

use async_trait::async_trait;
use postcraft_storage::StorageKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::{GeneratedContent, Layout};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageMode {
    Local,
    Remote,
}

impl std::fmt::Display for StorageMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageMode::Local => f.write_str("local"),
            StorageMode::Remote => f.write_str("remote"),
        }
    }
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    fn mode(&self) -> StorageMode;

    /// Raw stored settings for `key`, or `None` when nothing is stored.
    async fn load_settings(&self, key: StorageKey) -> Result<Option<Value>>;
    async fn save_settings(&self, key: StorageKey, value: Value) -> Result<()>;

    async fn save_content(&self, content: GeneratedContent) -> Result<String>;
    async fn load_content(&self, id: &str) -> Result<Option<GeneratedContent>>;
    /// Newest first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<GeneratedContent>>;
    async fn search(&self, text: &str) -> Result<Vec<GeneratedContent>>;
    async fn delete_content(&self, id: &str) -> Result<bool>;

    async fn save_layout(&self, layout: Layout) -> Result<String>;
    async fn list_layouts_for_content(&self, image_id: &str) -> Result<Vec<Layout>>;
}

/// A result tagged with the path that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Served<T> {
    pub value: T,
    pub served_by: StorageMode,
    /// Why the configured path was bypassed, when it was.
    pub fallback_reason: Option<String>,
}

impl<T> Served<T> {
    pub fn new(value: T, served_by: StorageMode) -> Self {
        Self {
            value,
            served_by,
            fallback_reason: None,
        }
    }

    pub fn fallback(value: T, reason: String) -> Self {
        Self {
            value,
            served_by: StorageMode::Local,
            fallback_reason: Some(reason),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback_reason.is_some()
    }

    pub fn into_inner(self) -> T {
        self.value
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Served<U> {
        Served {
            value: f(self.value),
            served_by: self.served_by,
            fallback_reason: self.fallback_reason,
        }
    }
}

/// Collects provenance across several routed calls. Any fallback marks the
/// combined result as locally served.
#[derive(Debug)]
pub(crate) struct ServedTracker {
    served_by: StorageMode,
    fallback_reason: Option<String>,
}

impl ServedTracker {
    pub(crate) fn new(mode: StorageMode) -> Self {
        Self {
            served_by: mode,
            fallback_reason: None,
        }
    }

    pub(crate) fn take<T>(&mut self, served: Served<T>) -> T {
        if let Some(reason) = served.fallback_reason {
            self.served_by = StorageMode::Local;
            self.fallback_reason.get_or_insert(reason);
        }
        served.value
    }

    pub(crate) fn finish<T>(self, value: T) -> Served<T> {
        Served {
            value,
            served_by: self.served_by,
            fallback_reason: self.fallback_reason,
        }
    }
}
