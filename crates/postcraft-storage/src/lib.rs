//! Postcraft Storage Layer
//!
//! Local persistence for brand settings and generated content.
//! Two mechanisms live here: a synchronous key-value store for small
//! settings payloads, and an asynchronous, versioned document store for
//! larger records partitioned into collections.

mod backend;
mod database;
mod diagnostics;
mod documents;
mod error;
mod keys;
mod kv;
mod migrations;

pub use backend::{KvBackend, MemoryKvBackend, SqliteKvBackend, DEFAULT_QUOTA_BYTES};
pub use database::{Database, DocumentLocation};
pub use diagnostics::{DiagnosticEntry, DiagnosticLog, DiagnosticSink, DEFAULT_DIAGNOSTIC_CAPACITY};
pub use documents::{
    format_timestamp, generate_id, parse_timestamp, CollectionInfo, Direction, DocumentStore,
    DocumentStoreInfo, GetAllOptions, OrderBy, Record, DOCUMENT_STORE_NAME,
};
pub use error::{ErrorKind, StorageError};
pub use keys::StorageKey;
pub use kv::{KeyValueStore, KvEntryInfo, KvInfo};
pub use migrations::{Collection, IndexSpec, SCHEMA_VERSION};

pub type Result<T> = std::result::Result<T, StorageError>;
