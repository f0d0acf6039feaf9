//! Postcraft Core
//!
//! The persistence entry point for the content studio. UI code talks only to
//! [`StorageService`]; it routes each logical entity to the right store and
//! hides the local/remote split.

mod config;
mod content;
mod error;
mod local;
mod maintenance;
mod remote;
mod service;
mod settings;
mod snapshot;
mod strategy;

pub use config::{Config, RemoteConfig};
pub use content::{Document, GeneratedContent, ImagePayload, Layout, Project};
pub use error::CoreError;
pub use local::LocalContentStore;
pub use maintenance::{MaintenanceOptions, MaintenanceReport};
pub use remote::RemoteContentStore;
pub use service::{ServiceStatus, StorageService};
pub use settings::{
    AppPreferences, BrandKit, CampaignVariable, RecentPrompts, Settings, Theme, UserInfo,
    MAX_BRAND_COLORS, MAX_RECENT_PROMPTS,
};
pub use snapshot::{ExportMetadata, ExportSnapshot, EXPORT_FORMAT_VERSION};
pub use strategy::{ContentStore, Served, StorageMode};

pub use postcraft_storage::{
    Collection, DiagnosticEntry, DocumentLocation, DocumentStoreInfo, ErrorKind, KvInfo,
    StorageError, StorageKey,
};

pub type Result<T> = std::result::Result<T, CoreError>;

/// Initialize logging
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).with_target(true).init();
}
