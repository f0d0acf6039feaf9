//! Storage configuration

use postcraft_storage::{DocumentLocation, DEFAULT_DIAGNOSTIC_CAPACITY, DEFAULT_QUOTA_BYTES};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;

use crate::error::CoreError;
use crate::Result;

fn default_connect_timeout() -> u64 {
    10
}

/// Remote storage endpoint. Its presence selects the remote strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub base_url: Url,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl RemoteConfig {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            api_token: None,
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding the local stores
    pub data_dir: PathBuf,
    /// Where the document store lives
    pub documents: DocumentLocation,
    /// Key-value store file; `None` keeps settings in memory
    pub settings_path: Option<PathBuf>,
    /// Key-value quota in bytes
    pub kv_quota_bytes: Option<usize>,
    /// Maximum retained diagnostic entries
    pub diagnostic_capacity: usize,
    /// Most recent content records included in an export
    pub export_limit: usize,
    /// Default age threshold for maintenance
    pub maintenance_max_age_days: u32,
    /// Remote storage, when configured
    pub remote: Option<RemoteConfig>,
}

impl Config {
    pub fn new(data_dir: PathBuf) -> Self {
        Self {
            documents: DocumentLocation::Disk(data_dir.join("documents.db")),
            settings_path: Some(data_dir.join("settings.db")),
            data_dir,
            kv_quota_bytes: Some(DEFAULT_QUOTA_BYTES),
            diagnostic_capacity: DEFAULT_DIAGNOSTIC_CAPACITY,
            export_limit: 100,
            maintenance_max_age_days: 30,
            remote: None,
        }
    }

    /// Everything in memory. Nothing survives the process.
    pub fn in_memory() -> Self {
        Self {
            documents: DocumentLocation::Memory,
            settings_path: None,
            ..Self::new(PathBuf::from(".postcraft"))
        }
    }

    pub fn with_remote(mut self, remote: RemoteConfig) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("Postcraft"))
            .unwrap_or_else(|| PathBuf::from(".postcraft"))
    }

    /// Default configuration overlaid with `POSTCRAFT_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("POSTCRAFT_DATA_DIR").filter(|v| !v.trim().is_empty()) {
            Some(dir) => Self::new(PathBuf::from(dir)),
            None => Self::default(),
        };

        if let Some(raw) = lookup("POSTCRAFT_REMOTE_URL").filter(|v| !v.trim().is_empty()) {
            let base_url = Url::parse(raw.trim())
                .map_err(|e| CoreError::Config(format!("POSTCRAFT_REMOTE_URL: {e}")))?;
            let mut remote = RemoteConfig::new(base_url);
            remote.api_token = lookup("POSTCRAFT_REMOTE_TOKEN").filter(|v| !v.is_empty());
            config.remote = Some(remote);
        }

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Self::data_dir())
    }
}

mod dirs {
    use std::path::PathBuf;

    pub fn data_local_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("LOCALAPPDATA").ok().map(PathBuf::from)
        }
        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|h| PathBuf::from(h).join("Library/Application Support"))
        }
        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_DATA_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| {
                    std::env::var("HOME")
                        .ok()
                        .map(|h| PathBuf::from(h).join(".local/share"))
                })
        }
        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }
}
