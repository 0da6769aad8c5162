//! Client configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tether_engine::MergeSchema;

use crate::orchestrator::{FlushPolicy, SyncOptions};

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the remote document server
    pub remote_url: String,
    /// Directory holding the local document cache and offline queue
    pub data_dir: PathBuf,
    /// Upper bound for every remote call
    pub remote_timeout: Duration,
    pub flush_policy: FlushPolicy,
    /// Optional MergeSchema JSON file
    pub schema_path: Option<PathBuf>,
}

impl ClientConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let remote_url = lookup("TETHER_REMOTE_URL").ok_or(ConfigError::MissingRemoteUrl)?;

        let data_dir = lookup("TETHER_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".tether"));

        let remote_timeout = match lookup("TETHER_REMOTE_TIMEOUT_MS") {
            Some(raw) => {
                let millis: u64 = raw
                    .parse()
                    .map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?;
                if millis == 0 {
                    return Err(ConfigError::InvalidTimeout(raw));
                }
                Duration::from_millis(millis)
            }
            None => SyncOptions::default().remote_timeout,
        };

        let flush_policy = match lookup("TETHER_FLUSH_POLICY") {
            Some(raw) => raw.parse()?,
            None => FlushPolicy::default(),
        };

        let schema_path = lookup("TETHER_SCHEMA_PATH").map(PathBuf::from);

        Ok(Self {
            remote_url,
            data_dir,
            remote_timeout,
            flush_policy,
            schema_path,
        })
    }

    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            remote_timeout: self.remote_timeout,
            flush_policy: self.flush_policy,
        }
    }

    /// Load the merge schema, or an empty (all-override) schema if none is configured.
    pub fn load_schema(&self) -> Result<MergeSchema, ConfigError> {
        let Some(path) = &self.schema_path else {
            return Ok(MergeSchema::new());
        };

        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Schema {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        MergeSchema::from_json(&raw).map_err(|e| ConfigError::Schema {
            path: path.clone(),
            reason: e.to_string(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("TETHER_REMOTE_URL environment variable is required")]
    MissingRemoteUrl,

    #[error("Invalid remote timeout: {0}")]
    InvalidTimeout(String),

    #[error("Invalid flush policy: {0}")]
    InvalidFlushPolicy(String),

    #[error("Invalid schema at {path:?}: {reason}")]
    Schema { path: PathBuf, reason: String },
}
