//! Error types for the sync client.
//!
//! Only [`SyncError`] reaches callers of the orchestrator. Remote failures
//! ([`RemoteError`]) are absorbed: reads degrade to local data and writes
//! degrade to the offline queue.

use std::time::Duration;

use crate::config::ConfigError;

/// Local persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt value at '{key}': {reason}")]
    Corrupt { key: String, reason: String },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Remote store errors.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status: {0}")]
    Status(u16),

    #[error("Remote call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid remote document: {0}")]
    Decode(String),

    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced to callers of the sync client.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),

    #[error("Engine error: {0}")]
    Engine(#[from] tether_engine::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Remote store error: {0}")]
    Remote(#[from] RemoteError),
}

/// Result type for sync client operations.
pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = StoreError::Corrupt {
            key: "offlineWriteQueue".into(),
            reason: "expected an array".into(),
        };
        assert_eq!(
            err.to_string(),
            "Corrupt value at 'offlineWriteQueue': expected an array"
        );

        let err = SyncError::from(StoreError::Unavailable("quota exceeded".into()));
        assert_eq!(
            err.to_string(),
            "Persistence failure: Storage unavailable: quota exceeded"
        );

        let err = RemoteError::Timeout(Duration::from_millis(250));
        assert_eq!(err.to_string(), "Remote call timed out after 250ms");
    }
}
