//! # Tether Client
//!
//! Offline-first access to per-identity documents.
//!
//! Reads and writes go through a [`SyncOrchestrator`]. Every write lands in a
//! device-local cache first; while the remote store is reachable it is also
//! written through, otherwise it waits in a durable [`OfflineQueue`] until
//! [`SyncOrchestrator::sync_offline_data`] runs (typically on reconnect).
//! Merge semantics come from `tether-engine`.
//!
//! ## Collaborators
//!
//! The orchestrator is wired from three injected traits:
//! - [`LocalStore`] - synchronous key/value storage ([`MemoryStore`], [`FileStore`])
//! - [`RemoteStore`] - the authoritative document store ([`HttpRemoteStore`], [`MemoryRemoteStore`])
//! - [`ConnectivityMonitor`] - reachability ([`ConnectivityFlag`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use tether_client::{
//!     ConnectivityFlag, MemoryRemoteStore, MemoryStore, SyncOptions, SyncOrchestrator,
//! };
//! use tether_engine::{Identity, MergeSchema};
//!
//! # async fn run() -> tether_client::Result<()> {
//! let connectivity = Arc::new(ConnectivityFlag::new());
//! let orchestrator = Arc::new(SyncOrchestrator::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryRemoteStore::new()),
//!     connectivity.clone(),
//!     MergeSchema::new().union("favorites"),
//!     SyncOptions::default(),
//! ));
//! orchestrator.spawn_reconnect_loop(connectivity.subscribe());
//!
//! let user = Identity::user("u1");
//! let patch = json!({"favorites": ["km"]}).as_object().cloned().unwrap_or_default();
//! orchestrator.update_user_data(&user, patch).await?;
//!
//! // Queued while offline; flushed once connectivity returns.
//! connectivity.set_online(true);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connectivity;
pub mod error;
pub mod local;
mod locks;
pub mod orchestrator;
pub mod queue;
pub mod remote;

pub use config::{ClientConfig, ConfigError};
pub use connectivity::{ConnectivityFlag, ConnectivityMonitor};
pub use error::{RemoteError, Result, StoreError, SyncError};
pub use local::{FileStore, LocalStore, MemoryStore};
pub use orchestrator::{FlushFailure, FlushPolicy, SyncOptions, SyncOrchestrator, SyncReport};
pub use queue::OfflineQueue;
pub use remote::{HttpRemoteStore, MemoryRemoteStore, RemoteStore};
