//! Read/write/flush coordination between the local cache, the offline queue
//! and the remote store.
//!
//! The orchestrator is the only public entry point for application code:
//!
//! - [`SyncOrchestrator::get_user_data`] returns `merge(remote, local)`,
//!   falling back to local data whenever the remote store is unreachable.
//! - [`SyncOrchestrator::update_user_data`] always lands in the local cache
//!   first, then either reaches the remote store directly or waits in the
//!   offline queue.
//! - [`SyncOrchestrator::sync_offline_data`] folds the queue into one patch
//!   per identity and pushes each one.
//!
//! Remote failures never surface as errors. They degrade to local-only reads
//! and queued writes, and are reported through `tracing` and [`SyncReport`].

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tether_engine::{Document, Identity, MergeEngine, MergeSchema, Patch, QueueEntry};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{ClientConfig, ConfigError};
use crate::connectivity::ConnectivityMonitor;
use crate::error::{RemoteError, Result, StoreError};
use crate::local::{FileStore, LocalStore};
use crate::locks::KeyedLocks;
use crate::queue::OfflineQueue;
use crate::remote::{HttpRemoteStore, RemoteStore};

/// What happens to the queue when a flush fails part-way.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlushPolicy {
    /// Nothing is removed unless every identity was written. A retry re-sends
    /// identities that already succeeded, so Sum fields may be counted twice.
    #[default]
    AllOrNothing,
    /// Each identity's entries are removed as soon as its write succeeds.
    PerIdentity,
}

impl FromStr for FlushPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "all-or-nothing" => Ok(FlushPolicy::AllOrNothing),
            "per-identity" => Ok(FlushPolicy::PerIdentity),
            other => Err(ConfigError::InvalidFlushPolicy(other.to_string())),
        }
    }
}

/// Runtime options for a [`SyncOrchestrator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Upper bound for every remote call
    pub remote_timeout: Duration,
    pub flush_policy: FlushPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            remote_timeout: Duration::from_secs(10),
            flush_policy: FlushPolicy::default(),
        }
    }
}

/// The identity whose remote write stopped a flush.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlushFailure {
    pub identity: String,
    pub reason: String,
}

/// Outcome of [`SyncOrchestrator::sync_offline_data`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Number of queue entries read at the start of the flush
    pub drained: usize,
    /// Identities written to the remote store, in flush order
    pub synced: Vec<String>,
    /// Guest entries found in the queue and discarded
    pub skipped_guest: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FlushFailure>,
}

impl SyncReport {
    /// True when every drained identity reached the remote store.
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// True when the queue was empty.
    pub fn is_noop(&self) -> bool {
        self.drained == 0
    }
}

/// Coordinates local cache, offline queue and remote store.
pub struct SyncOrchestrator {
    local: Arc<dyn LocalStore>,
    remote: Arc<dyn RemoteStore>,
    connectivity: Arc<dyn ConnectivityMonitor>,
    schema: Arc<MergeSchema>,
    queue: OfflineQueue,
    options: SyncOptions,
    /// Serializes read-merge-write of each identity's cached document
    local_locks: KeyedLocks<Identity>,
    /// Serializes read-merge-write of each user's remote document
    remote_locks: KeyedLocks<String>,
    /// Only one flush runs at a time
    flush_lock: Mutex<()>,
}

impl SyncOrchestrator {
    pub fn new(
        local: Arc<dyn LocalStore>,
        remote: Arc<dyn RemoteStore>,
        connectivity: Arc<dyn ConnectivityMonitor>,
        schema: MergeSchema,
        options: SyncOptions,
    ) -> Self {
        let schema = Arc::new(schema);
        let queue = OfflineQueue::new(local.clone(), schema.clone());

        Self {
            local,
            remote,
            connectivity,
            schema,
            queue,
            options,
            local_locks: KeyedLocks::new(),
            remote_locks: KeyedLocks::new(),
            flush_lock: Mutex::new(()),
        }
    }

    /// Build an orchestrator backed by a [`FileStore`] and an [`HttpRemoteStore`].
    pub fn from_config(
        config: &ClientConfig,
        connectivity: Arc<dyn ConnectivityMonitor>,
    ) -> Result<Self> {
        let schema = config.load_schema()?;
        let local = FileStore::open(&config.data_dir)?;
        let remote = HttpRemoteStore::new(&config.remote_url, config.remote_timeout)?;

        info!(
            remote = %config.remote_url,
            data_dir = %config.data_dir.display(),
            flush_policy = ?config.flush_policy,
            "Sync client configured"
        );

        Ok(Self::new(
            Arc::new(local),
            Arc::new(remote),
            connectivity,
            schema,
            config.sync_options(),
        ))
    }

    pub fn schema(&self) -> &MergeSchema {
        &self.schema
    }

    pub fn options(&self) -> SyncOptions {
        self.options
    }

    /// The durable offline queue.
    pub fn queue(&self) -> &OfflineQueue {
        &self.queue
    }

    fn engine(&self) -> MergeEngine<'_> {
        MergeEngine::new(&self.schema)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Current view of `identity`'s document: `merge(remote, local)`.
    ///
    /// The remote document is only consulted for non-guest identities while
    /// online; failures degrade to an empty remote document. Only local
    /// persistence failures are returned.
    pub async fn get_user_data(&self, identity: &Identity) -> Result<Document> {
        let remote = match identity.user_id() {
            Some(user_id) if self.connectivity.is_online() => {
                match self.read_remote(user_id).await {
                    Ok(document) => document.unwrap_or_default(),
                    Err(e) => {
                        warn!(identity = %identity, error = %e, "Remote read failed, serving local data");
                        Document::new()
                    }
                }
            }
            _ => Document::new(),
        };

        let local = self.load_local(identity)?;
        Ok(self.engine().merge(&remote, &local))
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Apply `patch` to `identity`'s document.
    ///
    /// The local cache is updated before any network activity. Guests stop
    /// there. Otherwise, while online, pending writes are flushed first and
    /// the patch is written through; if either step fails the patch is
    /// queued. Offline, it is queued straight away.
    pub async fn update_user_data(&self, identity: &Identity, patch: Patch) -> Result<()> {
        self.schema.validate_patch(&patch)?;
        self.apply_local(identity, &patch).await?;

        let Some(user_id) = identity.user_id() else {
            debug!("Guest write kept local");
            return Ok(());
        };

        if self.connectivity.is_online() {
            let report = self.sync_offline_data().await?;

            if report.is_complete() {
                match self.push_patch(user_id, &patch).await {
                    Ok(()) => {
                        debug!(identity = %identity, "Wrote through to remote store");
                        return Ok(());
                    }
                    Err(e) => {
                        warn!(identity = %identity, error = %e, "Direct write failed, queuing for later");
                    }
                }
            } else {
                // Older writes are still pending; keep this one behind them.
                debug!(identity = %identity, "Flush incomplete, queuing behind pending writes");
            }
        }

        self.queue.enqueue(identity, patch).await?;
        Ok(())
    }

    // ========================================================================
    // Flushing
    // ========================================================================

    /// Push every queued write to the remote store.
    ///
    /// Entries are folded into one patch per identity and written in order of
    /// first appearance. The first failing identity stops the flush. Under
    /// [`FlushPolicy::AllOrNothing`] entries are only removed once every
    /// identity has been written; entries queued while the flush runs are
    /// never removed by it.
    pub async fn sync_offline_data(&self) -> Result<SyncReport> {
        let _flush = self.flush_lock.lock().await;

        let entries = self.queue.drain().await?;
        if entries.is_empty() {
            debug!("Offline queue empty, nothing to sync");
            return Ok(SyncReport::default());
        }

        let mut report = SyncReport {
            drained: entries.len(),
            skipped_guest: entries.iter().filter(|e| e.identity.is_guest()).count(),
            ..Default::default()
        };
        if report.skipped_guest > 0 {
            warn!(count = report.skipped_guest, "Discarding guest entries found in offline queue");
        }

        let grouped = self.queue.group_by_identity(&entries);
        info!(entries = entries.len(), identities = grouped.len(), "Flushing offline queue");

        for (user_id, patch) in &grouped {
            if let Err(e) = self.push_patch(user_id, patch).await {
                warn!(
                    identity = %user_id,
                    error = %e,
                    synced = report.synced.len(),
                    remaining = grouped.len() - report.synced.len(),
                    "Offline flush aborted, queue left pending"
                );
                report.failure = Some(FlushFailure {
                    identity: user_id.clone(),
                    reason: e.to_string(),
                });
                return Ok(report);
            }

            report.synced.push(user_id.clone());

            if self.options.flush_policy == FlushPolicy::PerIdentity {
                let flushed: Vec<QueueEntry> = entries
                    .iter()
                    .filter(|e| e.identity.user_id() == Some(user_id.as_str()))
                    .cloned()
                    .collect();
                self.queue.acknowledge(&flushed).await?;
            }
        }

        self.queue.acknowledge(&entries).await?;
        info!(entries = report.drained, identities = report.synced.len(), "Offline queue flushed");
        Ok(report)
    }

    /// Flush the queue on every offline-to-online transition of `online`.
    ///
    /// Returns once the sending side is dropped.
    pub async fn run_reconnect_loop(self: Arc<Self>, mut online: watch::Receiver<bool>) {
        let mut was_online = *online.borrow_and_update();

        while online.changed().await.is_ok() {
            let is_online = *online.borrow_and_update();

            if is_online && !was_online {
                info!("Connectivity restored, flushing offline queue");
                match self.sync_offline_data().await {
                    Ok(report) if !report.is_complete() => {
                        warn!(pending = report.drained, "Reconnect flush incomplete");
                    }
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "Reconnect flush failed"),
                }
            }

            was_online = is_online;
        }

        debug!("Connectivity channel closed, reconnect loop stopped");
    }

    /// Spawn [`run_reconnect_loop`](Self::run_reconnect_loop) on the current runtime.
    pub fn spawn_reconnect_loop(self: &Arc<Self>, online: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run_reconnect_loop(online))
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn apply_local(&self, identity: &Identity, patch: &Patch) -> Result<()> {
        let _guard = self.local_locks.lock(identity).await;

        let current = self.load_local(identity)?;
        let merged = self.engine().merge(&current, patch);
        self.local.set(&identity.local_key(), Value::Object(merged))?;
        Ok(())
    }

    fn load_local(&self, identity: &Identity) -> Result<Document> {
        let key = identity.local_key();
        match self.local.get(&key)? {
            None | Some(Value::Null) => Ok(Document::new()),
            Some(Value::Object(document)) => Ok(document),
            Some(other) => Err(StoreError::Corrupt {
                key,
                reason: format!("expected an object, found {}", json_kind(&other)),
            }
            .into()),
        }
    }

    /// Read the remote document, merge `patch` over it and write it back.
    ///
    /// Held under the user's remote lock for the whole round trip, so direct
    /// writes and flushes for the same user never merge over a stale read.
    async fn push_patch(
        &self,
        user_id: &str,
        patch: &Document,
    ) -> std::result::Result<(), RemoteError> {
        let _guard = self.remote_locks.lock(&user_id.to_string()).await;

        let remote = self.read_remote(user_id).await?.unwrap_or_default();
        let merged = self.engine().merge(&remote, patch);
        self.write_remote(user_id, &merged).await
    }

    async fn read_remote(
        &self,
        user_id: &str,
    ) -> std::result::Result<Option<Document>, RemoteError> {
        tokio::time::timeout(self.options.remote_timeout, self.remote.read(user_id))
            .await
            .map_err(|_| RemoteError::Timeout(self.options.remote_timeout))?
    }

    async fn write_remote(
        &self,
        user_id: &str,
        document: &Document,
    ) -> std::result::Result<(), RemoteError> {
        tokio::time::timeout(
            self.options.remote_timeout,
            self.remote.write_merge(user_id, document),
        )
        .await
        .map_err(|_| RemoteError::Timeout(self.options.remote_timeout))?
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ConnectivityFlag;
    use crate::error::SyncError;
    use crate::local::MemoryStore;
    use crate::remote::MemoryRemoteStore;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    fn create_orchestrator(
        online: bool,
    ) -> (Arc<MemoryStore>, Arc<MemoryRemoteStore>, SyncOrchestrator) {
        let local = Arc::new(MemoryStore::new());
        let remote = Arc::new(MemoryRemoteStore::new());
        let orchestrator = SyncOrchestrator::new(
            local.clone(),
            remote.clone(),
            Arc::new(ConnectivityFlag::with_state(online)),
            MergeSchema::new().sum("dailyStats").union("favorites"),
            SyncOptions::default(),
        );
        (local, remote, orchestrator)
    }

    #[test]
    fn flush_policy_parsing() {
        assert_eq!(
            "all-or-nothing".parse::<FlushPolicy>().unwrap(),
            FlushPolicy::AllOrNothing
        );
        assert_eq!(
            "per-identity".parse::<FlushPolicy>().unwrap(),
            FlushPolicy::PerIdentity
        );
        assert!("never".parse::<FlushPolicy>().is_err());
        assert_eq!(FlushPolicy::default(), FlushPolicy::AllOrNothing);
    }

    #[test]
    fn report_serialization() {
        let report = SyncReport {
            drained: 3,
            synced: vec!["u1".into()],
            skipped_guest: 0,
            failure: Some(FlushFailure {
                identity: "u2".into(),
                reason: "Unexpected status: 503".into(),
            }),
        };

        assert!(!report.is_complete());
        assert_eq!(
            serde_json::to_value(&report).unwrap(),
            json!({
                "drained": 3,
                "synced": ["u1"],
                "skippedGuest": 0,
                "failure": {"identity": "u2", "reason": "Unexpected status: 503"}
            })
        );
        assert!(SyncReport::default().is_noop());
    }

    #[tokio::test]
    async fn invalid_patch_writes_nothing() {
        let (local, remote, orchestrator) = create_orchestrator(true);

        let result = orchestrator
            .update_user_data(&Identity::user("u1"), doc(json!({"favorites": "km"})))
            .await;

        assert!(matches!(
            result,
            Err(SyncError::Engine(tether_engine::Error::TypeMismatch { .. }))
        ));
        assert!(local.is_empty());
        assert!(remote.is_empty());
    }

    #[tokio::test]
    async fn corrupt_local_document() {
        let (local, _, orchestrator) = create_orchestrator(false);
        local.set("localUserData_u1", json!([1, 2])).unwrap();

        let result = orchestrator.get_user_data(&Identity::user("u1")).await;
        assert!(matches!(
            result,
            Err(SyncError::Persistence(StoreError::Corrupt { .. }))
        ));
    }

    #[tokio::test]
    async fn local_document_written_under_identity_key() {
        let (local, _, orchestrator) = create_orchestrator(false);

        orchestrator
            .update_user_data(&Identity::user("u1"), doc(json!({"name": "X"})))
            .await
            .unwrap();
        orchestrator
            .update_user_data(&Identity::Guest, doc(json!({"name": "G"})))
            .await
            .unwrap();

        assert_eq!(
            local.get("localUserData_u1").unwrap(),
            Some(json!({"name": "X"}))
        );
        assert_eq!(
            local.get("localUserData_guest").unwrap(),
            Some(json!({"name": "G"}))
        );
    }

    #[tokio::test]
    async fn lock_tables_drained_after_writes() {
        let (_, remote, orchestrator) = create_orchestrator(true);

        for i in 0..10 {
            orchestrator
                .update_user_data(&Identity::user(format!("u{}", i)), doc(json!({"n": i})))
                .await
                .unwrap();
        }

        assert_eq!(remote.len(), 10);
        assert_eq!(orchestrator.local_locks.len(), 0);
        assert_eq!(orchestrator.remote_locks.len(), 0);
    }

    #[tokio::test]
    async fn from_config_builds_file_backed_client() {
        let dir = std::env::temp_dir().join(format!("tether-orch-{}", uuid::Uuid::new_v4()));
        let config = ClientConfig {
            remote_url: "http://127.0.0.1:9".into(),
            data_dir: dir.clone(),
            remote_timeout: Duration::from_millis(200),
            flush_policy: FlushPolicy::PerIdentity,
            schema_path: None,
        };

        let orchestrator =
            SyncOrchestrator::from_config(&config, Arc::new(ConnectivityFlag::new())).unwrap();
        assert_eq!(orchestrator.options().flush_policy, FlushPolicy::PerIdentity);

        orchestrator
            .update_user_data(&Identity::user("u1"), doc(json!({"name": "X"})))
            .await
            .unwrap();
        assert!(dir.join("localUserData_u1.json").exists());
        assert!(dir.join("offlineWriteQueue.json").exists());

        std::fs::remove_dir_all(&dir).ok();
    }
}
