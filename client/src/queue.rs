//! Durable offline write queue.

use std::sync::Arc;

use serde_json::Value;
use tether_engine::{
    Document, Identity, MergeEngine, MergeSchema, PendingQueue, QueueEntry, Timestamp,
    OFFLINE_QUEUE_KEY,
};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::local::LocalStore;

/// The pending-write queue, persisted through a [`LocalStore`] under
/// `offlineWriteQueue`.
///
/// Every operation is a read-modify-write of the stored array, serialized by
/// an async mutex so concurrent enqueues never lose entries.
pub struct OfflineQueue {
    store: Arc<dyn LocalStore>,
    schema: Arc<MergeSchema>,
    lock: Mutex<()>,
}

impl OfflineQueue {
    pub fn new(store: Arc<dyn LocalStore>, schema: Arc<MergeSchema>) -> Self {
        Self {
            store,
            schema,
            lock: Mutex::new(()),
        }
    }

    /// Append a write for `identity`. Guest identities are rejected.
    pub async fn enqueue(&self, identity: &Identity, patch: Document) -> Result<QueueEntry> {
        let entry = QueueEntry::new(
            uuid::Uuid::new_v4().to_string(),
            identity.clone(),
            patch,
            now_millis(),
        )?;

        let _guard = self.lock.lock().await;
        let mut queue = self.load()?;
        queue.push(entry.clone());
        self.save(&queue)?;

        debug!(identity = %identity, entry = %entry.id, pending = queue.len(), "Queued offline write");
        Ok(entry)
    }

    /// Snapshot of all pending entries. The queue is left untouched.
    pub async fn drain(&self) -> Result<Vec<QueueEntry>> {
        let _guard = self.lock.lock().await;
        Ok(self.load()?.into_entries())
    }

    /// Remove every pending entry.
    pub async fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.save(&PendingQueue::new())
    }

    /// Remove exactly `entries` (matched by id); anything appended since they
    /// were drained stays queued.
    pub async fn acknowledge(&self, entries: &[QueueEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let ids: Vec<_> = entries.iter().map(|e| e.id.clone()).collect();

        let _guard = self.lock.lock().await;
        let mut queue = self.load()?;
        let before = queue.len();
        queue.acknowledge(&ids);
        self.save(&queue)?;

        debug!(
            acknowledged = before - queue.len(),
            pending = queue.len(),
            "Acknowledged offline writes"
        );
        Ok(())
    }

    pub async fn len(&self) -> Result<usize> {
        let _guard = self.lock.lock().await;
        Ok(self.load()?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Fold `entries` into one patch per non-guest identity, in order of
    /// first appearance.
    pub fn group_by_identity(&self, entries: &[QueueEntry]) -> Vec<(String, Document)> {
        tether_engine::group_by_identity(&MergeEngine::new(&self.schema), entries)
    }

    fn load(&self) -> Result<PendingQueue> {
        match self.store.get(OFFLINE_QUEUE_KEY)? {
            None | Some(Value::Null) => Ok(PendingQueue::new()),
            Some(value) => PendingQueue::from_value(value).map_err(|e| {
                StoreError::Corrupt {
                    key: OFFLINE_QUEUE_KEY.to_string(),
                    reason: e.to_string(),
                }
                .into()
            }),
        }
    }

    fn save(&self, queue: &PendingQueue) -> Result<()> {
        let value = serde_json::to_value(queue).map_err(StoreError::from)?;
        self.store.set(OFFLINE_QUEUE_KEY, value)?;
        Ok(())
    }
}

fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis().max(0) as Timestamp
}
