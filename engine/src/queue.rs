//! Pending write queue.
//!
//! Writes made while the remote store is unreachable are kept as an ordered
//! list of [`QueueEntry`] values. Entries are appended and never modified;
//! they leave the queue only once they have been flushed.

use crate::{error::Result, Document, EntryId, Error, Identity, MergeEngine, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A write waiting to be flushed to the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    /// Unique token for this entry
    pub id: EntryId,
    /// Identity the patch belongs to
    pub identity: Identity,
    /// The patch as supplied by the caller
    pub patch: Document,
    /// When the entry was queued (milliseconds since epoch)
    pub enqueued_at: Timestamp,
}

impl QueueEntry {
    /// Create a new entry. Guest writes are local-only and are rejected.
    pub fn new(
        id: impl Into<EntryId>,
        identity: Identity,
        patch: Document,
        enqueued_at: Timestamp,
    ) -> Result<Self> {
        if identity.is_guest() {
            return Err(Error::GuestNotQueueable);
        }
        Ok(Self {
            id: id.into(),
            identity,
            patch,
            enqueued_at,
        })
    }
}

/// Ordered queue of pending entries.
///
/// Serializes as a plain JSON array of entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingQueue {
    entries: Vec<QueueEntry>,
}

impl PendingQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry.
    pub fn push(&mut self, entry: QueueEntry) {
        self.entries.push(entry);
    }

    /// All entries in enqueue order.
    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<QueueEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Remove exactly the listed entries, keeping the rest in order.
    pub fn acknowledge(&mut self, ids: &[EntryId]) {
        if ids.is_empty() {
            return;
        }
        let ids: HashSet<&str> = ids.iter().map(String::as_str).collect();
        self.entries.retain(|e| !ids.contains(e.id.as_str()));
    }

    /// Serialize to a JSON array.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidQueue(e.to_string()))
    }

    /// Deserialize from a JSON array.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidQueue(e.to_string()))
    }

    /// Deserialize from an already parsed JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Error::InvalidQueue(e.to_string()))
    }
}

impl From<Vec<QueueEntry>> for PendingQueue {
    fn from(entries: Vec<QueueEntry>) -> Self {
        Self { entries }
    }
}

/// Fold entries into one consolidated patch per identity.
///
/// Patches of the same identity are merged in enqueue order starting from
/// `{}`. Groups come back in order of first appearance. Guest entries are
/// dropped.
pub fn group_by_identity(engine: &MergeEngine<'_>, entries: &[QueueEntry]) -> Vec<(String, Document)> {
    let mut groups: Vec<(String, Document)> = Vec::new();

    for entry in entries {
        let Some(user_id) = entry.identity.user_id() else {
            continue;
        };

        match groups.iter_mut().find(|(id, _)| id == user_id) {
            Some((_, acc)) => *acc = engine.merge(acc, &entry.patch),
            None => {
                let folded = engine.merge(&Document::new(), &entry.patch);
                groups.push((user_id.to_string(), folded));
            }
        }
    }

    groups
}
