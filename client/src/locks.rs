//! Per-key async mutual exclusion.

use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// A table of async mutexes, one per key, created on demand.
///
/// An entry is dropped from the table as soon as no task holds or waits on
/// it, so the table only ever contains keys with work in flight.
#[derive(Debug)]
pub(crate) struct KeyedLocks<K: Eq + Hash> {
    locks: DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash + Clone> KeyedLocks<K> {
    pub(crate) fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    /// Wait for exclusive access to `key`.
    pub(crate) async fn lock(&self, key: &K) -> KeyedGuard<'_, K> {
        // Cloned under the shard lock, so cleanup never removes a mutex
        // another task is about to wait on.
        let mutex = self.locks.entry(key.clone()).or_default().value().clone();
        let guard = mutex.lock_owned().await;

        KeyedGuard {
            guard: Some(guard),
            key: key.clone(),
            locks: &self.locks,
        }
    }

    /// Number of keys currently held or awaited.
    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.locks.len()
    }
}

/// Exclusive access to one key of a [`KeyedLocks`] table.
pub(crate) struct KeyedGuard<'a, K: Eq + Hash> {
    guard: Option<OwnedMutexGuard<()>>,
    key: K,
    locks: &'a DashMap<K, Arc<Mutex<()>>>,
}

impl<K: Eq + Hash> Drop for KeyedGuard<'_, K> {
    fn drop(&mut self) {
        // Release first so the guard's reference no longer counts.
        self.guard.take();
        self.locks
            .remove_if(&self.key, |_, mutex| Arc::strong_count(mutex) == 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn entry_removed_after_release() {
        let locks = KeyedLocks::new();

        let guard = locks.lock(&"u1".to_string()).await;
        assert_eq!(locks.len(), 1);
        drop(guard);
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = Arc::new(KeyedLocks::new());
        let guard = locks.lock(&"u1".to_string()).await;

        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.lock(&"u1".to_string()).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());
        // Entry survives while another task is waiting on it
        assert_eq!(locks.len(), 1);

        drop(guard);
        waiter.await.unwrap();
        assert_eq!(locks.len(), 0);
    }

    #[tokio::test]
    async fn different_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _u1 = locks.lock(&"u1".to_string()).await;

        tokio::time::timeout(Duration::from_secs(1), locks.lock(&"u2".to_string()))
            .await
            .expect("other key is free");
        assert_eq!(locks.len(), 1);
    }
}
