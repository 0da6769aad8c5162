//! Network reachability.

use tokio::sync::watch;

/// Reports whether the remote store is believed reachable.
pub trait ConnectivityMonitor: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Connectivity state published by the host platform.
///
/// Starts offline; unknown reachability is treated as offline.
#[derive(Debug)]
pub struct ConnectivityFlag {
    tx: watch::Sender<bool>,
}

impl ConnectivityFlag {
    pub fn new() -> Self {
        Self::with_state(false)
    }

    pub fn with_state(online: bool) -> Self {
        let (tx, _rx) = watch::channel(online);
        Self { tx }
    }

    /// Publish a reachability change. Receivers are only woken on actual changes.
    pub fn set_online(&self, online: bool) {
        self.tx.send_if_modified(|current| {
            let changed = *current != online;
            *current = online;
            changed
        });
    }

    /// Receiver for reachability changes, as consumed by the reconnect loop.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ConnectivityFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityMonitor for ConnectivityFlag {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }
}
