//! Identities and the storage keys derived from them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel used for unauthenticated, local-only data.
pub const GUEST: &str = "guest";

/// Local storage key holding the serialized offline queue.
pub const OFFLINE_QUEUE_KEY: &str = "offlineWriteQueue";

/// Prefix of the local storage key holding an identity's cached document.
pub const LOCAL_DOCUMENT_PREFIX: &str = "localUserData_";

/// The stable key a document is stored under.
///
/// Guest data never leaves the device: it is neither queued nor written to
/// the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Identity {
    /// Unauthenticated, local-only identity
    Guest,
    /// A verified user identifier
    User(String),
}

impl Identity {
    /// Parse an optional identifier. `None`, the empty string and the
    /// `"guest"` sentinel all map to [`Identity::Guest`].
    pub fn parse(id: Option<&str>) -> Self {
        match id {
            None => Identity::Guest,
            Some(id) if id.is_empty() || id == GUEST => Identity::Guest,
            Some(id) => Identity::User(id.to_string()),
        }
    }

    /// Create a user identity.
    pub fn user(id: impl Into<String>) -> Self {
        Self::from(id.into())
    }

    pub fn is_guest(&self) -> bool {
        matches!(self, Identity::Guest)
    }

    /// The remote user ID, or `None` for guests.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Identity::Guest => None,
            Identity::User(id) => Some(id),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Identity::Guest => GUEST,
            Identity::User(id) => id,
        }
    }

    /// Local storage key for this identity's cached document.
    pub fn local_key(&self) -> String {
        format!("{}{}", LOCAL_DOCUMENT_PREFIX, self.as_str())
    }
}

impl From<String> for Identity {
    fn from(id: String) -> Self {
        if id.is_empty() || id == GUEST {
            Identity::Guest
        } else {
            Identity::User(id)
        }
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Identity::parse(Some(id))
    }
}

impl From<Option<&str>> for Identity {
    fn from(id: Option<&str>) -> Self {
        Identity::parse(id)
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        match identity {
            Identity::Guest => GUEST.to_string(),
            Identity::User(id) => id,
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
