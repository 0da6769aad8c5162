//! # Tether Engine
//!
//! The deterministic core of an offline-first document sync engine.
//!
//! A client keeps one JSON document per identity. It reads and writes that
//! document against a remote store while online, and keeps working while
//! disconnected by caching documents locally and queuing writes. This crate
//! holds the pure logic behind that: how two versions of a document are
//! merged, and how queued writes are folded together before they are
//! flushed. The IO side lives in `tether-client`.
//!
//! ## Design Principles
//!
//! - **No IO**: Engine has no knowledge of files, network, or platform
//! - **Deterministic**: Same inputs always produce same outputs
//! - **Schema-driven**: Merge behavior is declared per field, never guessed
//!   from the shape of a value
//!
//! ## Core Concepts
//!
//! ### Identities
//!
//! Documents are keyed by an [`Identity`]: either a verified user ID or the
//! [`Identity::Guest`] sentinel. Guest data is local-only.
//!
//! ### Merge strategies
//!
//! A [`MergeSchema`] maps field names to a [`FieldMergeStrategy`]:
//! - [`FieldMergeStrategy::Sum`] - numeric leaves are added (date-keyed counters)
//! - [`FieldMergeStrategy::Union`] - arrays are combined without duplicates
//! - [`FieldMergeStrategy::Override`] - overlay wins (default)
//!
//! ### Queue folding
//!
//! [`group_by_identity`] folds pending [`QueueEntry`] values into one patch
//! per identity, so each identity is written to the remote store once per
//! flush.
//!
//! ## Quick Start
//!
//! ```rust
//! use tether_engine::{merge, MergeSchema};
//! use serde_json::json;
//!
//! let schema = MergeSchema::new().sum("dailyStats").union("favorites");
//!
//! let remote = json!({"favorites": ["km"], "dailyStats": {"2024-07-01": {"conversions": 2}}});
//! let local = json!({"favorites": ["mi"], "dailyStats": {"2024-07-01": {"conversions": 1}}});
//!
//! let merged = merge(
//!     &schema,
//!     remote.as_object().unwrap(),
//!     local.as_object().unwrap(),
//! );
//!
//! assert_eq!(merged["favorites"], json!(["km", "mi"]));
//! assert_eq!(merged["dailyStats"]["2024-07-01"]["conversions"], json!(3));
//! ```
//!
//! ## FFI
//!
//! The [`ffi`] module provides C-compatible functions for use from other languages.
//! All data is exchanged as JSON strings.

pub mod error;
pub mod ffi;
pub mod identity;
pub mod merge;
pub mod queue;
pub mod schema;

// Re-export main types at crate root
pub use error::Error;
pub use identity::{Identity, GUEST, LOCAL_DOCUMENT_PREFIX, OFFLINE_QUEUE_KEY};
pub use merge::{merge, MergeEngine};
pub use queue::{group_by_identity, PendingQueue, QueueEntry};
pub use schema::{FieldMergeStrategy, MergeSchema};

/// A per-identity JSON document.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// A partial document supplied by a caller.
pub type Patch = Document;

/// Type aliases for clarity
pub type EntryId = String;
pub type Timestamp = u64;
