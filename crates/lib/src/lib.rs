//!
//! ctxsync: timestamped context trees with a synchronization and merge engine.
//!
//! ## Core Concepts
//!
//! * **Store (`node::Store`)**: The arena owning every node. Nodes are addressed by copyable
//!   `NodeId`s, so shared and even cyclic graphs can be expressed.
//! * **Items (`node::Item`)**: Leaf values with metadata and created/modified/accessed timestamps.
//! * **Containers (`node::Container`)**: Ordered collections of named children, addressed with
//!   dot-separated paths such as `"user.profile.name"`.
//! * **Contexts (`node::Context`)**: Named handles on a root container; the operands of a merge.
//! * **Values (`value::Value`)**: The plain, serde-compatible data stored in items.
//! * **Sync (`merge`)**: Timestamp comparison, item and container synchronization, path-level
//!   merging under named strategies, bulk operations and a kind-dispatching facade.
//!
//! ```
//! use std::sync::Arc;
//!
//! use ctxsync::{FixedClock, Store, Value, merge::{MergeOptions, MergeStrategy, Merger}};
//!
//! let mut store = Store::with_clock(Arc::new(FixedClock::new(1_000)));
//! let local = store.create_context("local");
//! let remote = store.create_context("remote");
//! store.set_item(local.root(), "settings.volume", 3)?;
//! store.set_item(remote.root(), "settings.volume", 7)?;
//!
//! // remote was written last, so its value wins on both sides
//! Merger::merge(&mut store, &local, &remote, MergeStrategy::MergeNewerWins, &MergeOptions::default())?;
//! assert_eq!(store.get_value(local.root(), "settings.volume"), Some(Value::Int(7)));
//! # Ok::<(), ctxsync::Error>(())
//! ```

pub mod clock;
pub mod merge;
pub mod node;
pub mod path;
pub mod value;

pub use clock::{Clock, FixedClock, SystemClock, Timestamp};
pub use merge::{ItemFilter, Merger, SyncError, SyncResult, Synchronizer};
pub use node::{Container, Context, Item, Metadata, NodeId, NodeKind, Store, StoreError};
pub use value::Value;

/// Result type used throughout the ctxsync library.
pub type Result<T> = std::result::Result<T, Error>;

/// Common error type for the ctxsync library.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Structured store errors from the node module
    #[error(transparent)]
    Store(node::StoreError),

    /// Structured sync errors from the merge module
    #[error(transparent)]
    Sync(merge::SyncError),
}

impl Error {
    /// Get the originating module for this error.
    pub fn module(&self) -> &'static str {
        match self {
            Error::Store(_) => "node",
            Error::Sync(_) => "merge",
            Error::Serialize(_) => "serialize",
        }
    }

    /// Check if this error indicates a missing node or path.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_not_found(),
            _ => false,
        }
    }

    /// Check if this error was raised by a frozen node.
    pub fn is_frozen(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_frozen(),
            _ => false,
        }
    }

    /// Check if this error is related to path handling.
    pub fn is_path_error(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_path_error(),
            _ => false,
        }
    }

    /// Check if this error is type-related.
    pub fn is_type_error(&self) -> bool {
        match self {
            Error::Store(store_err) => store_err.is_type_error(),
            Error::Sync(sync_err) => sync_err.is_type_error(),
            Error::Serialize(_) => false,
        }
    }

    /// Check if this error comes from an unrecognized priority, operation,
    /// strategy, direction or comparison field name.
    pub fn is_invalid_name(&self) -> bool {
        match self {
            Error::Sync(sync_err) => sync_err.is_invalid_name(),
            _ => false,
        }
    }

    /// Check if this error is store-related.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Error::Store(_))
    }

    /// Check if this error is sync-related.
    pub fn is_sync_error(&self) -> bool {
        matches!(self, Error::Sync(_))
    }
}
