//! Error types for the node store.
//!
//! Failures that come from reading or mutating Items and Containers: unknown
//! node ids, frozen nodes, malformed paths and kind mismatches.

use thiserror::Error;

use super::{NodeId, NodeKind};

/// Structured error types for store operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum StoreError {
    /// The id does not refer to a node in this store
    #[error("Node not found: {id}")]
    NodeNotFound { id: NodeId },

    /// A frozen node rejected a mutation
    #[error("Cannot modify frozen {kind}")]
    Frozen { kind: NodeKind },

    /// The path is empty or otherwise unusable for the operation
    #[error("Invalid path: {path}")]
    InvalidPath { path: String },

    /// No node exists at the path
    #[error("Path not found: {path}")]
    PathNotFound { path: String },

    /// A path segment resolved to something that cannot hold children
    #[error("Cannot traverse '{path}': '{segment}' is not a container")]
    NotAContainer { path: String, segment: String },

    /// A node or value was not of the expected kind
    #[error("Type mismatch: expected {expected}, found {actual}")]
    TypeMismatch { expected: String, actual: String },
}

impl StoreError {
    /// Check if this error indicates a missing node or path
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NodeNotFound { .. } | StoreError::PathNotFound { .. }
        )
    }

    /// Check if this error was raised by a frozen node
    pub fn is_frozen(&self) -> bool {
        matches!(self, StoreError::Frozen { .. })
    }

    /// Check if this error is related to path handling
    pub fn is_path_error(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidPath { .. }
                | StoreError::PathNotFound { .. }
                | StoreError::NotAContainer { .. }
        )
    }

    /// Check if this error is a kind mismatch
    pub fn is_type_error(&self) -> bool {
        matches!(
            self,
            StoreError::TypeMismatch { .. } | StoreError::NotAContainer { .. }
        )
    }

    /// Get the path if this is a path-related error
    pub fn path(&self) -> Option<&str> {
        match self {
            StoreError::InvalidPath { path }
            | StoreError::PathNotFound { path }
            | StoreError::NotAContainer { path, .. } => Some(path),
            _ => None,
        }
    }
}

impl From<StoreError> for crate::Error {
    fn from(err: StoreError) -> Self {
        crate::Error::Store(err)
    }
}
