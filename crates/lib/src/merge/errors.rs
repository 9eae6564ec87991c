//! Error types for sync and merge operations.
//!
//! These cover caller misuse: bad timestamps, unknown priority, operation or
//! strategy names, invalid filter patterns and mismatched operand kinds.
//! Expected outcomes such as equal trees are never errors.

use thiserror::Error;

use super::compare::CompareBy;

/// Structured error types for the sync engine.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum SyncError {
    /// A compared node lacks a valid timestamp for the requested field
    #[error("Invalid or missing {field} timestamp on {side}")]
    InvalidTimestamp { field: CompareBy, side: &'static str },

    /// The comparison field name is not a known timestamp
    #[error("Unknown comparison field: {field}")]
    InvalidCompareField { field: String },

    /// Priority was neither "source" nor "target"
    #[error("Invalid priority: \"{priority}\". Must be 'source' or 'target'.")]
    InvalidPriority { priority: String },

    /// Unknown sync operation name
    #[error("Invalid sync operation: {operation}")]
    InvalidOperation { operation: String },

    /// Unknown merge strategy name
    #[error("Invalid merge strategy: {strategy}")]
    InvalidStrategy { strategy: String },

    /// Unknown sync direction name
    #[error("Invalid sync direction: {direction}")]
    InvalidDirection { direction: String },

    /// The two operands are not of the same kind
    #[error("type mismatch: source is {source_kind}, target is {target_kind}")]
    TypeMismatch {
        source_kind: String,
        target_kind: String,
    },

    /// Strict type checking refused a fallback for non-node values
    #[error("Strict type checking failed at '{path}': {source_kind} and {target_kind} are not context nodes")]
    StrictTypeCheck {
        path: String,
        source_kind: String,
        target_kind: String,
    },

    /// A filter pattern failed to compile
    #[error("Invalid filter pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

impl SyncError {
    /// Check if this error is an operand or value kind mismatch
    pub fn is_type_error(&self) -> bool {
        matches!(
            self,
            SyncError::TypeMismatch { .. }
                | SyncError::StrictTypeCheck { .. }
                | SyncError::InvalidTimestamp { .. }
        )
    }

    /// Check if this error comes from an unrecognized name
    pub fn is_invalid_name(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidCompareField { .. }
                | SyncError::InvalidPriority { .. }
                | SyncError::InvalidOperation { .. }
                | SyncError::InvalidStrategy { .. }
                | SyncError::InvalidDirection { .. }
        )
    }
}

impl From<SyncError> for crate::Error {
    fn from(err: SyncError) -> Self {
        crate::Error::Sync(err)
    }
}
