//! Timestamp comparison between two nodes.
//!
//! [`compare`] is the single decision primitive behind every newer-wins sync
//! and merge. It is pure: it reads one timestamp from each side and never
//! touches either node.
//!
//! ```
//! use ctxsync::merge::compare::{CompareBy, ComparisonResult, compare};
//!
//! let none = compare(None, None, CompareBy::ModifiedAt)?;
//! assert_eq!(none.result, ComparisonResult::BothMissing);
//! assert_eq!(none.time_difference, Some(0));
//! # Ok::<(), ctxsync::merge::SyncError>(())
//! ```

use std::{cmp::Ordering, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::SyncError;
use crate::{
    clock::Timestamp,
    node::{Container, Item, Node, NodeId, Store, Timestamps},
};

/// Categorical temporal relationship between `a` and `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonResult {
    ANewer,
    BNewer,
    Equal,
    AMissing,
    BMissing,
    BothMissing,
}

impl ComparisonResult {
    /// True when exactly one side is missing.
    pub fn is_one_sided(self) -> bool {
        matches!(self, ComparisonResult::AMissing | ComparisonResult::BMissing)
    }
}

/// The timestamp field a comparison reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CompareBy {
    CreatedAt,
    #[default]
    ModifiedAt,
    LastAccessedAt,
}

impl CompareBy {
    pub fn as_str(self) -> &'static str {
        match self {
            CompareBy::CreatedAt => "createdAt",
            CompareBy::ModifiedAt => "modifiedAt",
            CompareBy::LastAccessedAt => "lastAccessedAt",
        }
    }
}

impl fmt::Display for CompareBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompareBy {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createdAt" | "created_at" => Ok(CompareBy::CreatedAt),
            "modifiedAt" | "modified_at" => Ok(CompareBy::ModifiedAt),
            "lastAccessedAt" | "last_accessed_at" => Ok(CompareBy::LastAccessedAt),
            other => Err(SyncError::InvalidCompareField {
                field: other.to_string(),
            }),
        }
    }
}

/// Anything carrying node timestamps.
pub trait Timestamped {
    fn timestamps(&self) -> &Timestamps;

    /// Reads one timestamp field; `None` if it was never set.
    fn timestamp(&self, by: CompareBy) -> Option<Timestamp> {
        let ts = self.timestamps();
        match by {
            CompareBy::CreatedAt => Some(ts.created_at()),
            CompareBy::ModifiedAt => Some(ts.modified_at()),
            CompareBy::LastAccessedAt => ts.last_accessed_at(),
        }
    }
}

impl Timestamped for Timestamps {
    fn timestamps(&self) -> &Timestamps {
        self
    }
}

impl Timestamped for Item {
    fn timestamps(&self) -> &Timestamps {
        Item::timestamps(self)
    }
}

impl Timestamped for Container {
    fn timestamps(&self) -> &Timestamps {
        Container::timestamps(self)
    }
}

impl Timestamped for Node {
    fn timestamps(&self) -> &Timestamps {
        Node::timestamps(self)
    }
}

/// Outcome of [`compare`], with the timestamps that were read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comparison {
    pub result: ComparisonResult,
    pub a_time: Option<Timestamp>,
    pub b_time: Option<Timestamp>,
    /// `a - b` in milliseconds. `None` when exactly one side is missing.
    pub time_difference: Option<i64>,
}

/// Compares two entities by one timestamp field.
///
/// Missing entities are an expected outcome; a present entity without the
/// requested timestamp is a caller error.
pub fn compare(
    a: Option<&dyn Timestamped>,
    b: Option<&dyn Timestamped>,
    by: CompareBy,
) -> Result<Comparison, SyncError> {
    let (a, b) = match (a, b) {
        (None, None) => {
            return Ok(Comparison {
                result: ComparisonResult::BothMissing,
                a_time: None,
                b_time: None,
                time_difference: Some(0),
            });
        }
        (None, Some(b)) => {
            return Ok(Comparison {
                result: ComparisonResult::AMissing,
                a_time: None,
                b_time: b.timestamp(by),
                time_difference: None,
            });
        }
        (Some(a), None) => {
            return Ok(Comparison {
                result: ComparisonResult::BMissing,
                a_time: a.timestamp(by),
                b_time: None,
                time_difference: None,
            });
        }
        (Some(a), Some(b)) => (a, b),
    };

    let a_time = a
        .timestamp(by)
        .ok_or(SyncError::InvalidTimestamp { field: by, side: "a" })?;
    let b_time = b
        .timestamp(by)
        .ok_or(SyncError::InvalidTimestamp { field: by, side: "b" })?;
    // Both sides fit in i64 after conversion, so the difference cannot overflow.
    let a_signed =
        i64::try_from(a_time).map_err(|_| SyncError::InvalidTimestamp { field: by, side: "a" })?;
    let b_signed =
        i64::try_from(b_time).map_err(|_| SyncError::InvalidTimestamp { field: by, side: "b" })?;
    let difference = a_signed - b_signed;

    let result = match a_time.cmp(&b_time) {
        Ordering::Greater => ComparisonResult::ANewer,
        Ordering::Less => ComparisonResult::BNewer,
        Ordering::Equal => ComparisonResult::Equal,
    };

    Ok(Comparison {
        result,
        a_time: Some(a_time),
        b_time: Some(b_time),
        time_difference: Some(difference),
    })
}

/// Compares two nodes of a store.
pub fn compare_nodes(
    store: &Store,
    a: Option<NodeId>,
    b: Option<NodeId>,
    by: CompareBy,
) -> crate::Result<Comparison> {
    let a = a.map(|id| store.node(id)).transpose()?;
    let b = b.map(|id| store.node(id)).transpose()?;
    Ok(compare(
        a.map(|n| n as &dyn Timestamped),
        b.map(|n| n as &dyn Timestamped),
        by,
    )?)
}
