//! Pairwise synchronization of two items.
//!
//! Every move deep-copies the origin's value into the destination; the two
//! items never share data afterwards. A synced destination adopts the
//! origin's `modified_at`, so repeating a newer-wins merge is a no-op.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{
    SyncError,
    compare::{CompareBy, ComparisonResult, compare_nodes},
    result::{Change, ChangeKind, Direction, SyncResult},
};
use crate::{
    Result, Value,
    node::{NodeId, Store},
};

/// Options for item synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemSyncOptions {
    /// Copy metadata together with the value.
    pub sync_metadata: bool,
    /// Timestamp used by newer-wins decisions.
    pub compare_by: CompareBy,
}

impl Default for ItemSyncOptions {
    fn default() -> Self {
        Self {
            sync_metadata: true,
            compare_by: CompareBy::ModifiedAt,
        }
    }
}

impl ItemSyncOptions {
    pub fn with_sync_metadata(mut self, sync_metadata: bool) -> Self {
        self.sync_metadata = sync_metadata;
        self
    }

    pub fn with_compare_by(mut self, compare_by: CompareBy) -> Self {
        self.compare_by = compare_by;
        self
    }
}

/// Which side wins a priority merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Priority {
    Source,
    Target,
}

impl Priority {
    /// Direction of the write this priority implies.
    pub fn direction(self) -> Direction {
        match self {
            Priority::Source => Direction::SourceToTarget,
            Priority::Target => Direction::TargetToSource,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Source => f.write_str("source"),
            Priority::Target => f.write_str("target"),
        }
    }
}

impl FromStr for Priority {
    type Err = SyncError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "source" => Ok(Priority::Source),
            "target" => Ok(Priority::Target),
            other => Err(SyncError::InvalidPriority {
                priority: other.to_string(),
            }),
        }
    }
}

/// Makes `destination` match `origin`.
///
/// Records a `value` change when the values differed and a `metadata` change
/// when metadata was copied. An already matching destination yields no
/// changes.
pub fn update_destination_to_match_origin(
    store: &mut Store,
    origin: NodeId,
    destination: NodeId,
    direction: Direction,
    options: &ItemSyncOptions,
) -> Result<SyncResult> {
    copy_item(
        store,
        origin,
        destination,
        direction,
        options,
        "updateDestinationToMatchOrigin",
    )
}

/// Makes `target` match `source`.
pub fn update_target_to_match_source(
    store: &mut Store,
    source: NodeId,
    target: NodeId,
    options: &ItemSyncOptions,
) -> Result<SyncResult> {
    copy_item(
        store,
        source,
        target,
        Direction::SourceToTarget,
        options,
        "updateTargetToMatchSource",
    )
}

/// Makes `source` match `target`.
pub fn update_source_to_match_target(
    store: &mut Store,
    source: NodeId,
    target: NodeId,
    options: &ItemSyncOptions,
) -> Result<SyncResult> {
    copy_item(
        store,
        target,
        source,
        Direction::TargetToSource,
        options,
        "updateSourceToMatchTarget",
    )
}

/// Copies the newer item over the older one. Equal items are left alone.
pub fn merge_newer_wins(
    store: &mut Store,
    source: NodeId,
    target: NodeId,
    options: &ItemSyncOptions,
) -> Result<SyncResult> {
    store.item(source)?;
    store.item(target)?;
    let comparison = compare_nodes(store, Some(source), Some(target), options.compare_by)?;
    debug!(result = ?comparison.result, %source, %target, "Item newer-wins decision");

    match comparison.result {
        ComparisonResult::ANewer => copy_item(
            store,
            source,
            target,
            Direction::SourceToTarget,
            options,
            "mergeNewerWins",
        ),
        ComparisonResult::BNewer => copy_item(
            store,
            target,
            source,
            Direction::TargetToSource,
            options,
            "mergeNewerWins",
        ),
        _ => Ok(SyncResult::new("mergeNewerWins").with_message("Items are equal, nothing to merge")),
    }
}

/// Applies the direction named by `priority` unconditionally.
///
/// An unknown priority returns an unsuccessful result and leaves both items
/// untouched.
pub fn merge_with_priority(
    store: &mut Store,
    source: NodeId,
    target: NodeId,
    priority: &str,
    options: &ItemSyncOptions,
) -> Result<SyncResult> {
    match priority.parse::<Priority>() {
        Ok(priority) => merge_with(store, source, target, priority, options),
        Err(err) => {
            debug!(priority, "Rejected merge priority");
            Ok(SyncResult::failure("mergeWithPriority", err.to_string()))
        }
    }
}

/// Typed form of [`merge_with_priority`].
pub fn merge_with(
    store: &mut Store,
    source: NodeId,
    target: NodeId,
    priority: Priority,
    options: &ItemSyncOptions,
) -> Result<SyncResult> {
    let (origin, destination) = match priority {
        Priority::Source => (source, target),
        Priority::Target => (target, source),
    };
    copy_item(
        store,
        origin,
        destination,
        priority.direction(),
        options,
        "mergeWithPriority",
    )
}

fn copy_item(
    store: &mut Store,
    origin: NodeId,
    destination: NodeId,
    direction: Direction,
    options: &ItemSyncOptions,
    operation: &str,
) -> Result<SyncResult> {
    let mut result = SyncResult::new(operation);
    if origin == destination {
        return Ok(result.with_message("Origin and destination are the same item"));
    }

    let (value, metadata, origin_modified_at) = {
        let item = store.item(origin)?;
        (
            item.value().clone(),
            item.metadata().clone(),
            item.timestamps().modified_at(),
        )
    };
    let now = store.now();
    let dest = store.item_mut(destination)?;

    if dest.value() != &value {
        let previous = dest.replicate_value(value.clone(), origin_modified_at)?;
        trace!(%origin, %destination, "Copied item value");
        result.push_change(
            Change::new(ChangeKind::Value)
                .with_from(previous)
                .with_to(value)
                .towards(direction),
        );
    }

    if options.sync_metadata && dest.metadata() != &metadata {
        let previous = dest.metadata().clone();
        dest.set_metadata(metadata.clone(), false, now)?;
        result.push_change(
            Change::new(ChangeKind::Metadata)
                .with_from(Value::Map(previous))
                .with_to(Value::Map(metadata))
                .towards(direction),
        );
    }

    Ok(result)
}
