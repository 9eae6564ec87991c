//! Result types shared by every sync and merge operation.
//!
//! Expected outcomes (equal trees, a missing side, dry runs) are reported
//! through [`SyncResult`] with `success = true`. Only caller misuse surfaces
//! as an `Err`.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::SyncError;
use crate::{Value, path};

/// Which side of a pair is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Direction {
    /// The target is updated from the source.
    SourceToTarget,
    /// The source is updated from the target.
    TargetToSource,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Direction::SourceToTarget => Direction::TargetToSource,
            Direction::TargetToSource => Direction::SourceToTarget,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::SourceToTarget => "sourceToTarget",
            Direction::TargetToSource => "targetToSource",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sourceToTarget" => Ok(Direction::SourceToTarget),
            "targetToSource" => Ok(Direction::TargetToSource),
            other => Err(SyncError::InvalidDirection {
                direction: other.to_string(),
            }),
        }
    }
}

/// The kind of a recorded change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    /// An existing value was overwritten
    Value,
    /// Metadata was copied
    Metadata,
    /// A node was inserted where none existed
    Created,
    /// A node was removed
    Removed,
    /// A container's whole content was replaced
    Replaced,
    /// Two plain structures were deep-merged
    Merged,
}

/// One change made (or, in a dry run, planned) by an operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    #[serde(rename = "type")]
    pub kind: ChangeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<Direction>,
}

impl Change {
    pub fn new(kind: ChangeKind) -> Self {
        Self {
            kind,
            path: None,
            from: None,
            to: None,
            direction: None,
        }
    }

    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_from(mut self, value: Value) -> Self {
        self.from = Some(value);
        self
    }

    pub fn with_to(mut self, value: Value) -> Self {
        self.to = Some(value);
        self
    }

    pub fn towards(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Re-roots the change under a parent path.
    fn prefixed(mut self, prefix: &str) -> Self {
        if prefix.is_empty() {
            return self;
        }
        self.path = Some(match self.path.take() {
            Some(inner) => path::join(prefix, &inner),
            None => prefix.to_string(),
        });
        self
    }
}

/// Summary counters of an operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    /// Paths evaluated after filtering
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub removed: usize,
    pub metadata: usize,
    pub merged: usize,
    /// Evaluated paths that needed no change
    pub unchanged: usize,
    /// Paths excluded by filters
    pub filtered: usize,
    /// Paths present on both sides with different values
    pub conflicts: usize,
    /// Paths whose processing failed and was skipped
    pub failed: usize,
}

impl Statistics {
    /// Counts changes by kind.
    pub fn record(&mut self, change: &Change) {
        match change.kind {
            ChangeKind::Created => self.created += 1,
            ChangeKind::Value | ChangeKind::Replaced => self.updated += 1,
            ChangeKind::Removed => self.removed += 1,
            ChangeKind::Metadata => self.metadata += 1,
            ChangeKind::Merged => self.merged += 1,
        }
    }

    pub fn total_changes(&self) -> usize {
        self.created + self.updated + self.removed + self.metadata + self.merged
    }

    pub fn add(&mut self, other: &Statistics) {
        self.processed += other.processed;
        self.created += other.created;
        self.updated += other.updated;
        self.removed += other.removed;
        self.metadata += other.metadata;
        self.merged += other.merged;
        self.unchanged += other.unchanged;
        self.filtered += other.filtered;
        self.conflicts += other.conflicts;
        self.failed += other.failed;
    }
}

/// Uniform outcome of sync and merge calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub success: bool,
    pub operation: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub changes: Vec<Change>,
    pub items_processed: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub statistics: Option<Statistics>,
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Changes were computed but not applied.
    #[serde(default)]
    pub dry_run: bool,
}

impl SyncResult {
    /// A successful, empty result.
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            success: true,
            operation: operation.into(),
            message: None,
            changes: Vec::new(),
            items_processed: Vec::new(),
            statistics: None,
            warnings: Vec::new(),
            error: None,
            dry_run: false,
        }
    }

    /// A failed result carrying a human-readable message.
    pub fn failure(operation: impl Into<String>, message: impl Into<String>) -> Self {
        let mut result = Self::new(operation);
        result.success = false;
        result.message = Some(message.into());
        result
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }

    pub fn push_change(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Folds another result into this one.
    pub fn absorb(&mut self, other: SyncResult) {
        self.absorb_at(other, "");
    }

    /// Folds a nested result into this one, re-rooting its change paths.
    pub fn absorb_at(&mut self, other: SyncResult, prefix: &str) {
        self.success &= other.success;
        self.changes
            .extend(other.changes.into_iter().map(|c| c.prefixed(prefix)));
        self.items_processed.extend(other.items_processed);
        self.warnings.extend(other.warnings);
        if self.error.is_none() {
            self.error = other.error;
        }
        if let Some(stats) = other.statistics {
            self.statistics.get_or_insert_with(Statistics::default).add(&stats);
        }
        self.dry_run |= other.dry_run;
    }

    /// Fills `statistics` from the recorded changes if no counters were kept.
    pub fn summarize(mut self) -> Self {
        if self.statistics.is_none() {
            let mut stats = Statistics::default();
            for change in &self.changes {
                stats.record(change);
            }
            stats.processed = self.items_processed.len();
            self.statistics = Some(stats);
        }
        self
    }

    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
