//! Recursive synchronization of two containers.
//!
//! [`ContainerSync`] walks the origin container key by key and makes the
//! destination match it along one [`Direction`]. Keys that exist only in the
//! destination are kept. Each top-level call owns a traversal state holding the
//! visited set that guards against cyclic graphs; it is dropped when the call
//! returns, on success and on error alike.
//!
//! A failure while processing one key is logged and reported as a warning;
//! sibling keys are still processed. Strict type checking violations are the
//! exception and abort the call.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::{
    SyncError,
    compare::{CompareBy, ComparisonResult, compare_nodes},
    item::{self, ItemSyncOptions, Priority},
    result::{Change, ChangeKind, Direction, SyncResult},
};
use crate::{
    Error, Result, Value,
    node::{Child, NodeId, NodeKind, Store},
    path,
};

/// Options for container synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerSyncOptions {
    /// Copy item and container metadata together with values.
    pub sync_metadata: bool,
    /// Fail instead of falling back when two plain values meet.
    pub strict_type_checking: bool,
    /// Walk the trees recursively. When off, the facade replaces the whole
    /// destination content with a copy of the origin.
    pub deep_sync: bool,
    /// Timestamp used by newer-wins decisions.
    pub compare_by: CompareBy,
}

impl Default for ContainerSyncOptions {
    fn default() -> Self {
        Self {
            sync_metadata: true,
            strict_type_checking: false,
            deep_sync: true,
            compare_by: CompareBy::ModifiedAt,
        }
    }
}

impl ContainerSyncOptions {
    pub fn with_sync_metadata(mut self, sync_metadata: bool) -> Self {
        self.sync_metadata = sync_metadata;
        self
    }

    pub fn with_strict_type_checking(mut self, strict: bool) -> Self {
        self.strict_type_checking = strict;
        self
    }

    pub fn with_deep_sync(mut self, deep_sync: bool) -> Self {
        self.deep_sync = deep_sync;
        self
    }

    pub fn with_compare_by(mut self, compare_by: CompareBy) -> Self {
        self.compare_by = compare_by;
        self
    }

    fn item_options(&self) -> ItemSyncOptions {
        ItemSyncOptions {
            sync_metadata: self.sync_metadata,
            compare_by: self.compare_by,
        }
    }
}

/// Container synchronization engine and facade.
///
/// ```
/// use ctxsync::{Store, Value, merge::{ContainerSync, Direction}};
///
/// let mut store = Store::new();
/// let source = store.create_container(None, Default::default(), Default::default())?;
/// let target = store.create_container(None, Default::default(), Default::default())?;
/// store.set_item(source, "a.b", 1)?;
/// store.set_item(target, "a.c", 2)?;
///
/// let result = ContainerSync::default().sync(&mut store, source, target, Direction::SourceToTarget)?;
/// assert!(result.success);
/// assert_eq!(store.get_value(target, "a.b"), Some(Value::Int(1)));
/// assert_eq!(store.get_value(target, "a.c"), Some(Value::Int(2)));
/// # Ok::<(), ctxsync::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct ContainerSync {
    options: ContainerSyncOptions,
}

impl ContainerSync {
    pub fn new(options: ContainerSyncOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ContainerSyncOptions {
        &self.options
    }

    /// Deep-syncs `source` and `target` along `direction`.
    pub fn sync(
        &self,
        store: &mut Store,
        source: NodeId,
        target: NodeId,
        direction: Direction,
    ) -> Result<SyncResult> {
        self.deep(store, source, target, direction, "deepSync")
    }

    /// Makes `target` match `source`.
    pub fn update_target_to_match_source(
        &self,
        store: &mut Store,
        source: NodeId,
        target: NodeId,
    ) -> Result<SyncResult> {
        self.dispatch(
            store,
            source,
            target,
            Direction::SourceToTarget,
            "updateTargetToMatchSource",
        )
    }

    /// Makes `source` match `target`.
    pub fn update_source_to_match_target(
        &self,
        store: &mut Store,
        source: NodeId,
        target: NodeId,
    ) -> Result<SyncResult> {
        self.dispatch(
            store,
            source,
            target,
            Direction::TargetToSource,
            "updateSourceToMatchTarget",
        )
    }

    /// Syncs from the newer container into the older one.
    pub fn merge_newer_wins(
        &self,
        store: &mut Store,
        source: NodeId,
        target: NodeId,
    ) -> Result<SyncResult> {
        store.container(source)?;
        store.container(target)?;
        let comparison = compare_nodes(store, Some(source), Some(target), self.options.compare_by)?;
        debug!(result = ?comparison.result, %source, %target, "Container newer-wins decision");

        let direction = match comparison.result {
            ComparisonResult::ANewer => Direction::SourceToTarget,
            ComparisonResult::BNewer => Direction::TargetToSource,
            _ => {
                return Ok(SyncResult::new("mergeNewerWins")
                    .with_message("Containers are equal, nothing to merge")
                    .summarize());
            }
        };
        self.dispatch(store, source, target, direction, "mergeNewerWins")
    }

    /// Applies the direction named by `priority` unconditionally.
    ///
    /// An unknown priority returns an unsuccessful result and mutates
    /// nothing.
    pub fn merge_with_priority(
        &self,
        store: &mut Store,
        source: NodeId,
        target: NodeId,
        priority: &str,
    ) -> Result<SyncResult> {
        match priority.parse::<Priority>() {
            Ok(priority) => self.dispatch(
                store,
                source,
                target,
                priority.direction(),
                "mergeWithPriority",
            ),
            Err(err) => Ok(SyncResult::failure("mergeWithPriority", err.to_string())),
        }
    }

    fn dispatch(
        &self,
        store: &mut Store,
        source: NodeId,
        target: NodeId,
        direction: Direction,
        operation: &str,
    ) -> Result<SyncResult> {
        if self.options.deep_sync {
            self.deep(store, source, target, direction, operation)
        } else {
            self.shallow(store, source, target, direction, operation)
        }
    }

    fn deep(
        &self,
        store: &mut Store,
        source: NodeId,
        target: NodeId,
        direction: Direction,
        operation: &str,
    ) -> Result<SyncResult> {
        let (origin, destination) = endpoints(source, target, direction);
        store.container(origin)?;
        store.container(destination)?;

        let mut traversal = Traversal::new(store, &self.options, direction);
        let inner = traversal.sync_containers(origin, destination, "")?;
        debug!(
            operation,
            %direction,
            changes = inner.changes.len(),
            warnings = inner.warnings.len(),
            visited = traversal.visited.len(),
            "Container sync finished"
        );

        let mut result = SyncResult::new(operation);
        result.absorb(inner);
        Ok(result.summarize())
    }

    /// Replaces the destination's content with a deep copy of the origin's.
    fn shallow(
        &self,
        store: &mut Store,
        source: NodeId,
        target: NodeId,
        direction: Direction,
        operation: &str,
    ) -> Result<SyncResult> {
        let (origin, destination) = endpoints(source, target, direction);
        store.container(origin)?;
        store.container(destination)?.ensure_mutable()?;

        let mut result = SyncResult::new(operation);
        if origin == destination {
            return Ok(result.summarize());
        }

        let before = store.to_value(destination)?;
        let after = store.to_value(origin)?;
        let copy = store.clone_node(origin)?;
        let (children, metadata, origin_modified_at) = {
            let copied = store.container_mut(copy)?;
            (
                std::mem::take(&mut copied.children),
                copied.metadata().clone(),
                copied.timestamps().modified_at(),
            )
        };

        let now = store.now();
        let dest = store.container_mut(destination)?;
        dest.replace_children(children)?;
        if self.options.sync_metadata {
            dest.set_metadata(metadata, false, now)?;
        }
        dest.timestamps.replicate_modified(origin_modified_at);

        result.push_change(
            Change::new(ChangeKind::Replaced)
                .with_from(before)
                .with_to(after)
                .towards(direction),
        );
        Ok(result.summarize())
    }
}

fn endpoints(source: NodeId, target: NodeId, direction: Direction) -> (NodeId, NodeId) {
    match direction {
        Direction::SourceToTarget => (source, target),
        Direction::TargetToSource => (target, source),
    }
}

/// State of one top-level sync call.
struct Traversal<'a> {
    store: &'a mut Store,
    options: &'a ContainerSyncOptions,
    direction: Direction,
    visited: HashSet<NodeId>,
}

impl<'a> Traversal<'a> {
    fn new(store: &'a mut Store, options: &'a ContainerSyncOptions, direction: Direction) -> Self {
        Self {
            store,
            options,
            direction,
            visited: HashSet::new(),
        }
    }

    /// Syncs one container pair. Change paths are relative to the pair;
    /// `path` is only used for diagnostics.
    fn sync_containers(
        &mut self,
        origin: NodeId,
        destination: NodeId,
        path: &str,
    ) -> Result<SyncResult> {
        let mut result = SyncResult::new("deepSync");
        if !self.visited.insert(origin) {
            warn!(path, container = %origin, "Cycle detected, skipping branch");
            result.warn(format!("Cycle detected at '{path}', branch skipped"));
            return Ok(result);
        }
        if origin == destination {
            return Ok(result);
        }

        let entries: Vec<(String, Child)> = self
            .store
            .container(origin)?
            .children()
            .map(|(key, child)| (key.clone(), child.clone()))
            .collect();

        for (key, child) in entries {
            let child_path = path::join(path, &key);
            trace!(path = %child_path, "Syncing key");
            match self.sync_key(origin, destination, &key, child, &child_path) {
                Ok(sub) => {
                    result.items_processed.push(child_path);
                    result.absorb_at(sub, &key);
                }
                Err(err @ Error::Sync(SyncError::StrictTypeCheck { .. })) => return Err(err),
                Err(err) => {
                    warn!(path = %child_path, error = %err, "Failed to sync key");
                    result.warn(format!("Failed to sync '{child_path}': {err}"));
                }
            }
        }

        if self.options.sync_metadata {
            if let Err(err) = self.sync_container_metadata(origin, destination, &mut result) {
                warn!(path, error = %err, "Failed to copy container metadata");
                result.warn(format!("Failed to copy metadata at '{path}': {err}"));
            }
        }

        if result.has_changes() {
            let origin_modified_at = self.store.timestamps(origin)?.modified_at();
            let dest = self.store.container_mut(destination)?;
            if !dest.is_frozen() {
                dest.timestamps.replicate_modified(origin_modified_at);
            }
        }
        Ok(result)
    }

    fn sync_container_metadata(
        &mut self,
        origin: NodeId,
        destination: NodeId,
        result: &mut SyncResult,
    ) -> Result<()> {
        let metadata = self.store.metadata(origin)?.clone();
        let previous = self.store.metadata(destination)?.clone();
        if metadata == previous {
            return Ok(());
        }
        self.store.set_metadata(destination, metadata.clone(), false)?;
        result.push_change(
            Change::new(ChangeKind::Metadata)
                .with_from(Value::Map(previous))
                .with_to(Value::Map(metadata))
                .towards(self.direction),
        );
        Ok(())
    }

    /// Syncs the child at `key`. Change paths in the returned result are
    /// relative to the key.
    fn sync_key(
        &mut self,
        origin: NodeId,
        destination: NodeId,
        key: &str,
        child: Child,
        path: &str,
    ) -> Result<SyncResult> {
        let mut result = SyncResult::new("deepSync");

        if child == Child::Node(origin) {
            warn!(path, "Container references itself, skipping key");
            result.warn(format!("Self reference at '{path}' skipped"));
            return Ok(result);
        }

        let existing = self.store.container(destination)?.get(key).cloned();
        let Some(existing) = existing else {
            return self.create_missing(destination, key, child);
        };

        match (child, existing) {
            (Child::Node(from), Child::Node(to)) => {
                match (self.store.kind(from), self.store.kind(to)) {
                    (Some(NodeKind::Item), Some(NodeKind::Item)) => item::update_destination_to_match_origin(
                        self.store,
                        from,
                        to,
                        self.direction,
                        &self.options.item_options(),
                    ),
                    (Some(NodeKind::Container), Some(NodeKind::Container)) => {
                        self.sync_containers(from, to, path)
                    }
                    _ => self.assign_node(Child::Node(from), origin, key, to),
                }
            }
            (from @ Child::Raw(_), Child::Node(to)) => self.assign_node(from, origin, key, to),
            (Child::Node(from), Child::Raw(previous)) => {
                let value = self.store.to_value(from)?;
                self.replace_raw(destination, key, previous, value)
            }
            (Child::Raw(value), Child::Raw(previous)) => {
                self.merge_plain(destination, key, previous, value, path)
            }
        }
    }

    /// Inserts a deep copy of the origin child where the destination has
    /// nothing.
    fn create_missing(&mut self, destination: NodeId, key: &str, child: Child) -> Result<SyncResult> {
        let mut result = SyncResult::new("deepSync");
        self.store.container(destination)?.ensure_mutable()?;
        let (copy, value) = match child {
            Child::Node(id) => (self.store.clone_node(id)?, self.store.to_value(id)?),
            Child::Raw(value) => (self.store.wrap(value.clone()), value),
        };
        self.store
            .container_mut(destination)?
            .insert(key.to_string(), Child::Node(copy))?;
        result.push_change(
            Change::new(ChangeKind::Created)
                .with_to(value)
                .towards(self.direction),
        );
        Ok(result)
    }

    /// Mixed kinds: copies the origin's plain value into a destination node.
    /// A raw origin slot carries the timestamps of its owning container.
    fn assign_node(
        &mut self,
        from: Child,
        origin: NodeId,
        key: &str,
        to: NodeId,
    ) -> Result<SyncResult> {
        let mut result = SyncResult::new("deepSync");
        let value = self.store.child_value(&from)?;
        let previous = self.store.to_value(to)?;
        if value == previous {
            return Ok(result);
        }

        match self.store.kind(to) {
            Some(NodeKind::Item) => {
                let origin_modified_at = match &from {
                    Child::Node(id) => self.store.timestamps(*id)?.modified_at(),
                    Child::Raw(_) => self.store.timestamps(origin)?.modified_at(),
                };
                self.store
                    .item_mut(to)?
                    .replicate_value(value.clone(), origin_modified_at)?;
            }
            _ => {
                let Value::Map(entries) = value.clone() else {
                    warn!(kind = value.type_name(), "Cannot assign a non-map value to a container");
                    result.warn(format!(
                        "Cannot assign {} to container '{key}'",
                        value.type_name()
                    ));
                    return Ok(result);
                };
                self.store.container(to)?.ensure_mutable()?;
                let children: IndexMap<String, Child> = entries
                    .into_iter()
                    .map(|(k, v)| (k, Child::Node(self.store.wrap(v))))
                    .collect();
                let now = self.store.now();
                let container = self.store.container_mut(to)?;
                container.replace_children(children)?;
                container.timestamps.touch_modified(now);
            }
        }

        if self.options.sync_metadata {
            if let Child::Node(id) = from {
                let metadata = self.store.metadata(id)?.clone();
                if let Err(err) = self.store.set_metadata(to, metadata, false) {
                    warn!(key, error = %err, "Failed to copy metadata");
                    result.warn(format!("Failed to copy metadata for '{key}': {err}"));
                }
            }
        }

        result.push_change(
            Change::new(ChangeKind::Value)
                .with_from(previous)
                .with_to(value)
                .towards(self.direction),
        );
        Ok(result)
    }

    fn replace_raw(
        &mut self,
        destination: NodeId,
        key: &str,
        previous: Value,
        value: Value,
    ) -> Result<SyncResult> {
        let mut result = SyncResult::new("deepSync");
        if previous == value {
            return Ok(result);
        }
        self.store
            .container_mut(destination)?
            .insert(key.to_string(), Child::Raw(value.clone()))?;
        result.push_change(
            Change::new(ChangeKind::Value)
                .with_from(previous)
                .with_to(value)
                .towards(self.direction),
        );
        Ok(result)
    }

    /// Two plain values: maps are deep-merged, anything else is overwritten
    /// in the slot owned by the destination container.
    fn merge_plain(
        &mut self,
        destination: NodeId,
        key: &str,
        previous: Value,
        value: Value,
        path: &str,
    ) -> Result<SyncResult> {
        if self.options.strict_type_checking {
            return Err(SyncError::StrictTypeCheck {
                path: path.to_string(),
                source_kind: value.type_name().to_string(),
                target_kind: previous.type_name().to_string(),
            }
            .into());
        }

        if !(previous.is_map() && value.is_map()) {
            debug!(path, "Overwriting plain value slot");
            return self.replace_raw(destination, key, previous, value);
        }

        let mut result = SyncResult::new("deepSync");
        let mut merged = previous.clone();
        merged.deep_merge(&value);
        if merged == previous {
            return Ok(result);
        }
        self.store
            .container_mut(destination)?
            .insert(key.to_string(), Child::Raw(merged.clone()))?;
        result.push_change(
            Change::new(ChangeKind::Merged)
                .with_from(previous)
                .with_to(merged)
                .towards(self.direction),
        );
        Ok(result)
    }
}
