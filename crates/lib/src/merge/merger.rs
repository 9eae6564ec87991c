//! Path-level reconciliation of two contexts.
//!
//! The merger flattens both trees into leaf paths (items and plain value
//! slots), takes the union of those paths with the source's order first and
//! decides per path which side wins under a [`MergeStrategy`]. A path whose
//! write fails is reported as a warning and the merge carries on.

use std::{
    collections::HashSet,
    fmt,
    str::FromStr,
    sync::Arc,
};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use super::{
    SyncError,
    compare::{CompareBy, ComparisonResult, Timestamped, compare},
    filter::ItemFilter,
    result::{Change, ChangeKind, Direction, Statistics, SyncResult},
};
use crate::{
    Result, Value,
    clock::Timestamp,
    node::{Child, Context, Metadata, Node, NodeId, NodeKind, Store, StoreError, Timestamps},
    path,
};

/// How a merge decides between the two sides of a path.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MergeStrategy {
    /// The side with the newer timestamp wins, in either direction.
    #[default]
    MergeNewerWins,
    /// Source wins every difference; target-only paths are copied back.
    #[serde(alias = "mergeSourceTarget")]
    MergeSourcePriority,
    /// Target wins every difference; source-only paths are copied over.
    MergeTargetPriority,
    /// The source is updated to match the target.
    UpdateSourceToTarget,
    /// The target is updated to match the source.
    UpdateTargetToSource,
    /// The target becomes a copy of the source, losing target-only paths.
    Replace,
    /// Computes what `MergeNewerWins` would change without applying it.
    NoAction,
}

impl MergeStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            MergeStrategy::MergeNewerWins => "mergeNewerWins",
            MergeStrategy::MergeSourcePriority => "mergeSourcePriority",
            MergeStrategy::MergeTargetPriority => "mergeTargetPriority",
            MergeStrategy::UpdateSourceToTarget => "updateSourceToTarget",
            MergeStrategy::UpdateTargetToSource => "updateTargetToSource",
            MergeStrategy::Replace => "replace",
            MergeStrategy::NoAction => "noAction",
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStrategy {
    type Err = SyncError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "mergeNewerWins" => Ok(MergeStrategy::MergeNewerWins),
            "mergeSourcePriority" | "mergeSourceTarget" => Ok(MergeStrategy::MergeSourcePriority),
            "mergeTargetPriority" => Ok(MergeStrategy::MergeTargetPriority),
            "updateSourceToTarget" => Ok(MergeStrategy::UpdateSourceToTarget),
            "updateTargetToSource" => Ok(MergeStrategy::UpdateTargetToSource),
            "replace" => Ok(MergeStrategy::Replace),
            "noAction" => Ok(MergeStrategy::NoAction),
            other => Err(SyncError::InvalidStrategy {
                strategy: other.to_string(),
            }),
        }
    }
}

/// Caller override for a path whose values differ on both sides.
#[derive(Debug, Clone, PartialEq)]
pub enum ConflictResolution {
    TakeSource,
    TakeTarget,
    /// Leave both sides untouched.
    Skip,
    /// Write this value to both sides.
    Use(Value),
}

/// Called with `(source_value, target_value, path)`. `None` keeps the
/// strategy's decision.
pub type ConflictHandler =
    Arc<dyn Fn(&Value, &Value, &str) -> Option<ConflictResolution> + Send + Sync>;

/// Options for [`Merger::merge`].
#[derive(Clone)]
pub struct MergeOptions {
    pub custom_filter: Option<ItemFilter>,
    /// Only paths equal to or under one of these take part.
    pub allow_only: Vec<String>,
    /// Paths equal to or under one of these are skipped.
    pub block_only: Vec<String>,
    /// Restricts the whole merge to one path (and anything under it).
    pub single_item: Option<String>,
    pub on_conflict: Option<ConflictHandler>,
    /// Copy metadata together with values.
    pub preserve_metadata: bool,
    /// Create paths that exist on only one side.
    pub create_missing: bool,
    pub compare_by: CompareBy,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            custom_filter: None,
            allow_only: Vec::new(),
            block_only: Vec::new(),
            single_item: None,
            on_conflict: None,
            preserve_metadata: true,
            create_missing: true,
            compare_by: CompareBy::ModifiedAt,
        }
    }
}

impl fmt::Debug for MergeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MergeOptions")
            .field("custom_filter", &self.custom_filter)
            .field("allow_only", &self.allow_only)
            .field("block_only", &self.block_only)
            .field("single_item", &self.single_item)
            .field("on_conflict", &self.on_conflict.as_ref().map(|_| "<handler>"))
            .field("preserve_metadata", &self.preserve_metadata)
            .field("create_missing", &self.create_missing)
            .field("compare_by", &self.compare_by)
            .finish()
    }
}

impl MergeOptions {
    pub fn with_filter(mut self, filter: ItemFilter) -> Self {
        self.custom_filter = Some(filter);
        self
    }

    pub fn with_allow_only<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allow_only = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_block_only<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.block_only = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_single_item(mut self, path: impl Into<String>) -> Self {
        self.single_item = Some(path.into());
        self
    }

    pub fn with_on_conflict(
        mut self,
        handler: impl Fn(&Value, &Value, &str) -> Option<ConflictResolution> + Send + Sync + 'static,
    ) -> Self {
        self.on_conflict = Some(Arc::new(handler));
        self
    }

    pub fn with_preserve_metadata(mut self, preserve: bool) -> Self {
        self.preserve_metadata = preserve;
        self
    }

    pub fn with_create_missing(mut self, create: bool) -> Self {
        self.create_missing = create;
        self
    }

    pub fn with_compare_by(mut self, compare_by: CompareBy) -> Self {
        self.compare_by = compare_by;
        self
    }

    /// All configured restrictions combined into one filter.
    pub fn effective_filter(&self) -> ItemFilter {
        let mut filters = Vec::new();
        if let Some(filter) = &self.custom_filter {
            filters.push(filter.clone());
        }
        if !self.allow_only.is_empty() {
            filters.push(ItemFilter::allow_only(&self.allow_only));
        }
        if !self.block_only.is_empty() {
            filters.push(ItemFilter::block_only(&self.block_only));
        }
        if let Some(single) = &self.single_item {
            filters.push(ItemFilter::allow_only([single]));
        }
        match filters.len() {
            0 => ItemFilter::allow_all(),
            1 => filters.remove(0),
            _ => ItemFilter::and(filters),
        }
    }
}

/// A leaf of a flattened context tree.
#[derive(Debug, Clone)]
struct Leaf {
    value: Value,
    metadata: Metadata,
    timestamps: Timestamps,
    /// Stored as a plain value slot rather than an item.
    raw: bool,
}

#[derive(Debug, Clone, PartialEq)]
enum Action {
    Keep,
    ToTarget,
    ToSource,
    Use(Value),
    RemoveTarget,
}

impl From<ConflictResolution> for Action {
    fn from(resolution: ConflictResolution) -> Self {
        match resolution {
            ConflictResolution::TakeSource => Action::ToTarget,
            ConflictResolution::TakeTarget => Action::ToSource,
            ConflictResolution::Skip => Action::Keep,
            ConflictResolution::Use(value) => Action::Use(value),
        }
    }
}

/// Path-level merge of two contexts.
///
/// ```
/// use ctxsync::{Store, Value, merge::{MergeOptions, MergeStrategy, Merger}};
///
/// let mut store = Store::new();
/// let local = store.create_context("local");
/// let remote = store.create_context("remote");
/// store.set_item(local.root(), "player.name", "Ada")?;
/// store.set_item(remote.root(), "player.level", 3)?;
///
/// let result = Merger::merge(
///     &mut store,
///     &local,
///     &remote,
///     MergeStrategy::MergeSourcePriority,
///     &MergeOptions::default(),
/// )?;
/// assert!(result.success);
/// assert_eq!(store.get_value(remote.root(), "player.name"), Some(Value::from("Ada")));
/// assert_eq!(store.get_value(local.root(), "player.level"), Some(Value::Int(3)));
/// # Ok::<(), ctxsync::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Merger;

impl Merger {
    pub fn merge(
        store: &mut Store,
        source: &Context,
        target: &Context,
        strategy: MergeStrategy,
        options: &MergeOptions,
    ) -> Result<SyncResult> {
        let dry_run = strategy == MergeStrategy::NoAction;
        let mut result = SyncResult::new(strategy.as_str());
        result.dry_run = dry_run;

        let source_leaves = collect_leaves(store, source.root())?;
        let target_leaves = collect_leaves(store, target.root())?;
        let mut paths: Vec<String> = source_leaves.keys().cloned().collect();
        paths.extend(
            target_leaves
                .keys()
                .filter(|p| !source_leaves.contains_key(*p))
                .cloned(),
        );

        let filter = options.effective_filter();
        let mut stats = Statistics::default();

        for path in paths {
            let s = source_leaves.get(&path);
            let t = target_leaves.get(&path);
            if !filter.matches(&path, s.map(|l| &l.value), t.map(|l| &l.value)) {
                trace!(path = %path, "Path filtered out");
                stats.filtered += 1;
                continue;
            }
            stats.processed += 1;
            result.items_processed.push(path.clone());

            let mut action = plan(strategy, s, t, options)?;
            if let (Some(s), Some(t)) = (s, t) {
                if s.value != t.value {
                    stats.conflicts += 1;
                    if let Some(handler) = &options.on_conflict {
                        if let Some(resolution) = handler(&s.value, &t.value, &path) {
                            debug!(path = %path, ?resolution, "Conflict resolved by handler");
                            action = resolution.into();
                        }
                    }
                }
            }

            let changes = describe(&path, &action, s, t, options);
            if changes.is_empty() {
                stats.unchanged += 1;
                continue;
            }

            if !dry_run {
                let applied = apply(
                    store,
                    source.root(),
                    target.root(),
                    &path,
                    &action,
                    s,
                    t,
                    options,
                );
                if let Err(err) = applied {
                    warn!(path = %path, error = %err, "Failed to merge path");
                    result.warn(format!("Failed to merge '{path}': {err}"));
                    stats.failed += 1;
                    continue;
                }
            }

            for change in changes {
                stats.record(&change);
                result.push_change(change);
            }
        }

        debug!(
            strategy = %strategy,
            source = source.name(),
            target = target.name(),
            processed = stats.processed,
            changes = result.changes.len(),
            dry_run,
            "Merge finished"
        );
        result.statistics = Some(stats);
        Ok(result)
    }

    /// Like [`Merger::merge`], taking the strategy by name.
    pub fn merge_named(
        store: &mut Store,
        source: &Context,
        target: &Context,
        strategy: &str,
        options: &MergeOptions,
    ) -> Result<SyncResult> {
        let strategy = strategy.parse::<MergeStrategy>()?;
        Self::merge(store, source, target, strategy, options)
    }
}

fn collect_leaves(store: &Store, root: NodeId) -> std::result::Result<IndexMap<String, Leaf>, StoreError> {
    let mut leaves = IndexMap::new();
    let mut ancestors = HashSet::new();
    collect_into(store, root, "", &mut ancestors, &mut leaves)?;
    Ok(leaves)
}

/// Flattens `id` into `leaves`. Only containers on the current ancestor chain
/// are skipped, so a container shared under two keys yields leaves under both.

fn collect_into(
    store: &Store,
    id: NodeId,
    prefix: &str,
    ancestors: &mut HashSet<NodeId>,
    leaves: &mut IndexMap<String, Leaf>,
) -> std::result::Result<(), StoreError> {
    if !ancestors.insert(id) {
        trace!(path = prefix, container = %id, "Cycle in context tree, branch skipped");
        return Ok(());
    }
    let container = store.container(id)?;
    for (key, child) in container.children() {
        let path = path::join(prefix, key);
        match child {
            Child::Node(child_id) => match store.node(*child_id)? {
                Node::Item(item) => {
                    leaves.insert(
                        path,
                        Leaf {
                            value: item.value().clone(),
                            metadata: item.metadata().clone(),
                            timestamps: *item.timestamps(),
                            raw: false,
                        },
                    );
                }
                Node::Container(_) => collect_into(store, *child_id, &path, ancestors, leaves)?,
            },
            Child::Raw(value) => {
                leaves.insert(
                    path,
                    Leaf {
                        value: value.clone(),
                        metadata: Metadata::new(),
                        timestamps: *container.timestamps(),
                        raw: true,
                    },
                );
            }
        }
    }
    ancestors.remove(&id);
    Ok(())
}

fn differs(a: &Leaf, b: &Leaf, options: &MergeOptions) -> bool {
    a.value != b.value || (options.preserve_metadata && a.metadata != b.metadata)
}

fn plan(
    strategy: MergeStrategy,
    source: Option<&Leaf>,
    target: Option<&Leaf>,
    options: &MergeOptions,
) -> std::result::Result<Action, SyncError> {
    use MergeStrategy::*;

    let action = match (source, target) {
        (None, None) => Action::Keep,
        (Some(_), None) => match strategy {
            Replace => Action::ToTarget,
            UpdateSourceToTarget => Action::Keep,
            _ if options.create_missing => Action::ToTarget,
            _ => Action::Keep,
        },
        (None, Some(_)) => match strategy {
            Replace => Action::RemoveTarget,
            UpdateTargetToSource => Action::Keep,
            _ if options.create_missing => Action::ToSource,
            _ => Action::Keep,
        },
        (Some(s), Some(t)) if !differs(s, t, options) => Action::Keep,
        (Some(s), Some(t)) => match strategy {
            MergeNewerWins | NoAction => {
                let comparison = compare(
                    Some(&s.timestamps as &dyn Timestamped),
                    Some(&t.timestamps as &dyn Timestamped),
                    options.compare_by,
                )?;
                match comparison.result {
                    ComparisonResult::ANewer => Action::ToTarget,
                    ComparisonResult::BNewer => Action::ToSource,
                    _ => Action::Keep,
                }
            }
            MergeSourcePriority | UpdateTargetToSource | Replace => Action::ToTarget,
            MergeTargetPriority | UpdateSourceToTarget => Action::ToSource,
        },
    };
    Ok(action)
}

/// The changes `action` makes at `path`.
fn describe(
    path: &str,
    action: &Action,
    source: Option<&Leaf>,
    target: Option<&Leaf>,
    options: &MergeOptions,
) -> Vec<Change> {
    match action {
        Action::Keep => Vec::new(),
        Action::ToTarget => copy_changes(path, source, target, Direction::SourceToTarget, options),
        Action::ToSource => copy_changes(path, target, source, Direction::TargetToSource, options),
        Action::RemoveTarget => target
            .map(|t| {
                vec![
                    Change::new(ChangeKind::Removed)
                        .at(path)
                        .with_from(t.value.clone())
                        .towards(Direction::SourceToTarget),
                ]
            })
            .unwrap_or_default(),
        Action::Use(value) => [
            (target, Direction::SourceToTarget),
            (source, Direction::TargetToSource),
        ]
        .into_iter()
        .filter_map(|(side, direction)| match side {
            Some(leaf) if &leaf.value == value => None,
            Some(leaf) => Some(
                Change::new(ChangeKind::Value)
                    .at(path)
                    .with_from(leaf.value.clone())
                    .with_to(value.clone())
                    .towards(direction),
            ),
            None => Some(
                Change::new(ChangeKind::Created)
                    .at(path)
                    .with_to(value.clone())
                    .towards(direction),
            ),
        })
        .collect(),
    }
}

fn copy_changes(
    path: &str,
    origin: Option<&Leaf>,
    destination: Option<&Leaf>,
    direction: Direction,
    options: &MergeOptions,
) -> Vec<Change> {
    let Some(origin) = origin else {
        return Vec::new();
    };
    let Some(destination) = destination else {
        return vec![
            Change::new(ChangeKind::Created)
                .at(path)
                .with_to(origin.value.clone())
                .towards(direction),
        ];
    };

    let mut changes = Vec::new();
    if origin.value != destination.value {
        changes.push(
            Change::new(ChangeKind::Value)
                .at(path)
                .with_from(destination.value.clone())
                .with_to(origin.value.clone())
                .towards(direction),
        );
    }
    if options.preserve_metadata && !origin.raw && origin.metadata != destination.metadata {
        changes.push(
            Change::new(ChangeKind::Metadata)
                .at(path)
                .with_from(Value::Map(destination.metadata.clone()))
                .with_to(Value::Map(origin.metadata.clone()))
                .towards(direction),
        );
    }
    changes
}

#[allow(clippy::too_many_arguments)]
fn apply(
    store: &mut Store,
    source_root: NodeId,
    target_root: NodeId,
    path: &str,
    action: &Action,
    source: Option<&Leaf>,
    target: Option<&Leaf>,
    options: &MergeOptions,
) -> Result<()> {
    match action {
        Action::Keep => {}
        Action::ToTarget => {
            if let Some(origin) = source {
                write_leaf(store, target_root, path, origin, options)?;
            }
        }
        Action::ToSource => {
            if let Some(origin) = target {
                write_leaf(store, source_root, path, origin, options)?;
            }
        }
        Action::RemoveTarget => {
            store.delete_item(target_root, path)?;
        }
        Action::Use(value) => {
            let resolved = Leaf {
                value: value.clone(),
                metadata: Metadata::new(),
                timestamps: Timestamps::new(store.now()),
                raw: false,
            };
            let keep_metadata = MergeOptions {
                preserve_metadata: false,
                ..options.clone()
            };
            for (root, side) in [(target_root, target), (source_root, source)] {
                if side.is_none_or(|leaf| &leaf.value != value) {
                    let leaf = Leaf {
                        raw: side.is_some_and(|leaf| leaf.raw),
                        ..resolved.clone()
                    };
                    write_leaf(store, root, path, &leaf, &keep_metadata)?;
                }
            }
        }
    }
    Ok(())
}

/// Writes `origin` at `path` under `root`, adopting its `modified_at`.
fn write_leaf(
    store: &mut Store,
    root: NodeId,
    path: &str,
    origin: &Leaf,
    options: &MergeOptions,
) -> Result<()> {
    let modified_at: Timestamp = origin.timestamps.modified_at();
    let metadata = options.preserve_metadata.then_some(&origin.metadata);

    match store.get_item(root, path).cloned() {
        Some(Child::Node(id)) if store.kind(id) == Some(NodeKind::Item) => {
            let now = store.now();
            let item = store.item_mut(id)?;
            if item.value() != &origin.value {
                item.replicate_value(origin.value.clone(), modified_at)?;
            }
            if let Some(metadata) = metadata {
                if !origin.raw && item.metadata() != metadata {
                    item.set_metadata(metadata.clone(), false, now)?;
                }
            }
        }
        Some(Child::Raw(_)) => {
            store.set_raw(root, path, origin.value.clone())?;
        }
        _ if origin.raw => {
            store.set_raw(root, path, origin.value.clone())?;
        }
        _ => {
            let id = store.set_item_with(
                root,
                path,
                origin.value.clone(),
                metadata.cloned().unwrap_or_default(),
            )?;
            store.node_mut(id)?.timestamps_mut().replicate_modified(modified_at);
        }
    }
    Ok(())
}
