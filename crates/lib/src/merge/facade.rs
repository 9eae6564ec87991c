//! Single entry point dispatching on operand kind.
//!
//! Items go to the item synchronizer, containers to [`ContainerSync`] and
//! contexts to the [`Merger`]. The kind is read from the explicit tag every
//! node carries, never guessed from its content.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{
    SyncError,
    compare::{ComparisonResult, compare_nodes},
    container::{ContainerSync, ContainerSyncOptions},
    item::{self, ItemSyncOptions, Priority},
    merger::{MergeOptions, MergeStrategy, Merger},
    result::SyncResult,
};
use crate::{
    Error, Result,
    node::{Context, NodeId, NodeKind, Store, StoreError},
};

/// Something that can be synchronized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Item(NodeId),
    Container(NodeId),
    Context(Context),
}

/// The kind tag of an [`Operand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperandKind {
    Item,
    Container,
    Context,
}

impl fmt::Display for OperandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperandKind::Item => f.write_str("item"),
            OperandKind::Container => f.write_str("container"),
            OperandKind::Context => f.write_str("context"),
        }
    }
}

impl Operand {
    pub fn kind(&self) -> OperandKind {
        match self {
            Operand::Item(_) => OperandKind::Item,
            Operand::Container(_) => OperandKind::Container,
            Operand::Context(_) => OperandKind::Context,
        }
    }

    /// The node behind the operand; the root container for a context.
    pub fn node(&self) -> NodeId {
        match self {
            Operand::Item(id) | Operand::Container(id) => *id,
            Operand::Context(context) => context.root(),
        }
    }
}

impl From<Context> for Operand {
    fn from(context: Context) -> Self {
        Operand::Context(context)
    }
}

impl Store {
    /// Tags a node as an operand according to its kind.
    pub fn operand(&self, id: NodeId) -> std::result::Result<Operand, StoreError> {
        Ok(match self.node(id)?.kind() {
            NodeKind::Item => Operand::Item(id),
            NodeKind::Container => Operand::Container(id),
        })
    }
}

/// A named sync operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncOperation {
    UpdateSourceToMatchTarget,
    UpdateTargetToMatchSource,
    MergeNewerWins,
    #[serde(alias = "mergeSourceTarget")]
    MergeSourcePriority,
    MergeTargetPriority,
    Replace,
    NoAction,
}

impl SyncOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncOperation::UpdateSourceToMatchTarget => "updateSourceToMatchTarget",
            SyncOperation::UpdateTargetToMatchSource => "updateTargetToMatchSource",
            SyncOperation::MergeNewerWins => "mergeNewerWins",
            SyncOperation::MergeSourcePriority => "mergeSourcePriority",
            SyncOperation::MergeTargetPriority => "mergeTargetPriority",
            SyncOperation::Replace => "replace",
            SyncOperation::NoAction => "noAction",
        }
    }
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncOperation {
    type Err = SyncError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "updateSourceToMatchTarget" => Ok(SyncOperation::UpdateSourceToMatchTarget),
            "updateTargetToMatchSource" => Ok(SyncOperation::UpdateTargetToMatchSource),
            "mergeNewerWins" => Ok(SyncOperation::MergeNewerWins),
            "mergeSourcePriority" | "mergeSourceTarget" => Ok(SyncOperation::MergeSourcePriority),
            "mergeTargetPriority" => Ok(SyncOperation::MergeTargetPriority),
            "replace" => Ok(SyncOperation::Replace),
            "noAction" => Ok(SyncOperation::NoAction),
            other => Err(SyncError::InvalidOperation {
                operation: other.to_string(),
            }),
        }
    }
}

impl From<SyncOperation> for MergeStrategy {
    fn from(operation: SyncOperation) -> Self {
        match operation {
            SyncOperation::UpdateSourceToMatchTarget => MergeStrategy::UpdateSourceToTarget,
            SyncOperation::UpdateTargetToMatchSource => MergeStrategy::UpdateTargetToSource,
            SyncOperation::MergeNewerWins => MergeStrategy::MergeNewerWins,
            SyncOperation::MergeSourcePriority => MergeStrategy::MergeSourcePriority,
            SyncOperation::MergeTargetPriority => MergeStrategy::MergeTargetPriority,
            SyncOperation::Replace => MergeStrategy::Replace,
            SyncOperation::NoAction => MergeStrategy::NoAction,
        }
    }
}

/// Options for every layer the facade may dispatch to.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub item: ItemSyncOptions,
    pub container: ContainerSyncOptions,
    pub merge: MergeOptions,
}

impl SyncOptions {
    pub fn with_item(mut self, item: ItemSyncOptions) -> Self {
        self.item = item;
        self
    }

    pub fn with_container(mut self, container: ContainerSyncOptions) -> Self {
        self.container = container;
        self
    }

    pub fn with_merge(mut self, merge: MergeOptions) -> Self {
        self.merge = merge;
        self
    }
}

/// The sync facade.
///
/// ```
/// use ctxsync::{Store, Value, merge::Synchronizer};
///
/// let mut store = Store::new();
/// let older = store.create_item(1, Default::default(), Default::default());
/// let newer = store.create_item(2, Default::default(), Default::default());
/// let older = store.operand(older)?;
/// let newer = store.operand(newer)?;
///
/// let sync = Synchronizer::default();
/// let result = sync.sync_safe(&mut store, Some(&older), Some(&newer), "bogus");
/// assert_eq!(result.error.as_deref(), Some("Invalid sync operation"));
///
/// let result = sync.sync_safe(&mut store, Some(&older), Some(&newer), "updateTargetToMatchSource");
/// assert!(result.success);
/// assert_eq!(store.item(newer.node())?.value(), &Value::Int(1));
/// # Ok::<(), ctxsync::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct Synchronizer {
    options: SyncOptions,
}

impl Synchronizer {
    pub fn new(options: SyncOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// True when both operands are of the same kind.
    pub fn validate_compatibility(a: &Operand, b: &Operand) -> bool {
        a.kind() == b.kind()
    }

    /// Runs `operation` on two operands of the same kind.
    pub fn sync(
        &self,
        store: &mut Store,
        source: &Operand,
        target: &Operand,
        operation: SyncOperation,
    ) -> Result<SyncResult> {
        debug!(%operation, kind = %source.kind(), "Dispatching sync");

        let mut result = match (source, target) {
            (Operand::Item(s), Operand::Item(t)) => self.sync_items(store, *s, *t, operation)?,
            (Operand::Container(s), Operand::Container(t)) => {
                self.sync_containers(store, *s, *t, operation)?
            }
            (Operand::Context(s), Operand::Context(t)) => {
                Merger::merge(store, s, t, operation.into(), &self.options.merge)?
            }
            _ => return Err(mismatch(source, target).into()),
        };
        result.operation = operation.as_str().to_string();
        Ok(result)
    }

    /// Picks the operation from the timestamps and runs it.
    ///
    /// The newer side updates the older one. A missing operand cannot be
    /// populated here, so it yields a successful result with a warning.
    pub fn auto_sync(
        &self,
        store: &mut Store,
        source: Option<&Operand>,
        target: Option<&Operand>,
    ) -> Result<SyncResult> {
        let (source, target) = match (source, target) {
            (Some(source), Some(target)) => (source, target),
            (source, target) => {
                let missing = match (source, target) {
                    (None, None) => "source and target",
                    (None, _) => "source",
                    _ => "target",
                };
                warn!(missing, "Auto sync without both operands");
                let mut result = SyncResult::new("autoSync");
                result.warn(format!("Missing {missing}, nothing to synchronize"));
                return Ok(result.summarize());
            }
        };
        if !Self::validate_compatibility(source, target) {
            return Err(mismatch(source, target).into());
        }

        let compare_by = match source.kind() {
            OperandKind::Item => self.options.item.compare_by,
            OperandKind::Container => self.options.container.compare_by,
            OperandKind::Context => self.options.merge.compare_by,
        };
        let comparison = compare_nodes(store, Some(source.node()), Some(target.node()), compare_by)?;
        let operation = match comparison.result {
            ComparisonResult::ANewer => SyncOperation::UpdateTargetToMatchSource,
            ComparisonResult::BNewer => SyncOperation::UpdateSourceToMatchTarget,
            _ => {
                return Ok(SyncResult::new("autoSync")
                    .with_message("Operands are in sync")
                    .summarize());
            }
        };
        debug!(result = ?comparison.result, %operation, "Auto sync resolved operation");

        let result = self.sync(store, source, target, operation)?;
        Ok(result.with_message(format!("autoSync resolved to {operation}")))
    }

    /// Like [`Synchronizer::sync`] but never fails.
    ///
    /// `"auto"` and `"autoSync"` run [`Synchronizer::auto_sync`]. Errors come
    /// back as an unsuccessful result: an unknown operation name sets
    /// `error` to `"Invalid sync operation"`, operands of different kinds set
    /// it to `"type mismatch"`. A missing operand is a warning.
    pub fn sync_safe(
        &self,
        store: &mut Store,
        source: Option<&Operand>,
        target: Option<&Operand>,
        operation: &str,
    ) -> SyncResult {
        if matches!(operation, "auto" | "autoSync") {
            return capture(operation, self.auto_sync(store, source, target));
        }

        let parsed = match operation.parse::<SyncOperation>() {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(operation, "Rejected sync operation");
                return SyncResult::new(operation)
                    .with_error("Invalid sync operation")
                    .with_message(err.to_string());
            }
        };

        let (Some(source), Some(target)) = (source, target) else {
            warn!(operation, "Sync without both operands");
            let mut result = SyncResult::new(operation);
            result.warn("Missing source or target, nothing to synchronize");
            return result.summarize();
        };
        capture(operation, self.sync(store, source, target, parsed))
    }

    fn sync_items(
        &self,
        store: &mut Store,
        source: NodeId,
        target: NodeId,
        operation: SyncOperation,
    ) -> Result<SyncResult> {
        let options = &self.options.item;
        let result = match operation {
            SyncOperation::UpdateSourceToMatchTarget => {
                item::update_source_to_match_target(store, source, target, options)?
            }
            SyncOperation::UpdateTargetToMatchSource | SyncOperation::Replace => {
                item::update_target_to_match_source(store, source, target, options)?
            }
            SyncOperation::MergeNewerWins => item::merge_newer_wins(store, source, target, options)?,
            SyncOperation::MergeSourcePriority => {
                item::merge_with(store, source, target, Priority::Source, options)?
            }
            SyncOperation::MergeTargetPriority => {
                item::merge_with(store, source, target, Priority::Target, options)?
            }
            SyncOperation::NoAction => {
                store.item(source)?;
                store.item(target)?;
                dry_run()
            }
        };
        Ok(result.summarize())
    }

    fn sync_containers(
        &self,
        store: &mut Store,
        source: NodeId,
        target: NodeId,
        operation: SyncOperation,
    ) -> Result<SyncResult> {
        let engine = ContainerSync::new(self.options.container);
        match operation {
            SyncOperation::UpdateSourceToMatchTarget => {
                engine.update_source_to_match_target(store, source, target)
            }
            SyncOperation::UpdateTargetToMatchSource => {
                engine.update_target_to_match_source(store, source, target)
            }
            SyncOperation::MergeNewerWins => engine.merge_newer_wins(store, source, target),
            SyncOperation::MergeSourcePriority => {
                engine.merge_with_priority(store, source, target, "source")
            }
            SyncOperation::MergeTargetPriority => {
                engine.merge_with_priority(store, source, target, "target")
            }
            SyncOperation::Replace => ContainerSync::new(self.options.container.with_deep_sync(false))
                .update_target_to_match_source(store, source, target),
            SyncOperation::NoAction => {
                store.container(source)?;
                store.container(target)?;
                Ok(dry_run().summarize())
            }
        }
    }
}

fn dry_run() -> SyncResult {
    let mut result = SyncResult::new("noAction").with_message("No action taken");
    result.dry_run = true;
    result
}

fn mismatch(source: &Operand, target: &Operand) -> SyncError {
    SyncError::TypeMismatch {
        source_kind: source.kind().to_string(),
        target_kind: target.kind().to_string(),
    }
}

fn capture(operation: &str, outcome: Result<SyncResult>) -> SyncResult {
    match outcome {
        Ok(result) => result,
        Err(Error::Sync(err @ SyncError::TypeMismatch { .. })) => {
            warn!(operation, error = %err, "Sync operands do not match");
            SyncResult::new(operation)
                .with_error("type mismatch")
                .with_message(err.to_string())
        }
        Err(err) => {
            warn!(operation, error = %err, module = err.module(), "Sync failed");
            SyncResult::new(operation).with_error(err.to_string())
        }
    }
}
