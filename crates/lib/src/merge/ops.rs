//! Bulk orchestration over [`Merger`] and [`ItemFilter`].
//!
//! Nothing here decides values on its own. Every operation narrows the
//! caller's [`MergeOptions`] with extra filters and runs one or more merges in
//! a fixed order.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    filter::ItemFilter,
    merger::{MergeOptions, MergeStrategy, Merger},
    result::SyncResult,
};
use crate::{Result, Store, node::Context};

/// Adds `filter` on top of whatever the options already restrict.
fn narrowed(options: &MergeOptions, filter: ItemFilter) -> MergeOptions {
    let custom_filter = match &options.custom_filter {
        Some(existing) => ItemFilter::and([existing.clone(), filter]),
        None => filter,
    };
    MergeOptions {
        custom_filter: Some(custom_filter),
        ..options.clone()
    }
}

/// Merges only the given paths (and anything under them) from `source`
/// into `target`.
pub fn push_items<S: AsRef<str>>(
    store: &mut Store,
    source: &Context,
    target: &Context,
    paths: &[S],
    strategy: MergeStrategy,
    options: &MergeOptions,
) -> Result<SyncResult> {
    debug!(
        source = source.name(),
        target = target.name(),
        paths = paths.len(),
        "Pushing items"
    );
    let options = narrowed(options, ItemFilter::allow_only(paths));
    Merger::merge(store, source, target, strategy, &options)
}

/// Pulls the given paths from `target` into `source`.
pub fn pull_items<S: AsRef<str>>(
    store: &mut Store,
    source: &Context,
    target: &Context,
    paths: &[S],
    strategy: MergeStrategy,
    options: &MergeOptions,
) -> Result<SyncResult> {
    push_items(store, target, source, paths, strategy, options)
}

/// Merges every source into `target`, one after another. Later sources may
/// overwrite what earlier ones contributed. One result per source, in input
/// order.
pub fn push_from_multiple_sources(
    store: &mut Store,
    sources: &[Context],
    target: &Context,
    strategy: MergeStrategy,
    options: &MergeOptions,
) -> Result<Vec<SyncResult>> {
    sources
        .iter()
        .map(|source| Merger::merge(store, source, target, strategy, options))
        .collect()
}

/// Merges `source` into every target. One result per target, in input order.
pub fn push_to_multiple_targets(
    store: &mut Store,
    source: &Context,
    targets: &[Context],
    strategy: MergeStrategy,
    options: &MergeOptions,
) -> Result<Vec<SyncResult>> {
    targets
        .iter()
        .map(|target| Merger::merge(store, source, target, strategy, options))
        .collect()
}

/// Pushes `paths` from every source to every target. The result is indexed
/// `[source][target]`.
pub fn push_items_bulk<S: AsRef<str>>(
    store: &mut Store,
    sources: &[Context],
    targets: &[Context],
    paths: &[S],
    strategy: MergeStrategy,
    options: &MergeOptions,
) -> Result<Vec<Vec<SyncResult>>> {
    let options = narrowed(options, ItemFilter::allow_only(paths));
    sources
        .iter()
        .map(|source| push_to_multiple_targets(store, source, targets, strategy, &options))
        .collect()
}

/// Options for [`synchronize_bidirectional`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BidirectionalOptions {
    pub strategy: MergeStrategy,
    /// Paths left alone in both directions.
    pub exclude_paths: Vec<String>,
    /// Paths where the first context always wins.
    pub a_priority: Vec<String>,
    /// Paths where the second context always wins.
    pub b_priority: Vec<String>,
}

impl BidirectionalOptions {
    pub fn with_strategy(mut self, strategy: MergeStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_exclude_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_a_priority<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.a_priority = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_b_priority<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.b_priority = paths.into_iter().map(Into::into).collect();
        self
    }
}

/// Outcome of [`synchronize_bidirectional`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidirectionalResult {
    pub success: bool,
    #[serde(rename = "direction1to2")]
    pub direction_1_to_2: SyncResult,
    #[serde(rename = "direction2to1")]
    pub direction_2_to_1: SyncResult,
}

/// Merges `a` into `b` and then `b` into `a`.
///
/// Each direction runs the configured strategy over every path that is
/// neither excluded nor claimed by a priority list, then forces its own
/// priority paths across.
pub fn synchronize_bidirectional(
    store: &mut Store,
    a: &Context,
    b: &Context,
    bidirectional: &BidirectionalOptions,
    options: &MergeOptions,
) -> Result<BidirectionalResult> {
    let direction_1_to_2 = one_direction(
        store,
        a,
        b,
        bidirectional,
        &bidirectional.a_priority,
        &bidirectional.b_priority,
        options,
    )?;
    let direction_2_to_1 = one_direction(
        store,
        b,
        a,
        bidirectional,
        &bidirectional.b_priority,
        &bidirectional.a_priority,
        options,
    )?;

    let success = direction_1_to_2.success && direction_2_to_1.success;
    debug!(
        a = a.name(),
        b = b.name(),
        success,
        changes = direction_1_to_2.changes.len() + direction_2_to_1.changes.len(),
        "Bidirectional sync finished"
    );
    Ok(BidirectionalResult {
        success,
        direction_1_to_2,
        direction_2_to_1,
    })
}

fn one_direction(
    store: &mut Store,
    from: &Context,
    to: &Context,
    bidirectional: &BidirectionalOptions,
    own_priority: &[String],
    other_priority: &[String],
    options: &MergeOptions,
) -> Result<SyncResult> {
    let blocked: Vec<&String> = bidirectional
        .exclude_paths
        .iter()
        .chain(own_priority)
        .chain(other_priority)
        .collect();
    let general = narrowed(options, ItemFilter::block_only(&blocked));
    let mut result = Merger::merge(store, from, to, bidirectional.strategy, &general)?;

    if !own_priority.is_empty() {
        let forced = narrowed(
            options,
            ItemFilter::and([
                ItemFilter::allow_only(own_priority),
                ItemFilter::block_only(&bidirectional.exclude_paths),
            ]),
        );
        let priority = Merger::merge(store, from, to, MergeStrategy::UpdateTargetToSource, &forced)?;
        result.absorb(priority);
    }
    Ok(result)
}

/// Outcome of [`consolidate_contexts`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidationResult {
    /// One result per source, in input order.
    pub results: Vec<SyncResult>,
    /// Every per-source result folded together.
    pub summary: SyncResult,
}

/// Folds every source into `target` from left to right.
pub fn consolidate_contexts(
    store: &mut Store,
    sources: &[Context],
    target: &Context,
    strategy: MergeStrategy,
    options: &MergeOptions,
) -> Result<ConsolidationResult> {
    let results = push_from_multiple_sources(store, sources, target, strategy, options)?;
    let mut summary = SyncResult::new("consolidateContexts");
    for result in &results {
        summary.absorb(result.clone());
    }
    debug!(
        sources = sources.len(),
        target = target.name(),
        changes = summary.changes.len(),
        "Contexts consolidated"
    );
    Ok(ConsolidationResult { results, summary })
}
