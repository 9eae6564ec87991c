use ctxsync::{
    Value,
    merge::{ChangeKind, ConflictResolution, Direction, MergeOptions, MergeStrategy, Merger},
};
use serde_json::json;

use crate::helpers::*;

#[test]
fn source_priority_fills_both_sides() {
    let mut store = test_store();
    let local = context(&mut store, "local", json!({"player": {"name": "Ada", "hp": 10}}));
    let remote = context(&mut store, "remote", json!({"player": {"hp": 7, "level": 3}}));

    let result = Merger::merge(
        &mut store,
        &local,
        &remote,
        MergeStrategy::MergeSourcePriority,
        &MergeOptions::default(),
    )
    .unwrap();
    assert!(result.success);
    assert_eq!(
        tree_json(&store, remote.root()),
        json!({"player": {"name": "Ada", "hp": 10, "level": 3}})
    );
    assert_eq!(
        tree_json(&store, local.root()),
        json!({"player": {"name": "Ada", "hp": 10, "level": 3}})
    );

    let stats = result.statistics.unwrap();
    assert_eq!(stats.processed, 3);
    assert_eq!(stats.conflicts, 1);
    assert_eq!(stats.created, 2);
    assert_eq!(stats.updated, 1);
}

#[test]
fn target_priority_keeps_target_values() {
    let mut store = test_store();
    let source = context(&mut store, "source", json!({"a": 1}));
    let target = context(&mut store, "target", json!({"a": 2}));

    let result = Merger::merge(
        &mut store,
        &source,
        &target,
        MergeStrategy::MergeTargetPriority,
        &MergeOptions::default(),
    )
    .unwrap();
    assert_eq!(json_at(&store, source.root(), "a"), Some(json!(2)));
    assert_eq!(result.changes[0].direction, Some(Direction::TargetToSource));
}

#[test]
fn update_source_to_target_never_touches_target() {
    let mut store = test_store();
    let source = context(&mut store, "source", json!({"a": 1, "only_source": true}));
    let target = context(&mut store, "target", json!({"a": 2, "only_target": true}));
    let before = tree_json(&store, target.root());

    Merger::merge(
        &mut store,
        &source,
        &target,
        MergeStrategy::UpdateSourceToTarget,
        &MergeOptions::default(),
    )
    .unwrap();
    assert_eq!(tree_json(&store, target.root()), before);
    assert_eq!(
        tree_json(&store, source.root()),
        json!({"a": 2, "only_source": true, "only_target": true})
    );
}

#[test]
fn replace_mirrors_the_source() {
    let mut store = test_store();
    let source = context(&mut store, "source", json!({"keep": {"x": 1}}));
    let target = context(&mut store, "target", json!({"keep": {"x": 0}, "stale": {"y": 2}}));

    let result = Merger::merge(
        &mut store,
        &source,
        &target,
        MergeStrategy::Replace,
        &MergeOptions::default().with_create_missing(false),
    )
    .unwrap();
    assert_eq!(json_at(&store, target.root(), "keep.x"), Some(json!(1)));
    assert!(!store.has_item(target.root(), "stale.y"));
    assert!(result.changes.iter().any(|c| c.kind == ChangeKind::Removed));
}

#[test]
fn replace_reaches_a_container_shared_under_two_keys() {
    let mut store = test_store();
    let target = context(&mut store, "target", json!({"x": {"k": 5}, "y": {"k": 5}}));
    let source = context(&mut store, "source", json!({}));
    let shared = container(&mut store, json!({"k": 1}));
    store.set_node(source.root(), "x", shared).unwrap();
    store.set_node(source.root(), "y", shared).unwrap();

    let result = Merger::merge(
        &mut store,
        &source,
        &target,
        MergeStrategy::Replace,
        &MergeOptions::default(),
    )
    .unwrap();
    assert_eq!(tree_json(&store, target.root()), json!({"x": {"k": 1}, "y": {"k": 1}}));
    assert!(result.changes.iter().all(|c| c.kind != ChangeKind::Removed));
}

#[test]
fn newer_shared_container_updates_every_key() {
    let mut store = test_store();
    let target = context(&mut store, "target", json!({"x": {"k": 5}, "y": {"k": 5}}));
    let source = context(&mut store, "source", json!({}));
    let shared = container(&mut store, json!({"k": 1}));
    store.set_node(source.root(), "x", shared).unwrap();
    store.set_node(source.root(), "y", shared).unwrap();

    Merger::merge(
        &mut store,
        &source,
        &target,
        MergeStrategy::MergeNewerWins,
        &MergeOptions::default(),
    )
    .unwrap();
    assert_eq!(json_at(&store, target.root(), "x.k"), Some(json!(1)));
    assert_eq!(json_at(&store, target.root(), "y.k"), Some(json!(1)));
    assert_eq!(tree_json(&store, target.root()), tree_json(&store, source.root()));
}

#[test]
fn later_write_wins_on_both_sides() {
    let mut store = test_store();
    let local = context(&mut store, "local", json!({}));
    let remote = context(&mut store, "remote", json!({}));
    store.set_item(local.root(), "settings.volume", 3).unwrap();
    store.set_item(remote.root(), "settings.volume", 7).unwrap();

    let result = Merger::merge(
        &mut store,
        &local,
        &remote,
        MergeStrategy::MergeNewerWins,
        &MergeOptions::default(),
    )
    .unwrap();
    assert!(result.has_changes());
    assert_eq!(json_at(&store, local.root(), "settings.volume"), Some(json!(7)));
    assert_eq!(json_at(&store, remote.root(), "settings.volume"), Some(json!(7)));
}

#[test]
fn merge_is_idempotent() {
    let mut store = test_store();
    let source = context(&mut store, "source", json!({"a": 1, "n": {"b": 2}}));
    let target = context(&mut store, "target", json!({"a": 5, "c": 3}));

    let first = Merger::merge(
        &mut store,
        &source,
        &target,
        MergeStrategy::MergeNewerWins,
        &MergeOptions::default(),
    )
    .unwrap();
    assert!(first.has_changes());
    let source_tree = tree_json(&store, source.root());
    let target_tree = tree_json(&store, target.root());
    assert_eq!(source_tree, target_tree);

    let second = Merger::merge(
        &mut store,
        &source,
        &target,
        MergeStrategy::MergeNewerWins,
        &MergeOptions::default(),
    )
    .unwrap();
    assert!(second.changes.is_empty());
    assert_eq!(second.statistics.unwrap().unchanged, 3);
    assert_eq!(tree_json(&store, source.root()), source_tree);
}

#[test]
fn merged_nodes_are_independent_copies() {
    let mut store = test_store();
    let source = context(&mut store, "source", json!({"list": [1, 2]}));
    let target = context(&mut store, "target", json!({}));

    Merger::merge(
        &mut store,
        &source,
        &target,
        MergeStrategy::UpdateTargetToSource,
        &MergeOptions::default(),
    )
    .unwrap();
    store.set_item(source.root(), "list", json_value(json!([1, 2, 3]))).unwrap();
    assert_eq!(json_at(&store, target.root(), "list"), Some(json!([1, 2])));
}

#[test]
fn conflict_handler_can_take_either_side() {
    let mut store = test_store();
    let source = context(&mut store, "source", json!({"a": 1, "b": 1}));
    let target = context(&mut store, "target", json!({"a": 2, "b": 2}));

    let options = MergeOptions::default().with_on_conflict(|_, _, path| {
        Some(if path == "a" {
            ConflictResolution::TakeTarget
        } else {
            ConflictResolution::TakeSource
        })
    });
    Merger::merge(
        &mut store,
        &source,
        &target,
        MergeStrategy::NoAction,
        &options,
    )
    .unwrap();
    // a dry run never writes, whatever the handler decided
    assert_eq!(json_at(&store, source.root(), "a"), Some(json!(1)));

    Merger::merge(
        &mut store,
        &source,
        &target,
        MergeStrategy::MergeNewerWins,
        &options,
    )
    .unwrap();
    assert_eq!(json_at(&store, source.root(), "a"), Some(json!(2)));
    assert_eq!(json_at(&store, target.root(), "b"), Some(json!(1)));
}

#[test]
fn named_strategies() {
    let mut store = test_store();
    let source = context(&mut store, "source", json!({"a": 1}));
    let target = context(&mut store, "target", json!({}));

    let result = Merger::merge_named(
        &mut store,
        &source,
        &target,
        "mergeSourceTarget",
        &MergeOptions::default(),
    )
    .unwrap();
    assert_eq!(result.operation, "mergeSourcePriority");
    assert_eq!(json_at(&store, target.root(), "a"), Some(json!(1)));

    let err = Merger::merge_named(
        &mut store,
        &source,
        &target,
        "sideways",
        &MergeOptions::default(),
    )
    .unwrap_err();
    assert!(err.is_invalid_name());
}

#[test]
fn metadata_travels_with_values() {
    let mut store = test_store();
    let source = context(&mut store, "source", json!({}));
    let target = context(&mut store, "target", json!({}));
    let mut metadata = ctxsync::Metadata::new();
    metadata.insert("unit".to_string(), Value::from("ms"));
    store
        .set_item_with(source.root(), "latency", 12, metadata.clone())
        .unwrap();

    Merger::merge(
        &mut store,
        &source,
        &target,
        MergeStrategy::UpdateTargetToSource,
        &MergeOptions::default(),
    )
    .unwrap();
    let copied = store.get_item(target.root(), "latency").and_then(|c| c.node_id()).unwrap();
    assert_eq!(store.metadata(copied).unwrap(), &metadata);
}

#[test]
fn result_serializes_to_camel_case() {
    let mut store = test_store();
    let source = context(&mut store, "source", json!({"a": 1}));
    let target = context(&mut store, "target", json!({}));

    let result = Merger::merge(
        &mut store,
        &source,
        &target,
        MergeStrategy::UpdateTargetToSource,
        &MergeOptions::default(),
    )
    .unwrap();
    let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
    assert_eq!(json["itemsProcessed"], json!(["a"]));
    assert_eq!(json["changes"][0]["type"], json!("created"));
    assert_eq!(json["dryRun"], json!(false));
}
