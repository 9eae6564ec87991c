use ctxsync::{
    Value,
    merge::{ChangeKind, ContainerSync, ContainerSyncOptions, Direction},
    node::Child,
};
use serde_json::json;

use crate::helpers::*;

#[test]
fn three_level_sync_updates_leaf_and_keeps_extra_keys() {
    let mut store = test_store();
    let source = container(&mut store, json!({"a": {"b": {"c": 1}}}));
    let target = container(&mut store, json!({"a": {"b": {"c": 2, "d": 3}}}));

    let result = ContainerSync::default()
        .update_target_to_match_source(&mut store, source, target)
        .unwrap();
    assert!(result.success);
    assert_eq!(tree_json(&store, target), json!({"a": {"b": {"c": 1, "d": 3}}}));
    assert_eq!(result.changes.len(), 1);
    assert_eq!(result.changes[0].path.as_deref(), Some("a.b.c"));
    assert_eq!(result.changes[0].kind, ChangeKind::Value);
}

#[test]
fn reverse_direction_updates_source() {
    let mut store = test_store();
    let source = container(&mut store, json!({"x": 1}));
    let target = container(&mut store, json!({"x": 2, "y": 3}));

    ContainerSync::default()
        .update_source_to_match_target(&mut store, source, target)
        .unwrap();
    assert_eq!(tree_json(&store, source), json!({"x": 2, "y": 3}));
    assert_eq!(tree_json(&store, target), json!({"x": 2, "y": 3}));
}

#[test]
fn created_subtrees_do_not_alias_the_origin() {
    let mut store = test_store();
    let source = container(&mut store, json!({"profile": {"name": "Ada", "tags": {"a": 1}}}));
    let target = container(&mut store, json!({}));

    ContainerSync::default()
        .sync(&mut store, source, target, Direction::SourceToTarget)
        .unwrap();
    let source_profile = store.get_item(source, "profile").and_then(Child::node_id);
    let target_profile = store.get_item(target, "profile").and_then(Child::node_id);
    assert!(target_profile.is_some());
    assert_ne!(source_profile, target_profile);

    store.set_item(source, "profile.tags.a", 2).unwrap();
    assert_eq!(json_at(&store, target, "profile.tags.a"), Some(json!(1)));
}

#[test]
fn second_sync_changes_nothing() {
    let mut store = test_store();
    let source = container(&mut store, json!({"a": 1, "n": {"b": 2}}));
    let target = container(&mut store, json!({"a": 0}));
    let engine = ContainerSync::default();

    let first = engine.update_target_to_match_source(&mut store, source, target).unwrap();
    assert!(first.has_changes());
    let snapshot = tree_json(&store, target);

    let second = engine.update_target_to_match_source(&mut store, source, target).unwrap();
    assert!(second.changes.is_empty());
    assert_eq!(tree_json(&store, target), snapshot);
}

#[test]
fn newer_wins_picks_direction_from_timestamps() {
    let mut store = test_store();
    let older = container(&mut store, json!({"v": "old"}));
    let newer = container(&mut store, json!({"v": "new"}));

    let result = ContainerSync::default()
        .merge_newer_wins(&mut store, older, newer)
        .unwrap();
    assert!(result.success);
    assert_eq!(json_at(&store, older, "v"), Some(json!("new")));
    assert_eq!(
        result.changes[0].direction,
        Some(Direction::TargetToSource)
    );
}

#[test]
fn cyclic_containers_terminate() {
    let mut store = test_store();
    let c1 = container(&mut store, json!({"name": "one"}));
    let c2 = container(&mut store, json!({"name": "two"}));
    store.set_node(c1, "other", c2).unwrap();
    store.set_node(c2, "other", c1).unwrap();

    let result = ContainerSync::default()
        .sync(&mut store, c1, c2, Direction::SourceToTarget)
        .unwrap();
    assert!(result.success);
    assert_eq!(json_at(&store, c2, "name"), Some(json!("one")));
}

#[test]
fn metadata_follows_the_container() {
    let mut store = test_store();
    let source = container(&mut store, json!({}));
    let target = container(&mut store, json!({}));
    let mut metadata = ctxsync::Metadata::new();
    metadata.insert("owner".to_string(), Value::from("ops"));
    store.set_metadata(source, metadata.clone(), false).unwrap();

    let result = ContainerSync::default()
        .update_target_to_match_source(&mut store, source, target)
        .unwrap();
    assert_eq!(store.metadata(target).unwrap(), &metadata);
    assert!(result.changes.iter().any(|c| c.kind == ChangeKind::Metadata));

    let without = ContainerSync::new(ContainerSyncOptions::default().with_sync_metadata(false));
    let other = container(&mut store, json!({}));
    without.update_target_to_match_source(&mut store, source, other).unwrap();
    assert!(store.metadata(other).unwrap().is_empty());
}

#[test]
fn plain_map_slots_are_deep_merged() {
    let mut store = test_store();
    let source = container(&mut store, json!({}));
    let target = container(&mut store, json!({}));
    store.set_raw(source, "p", json_value(json!({"x": 1}))).unwrap();
    store.set_raw(target, "p", json_value(json!({"x": 2, "y": 3}))).unwrap();

    ContainerSync::default()
        .sync(&mut store, source, target, Direction::SourceToTarget)
        .unwrap();
    assert_eq!(json_at(&store, target, "p"), Some(json!({"x": 1, "y": 3})));
    assert_eq!(json_at(&store, source, "p"), Some(json!({"x": 1})));
}

#[test]
fn shallow_replace_copies_whole_content() {
    let mut store = test_store();
    let source = container(&mut store, json!({"a": {"b": 1}}));
    let target = container(&mut store, json!({"only_target": true}));

    let engine = ContainerSync::new(ContainerSyncOptions::default().with_deep_sync(false));
    engine.update_target_to_match_source(&mut store, source, target).unwrap();
    assert_eq!(tree_json(&store, target), json!({"a": {"b": 1}}));
}

#[test]
fn frozen_child_becomes_a_warning() {
    let mut store = test_store();
    let source = container(&mut store, json!({"locked": 1, "open": 1}));
    let target = container(&mut store, json!({"locked": 0, "open": 0}));
    let locked = store.get_item(target, "locked").and_then(Child::node_id).unwrap();
    store.freeze(locked).unwrap();

    let result = ContainerSync::default()
        .update_target_to_match_source(&mut store, source, target)
        .unwrap();
    assert!(result.success);
    assert_eq!(result.warnings.len(), 1);
    assert_eq!(json_at(&store, target, "locked"), Some(json!(0)));
    assert_eq!(json_at(&store, target, "open"), Some(json!(1)));
}
