use ctxsync::merge::{
    BidirectionalOptions, ItemFilter, MergeOptions, MergeStrategy,
    ops::{
        consolidate_contexts, pull_items, push_from_multiple_sources, push_items,
        push_to_multiple_targets, synchronize_bidirectional,
    },
};
use serde_json::json;

use crate::helpers::*;

#[test]
fn push_respects_existing_filters() {
    let mut store = test_store();
    let source = context(&mut store, "source", json!({"cfg": {"a": 1, "secret": 2}, "other": 3}));
    let target = context(&mut store, "target", json!({}));

    let options = MergeOptions::default().with_filter(ItemFilter::block_only(["cfg.secret"]));
    let result = push_items(
        &mut store,
        &source,
        &target,
        &["cfg"],
        MergeStrategy::UpdateTargetToSource,
        &options,
    )
    .unwrap();
    assert_eq!(result.items_processed, vec!["cfg.a"]);
    assert_eq!(tree_json(&store, target.root()), json!({"cfg": {"a": 1}}));
}

#[test]
fn pull_brings_remote_paths_home() {
    let mut store = test_store();
    let local = context(&mut store, "local", json!({"mine": 1}));
    let remote = context(&mut store, "remote", json!({"theirs": {"x": 2}, "noise": 0}));

    pull_items(
        &mut store,
        &local,
        &remote,
        &["theirs"],
        MergeStrategy::MergeNewerWins,
        &MergeOptions::default(),
    )
    .unwrap();
    assert_eq!(tree_json(&store, local.root()), json!({"mine": 1, "theirs": {"x": 2}}));
    assert_eq!(
        tree_json(&store, remote.root()),
        json!({"theirs": {"x": 2}, "noise": 0})
    );
}

#[test]
fn fan_in_and_fan_out() {
    let mut store = test_store();
    let hub = context(&mut store, "hub", json!({}));
    let spokes = [
        context(&mut store, "s1", json!({"s1": true})),
        context(&mut store, "s2", json!({"s2": true})),
    ];

    let inbound = push_from_multiple_sources(
        &mut store,
        &spokes,
        &hub,
        MergeStrategy::UpdateTargetToSource,
        &MergeOptions::default(),
    )
    .unwrap();
    assert_eq!(inbound.len(), 2);
    assert_eq!(tree_json(&store, hub.root()), json!({"s1": true, "s2": true}));

    let outbound = push_to_multiple_targets(
        &mut store,
        &hub,
        &spokes,
        MergeStrategy::UpdateTargetToSource,
        &MergeOptions::default(),
    )
    .unwrap();
    assert!(outbound.iter().all(|r| r.success));
    for spoke in &spokes {
        assert_eq!(tree_json(&store, spoke.root()), json!({"s1": true, "s2": true}));
    }
}

#[test]
fn bidirectional_converges() {
    let mut store = test_store();
    let a = context(&mut store, "a", json!({"left": 1, "both": "a"}));
    let b = context(&mut store, "b", json!({"right": 2, "both": "b"}));

    let result = synchronize_bidirectional(
        &mut store,
        &a,
        &b,
        &BidirectionalOptions::default(),
        &MergeOptions::default(),
    )
    .unwrap();
    assert!(result.success);
    assert_eq!(tree_json(&store, a.root()), tree_json(&store, b.root()));
    assert_eq!(json_at(&store, a.root(), "both"), Some(json!("b")));

    let again = synchronize_bidirectional(
        &mut store,
        &a,
        &b,
        &BidirectionalOptions::default(),
        &MergeOptions::default(),
    )
    .unwrap();
    assert!(again.direction_1_to_2.changes.is_empty());
    assert!(again.direction_2_to_1.changes.is_empty());
}

#[test]
fn bidirectional_priority_beats_timestamps() {
    let mut store = test_store();
    let a = context(&mut store, "a", json!({"owner": "a", "shared": 0}));
    let b = context(&mut store, "b", json!({"owner": "b", "shared": 1}));

    let options = BidirectionalOptions::default()
        .with_strategy(MergeStrategy::MergeNewerWins)
        .with_a_priority(["owner"]);
    synchronize_bidirectional(&mut store, &a, &b, &options, &MergeOptions::default()).unwrap();
    assert_eq!(json_at(&store, a.root(), "owner"), Some(json!("a")));
    assert_eq!(json_at(&store, b.root(), "owner"), Some(json!("a")));
    assert_eq!(json_at(&store, a.root(), "shared"), Some(json!(1)));
}

#[test]
fn bidirectional_result_serializes_direction_names() {
    let mut store = test_store();
    let a = context(&mut store, "a", json!({}));
    let b = context(&mut store, "b", json!({}));
    let result = synchronize_bidirectional(
        &mut store,
        &a,
        &b,
        &BidirectionalOptions::default(),
        &MergeOptions::default(),
    )
    .unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert!(json.get("direction1to2").is_some());
    assert!(json.get("direction2to1").is_some());
}

#[test]
fn consolidation_summarizes_every_source() {
    let mut store = test_store();
    let sources = [
        context(&mut store, "a", json!({"k": 1, "a": true})),
        context(&mut store, "b", json!({"k": 2, "b": true})),
    ];
    let target = context(&mut store, "target", json!({}));

    let consolidated = consolidate_contexts(
        &mut store,
        &sources,
        &target,
        MergeStrategy::MergeSourcePriority,
        &MergeOptions::default().with_create_missing(true),
    )
    .unwrap();
    assert!(consolidated.summary.success);
    assert_eq!(consolidated.summary.operation, "consolidateContexts");
    assert_eq!(json_at(&store, target.root(), "k"), Some(json!(2)));
    assert_eq!(json_at(&store, target.root(), "a"), Some(json!(true)));
    assert_eq!(json_at(&store, target.root(), "b"), Some(json!(true)));
}
