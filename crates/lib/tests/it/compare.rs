use std::sync::Arc;

use ctxsync::{
    FixedClock,
    merge::{CompareBy, ComparisonResult, compare_nodes},
    node::ItemOptions,
};

use crate::helpers::*;

#[test]
fn node_compared_with_itself_is_equal() {
    let mut store = test_store();
    let a = item(&mut store, 1);

    let comparison = compare_nodes(&store, Some(a), Some(a), CompareBy::ModifiedAt).unwrap();
    assert_eq!(comparison.result, ComparisonResult::Equal);
    assert_eq!(comparison.time_difference, Some(0));
}

#[test]
fn later_node_is_newer() {
    let mut store = test_store();
    let older = item(&mut store, 1);
    let newer = item(&mut store, 2);

    let comparison = compare_nodes(&store, Some(newer), Some(older), CompareBy::CreatedAt).unwrap();
    assert_eq!(comparison.result, ComparisonResult::ANewer);
    assert!(comparison.time_difference.unwrap() > 0);

    let comparison = compare_nodes(&store, Some(older), Some(newer), CompareBy::CreatedAt).unwrap();
    assert_eq!(comparison.result, ComparisonResult::BNewer);
    assert!(comparison.time_difference.unwrap() < 0);
}

#[test]
fn missing_sides() {
    let mut store = test_store();
    let present = item(&mut store, 1);

    let both = compare_nodes(&store, None, None, CompareBy::ModifiedAt).unwrap();
    assert_eq!(both.result, ComparisonResult::BothMissing);
    assert_eq!(both.time_difference, Some(0));

    let a_missing = compare_nodes(&store, None, Some(present), CompareBy::ModifiedAt).unwrap();
    assert_eq!(a_missing.result, ComparisonResult::AMissing);
    assert!(a_missing.result.is_one_sided());
    assert_eq!(a_missing.time_difference, None);
}

#[test]
fn modification_makes_older_node_newer() {
    let clock = Arc::new(FixedClock::new(5_000));
    let mut store = store_with_clock(clock.clone());
    let root = container(&mut store, serde_json::json!({"first": 1}));
    let first = store.get_item(root, "first").and_then(|c| c.node_id()).unwrap();
    let second = item(&mut store, 2);

    clock.advance(1_000);
    store.set_item(root, "first", 10).unwrap();

    let by_created = compare_nodes(&store, Some(first), Some(second), CompareBy::CreatedAt).unwrap();
    assert_eq!(by_created.result, ComparisonResult::BNewer);
    let by_modified = compare_nodes(&store, Some(first), Some(second), CompareBy::ModifiedAt).unwrap();
    assert_eq!(by_modified.result, ComparisonResult::ANewer);
}

#[test]
fn missing_access_timestamp_is_an_error() {
    let mut store = test_store();
    let a = item(&mut store, 1);
    let b = item(&mut store, 2);

    let err = compare_nodes(&store, Some(a), Some(b), CompareBy::LastAccessedAt).unwrap_err();
    assert!(err.is_sync_error());
}

#[test]
fn recorded_access_can_be_compared() {
    let mut store = test_store();
    let a = store.create_item(
        1,
        Default::default(),
        ItemOptions {
            record_access: true,
            ..Default::default()
        },
    );
    let b = store.create_item(
        2,
        Default::default(),
        ItemOptions {
            record_access: true,
            ..Default::default()
        },
    );
    let root = store.create_context("reads").root();
    store.set_node(root, "b", b).unwrap();
    store.set_node(root, "a", a).unwrap();
    store.read_item(root, "b").unwrap();
    store.read_item(root, "a").unwrap();

    let comparison = compare_nodes(&store, Some(a), Some(b), CompareBy::LastAccessedAt).unwrap();
    assert_eq!(comparison.result, ComparisonResult::ANewer);
}

#[test]
fn clone_keeps_timestamps_and_compares_equal() {
    let mut store = test_store();
    let original = container(&mut store, serde_json::json!({"a": {"b": 1}}));
    let copy = store.clone_node(original).unwrap();

    assert_ne!(original, copy);
    let comparison = compare_nodes(&store, Some(original), Some(copy), CompareBy::ModifiedAt).unwrap();
    assert_eq!(comparison.result, ComparisonResult::Equal);
    assert_eq!(comparison.time_difference, Some(0));
}
