use ctxsync::{
    ItemFilter, Value,
    merge::{MergeOptions, MergeStrategy, Merger},
};
use serde_json::json;

use crate::helpers::*;

#[test]
fn allow_then_block_never_processes_blocked_path() {
    let mut store = test_store();
    let source = context(&mut store, "source", json!({"x": {"y": 1, "z": 2}, "w": 3}));
    let target = context(&mut store, "target", json!({}));

    let filter = ItemFilter::and([
        ItemFilter::allow_only(["x"]),
        ItemFilter::block_only(["x.y"]),
    ]);
    let result = Merger::merge(
        &mut store,
        &source,
        &target,
        MergeStrategy::UpdateTargetToSource,
        &MergeOptions::default().with_filter(filter),
    )
    .unwrap();

    assert_eq!(result.items_processed, vec!["x.z"]);
    assert!(!result.items_processed.iter().any(|p| p == "x.y"));
    assert_eq!(json_at(&store, target.root(), "x.z"), Some(json!(2)));
    assert!(!store.has_item(target.root(), "x.y"));
    assert!(!store.has_item(target.root(), "w"));
    assert_eq!(result.statistics.unwrap().filtered, 2);
}

#[test]
fn option_lists_and_custom_filter_combine() {
    let mut store = test_store();
    let source = context(&mut store, "source", json!({"a": 1, "b": 2, "c": 3, "d": 4}));
    let target = context(&mut store, "target", json!({}));

    let options = MergeOptions::default()
        .with_allow_only(["a", "b", "c"])
        .with_block_only(["c"])
        .with_filter(ItemFilter::custom(|path, _, _| path != "b"));
    let result = Merger::merge(
        &mut store,
        &source,
        &target,
        MergeStrategy::UpdateTargetToSource,
        &options,
    )
    .unwrap();
    assert_eq!(result.items_processed, vec!["a"]);
}

#[test]
fn pattern_filter_selects_paths() {
    let mut store = test_store();
    let source = context(
        &mut store,
        "source",
        json!({"settings": {"audio": {"volume": 5}, "video": {"fov": 90}}}),
    );
    let target = context(&mut store, "target", json!({}));

    let filter = ItemFilter::match_pattern(r"^settings\.audio\.").unwrap();
    Merger::merge(
        &mut store,
        &source,
        &target,
        MergeStrategy::UpdateTargetToSource,
        &MergeOptions::default().with_filter(filter),
    )
    .unwrap();
    assert_eq!(json_at(&store, target.root(), "settings.audio.volume"), Some(json!(5)));
    assert!(!store.has_item(target.root(), "settings.video"));
}

#[test]
fn custom_filter_sees_candidate_values() {
    let mut store = test_store();
    let source = context(&mut store, "source", json!({"small": 1, "large": 100}));
    let target = context(&mut store, "target", json!({}));

    let filter = ItemFilter::custom(|_, source, _| {
        source.and_then(Value::as_int).is_some_and(|n| n < 10)
    });
    Merger::merge(
        &mut store,
        &source,
        &target,
        MergeStrategy::UpdateTargetToSource,
        &MergeOptions::default().with_filter(filter),
    )
    .unwrap();
    assert!(store.has_item(target.root(), "small"));
    assert!(!store.has_item(target.root(), "large"));
}

#[test]
fn or_accepts_either_branch() {
    let filter = ItemFilter::or([
        ItemFilter::allow_only(["a"]),
        ItemFilter::match_pattern("^z").unwrap(),
    ]);
    assert!(filter.matches("a.b", None, None));
    assert!(filter.matches("zeta", None, None));
    assert!(!filter.matches("b", None, None));
}
