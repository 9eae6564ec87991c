use ctxsync::{
    Synchronizer,
    merge::{
        ContainerSyncOptions, Operand, OperandKind, SyncConfig, SyncOperation, SyncOptions,
    },
};
use serde_json::json;

use crate::helpers::*;

#[test]
fn dispatches_by_operand_kind() {
    let mut store = test_store();
    let sync = Synchronizer::default();

    let a = item(&mut store, 1);
    let b = item(&mut store, 2);
    let result = sync
        .sync(
            &mut store,
            &Operand::Item(a),
            &Operand::Item(b),
            SyncOperation::UpdateTargetToMatchSource,
        )
        .unwrap();
    assert_eq!(result.operation, "updateTargetToMatchSource");
    assert_eq!(store.item(b).unwrap().value(), &ctxsync::Value::Int(1));

    let source = context(&mut store, "source", json!({"x": {"y": 1}}));
    let target = context(&mut store, "target", json!({}));
    sync.sync(
        &mut store,
        &source.clone().into(),
        &target.clone().into(),
        SyncOperation::MergeSourcePriority,
    )
    .unwrap();
    assert_eq!(json_at(&store, target.root(), "x.y"), Some(json!(1)));
}

#[test]
fn store_tags_operands() {
    let mut store = test_store();
    let leaf = item(&mut store, 1);
    let tree = container(&mut store, json!({}));
    assert_eq!(store.operand(leaf).unwrap().kind(), OperandKind::Item);
    assert_eq!(store.operand(tree).unwrap().kind(), OperandKind::Container);
}

#[test]
fn mismatched_kinds_are_rejected() {
    let mut store = test_store();
    let leaf = Operand::Item(item(&mut store, 1));
    let tree = Operand::Container(container(&mut store, json!({"a": 1})));
    assert!(!Synchronizer::validate_compatibility(&leaf, &tree));

    let sync = Synchronizer::default();
    let err = sync
        .sync(&mut store, &leaf, &tree, SyncOperation::MergeNewerWins)
        .unwrap_err();
    assert!(err.is_type_error());

    let result = sync.sync_safe(&mut store, Some(&leaf), Some(&tree), "mergeNewerWins");
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("type mismatch"));
}

#[test]
fn unknown_operation_is_reported() {
    let mut store = test_store();
    let a = Operand::Item(item(&mut store, 1));
    let b = Operand::Item(item(&mut store, 2));

    let result = Synchronizer::default().sync_safe(&mut store, Some(&a), Some(&b), "teleport");
    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("Invalid sync operation"));
    assert_eq!(store.item(a.node()).unwrap().value(), &ctxsync::Value::Int(1));
}

#[test]
fn cyclic_containers_sync_safely() {
    let mut store = test_store();
    let c1 = container(&mut store, json!({"v": 1}));
    let c2 = container(&mut store, json!({"v": 2}));
    store.set_node(c1, "peer", c2).unwrap();
    store.set_node(c2, "peer", c1).unwrap();

    let result = Synchronizer::default().sync_safe(
        &mut store,
        Some(&Operand::Container(c1)),
        Some(&Operand::Container(c2)),
        "mergeNewerWins",
    );
    assert!(result.success);
    assert!(result.error.is_none());
}

#[test]
fn auto_sync_follows_the_newer_side() {
    let mut store = test_store();
    let older = Operand::Item(item(&mut store, "old"));
    let newer = Operand::Item(item(&mut store, "new"));

    let sync = Synchronizer::default();
    let result = sync.auto_sync(&mut store, Some(&older), Some(&newer)).unwrap();
    assert_eq!(result.operation, "updateSourceToMatchTarget");
    assert_eq!(
        store.item(older.node()).unwrap().value(),
        &ctxsync::Value::from("new")
    );

    let settled = sync.auto_sync(&mut store, Some(&older), Some(&newer)).unwrap();
    assert!(settled.changes.is_empty());
    assert_eq!(settled.message.as_deref(), Some("Operands are in sync"));
}

#[test]
fn auto_sync_with_missing_operand_warns() {
    let mut store = test_store();
    let only = Operand::Item(item(&mut store, 1));

    let result = Synchronizer::default()
        .auto_sync(&mut store, Some(&only), None)
        .unwrap();
    assert!(result.success);
    assert_eq!(result.warnings.len(), 1);

    let safe = Synchronizer::default().sync_safe(&mut store, None, Some(&only), "auto");
    assert!(safe.success);
    assert_eq!(safe.warnings.len(), 1);
}

#[test]
fn replace_on_containers_is_shallow() {
    let mut store = test_store();
    let source = container(&mut store, json!({"a": {"b": 1}}));
    let target = container(&mut store, json!({"z": 0}));

    let result = Synchronizer::default()
        .sync(
            &mut store,
            &Operand::Container(source),
            &Operand::Container(target),
            SyncOperation::Replace,
        )
        .unwrap();
    assert_eq!(result.changes.len(), 1);
    assert_eq!(tree_json(&store, target), json!({"a": {"b": 1}}));
}

#[test]
fn no_action_never_writes() {
    let mut store = test_store();
    let source = container(&mut store, json!({"a": 1}));
    let target = container(&mut store, json!({"a": 2}));

    let result = Synchronizer::default()
        .sync(
            &mut store,
            &Operand::Container(source),
            &Operand::Container(target),
            SyncOperation::NoAction,
        )
        .unwrap();
    assert!(result.dry_run);
    assert_eq!(json_at(&store, target, "a"), Some(json!(2)));
}

#[test]
fn config_drives_options() {
    let config = SyncConfig::from_json(r#"{"deepSync": false, "strictTypeChecking": true}"#).unwrap();
    let sync = Synchronizer::new(config.sync_options());
    assert_eq!(
        sync.options().container,
        ContainerSyncOptions::default()
            .with_deep_sync(false)
            .with_strict_type_checking(true)
    );

    let options = SyncOptions::default().with_container(ContainerSyncOptions::default());
    assert!(Synchronizer::new(options).options().container.deep_sync);
}
