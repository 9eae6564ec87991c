use std::sync::Arc;

use ctxsync::{Context, FixedClock, Metadata, NodeId, Store, Value, node::ItemOptions};

/// A store whose clock starts at 1000ms and advances on every read.
pub fn test_store() -> Store {
    Store::with_clock(Arc::new(FixedClock::new(1000)))
}

/// A store sharing `clock`, so tests can move time explicitly.
pub fn store_with_clock(clock: Arc<FixedClock>) -> Store {
    Store::with_clock(clock)
}

pub fn json_value(json: serde_json::Value) -> Value {
    Value::from_json(json)
}

pub fn container(store: &mut Store, json: serde_json::Value) -> NodeId {
    store
        .create_container(Some(json_value(json)), Metadata::new(), Default::default())
        .expect("container from a JSON object")
}

pub fn context(store: &mut Store, name: &str, json: serde_json::Value) -> Context {
    store
        .context_from_value(name, json_value(json))
        .expect("context from a JSON object")
}

pub fn item(store: &mut Store, value: impl Into<Value>) -> NodeId {
    store.create_item(value, Metadata::new(), ItemOptions::default())
}

pub fn item_with_metadata(store: &mut Store, value: impl Into<Value>, metadata: &[(&str, Value)]) -> NodeId {
    let metadata: Metadata = metadata
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    store.create_item(value, metadata, ItemOptions::default())
}

/// Reads a path as JSON, `None` when missing.
pub fn json_at(store: &Store, root: NodeId, path: &str) -> Option<serde_json::Value> {
    store.get_value(root, path).map(|v| v.to_json())
}

pub fn tree_json(store: &Store, root: NodeId) -> serde_json::Value {
    store.to_value(root).expect("node exists").to_json()
}
