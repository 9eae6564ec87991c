//! Context tree nodes and the arena that owns them.
//!
//! Every [`Item`] and [`Container`] lives in a [`Store`] and is addressed by a
//! copyable [`NodeId`]. Containers link to their children by id, so node
//! identity is a plain id comparison and a consumer may build shared or even
//! cyclic graphs (`c1.ref -> c2`, `c2.ref -> c1`). The sync engine guards
//! against such graphs with a per-call visited set.
//!
//! # Usage
//!
//! ```
//! use ctxsync::{Store, Value};
//!
//! let mut store = Store::new();
//! let root = store.create_container(None, Default::default(), Default::default())?;
//! store.set_item(root, "settings.volume", 7)?;
//!
//! assert!(store.has_item(root, "settings"));
//! assert_eq!(store.get_value(root, "settings.volume"), Some(Value::Int(7)));
//! assert_eq!(store.size(root)?, 1);
//! # Ok::<(), ctxsync::Error>(())
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    Value,
    clock::{Clock, SystemClock, Timestamp},
};

pub mod container;
pub mod context;
pub mod errors;
pub mod item;
pub mod wrap;

pub use container::{Child, Container, ContainerOptions};
pub use context::Context;
pub use errors::StoreError;
pub use item::{Item, ItemOptions};
pub use wrap::{DefaultWrapPolicy, LeafWrapPolicy, WrapAs, WrapPolicy};

/// Free-form metadata attached to a node.
pub type Metadata = BTreeMap<String, Value>;

/// Stable handle of a node inside a [`Store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The explicit kind tag every node carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Item,
    Container,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Item => f.write_str("item"),
            NodeKind::Container => f.write_str("container"),
        }
    }
}

/// Creation, modification and access times of a node.
///
/// `created_at` never changes after construction. `last_accessed_at` stays
/// `None` until a read is recorded on a node with access recording enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timestamps {
    created_at: Timestamp,
    modified_at: Timestamp,
    last_accessed_at: Option<Timestamp>,
}

impl Timestamps {
    pub fn new(now: Timestamp) -> Self {
        Self {
            created_at: now,
            modified_at: now,
            last_accessed_at: None,
        }
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn modified_at(&self) -> Timestamp {
        self.modified_at
    }

    pub fn last_accessed_at(&self) -> Option<Timestamp> {
        self.last_accessed_at
    }

    /// `modified_at` as a UTC datetime.
    pub fn modified_at_utc(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        crate::clock::to_datetime(self.modified_at)
    }

    pub(crate) fn touch_modified(&mut self, now: Timestamp) {
        self.modified_at = now;
    }

    pub(crate) fn touch_accessed(&mut self, now: Timestamp) {
        self.last_accessed_at = Some(now);
    }

    /// Adopts the modification time of the node this one was synced from.
    pub(crate) fn replicate_modified(&mut self, origin_modified_at: Timestamp) {
        self.modified_at = origin_modified_at;
    }
}

/// A node in the arena.
#[derive(Debug, Clone)]
pub enum Node {
    Item(Item),
    Container(Container),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Item(_) => NodeKind::Item,
            Node::Container(_) => NodeKind::Container,
        }
    }

    pub fn timestamps(&self) -> &Timestamps {
        match self {
            Node::Item(item) => item.timestamps(),
            Node::Container(container) => container.timestamps(),
        }
    }

    pub fn metadata(&self) -> &Metadata {
        match self {
            Node::Item(item) => item.metadata(),
            Node::Container(container) => container.metadata(),
        }
    }

    /// Replaces the metadata of either node kind.
    pub fn set_metadata(
        &mut self,
        metadata: Metadata,
        record_access: bool,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        match self {
            Node::Item(item) => item.set_metadata(metadata, record_access, now),
            Node::Container(container) => container.set_metadata(metadata, record_access, now),
        }
    }

    pub fn is_frozen(&self) -> bool {
        match self {
            Node::Item(item) => item.is_frozen(),
            Node::Container(container) => container.is_frozen(),
        }
    }

    pub(crate) fn timestamps_mut(&mut self) -> &mut Timestamps {
        match self {
            Node::Item(item) => &mut item.timestamps,
            Node::Container(container) => &mut container.timestamps,
        }
    }
}

/// Arena owning every node of one or more context trees.
///
/// Nodes are released together with the store; deleting a key only unlinks
/// the child from its container.
#[derive(Debug, Clone)]
pub struct Store {
    nodes: Vec<Node>,
    clock: Arc<dyn Clock>,
    policy: Arc<dyn WrapPolicy>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Creates an empty store using the system clock and the default wrap policy.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store stamping nodes with the given clock.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            nodes: Vec::new(),
            clock,
            policy: Arc::new(DefaultWrapPolicy),
        }
    }

    /// Replaces the value-wrapping policy used for newly inserted values.
    pub fn with_policy(mut self, policy: Arc<dyn WrapPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Reads the store clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now_millis()
    }

    /// Number of nodes ever allocated in this store.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, StoreError> {
        self.nodes.get(id.0).ok_or(StoreError::NodeNotFound { id })
    }

    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, StoreError> {
        self.nodes
            .get_mut(id.0)
            .ok_or(StoreError::NodeNotFound { id })
    }

    /// Returns the kind tag of a node, or `None` for unknown ids.
    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.nodes.get(id.0).map(Node::kind)
    }

    pub fn item(&self, id: NodeId) -> Result<&Item, StoreError> {
        match self.node(id)? {
            Node::Item(item) => Ok(item),
            other => Err(kind_mismatch(NodeKind::Item, other.kind())),
        }
    }

    pub fn item_mut(&mut self, id: NodeId) -> Result<&mut Item, StoreError> {
        match self.node_mut(id)? {
            Node::Item(item) => Ok(item),
            other => Err(kind_mismatch(NodeKind::Item, other.kind())),
        }
    }

    pub fn container(&self, id: NodeId) -> Result<&Container, StoreError> {
        match self.node(id)? {
            Node::Container(container) => Ok(container),
            other => Err(kind_mismatch(NodeKind::Container, other.kind())),
        }
    }

    pub fn container_mut(&mut self, id: NodeId) -> Result<&mut Container, StoreError> {
        match self.node_mut(id)? {
            Node::Container(container) => Ok(container),
            other => Err(kind_mismatch(NodeKind::Container, other.kind())),
        }
    }

    pub fn timestamps(&self, id: NodeId) -> Result<&Timestamps, StoreError> {
        Ok(self.node(id)?.timestamps())
    }

    pub fn metadata(&self, id: NodeId) -> Result<&Metadata, StoreError> {
        Ok(self.node(id)?.metadata())
    }

    /// Replaces a node's metadata without touching `modified_at`.
    pub fn set_metadata(
        &mut self,
        id: NodeId,
        metadata: Metadata,
        record_access: bool,
    ) -> Result<(), StoreError> {
        let now = self.now();
        self.node_mut(id)?.set_metadata(metadata, record_access, now)
    }

    pub(crate) fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Creates a standalone item.
    pub fn create_item(
        &mut self,
        value: impl Into<Value>,
        metadata: Metadata,
        options: ItemOptions,
    ) -> NodeId {
        let now = self.now();
        self.alloc(Node::Item(Item::new(value.into(), metadata, options, now)))
    }

    /// Creates a container, optionally populated from a raw nested map.
    ///
    /// Each entry of `initial` is inserted through the wrap policy, so nested
    /// maps become child containers and scalars become items by default.
    pub fn create_container(
        &mut self,
        initial: Option<Value>,
        metadata: Metadata,
        options: ContainerOptions,
    ) -> Result<NodeId, StoreError> {
        let entries = match initial {
            None => BTreeMap::new(),
            Some(Value::Map(map)) => map,
            Some(other) => {
                return Err(StoreError::TypeMismatch {
                    expected: "map".to_string(),
                    actual: other.type_name().to_string(),
                });
            }
        };

        let now = self.now();
        let frozen = options.frozen;
        let id = self.alloc(Node::Container(Container::new(
            metadata,
            ContainerOptions {
                frozen: false,
                ..options
            },
            now,
        )));
        for (key, value) in entries {
            let child = self.wrap(value);
            self.container_mut(id)?
                .children
                .insert(key, Child::Node(child));
        }
        if frozen {
            self.freeze(id)?;
        }
        Ok(id)
    }

    /// Wraps a raw value into a new node according to the wrap policy.
    pub fn wrap(&mut self, value: Value) -> NodeId {
        self.wrap_with(value, Metadata::new())
    }

    /// Wraps a raw value into a new node carrying the given metadata.
    pub fn wrap_with(&mut self, value: Value, metadata: Metadata) -> NodeId {
        let now = self.now();
        match (self.policy.classify(&value), value) {
            (WrapAs::Container, Value::Map(entries)) => {
                let id = self.alloc(Node::Container(Container::new(
                    metadata,
                    ContainerOptions::default(),
                    now,
                )));
                let children: Vec<(String, Child)> = entries
                    .into_iter()
                    .map(|(key, value)| (key, Child::Node(self.wrap(value))))
                    .collect();
                if let Node::Container(container) = &mut self.nodes[id.0] {
                    container.children.extend(children);
                }
                id
            }
            (_, value) => self.alloc(Node::Item(Item::new(
                value,
                metadata,
                ItemOptions::default(),
                now,
            ))),
        }
    }

    /// Freezes a node and everything reachable from it.
    pub fn freeze(&mut self, id: NodeId) -> Result<(), StoreError> {
        let mut visited = HashSet::new();
        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            if !visited.insert(current) {
                continue;
            }
            match self.node_mut(current)? {
                Node::Item(item) => item.freeze(),
                Node::Container(container) => {
                    container.freeze();
                    pending.extend(container.children.values().filter_map(Child::node_id));
                }
            }
        }
        Ok(())
    }

    /// Materializes a node as a plain value.
    ///
    /// Containers become maps. A container reached again through a cycle is
    /// rendered as `Null`.
    pub fn to_value(&self, id: NodeId) -> Result<Value, StoreError> {
        let mut path = HashSet::new();
        self.to_value_inner(id, &mut path)
    }

    fn to_value_inner(&self, id: NodeId, path: &mut HashSet<NodeId>) -> Result<Value, StoreError> {
        match self.node(id)? {
            Node::Item(item) => Ok(item.value().clone()),
            Node::Container(container) => {
                if !path.insert(id) {
                    return Ok(Value::Null);
                }
                let mut map = BTreeMap::new();
                for (key, child) in container.children() {
                    let value = match child {
                        Child::Node(child_id) => self.to_value_inner(*child_id, path)?,
                        Child::Raw(raw) => raw.clone(),
                    };
                    map.insert(key.clone(), value);
                }
                path.remove(&id);
                Ok(Value::Map(map))
            }
        }
    }

    /// Materializes a child slot as a plain value.
    pub fn child_value(&self, child: &Child) -> Result<Value, StoreError> {
        match child {
            Child::Node(id) => self.to_value(*id),
            Child::Raw(value) => Ok(value.clone()),
        }
    }

    /// Deep-copies a node into new, unfrozen nodes of this store.
    ///
    /// Shared children are copied once and cycles are reproduced in the copy,
    /// so the clone never aliases any node of the original.
    pub fn clone_node(&mut self, id: NodeId) -> Result<NodeId, StoreError> {
        let mut copies = HashMap::new();
        self.clone_inner(id, &mut copies)
    }

    fn clone_inner(
        &mut self,
        id: NodeId,
        copies: &mut HashMap<NodeId, NodeId>,
    ) -> Result<NodeId, StoreError> {
        if let Some(copy) = copies.get(&id) {
            return Ok(*copy);
        }
        match self.node(id)?.clone() {
            Node::Item(mut item) => {
                item.frozen = false;
                let copy = self.alloc(Node::Item(item));
                copies.insert(id, copy);
                Ok(copy)
            }
            Node::Container(mut container) => {
                let children = std::mem::take(&mut container.children);
                container.frozen = false;
                let copy = self.alloc(Node::Container(container));
                copies.insert(id, copy);
                for (key, child) in children {
                    let child = match child {
                        Child::Node(child_id) => Child::Node(self.clone_inner(child_id, copies)?),
                        raw => raw,
                    };
                    if let Node::Container(target) = &mut self.nodes[copy.0] {
                        target.children.insert(key, child);
                    }
                }
                Ok(copy)
            }
        }
    }
}

fn kind_mismatch(expected: NodeKind, actual: NodeKind) -> StoreError {
    StoreError::TypeMismatch {
        expected: expected.to_string(),
        actual: actual.to_string(),
    }
}
