//! Containers and dot-path addressing.
//!
//! A [`Container`] is an insertion-ordered map of named children. Paths such
//! as `"a.b.c"` walk through nested containers; writes create missing
//! intermediate containers and bump `modified_at` on every container along
//! the way.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{Metadata, Node, NodeId, NodeKind, Store, StoreError, Timestamps};
use crate::{Value, clock::Timestamp, path::PathBuf};

/// Construction options for a [`Container`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContainerOptions {
    /// Record metadata reads in `last_accessed_at`.
    pub record_access: bool,
    /// Freeze the container and its initial children after construction.
    pub frozen: bool,
}

/// A child slot of a container.
///
/// Children are normally nodes of the store. `Raw` slots hold a plain value
/// that was stored without wrapping; the sync engine deep-merges them when
/// both sides are maps.
#[derive(Debug, Clone, PartialEq)]
pub enum Child {
    Node(NodeId),
    Raw(Value),
}

impl Child {
    pub fn node_id(&self) -> Option<NodeId> {
        match self {
            Child::Node(id) => Some(*id),
            Child::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&Value> {
        match self {
            Child::Raw(value) => Some(value),
            Child::Node(_) => None,
        }
    }
}

/// An ordered collection of named children with its own metadata.
#[derive(Debug, Clone)]
pub struct Container {
    pub(crate) children: IndexMap<String, Child>,
    metadata: Metadata,
    pub(crate) timestamps: Timestamps,
    pub(crate) frozen: bool,
    record_access: bool,
}

impl Container {
    pub(crate) fn new(metadata: Metadata, options: ContainerOptions, now: Timestamp) -> Self {
        Self {
            children: IndexMap::new(),
            metadata,
            timestamps: Timestamps::new(now),
            frozen: options.frozen,
            record_access: options.record_access,
        }
    }

    /// Number of direct children.
    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Child> {
        self.children.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.children.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.children.keys()
    }

    pub fn children(&self) -> impl Iterator<Item = (&String, &Child)> {
        self.children.iter()
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Reads the metadata, recording the access if enabled.
    pub fn read_metadata(&mut self, now: Timestamp) -> &Metadata {
        if self.record_access {
            self.timestamps.touch_accessed(now);
        }
        &self.metadata
    }

    pub fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    pub(crate) fn ensure_mutable(&self) -> Result<(), StoreError> {
        if self.frozen {
            return Err(StoreError::Frozen {
                kind: NodeKind::Container,
            });
        }
        Ok(())
    }

    /// Replaces the metadata. `modified_at` is left alone.
    pub fn set_metadata(
        &mut self,
        metadata: Metadata,
        record_access: bool,
        now: Timestamp,
    ) -> Result<(), StoreError> {
        self.ensure_mutable()?;
        self.metadata = metadata;
        if record_access {
            self.timestamps.touch_accessed(now);
        }
        Ok(())
    }

    /// Inserts a child without touching timestamps.
    pub(crate) fn insert(&mut self, key: String, child: Child) -> Result<Option<Child>, StoreError> {
        self.ensure_mutable()?;
        Ok(self.children.insert(key, child))
    }

    /// Removes a child, keeping the order of the remaining keys.
    pub(crate) fn remove(&mut self, key: &str) -> Result<Option<Child>, StoreError> {
        self.ensure_mutable()?;
        Ok(self.children.shift_remove(key))
    }

    pub(crate) fn replace_children(
        &mut self,
        children: IndexMap<String, Child>,
    ) -> Result<IndexMap<String, Child>, StoreError> {
        self.ensure_mutable()?;
        Ok(std::mem::replace(&mut self.children, children))
    }
}

impl Store {
    /// Walks to the container holding the final path component.
    ///
    /// Returns every container on the way (starting with `container`) and
    /// the final key. With `create`, missing intermediate containers are
    /// created; otherwise a missing segment yields `PathNotFound`.
    fn walk_to_parent(
        &mut self,
        container: NodeId,
        path: &str,
        create: bool,
    ) -> Result<(Vec<NodeId>, String), StoreError> {
        let path_buf = PathBuf::normalize(path);
        let (parents, last) = path_buf.split_last().ok_or_else(|| StoreError::InvalidPath {
            path: path.to_string(),
        })?;

        let mut chain = vec![container];
        let mut current = container;
        self.container(current)?;
        for segment in parents {
            let found = self.container(current)?.get(segment).cloned();
            let next = match found {
                Some(Child::Node(id)) if self.kind(id) == Some(NodeKind::Container) => id,
                Some(_) => {
                    return Err(StoreError::NotAContainer {
                        path: path_buf.to_string(),
                        segment: segment.to_string(),
                    });
                }
                None if create => {
                    let now = self.now();
                    let id = self.alloc(Node::Container(Container::new(
                        Metadata::new(),
                        ContainerOptions::default(),
                        now,
                    )));
                    self.container_mut(current)?
                        .insert(segment.to_string(), Child::Node(id))?;
                    id
                }
                None => {
                    return Err(StoreError::PathNotFound {
                        path: path_buf.to_string(),
                    });
                }
            };
            chain.push(next);
            current = next;
        }
        Ok((chain, last.to_string()))
    }

    fn touch_chain(&mut self, chain: &[NodeId]) -> Result<(), StoreError> {
        let now = self.now();
        for id in chain {
            self.container_mut(*id)?.timestamps.touch_modified(now);
        }
        Ok(())
    }

    fn insert_at(
        &mut self,
        container: NodeId,
        path: &str,
        child: Child,
    ) -> Result<Option<Child>, StoreError> {
        let (chain, key) = self.walk_to_parent(container, path, true)?;
        let parent = *chain.last().unwrap_or(&container);
        let previous = self.container_mut(parent)?.insert(key, child)?;
        self.touch_chain(&chain)?;
        Ok(previous)
    }

    /// Sets a value at a path, wrapping it through the wrap policy.
    ///
    /// An existing item at the path keeps its identity and has its value
    /// replaced (bumping `modified_at`) when the new value would also be
    /// wrapped as an item. Anything else is replaced by a freshly wrapped
    /// node. Returns the id of the node now stored at the path.
    pub fn set_item(
        &mut self,
        container: NodeId,
        path: impl AsRef<str>,
        value: impl Into<Value>,
    ) -> Result<NodeId, StoreError> {
        let path = path.as_ref();
        let value = value.into();
        if let Some(Child::Node(existing)) = self.get_item(container, path).cloned() {
            let wraps_as_item = self.policy.classify(&value) == super::WrapAs::Item || !value.is_map();
            if self.kind(existing) == Some(NodeKind::Item) && wraps_as_item {
                let (chain, _) = self.walk_to_parent(container, path, false)?;
                let now = self.now();
                self.item_mut(existing)?.set_value(value, now)?;
                self.touch_chain(&chain)?;
                return Ok(existing);
            }
        }
        self.ensure_path_writable(container, path)?;
        let id = self.wrap(value);
        self.insert_at(container, path, Child::Node(id))?;
        Ok(id)
    }

    /// Like [`Store::set_item`] but always creates a new node with metadata.
    pub fn set_item_with(
        &mut self,
        container: NodeId,
        path: impl AsRef<str>,
        value: impl Into<Value>,
        metadata: Metadata,
    ) -> Result<NodeId, StoreError> {
        let path = path.as_ref();
        self.ensure_path_writable(container, path)?;
        let id = self.wrap_with(value.into(), metadata);
        self.insert_at(container, path, Child::Node(id))?;
        Ok(id)
    }

    /// Links an existing node at a path.
    ///
    /// This is how shared and cyclic graphs are built; the linked node is not
    /// copied.
    pub fn set_node(
        &mut self,
        container: NodeId,
        path: impl AsRef<str>,
        node: NodeId,
    ) -> Result<Option<Child>, StoreError> {
        self.node(node)?;
        self.insert_at(container, path.as_ref(), Child::Node(node))
    }

    /// Stores a plain value at a path without wrapping it.
    pub fn set_raw(
        &mut self,
        container: NodeId,
        path: impl AsRef<str>,
        value: impl Into<Value>,
    ) -> Result<Option<Child>, StoreError> {
        self.insert_at(container, path.as_ref(), Child::Raw(value.into()))
    }

    /// Sets several values, in iteration order.
    pub fn set_items<I, K, V>(&mut self, container: NodeId, items: I) -> Result<Vec<NodeId>, StoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        items
            .into_iter()
            .map(|(path, value)| self.set_item(container, path, value))
            .collect()
    }

    /// Looks up the child slot at a path.
    pub fn get_item(&self, container: NodeId, path: impl AsRef<str>) -> Option<&Child> {
        let path = PathBuf::normalize(path.as_ref());
        let (parents, last) = path.split_last()?;
        let mut current = self.container(container).ok()?;
        for segment in parents {
            match current.get(segment)? {
                Child::Node(id) => current = self.container(*id).ok()?,
                Child::Raw(_) => return None,
            }
        }
        current.get(last)
    }

    /// Materializes the value at a path.
    pub fn get_value(&self, container: NodeId, path: impl AsRef<str>) -> Option<Value> {
        let child = self.get_item(container, path)?;
        self.child_value(child).ok()
    }

    /// Reads an item value at a path, recording the access if the item
    /// tracks reads.
    pub fn read_item(
        &mut self,
        container: NodeId,
        path: impl AsRef<str>,
    ) -> Result<Value, StoreError> {
        let path = path.as_ref();
        let child = self
            .get_item(container, path)
            .cloned()
            .ok_or_else(|| StoreError::PathNotFound {
                path: path.to_string(),
            })?;
        match child {
            Child::Node(id) => {
                let now = self.now();
                match self.node_mut(id)? {
                    Node::Item(item) => Ok(item.read(now).clone()),
                    Node::Container(_) => self.to_value(id),
                }
            }
            Child::Raw(value) => Ok(value),
        }
    }

    pub fn has_item(&self, container: NodeId, path: impl AsRef<str>) -> bool {
        self.get_item(container, path).is_some()
    }

    /// Removes the child at a path. Returns whether anything was removed.
    pub fn delete_item(
        &mut self,
        container: NodeId,
        path: impl AsRef<str>,
    ) -> Result<bool, StoreError> {
        let (chain, key) = match self.walk_to_parent(container, path.as_ref(), false) {
            Ok(found) => found,
            Err(StoreError::PathNotFound { .. } | StoreError::NotAContainer { .. }) => {
                return Ok(false);
            }
            Err(err) => return Err(err),
        };
        let parent = *chain.last().unwrap_or(&container);
        let removed = self.container_mut(parent)?.remove(&key)?.is_some();
        if removed {
            self.touch_chain(&chain)?;
        }
        Ok(removed)
    }

    /// Number of direct keys of a container.
    pub fn size(&self, container: NodeId) -> Result<usize, StoreError> {
        Ok(self.container(container)?.len())
    }

    /// Direct keys of a container, in insertion order.
    pub fn keys(&self, container: NodeId) -> Result<Vec<String>, StoreError> {
        Ok(self.container(container)?.keys().cloned().collect())
    }

    fn ensure_path_writable(&self, container: NodeId, path: &str) -> Result<(), StoreError> {
        if PathBuf::normalize(path).is_empty() {
            return Err(StoreError::InvalidPath {
                path: path.to_string(),
            });
        }
        self.container(container)?.ensure_mutable()
    }
}
