//! Named context trees.

use serde::Serialize;
use uuid::Uuid;

use super::{ContainerOptions, Metadata, NodeId, NodeKind, Store, StoreError};
use crate::Value;

/// A named handle on a root container.
///
/// Contexts are the operands of the [`Merger`](crate::Merger): two contexts
/// are reconciled path by path rather than node by node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Context {
    id: Uuid,
    name: String,
    root: NodeId,
}

impl Context {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The root container of this context.
    pub fn root(&self) -> NodeId {
        self.root
    }
}

impl Store {
    /// Creates a context with an empty root container.
    pub fn create_context(&mut self, name: impl Into<String>) -> Context {
        let now = self.now();
        let root = self.alloc(super::Node::Container(super::Container::new(
            Metadata::new(),
            ContainerOptions::default(),
            now,
        )));
        Context {
            id: Uuid::new_v4(),
            name: name.into(),
            root,
        }
    }

    /// Creates a context populated from a raw nested map.
    pub fn context_from_value(
        &mut self,
        name: impl Into<String>,
        value: Value,
    ) -> Result<Context, StoreError> {
        let root = self.create_container(Some(value), Metadata::new(), ContainerOptions::default())?;
        Ok(Context {
            id: Uuid::new_v4(),
            name: name.into(),
            root,
        })
    }

    /// Wraps an existing container as a context.
    pub fn context_for(&self, name: impl Into<String>, root: NodeId) -> Result<Context, StoreError> {
        match self.node(root)?.kind() {
            NodeKind::Container => Ok(Context {
                id: Uuid::new_v4(),
                name: name.into(),
                root,
            }),
            NodeKind::Item => Err(StoreError::TypeMismatch {
                expected: "container".to_string(),
                actual: "item".to_string(),
            }),
        }
    }
}
