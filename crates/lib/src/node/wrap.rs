//! Value-wrapping policy.
//!
//! Whenever a raw [`Value`] has to be inserted into a tree as a new node, the
//! store asks its [`WrapPolicy`] whether the value becomes an
//! [`Item`](super::Item) or a nested [`Container`](super::Container). Only
//! maps can become containers; a policy answering [`WrapAs::Container`] for
//! any other value still yields an item.

use std::fmt::Debug;

use crate::Value;

/// Node kind a raw value is wrapped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WrapAs {
    Item,
    Container,
}

/// Decides how raw values are represented as nodes.
pub trait WrapPolicy: Send + Sync + Debug {
    fn classify(&self, value: &Value) -> WrapAs;
}

/// Maps become containers, everything else becomes an item.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultWrapPolicy;

impl WrapPolicy for DefaultWrapPolicy {
    fn classify(&self, value: &Value) -> WrapAs {
        if value.is_map() {
            WrapAs::Container
        } else {
            WrapAs::Item
        }
    }
}

/// Keeps every value, maps included, inside a single item.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeafWrapPolicy;

impl WrapPolicy for LeafWrapPolicy {
    fn classify(&self, _value: &Value) -> WrapAs {
        WrapAs::Item
    }
}
