//! Leaf nodes.

use serde::{Deserialize, Serialize};

use super::{Metadata, NodeKind, StoreError, Timestamps};
use crate::{Value, clock::Timestamp};

/// Construction options for an [`Item`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ItemOptions {
    /// Record reads in `last_accessed_at`.
    pub record_access: bool,
    /// Create the item already frozen.
    pub frozen: bool,
}

/// A leaf value holder with metadata and timestamps.
///
/// Every value write bumps `modified_at`. Reads only touch
/// `last_accessed_at`, and only when access recording is enabled. A frozen
/// item rejects all mutation with [`StoreError::Frozen`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    value: Value,
    metadata: Metadata,
    pub(crate) timestamps: Timestamps,
    pub(crate) frozen: bool,
    record_access: bool,
}

impl Item {
    pub(crate) fn new(
        value: Value,
        metadata: Metadata,
        options: ItemOptions,
        now: Timestamp,
    ) -> Self {
        Self {
            value,
            metadata,
            timestamps: Timestamps::new(now),
            frozen: options.frozen,
            record_access: options.record_access,
        }
    }

    /// The current value, without recording an access.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Reads the value, recording the access if enabled for this item.
    pub fn read(&mut self, now: Timestamp) -> &Value {
        if self.record_access {
            self.timestamps.touch_accessed(now);
        }
        &self.value
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn timestamps(&self) -> &Timestamps {
        &self.timestamps
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn records_access(&self) -> bool {
        self.record_access
    }

    pub fn freeze(&mut self) {
        self.frozen = true;
    }

    fn ensure_mutable(&self) -> Result<(), StoreError> {
        if self.frozen {
            return Err(StoreError::Frozen {
                kind: NodeKind::Item,
            });
        }
        Ok(())
    }

    /// Writes a new value and returns the previous one.
    pub fn set_value(&mut self, value: Value, now: Timestamp) -> Result<Value, StoreError> {
        self.ensure_mutable()?;
        self.timestamps.touch_modified(now);
        Ok(std::mem::replace(&mut self.value, value))
    }

    /// Writes a value copied from another node, adopting its `modified_at`.
    ///
    /// A synced item carries the modification time of its origin, so that
    /// comparing the two afterwards yields equality instead of making the
    /// copy look newer.
    pub(crate) fn replicate_value(
        &mut self,
        value: Value,
        origin_modified_at: Timestamp,
    ) -> Result<Value, StoreError> {
        self.ensure_mutable()?;
        self.timestamps.replicate_modified(origin_modified_at);
        Ok(std::mem::replace(&mut self.value, value))
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
}
