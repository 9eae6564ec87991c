//! Host-provided defaults for the sync engine.
//!
//! ```
//! use ctxsync::merge::{CompareBy, MergeStrategy, SyncConfig};
//!
//! let config = SyncConfig::from_json(r#"{"compareBy": "createdAt", "defaultStrategy": "mergeSourceTarget"}"#)?;
//! assert_eq!(config.compare_by, CompareBy::CreatedAt);
//! assert_eq!(config.default_strategy, MergeStrategy::MergeSourcePriority);
//! assert!(config.sync_metadata);
//! # Ok::<(), ctxsync::Error>(())
//! ```

use serde::{Deserialize, Serialize};

use super::{
    compare::CompareBy,
    container::ContainerSyncOptions,
    facade::SyncOptions,
    item::ItemSyncOptions,
    merger::{MergeOptions, MergeStrategy},
};
use crate::Result;

/// Serializable defaults, usually loaded from JSON.
///
/// Missing fields take their default values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncConfig {
    pub compare_by: CompareBy,
    pub sync_metadata: bool,
    pub strict_type_checking: bool,
    pub deep_sync: bool,
    pub default_strategy: MergeStrategy,
    pub preserve_metadata: bool,
    pub create_missing: bool,
    pub allow_only: Vec<String>,
    pub block_only: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            compare_by: CompareBy::ModifiedAt,
            sync_metadata: true,
            strict_type_checking: false,
            deep_sync: true,
            default_strategy: MergeStrategy::MergeNewerWins,
            preserve_metadata: true,
            create_missing: true,
            allow_only: Vec::new(),
            block_only: Vec::new(),
        }
    }
}

impl SyncConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn item_options(&self) -> ItemSyncOptions {
        ItemSyncOptions {
            sync_metadata: self.sync_metadata,
            compare_by: self.compare_by,
        }
    }

    pub fn container_options(&self) -> ContainerSyncOptions {
        ContainerSyncOptions {
            sync_metadata: self.sync_metadata,
            strict_type_checking: self.strict_type_checking,
            deep_sync: self.deep_sync,
            compare_by: self.compare_by,
        }
    }

    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions {
            allow_only: self.allow_only.clone(),
            block_only: self.block_only.clone(),
            preserve_metadata: self.preserve_metadata,
            create_missing: self.create_missing,
            compare_by: self.compare_by,
            ..MergeOptions::default()
        }
    }

    /// Options for every layer of the [`Synchronizer`](super::Synchronizer).
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            item: self.item_options(),
            container: self.container_options(),
            merge: self.merge_options(),
        }
    }
}
