//! Comparison, synchronization and merging of context trees.
//!
//! Layers, from the bottom up:
//!
//! * [`compare`]: timestamp comparison of two nodes.
//! * [`item`]: copying one item onto another.
//! * [`ContainerSync`]: recursive, cycle-safe container synchronization.
//! * [`Merger`]: path-level reconciliation of two contexts under a
//!   [`MergeStrategy`], restricted by [`ItemFilter`]s.
//! * [`ops`]: bulk pushes, pulls and bidirectional syncs built on the merger.
//! * [`Synchronizer`]: one entry point dispatching on operand kind.
//!
//! Every operation reports a [`SyncResult`].

pub mod compare;
pub mod config;
pub mod container;
pub mod errors;
pub mod facade;
pub mod filter;
pub mod item;
pub mod merger;
pub mod ops;
pub mod result;

pub use compare::{CompareBy, Comparison, ComparisonResult, Timestamped, compare, compare_nodes};
pub use config::SyncConfig;
pub use container::{ContainerSync, ContainerSyncOptions};
pub use errors::SyncError;
pub use facade::{Operand, OperandKind, SyncOperation, SyncOptions, Synchronizer};
pub use filter::ItemFilter;
pub use item::{ItemSyncOptions, Priority};
pub use merger::{ConflictHandler, ConflictResolution, MergeOptions, MergeStrategy, Merger};
pub use ops::{BidirectionalOptions, BidirectionalResult, ConsolidationResult};
pub use result::{Change, ChangeKind, Direction, Statistics, SyncResult};
