//! Navtree Core
//!
//! Hierarchical navigation tree engine: access-filtered rendering with lazy
//! expansion, and transactional reordering that keeps sibling ordering keys
//! contiguous.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────┐
//!                 │  NavigationTree  │
//!                 └────────┬─────────┘
//!        ┌─────────────────┼──────────────────┐
//!        ▼                 ▼                  ▼
//! ┌──────────────┐ ┌───────────────┐ ┌────────────────┐
//! │ TreeRenderer │ │ NodeReorderer │ │ DeleteHandler  │
//! └──────┬───────┘ └───────┬───────┘ └───────┬────────┘
//!        │                 ▼                 ▼
//!        │        ┌────────────────────────────────┐
//!        │        │     StructuralMaintenance      │
//!        │        │ cache · paths · nested set ·   │
//!        │        │ recovery log · notifications   │
//!        │        └────────────────────────────────┘
//!        ▼
//! ┌──────────────┐
//! │ AccessFilter │
//! └──────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use navtree_core::prelude::*;
//!
//! let store = Arc::new(MemoryTreeStore::from_snapshot(snapshot));
//! let tree = NavigationTree::builder(store.clone(), store).build()?;
//!
//! let result = tree.render(&RenderRequest::new("99", access)).await?;
//! let outcome = tree.move_node(&MoveRequest::new("c", "p", 0)).await;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod access;
pub mod cache;
pub mod config;
pub mod delete;
pub mod error;
pub mod locks;
pub mod maintenance;
pub mod nested_set;
pub mod notify;
pub mod path_cache;
pub mod recovery;
pub mod render;
pub mod reorder;
pub mod tree;
pub mod verify;

// Re-exports
pub use access::{AccessFilter, AccessScope};
pub use cache::{CachePolicy, CacheTrigger, FragmentCache, FragmentKey, StructuralCache};
pub use config::{CacheConfig, NavTreeConfig, PermissionPolicy};
pub use delete::DeleteHandler;
pub use error::{ConfigError, TreeError, TreeResult};
pub use nested_set::NestedSetMaintainer;
pub use notify::{BroadcastNotifier, ChangeKind, ChangeNotifier, NoopNotifier, StructuralChangeEvent};
pub use path_cache::PathCacheMaintainer;
pub use recovery::{MemoryRecoveryLog, RecoveryEntry, RecoveryError, RecoveryLog, ReplayCommand};
pub use render::{Children, Indicator, LazyPlaceholder, NodeFlags, RenderRequest, RenderResult, RenderedNode, TreeRenderer};
pub use reorder::{plan_ordering, MoveOutcome, MoveRequest, NodeReorderer};
pub use tree::{NavigationTree, NavigationTreeBuilder};
pub use verify::{verify_tree, TreeReport};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
pub mod prelude {
    pub use crate::{
        Children, Indicator, MoveOutcome, MoveRequest, NavTreeConfig, NavigationTree, PermissionPolicy,
        RenderRequest, RenderResult, TreeError, TreeResult,
    };
    pub use navtree_model::{AccessContext, NodeId, OpenState, TreeNode};
    pub use navtree_store::{MemoryTreeStore, TreeSnapshot};
    pub use std::sync::Arc;
}
