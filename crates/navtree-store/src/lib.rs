//! Navtree Store
//!
//! Collaborator interfaces the tree engine reads and writes through, plus an
//! in-memory implementation with per-sibling-group optimistic versioning.
//!
//! # Architecture
//!
//! ```text
//! NodeReorderer ──▶ OrderingBatch ──▶ TreeStore::commit ──▶ (versions checked, all-or-nothing)
//! TreeRenderer  ──▶ TreeStore::children(parent, excluded, sort field)
//! AccessFilter  ──▶ PortalDirectory::portals
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use navtree_store::{MemoryTreeStore, TreeSnapshot};
//!
//! let snapshot = TreeSnapshot::from_yaml_str(include_str!("tree.yaml"))?;
//! let store = MemoryTreeStore::from_snapshot(snapshot);
//! let group = store.children(&"99".into(), &HashSet::new(), &SortField::Base).await?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

// Core modules
pub mod error;
pub mod memory;
pub mod schema;
pub mod snapshot;
pub mod traits;

// Re-exports for convenience
pub use error::{SnapshotError, StoreError};
pub use memory::MemoryTreeStore;
pub use schema::{SchemaConfig, StaticSchema};
pub use snapshot::TreeSnapshot;
pub use traits::{
    GroupGuard, NodeWrite, OrderingBatch, PortalDirectory, SchemaIntrospector, SiblingGroup,
    TreeStore,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
