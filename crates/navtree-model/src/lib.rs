//! Navtree Data Model
//!
//! Shared types for the navigation tree engine.
//!
//! # Core Concepts
//!
//! - [`TreeNode`]: A navigation node with its ordering keys, connected pages
//!   and denormalized structure columns
//! - [`Portal`]: A site rooted at a main node, with extra navigation starts
//! - [`AccessContext`]: The portals the acting user may view
//! - [`OpenState`]: Client-side expansion hints
//! - [`AncestorPath`]: The cached ancestor chain of a node
//! - [`NestedSetBounds`]: Left/right range encoding for descendant checks
//!
//! # Example
//!
//! ```rust,ignore
//! use navtree_model::{NodeId, TreeNode};
//!
//! let node = TreeNode::new("42", "99").with_name("Products").with_sort(3);
//! assert_eq!(node.parent_id(), Some(&NodeId::from("99")));
//! ```

#![warn(unreachable_pub)]

// Core modules
mod error;
mod id;
mod nested_set;
mod node;
mod path;
mod portal;

// Re-exports
pub use error::ModelError;
pub use id::{ExternalId, LocaleId, NodeId, PageId, PortalId, UserId, UNDEFINED_SENTINEL};
pub use nested_set::NestedSetBounds;
pub use node::{LinkedPage, LocalizedText, SortField, TreeNode, BASE_SORT_FIELD};
pub use path::AncestorPath;
pub use portal::{AccessContext, OpenState, Portal};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
