//! Collaborator interfaces
//!
//! The engine never talks to a database directly. Every read and write goes
//! through these traits so the same algorithms run against the in-memory
//! store in tests and against a real record store in production.

use crate::error::StoreError;
use async_trait::async_trait;
use navtree_model::{AncestorPath, LocaleId, NestedSetBounds, NodeId, Portal, SortField, TreeNode};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Children of one parent, read at a specific group version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiblingGroup {
    /// Parent id
    pub parent: NodeId,
    /// Version of the group when it was read
    pub version: u64,
    /// Children ascending by the requested sort field
    pub nodes: Vec<TreeNode>,
}

impl SiblingGroup {
    /// Guard asserting the group is unchanged at commit
    #[inline]
    #[must_use]
    pub fn guard(&self) -> GroupGuard {
        GroupGuard {
            parent: self.parent.clone(),
            version: self.version,
        }
    }

    /// Number of children
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// No children
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Child ids in order
    pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.iter().map(|n| &n.id)
    }
}

/// Expected version of a sibling group at commit time
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupGuard {
    /// Parent id of the guarded group
    pub parent: NodeId,
    /// Version the writer read
    pub version: u64,
}

/// A single write inside an [`OrderingBatch`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeWrite {
    /// Set the ordering key of `node` in the batch's sort field
    SortKey { node: NodeId, key: u32 },
    /// Move `node` under `parent`
    Parent { node: NodeId, parent: NodeId },
}

impl NodeWrite {
    /// Node the write targets
    #[inline]
    #[must_use]
    pub fn node(&self) -> &NodeId {
        match self {
            Self::SortKey { node, .. } | Self::Parent { node, .. } => node,
        }
    }
}

/// All writes of one reorder, committed atomically or not at all
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OrderingBatch {
    /// Sort field the key writes apply to
    pub sort_field: SortField,
    /// Groups that must still be at the read version
    pub guards: Vec<GroupGuard>,
    /// Writes in application order
    pub writes: Vec<NodeWrite>,
}

impl OrderingBatch {
    /// Empty batch for `sort_field`
    #[inline]
    #[must_use]
    pub fn new(sort_field: SortField) -> Self {
        Self {
            sort_field,
            guards: Vec::new(),
            writes: Vec::new(),
        }
    }

    /// Add a group guard (deduplicated by parent)
    pub fn guard(&mut self, guard: GroupGuard) {
        if !self.guards.iter().any(|g| g.parent == guard.parent) {
            self.guards.push(guard);
        }
    }

    /// Queue an ordering key write
    pub fn write_sort_key(&mut self, node: NodeId, key: u32) {
        self.writes.push(NodeWrite::SortKey { node, key });
    }

    /// Queue a parent write
    pub fn write_parent(&mut self, node: NodeId, parent: NodeId) {
        self.writes.push(NodeWrite::Parent { node, parent });
    }

    /// Number of queued writes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// No writes queued
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Read/write access to tree nodes
///
/// Implementations must apply [`TreeStore::commit`] atomically: either every
/// write lands and every guarded group version is bumped, or nothing changes.
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Load a node
    async fn node(&self, id: &NodeId) -> Result<Option<TreeNode>, StoreError>;

    /// Children of `parent`, excluding `excluded`, ascending by `order_by`
    async fn children(
        &self,
        parent: &NodeId,
        excluded: &HashSet<NodeId>,
        order_by: &SortField,
    ) -> Result<SiblingGroup, StoreError>;

    /// Apply a batch atomically
    ///
    /// # Errors
    /// - `StoreError::Conflict` if any guarded group moved past its version
    /// - `StoreError::NotFound` if a write targets a missing node
    async fn commit(&self, batch: OrderingBatch) -> Result<(), StoreError>;

    /// Store the cached ancestor path of a node
    async fn write_path_cache(&self, id: &NodeId, path: AncestorPath) -> Result<(), StoreError>;

    /// Drop cached ancestor paths
    async fn clear_path_cache(&self, ids: &[NodeId]) -> Result<(), StoreError>;

    /// Store nested set bounds for many nodes in one call
    async fn write_bounds(&self, bounds: Vec<(NodeId, NestedSetBounds)>) -> Result<(), StoreError>;
}

/// Source of the portal list
#[async_trait]
pub trait PortalDirectory: Send + Sync {
    /// All known portals
    async fn portals(&self) -> Result<Vec<Portal>, StoreError>;
}

/// Schema introspection for translatable fields
pub trait SchemaIntrospector: Send + Sync {
    /// Whether `field` of `table` has per-locale columns
    fn is_field_translated(&self, table: &str, field: &str) -> bool;

    /// Locale the acting user edits in
    fn active_locale(&self) -> LocaleId;

    /// Base language of field based translations, if any
    fn base_locale(&self) -> Option<LocaleId>;

    /// Resolve the ordering column for `table`
    ///
    /// Falls back to the base column when the field is untranslated or the
    /// active locale is the base locale.
    fn sort_field(&self, table: &str) -> SortField {
        if !self.is_field_translated(table, navtree_model::BASE_SORT_FIELD) {
            return SortField::Base;
        }
        let active = self.active_locale();
        match self.base_locale() {
            Some(base) if base == active => SortField::Base,
            _ if active.as_str().is_empty() => SortField::Base,
            _ => SortField::Localized(active),
        }
    }
}
