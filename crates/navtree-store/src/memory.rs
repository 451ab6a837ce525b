//! In-memory transactional tree store
//!
//! Keeps every node behind one `RwLock` so a commit validates all group
//! guards and applies all writes under a single write guard. Each sibling
//! group carries a version that is bumped whenever its membership or
//! ordering changes.

use crate::error::StoreError;
use crate::snapshot::TreeSnapshot;
use crate::traits::{NodeWrite, OrderingBatch, PortalDirectory, SiblingGroup, TreeStore};
use async_trait::async_trait;
use navtree_model::{AncestorPath, NestedSetBounds, NodeId, Portal, SortField, TreeNode};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
struct State {
    nodes: HashMap<NodeId, TreeNode>,
    versions: HashMap<NodeId, u64>,
}

impl State {
    fn version(&self, parent: &NodeId) -> u64 {
        self.versions.get(parent).copied().unwrap_or(0)
    }

    fn bump(&mut self, parent: &NodeId) {
        *self.versions.entry(parent.clone()).or_insert(0) += 1;
    }

    fn children_of(&self, parent: &NodeId) -> Vec<&TreeNode> {
        self.nodes
            .values()
            .filter(|n| n.parent_id() == Some(parent))
            .collect()
    }
}

/// Tree store holding all nodes in memory
#[derive(Debug)]
pub struct MemoryTreeStore {
    root_id: NodeId,
    state: RwLock<State>,
    portals: RwLock<Vec<Portal>>,
}

impl MemoryTreeStore {
    /// Create store containing only the root sentinel
    #[must_use]
    pub fn new(root_id: impl Into<NodeId>) -> Self {
        let root_id = root_id.into();
        let mut state = State::default();
        state
            .nodes
            .insert(root_id.clone(), TreeNode::root(root_id.clone()));
        Self {
            root_id,
            state: RwLock::new(state),
            portals: RwLock::new(Vec::new()),
        }
    }

    /// Create store from a snapshot
    #[must_use]
    pub fn from_snapshot(snapshot: TreeSnapshot) -> Self {
        let store = Self::new(snapshot.root_id.clone());
        for node in snapshot.nodes {
            store.insert(node);
        }
        store.set_portals(snapshot.portals);
        store
    }

    /// Export the current content
    #[must_use]
    pub fn snapshot(&self) -> TreeSnapshot {
        let state = self.state.read();
        let mut nodes: Vec<TreeNode> = state
            .nodes
            .values()
            .filter(|n| n.id != self.root_id)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        TreeSnapshot {
            root_id: self.root_id.clone(),
            portals: self.portals.read().clone(),
            nodes,
        }
    }

    /// Root sentinel id
    #[inline]
    #[must_use]
    pub fn root_id(&self) -> &NodeId {
        &self.root_id
    }

    /// Insert or replace a node, as the external record editor would
    pub fn insert(&self, node: TreeNode) {
        let mut state = self.state.write();
        if let Some(parent) = node.parent_id().cloned() {
            state.bump(&parent);
        }
        if let Some(previous) = state.nodes.insert(node.id.clone(), node) {
            if let Some(old_parent) = previous.parent_id {
                state.bump(&old_parent);
            }
        }
    }

    /// Delete a node and its descendants, as the external record editor would
    ///
    /// Returns the removed nodes, the requested node first.
    pub fn remove_subtree(&self, id: &NodeId) -> Vec<TreeNode> {
        let mut state = self.state.write();
        let mut removed = Vec::new();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            let children: Vec<NodeId> = state
                .children_of(&current)
                .into_iter()
                .map(|n| n.id.clone())
                .collect();
            stack.extend(children);
            if let Some(node) = state.nodes.remove(&current) {
                if let Some(parent) = node.parent_id().cloned() {
                    state.bump(&parent);
                }
                removed.push(node);
            }
        }
        removed
    }

    /// Replace the portal list
    pub fn set_portals(&self, portals: Vec<Portal>) {
        *self.portals.write() = portals;
    }

    /// Bump a group version without changing data
    ///
    /// Simulates another writer committing to the same sibling group.
    pub fn touch_group(&self, parent: &NodeId) {
        self.state.write().bump(parent);
    }

    /// Current version of a sibling group
    #[must_use]
    pub fn group_version(&self, parent: &NodeId) -> u64 {
        self.state.read().version(parent)
    }

    /// Number of nodes, root included
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read().nodes.len()
    }

    /// Store holds nothing but possibly the root
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    /// Synchronous node lookup
    #[must_use]
    pub fn get(&self, id: &NodeId) -> Option<TreeNode> {
        self.state.read().nodes.get(id).cloned()
    }

    /// Child ids of `parent` ascending by `field`, synchronously
    #[must_use]
    pub fn ordered_child_ids(&self, parent: &NodeId, field: &SortField) -> Vec<NodeId> {
        let state = self.state.read();
        let mut children = state.children_of(parent);
        sort_nodes(&mut children, field);
        children.into_iter().map(|n| n.id.clone()).collect()
    }
}

fn sort_nodes(nodes: &mut [&TreeNode], field: &SortField) {
    nodes.sort_by(|a, b| {
        a.sort_key(field)
            .cmp(&b.sort_key(field))
            .then_with(|| a.id.cmp(&b.id))
    });
}

#[async_trait]
impl TreeStore for MemoryTreeStore {
    async fn node(&self, id: &NodeId) -> Result<Option<TreeNode>, StoreError> {
        Ok(self.get(id))
    }

    async fn children(
        &self,
        parent: &NodeId,
        excluded: &HashSet<NodeId>,
        order_by: &SortField,
    ) -> Result<SiblingGroup, StoreError> {
        let state = self.state.read();
        let mut children: Vec<&TreeNode> = state
            .children_of(parent)
            .into_iter()
            .filter(|n| !excluded.contains(&n.id))
            .collect();
        sort_nodes(&mut children, order_by);

        Ok(SiblingGroup {
            parent: parent.clone(),
            version: state.version(parent),
            nodes: children.into_iter().cloned().collect(),
        })
    }

    async fn commit(&self, batch: OrderingBatch) -> Result<(), StoreError> {
        let mut state = self.state.write();

        for guard in &batch.guards {
            let actual = state.version(&guard.parent);
            if actual != guard.version {
                tracing::debug!(
                    parent = %guard.parent,
                    expected = guard.version,
                    actual,
                    "rejecting batch on stale sibling group"
                );
                return Err(StoreError::conflict(guard.parent.clone(), guard.version, actual));
            }
        }

        for write in &batch.writes {
            if !state.nodes.contains_key(write.node()) {
                return Err(StoreError::NotFound(write.node().clone()));
            }
            if let NodeWrite::Parent { parent, .. } = write {
                if !state.nodes.contains_key(parent) {
                    return Err(StoreError::NotFound(parent.clone()));
                }
            }
        }

        let mut touched: HashSet<NodeId> = batch.guards.iter().map(|g| g.parent.clone()).collect();
        for write in batch.writes {
            match write {
                NodeWrite::SortKey { node, key } => {
                    if let Some(n) = state.nodes.get_mut(&node) {
                        n.set_sort_key(&batch.sort_field, key);
                        if let Some(parent) = n.parent_id() {
                            touched.insert(parent.clone());
                        }
                    }
                }
                NodeWrite::Parent { node, parent } => {
                    if let Some(n) = state.nodes.get_mut(&node) {
                        if let Some(old) = n.parent_id.replace(parent.clone()) {
                            touched.insert(old);
                        }
                        touched.insert(parent);
                    }
                }
            }
        }

        for parent in &touched {
            state.bump(parent);
        }
        Ok(())
    }

    async fn write_path_cache(&self, id: &NodeId, path: AncestorPath) -> Result<(), StoreError> {
        let mut state = self.state.write();
        let node = state
            .nodes
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        node.path_cache = Some(path);
        Ok(())
    }

    async fn clear_path_cache(&self, ids: &[NodeId]) -> Result<(), StoreError> {
        let mut state = self.state.write();
        for id in ids {
            if let Some(node) = state.nodes.get_mut(id) {
                node.path_cache = None;
            }
        }
        Ok(())
    }

    async fn write_bounds(&self, bounds: Vec<(NodeId, NestedSetBounds)>) -> Result<(), StoreError> {
        let mut state = self.state.write();
        if let Some((missing, _)) = bounds.iter().find(|(id, _)| !state.nodes.contains_key(id)) {
            return Err(StoreError::NotFound(missing.clone()));
        }
        for (id, b) in bounds {
            if let Some(node) = state.nodes.get_mut(&id) {
                node.bounds = Some(b);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl PortalDirectory for MemoryTreeStore {
    async fn portals(&self) -> Result<Vec<Portal>, StoreError> {
        Ok(self.portals.read().clone())
    }
}
