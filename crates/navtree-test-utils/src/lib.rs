//! Testing utilities for the navtree workspace
//!
//! Shared fixtures, sibling-key assertions and fault-injecting stores.

#![allow(missing_docs)]

use async_trait::async_trait;
use navtree_model::{AncestorPath, LinkedPage, NestedSetBounds, NodeId, Portal, SortField, TreeNode};
use navtree_store::{MemoryTreeStore, OrderingBatch, PortalDirectory, SiblingGroup, StoreError, TreeStore};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

pub const ROOT: &str = "99";

/// Fluent tree construction over a fresh store
#[derive(Debug)]
pub struct TreeBuilder {
    store: MemoryTreeStore,
}

impl TreeBuilder {
    pub fn new() -> Self {
        Self {
            store: MemoryTreeStore::new(ROOT),
        }
    }

    /// Children of `parent` with keys `0..n` in the given order
    pub fn group(self, parent: &str, children: &[&str]) -> Self {
        for (key, id) in children.iter().enumerate() {
            let key = u32::try_from(key).unwrap_or(u32::MAX);
            self.store
                .insert(TreeNode::new(*id, parent).with_name(id.to_uppercase()).with_sort(key));
        }
        self
    }

    /// Insert a prepared node
    pub fn node(self, node: TreeNode) -> Self {
        self.store.insert(node);
        self
    }

    pub fn portal(self, portal: Portal) -> Self {
        let mut portals = self.store.snapshot().portals;
        portals.push(portal);
        self.store.set_portals(portals);
        self
    }

    pub fn build(self) -> Arc<MemoryTreeStore> {
        Arc::new(self.store)
    }
}

impl Default for TreeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// `99 -> p -> [a, b, c]`
pub fn abc_store() -> Arc<MemoryTreeStore> {
    TreeBuilder::new().group(ROOT, &["p"]).group("p", &["a", "b", "c"]).build()
}

/// Two portals, five levels deep below the first
///
/// ```text
/// 99
/// ├── home (portal "main")
/// │   ├── about
/// │   │   └── team
/// │   │       └── people
/// │   │           └── alice
/// │   └── news
/// └── intranet (portal "internal")
///     └── hr
/// ```
pub fn portal_store() -> Arc<MemoryTreeStore> {
    TreeBuilder::new()
        .group(ROOT, &["home", "intranet"])
        .group("home", &["about", "news"])
        .group("about", &["team"])
        .group("team", &["people"])
        .group("people", &["alice"])
        .group("intranet", &["hr"])
        .node(
            TreeNode::new("news", "home")
                .with_name("News")
                .with_sort(1)
                .with_external_id(42)
                .with_page(LinkedPage::new("page-news").primary())
                .with_page(LinkedPage::new("page-archive").restricted()),
        )
        .portal(Portal::new("main", "home").with_navigation_start("about"))
        .portal(Portal::new("internal", "intranet"))
        .build()
}

/// Children of `parent` with their base keys, in order
pub fn sibling_keys(store: &MemoryTreeStore, parent: &str) -> Vec<(String, u32)> {
    store
        .ordered_child_ids(&NodeId::from(parent), &SortField::Base)
        .into_iter()
        .filter_map(|id| store.get(&id))
        .map(|n| (n.id.to_string(), n.entry_sort))
        .collect()
}

/// Child ids of `parent` in order
pub fn child_names(store: &MemoryTreeStore, parent: &str) -> Vec<String> {
    store
        .ordered_child_ids(&NodeId::from(parent), &SortField::Base)
        .into_iter()
        .map(|id| id.to_string())
        .collect()
}

/// Whether every group in the store has keys `0..n` under `field`
pub fn all_groups_contiguous(store: &MemoryTreeStore, field: &SortField) -> bool {
    let snapshot = store.snapshot();
    let parents: HashSet<NodeId> = snapshot.nodes.iter().filter_map(|n| n.parent_id.clone()).collect();
    parents.iter().all(|parent| {
        store
            .ordered_child_ids(parent, field)
            .iter()
            .filter_map(|id| store.get(id))
            .enumerate()
            .all(|(i, n)| u32::try_from(i).is_ok_and(|i| i == n.sort_key(field)))
    })
}

/// Ids not reachable from the root through parent links, sorted
pub fn unreachable_nodes(store: &MemoryTreeStore) -> Vec<String> {
    let snapshot = store.snapshot();
    let mut reached: HashSet<NodeId> = HashSet::from([snapshot.root_id.clone()]);
    let mut stack = vec![snapshot.root_id.clone()];
    while let Some(parent) = stack.pop() {
        for child in store.ordered_child_ids(&parent, &SortField::Base) {
            if reached.insert(child.clone()) {
                stack.push(child);
            }
        }
    }
    let mut missing: Vec<String> = snapshot
        .nodes
        .iter()
        .filter(|n| !reached.contains(&n.id))
        .map(|n| n.id.to_string())
        .collect();
    missing.sort();
    missing
}

/// Store whose node lookups yield to the scheduler first
///
/// Interleaves concurrent moves at every lookup, so checks done on one read
/// and acted on after another become observable races.
#[derive(Debug)]
pub struct YieldingStore {
    inner: Arc<MemoryTreeStore>,
}

impl YieldingStore {
    pub fn new(inner: Arc<MemoryTreeStore>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Arc<MemoryTreeStore> {
        &self.inner
    }
}

#[async_trait]
impl TreeStore for YieldingStore {
    async fn node(&self, id: &NodeId) -> Result<Option<TreeNode>, StoreError> {
        tokio::task::yield_now().await;
        self.inner.node(id).await
    }

    async fn children(
        &self,
        parent: &NodeId,
        excluded: &HashSet<NodeId>,
        order_by: &SortField,
    ) -> Result<SiblingGroup, StoreError> {
        tokio::task::yield_now().await;
        self.inner.children(parent, excluded, order_by).await
    }

    async fn commit(&self, batch: OrderingBatch) -> Result<(), StoreError> {
        self.inner.commit(batch).await
    }

    async fn write_path_cache(&self, id: &NodeId, path: AncestorPath) -> Result<(), StoreError> {
        self.inner.write_path_cache(id, path).await
    }

    async fn clear_path_cache(&self, ids: &[NodeId]) -> Result<(), StoreError> {
        self.inner.clear_path_cache(ids).await
    }

    async fn write_bounds(&self, bounds: Vec<(NodeId, NestedSetBounds)>) -> Result<(), StoreError> {
        self.inner.write_bounds(bounds).await
    }
}

#[async_trait]
impl PortalDirectory for YieldingStore {
    async fn portals(&self) -> Result<Vec<Portal>, StoreError> {
        self.inner.portals().await
    }
}

/// Store that lets a competing writer win the next `n` commits
#[derive(Debug)]
pub struct ConflictInjectingStore {
    inner: Arc<MemoryTreeStore>,
    pending: AtomicU32,
    commits: AtomicU32,
}

impl ConflictInjectingStore {
    pub fn new(inner: Arc<MemoryTreeStore>, conflicts: u32) -> Self {
        Self {
            inner,
            pending: AtomicU32::new(conflicts),
            commits: AtomicU32::new(0),
        }
    }

    pub fn inner(&self) -> &Arc<MemoryTreeStore> {
        &self.inner
    }

    /// Commit calls seen, successful or not
    pub fn commits(&self) -> u32 {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TreeStore for ConflictInjectingStore {
    async fn node(&self, id: &NodeId) -> Result<Option<TreeNode>, StoreError> {
        self.inner.node(id).await
    }

    async fn children(
        &self,
        parent: &NodeId,
        excluded: &HashSet<NodeId>,
        order_by: &SortField,
    ) -> Result<SiblingGroup, StoreError> {
        self.inner.children(parent, excluded, order_by).await
    }

    async fn commit(&self, batch: OrderingBatch) -> Result<(), StoreError> {
        self.commits.fetch_add(1, Ordering::SeqCst);
        let inject = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if inject {
            if let Some(guard) = batch.guards.first() {
                self.inner.touch_group(&guard.parent);
            }
        }
        self.inner.commit(batch).await
    }

    async fn write_path_cache(&self, id: &NodeId, path: AncestorPath) -> Result<(), StoreError> {
        self.inner.write_path_cache(id, path).await
    }

    async fn clear_path_cache(&self, ids: &[NodeId]) -> Result<(), StoreError> {
        self.inner.clear_path_cache(ids).await
    }

    async fn write_bounds(&self, bounds: Vec<(NodeId, NestedSetBounds)>) -> Result<(), StoreError> {
        self.inner.write_bounds(bounds).await
    }
}

#[async_trait]
impl PortalDirectory for ConflictInjectingStore {
    async fn portals(&self) -> Result<Vec<Portal>, StoreError> {
        self.inner.portals().await
    }
}

/// Store with switchable failures
#[derive(Debug)]
pub struct FailingStore {
    inner: Arc<MemoryTreeStore>,
    failing_children: Mutex<HashSet<NodeId>>,
    fail_bounds: AtomicBool,
    fail_paths: AtomicBool,
}

impl FailingStore {
    pub fn new(inner: Arc<MemoryTreeStore>) -> Self {
        Self {
            inner,
            failing_children: Mutex::new(HashSet::new()),
            fail_bounds: AtomicBool::new(false),
            fail_paths: AtomicBool::new(false),
        }
    }

    pub fn inner(&self) -> &Arc<MemoryTreeStore> {
        &self.inner
    }

    /// Make child fetches of `parent` fail
    pub fn fail_children_of(&self, parent: &str) {
        self.failing_children.lock().insert(NodeId::from(parent));
    }

    pub fn fail_bounds(&self) {
        self.fail_bounds.store(true, Ordering::SeqCst);
    }

    pub fn fail_paths(&self) {
        self.fail_paths.store(true, Ordering::SeqCst);
    }
}

fn unavailable(what: &str) -> StoreError {
    StoreError::Unavailable(format!("injected failure: {what}"))
}

#[async_trait]
impl TreeStore for FailingStore {
    async fn node(&self, id: &NodeId) -> Result<Option<TreeNode>, StoreError> {
        self.inner.node(id).await
    }

    async fn children(
        &self,
        parent: &NodeId,
        excluded: &HashSet<NodeId>,
        order_by: &SortField,
    ) -> Result<SiblingGroup, StoreError> {
        if self.failing_children.lock().contains(parent) {
            return Err(unavailable("children"));
        }
        self.inner.children(parent, excluded, order_by).await
    }

    async fn commit(&self, batch: OrderingBatch) -> Result<(), StoreError> {
        self.inner.commit(batch).await
    }

    async fn write_path_cache(&self, id: &NodeId, path: AncestorPath) -> Result<(), StoreError> {
        if self.fail_paths.load(Ordering::SeqCst) {
            return Err(unavailable("path cache"));
        }
        self.inner.write_path_cache(id, path).await
    }

    async fn clear_path_cache(&self, ids: &[NodeId]) -> Result<(), StoreError> {
        if self.fail_paths.load(Ordering::SeqCst) {
            return Err(unavailable("path cache"));
        }
        self.inner.clear_path_cache(ids).await
    }

    async fn write_bounds(&self, bounds: Vec<(NodeId, NestedSetBounds)>) -> Result<(), StoreError> {
        if self.fail_bounds.load(Ordering::SeqCst) {
            return Err(unavailable("bounds"));
        }
        self.inner.write_bounds(bounds).await
    }
}

#[async_trait]
impl PortalDirectory for FailingStore {
    async fn portals(&self) -> Result<Vec<Portal>, StoreError> {
        self.inner.portals().await
    }
}
