//! Cached ancestor paths
//!
//! Each node may carry its root-first ancestor path. After a reparent the
//! moved subtree's paths are stale; [`PathCacheMaintainer`] recomputes them
//! from parent links and writes them back.

use crate::error::{TreeError, TreeResult};
use navtree_model::{AncestorPath, NodeId, SortField};
use navtree_store::TreeStore;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// Recomputes and purges cached paths
#[derive(Clone)]
pub struct PathCacheMaintainer {
    store: Arc<dyn TreeStore>,
}

impl std::fmt::Debug for PathCacheMaintainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PathCacheMaintainer").finish_non_exhaustive()
    }
}

impl PathCacheMaintainer {
    /// Create maintainer
    #[must_use]
    pub fn new(store: Arc<dyn TreeStore>) -> Self {
        Self { store }
    }

    /// Ancestor path of `id` computed from parent links
    ///
    /// # Errors
    /// - `TreeError::NotFound` if `id` or an ancestor is missing
    /// - `TreeError::InvalidInput` if parent links form a cycle
    pub async fn path_of(&self, id: &NodeId) -> TreeResult<AncestorPath> {
        let node = self
            .store
            .node(id)
            .await?
            .ok_or_else(|| TreeError::NotFound(id.clone()))?;

        let mut ancestors = Vec::new();
        let mut seen = HashSet::from([id.clone()]);
        let mut current = node.parent_id;
        while let Some(parent) = current {
            if !seen.insert(parent.clone()) {
                return Err(TreeError::invalid_input(format!("cycle in parent links at {parent}")));
            }
            current = self
                .store
                .node(&parent)
                .await?
                .ok_or_else(|| TreeError::NotFound(parent.clone()))?
                .parent_id;
            ancestors.push(parent);
        }
        ancestors.reverse();
        Ok(AncestorPath::new(ancestors))
    }

    /// Rewrite the cached path of `id` and all its descendants
    ///
    /// Returns the number of nodes written.
    ///
    /// # Errors
    /// Returns error if a node lookup or write fails.
    pub async fn regenerate_subtree(&self, id: &NodeId) -> TreeResult<usize> {
        let start = self.path_of(id).await?;
        let none = HashSet::new();
        let mut written = 0;
        let mut queue = VecDeque::from([(id.clone(), start)]);

        while let Some((node, path)) = queue.pop_front() {
            let children = self.store.children(&node, &none, &SortField::Base).await?;
            let child_path = path.child(&node);
            self.store.write_path_cache(&node, path).await?;
            written += 1;
            for child in children.nodes {
                queue.push_back((child.id, child_path.clone()));
            }
        }

        tracing::debug!(node = %id, written, "regenerated path cache");
        Ok(written)
    }

    /// Drop cached paths of `ids`
    ///
    /// # Errors
    /// Returns storage error if the store rejects the purge.
    pub async fn purge(&self, ids: &[NodeId]) -> TreeResult<()> {
        self.store.clear_path_cache(ids).await?;
        tracing::debug!(count = ids.len(), "purged path cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navtree_model::TreeNode;
    use navtree_store::MemoryTreeStore;
    use pretty_assertions::assert_eq;

    fn store() -> Arc<MemoryTreeStore> {
        let store = Arc::new(MemoryTreeStore::new("99"));
        store.insert(TreeNode::new("a", "99"));
        store.insert(TreeNode::new("b", "a"));
        store.insert(TreeNode::new("c", "b"));
        store
    }

    #[tokio::test]
    async fn path_is_root_first_and_excludes_self() {
        let store = store();
        let paths = PathCacheMaintainer::new(store);
        let path = paths.path_of(&"c".into()).await.unwrap();
        assert_eq!(path.to_string(), "99/a/b");
    }

    #[tokio::test]
    async fn regenerates_whole_subtree() {
        let store = store();
        let paths = PathCacheMaintainer::new(store.clone());
        assert_eq!(paths.regenerate_subtree(&"a".into()).await.unwrap(), 3);
        assert_eq!(
            store.get(&"c".into()).unwrap().path_cache().map(ToString::to_string),
            Some("99/a/b".to_string())
        );
        assert_eq!(
            store.get(&"a".into()).unwrap().path_cache().map(ToString::to_string),
            Some("99".to_string())
        );
    }

    #[tokio::test]
    async fn purge_clears_paths() {
        let store = store();
        let paths = PathCacheMaintainer::new(store.clone());
        paths.regenerate_subtree(&"a".into()).await.unwrap();
        paths.purge(&["b".into(), "c".into()]).await.unwrap();
        assert!(store.get(&"b".into()).unwrap().path_cache().is_none());
        assert!(store.get(&"a".into()).unwrap().path_cache().is_some());
    }
}
