//! Nested-set bounds maintenance
//!
//! Assigns `(left, right)` bounds by a depth-first walk ordered by the base
//! ordering key, so subtree membership is answerable without recursion:
//!
//! ```text
//! 99 (1,8)
//! ├── a (2,5)
//! │   └── b (3,4)
//! └── c (6,7)
//! ```

use crate::error::TreeResult;
use navtree_model::{NestedSetBounds, NodeId, SortField};
use navtree_store::TreeStore;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

enum Visit {
    Enter(NodeId),
    Leave(NodeId),
}

/// Rebuilds and checks nested-set bounds
#[derive(Clone)]
pub struct NestedSetMaintainer {
    store: Arc<dyn TreeStore>,
}

impl std::fmt::Debug for NestedSetMaintainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NestedSetMaintainer").finish_non_exhaustive()
    }
}

impl NestedSetMaintainer {
    /// Create maintainer
    #[must_use]
    pub fn new(store: Arc<dyn TreeStore>) -> Self {
        Self { store }
    }

    /// Compute bounds for every node reachable from `root`, in pre-order
    ///
    /// # Errors
    /// Returns storage error if a child lookup fails.
    pub async fn compute(&self, root: &NodeId) -> TreeResult<Vec<(NodeId, NestedSetBounds)>> {
        let none = HashSet::new();
        let mut counter = 1u32;
        let mut lefts: HashMap<NodeId, u32> = HashMap::new();
        let mut rights: HashMap<NodeId, u32> = HashMap::new();
        let mut preorder = Vec::new();
        let mut stack = vec![Visit::Enter(root.clone())];

        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter(id) => {
                    if lefts.contains_key(&id) {
                        tracing::warn!(node = %id, "node reached twice while numbering");
                        continue;
                    }
                    lefts.insert(id.clone(), counter);
                    counter += 1;
                    preorder.push(id.clone());
                    let children = self.store.children(&id, &none, &SortField::Base).await?;
                    stack.push(Visit::Leave(id));
                    stack.extend(children.nodes.into_iter().rev().map(|c| Visit::Enter(c.id)));
                }
                Visit::Leave(id) => {
                    rights.insert(id, counter);
                    counter += 1;
                }
            }
        }

        Ok(preorder
            .into_iter()
            .filter_map(|id| {
                let left = lefts.get(&id).copied()?;
                let right = rights.get(&id).copied()?;
                Some((id, NestedSetBounds::new(left, right)))
            })
            .collect())
    }

    /// Recompute and store bounds for the whole tree
    ///
    /// Returns the number of nodes written.
    ///
    /// # Errors
    /// Returns storage error if reading or writing fails.
    pub async fn rebuild(&self, root: &NodeId) -> TreeResult<usize> {
        let bounds = self.compute(root).await?;
        let count = bounds.len();
        self.store.write_bounds(bounds).await?;
        tracing::debug!(root = %root, nodes = count, "rebuilt nested set");
        Ok(count)
    }

    /// Nodes whose stored bounds differ from a fresh computation
    ///
    /// # Errors
    /// Returns storage error if reading fails.
    pub async fn verify(&self, root: &NodeId) -> TreeResult<Vec<NodeId>> {
        let mut drift = Vec::new();
        for (id, expected) in self.compute(root).await? {
            let stored = self.store.node(&id).await?.and_then(|n| n.bounds);
            if stored != Some(expected) {
                drift.push(id);
            }
        }
        Ok(drift)
    }
}
