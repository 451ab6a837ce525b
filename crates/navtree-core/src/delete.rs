//! Delete signal handling
//!
//! Called by the record editor before a node is removed. Derived structure
//! for the whole subtree is cleaned up and the node's external id returned so
//! the client can drop it from its view.

use crate::error::TreeResult;
use crate::maintenance::StructuralMaintenance;
use navtree_model::{ExternalId, NodeId, SortField};
use navtree_store::TreeStore;
use std::collections::HashSet;
use std::sync::Arc;

/// Reacts to node deletion
#[derive(Clone)]
pub struct DeleteHandler {
    store: Arc<dyn TreeStore>,
    maintenance: StructuralMaintenance,
}

impl std::fmt::Debug for DeleteHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeleteHandler").finish_non_exhaustive()
    }
}

impl DeleteHandler {
    /// Create handler
    #[must_use]
    pub fn new(store: Arc<dyn TreeStore>, maintenance: StructuralMaintenance) -> Self {
        Self { store, maintenance }
    }

    /// Clean up after `raw_id` and return its external id
    ///
    /// Missing, empty or sentinel input and unknown nodes yield `None`.
    pub async fn on_node_deleted(&self, raw_id: Option<&str>) -> Option<ExternalId> {
        let id = match NodeId::from_input(raw_id, "nodeID") {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!(error = %e, "ignoring delete signal");
                return None;
            }
        };

        let node = match self.store.node(&id).await {
            Ok(Some(node)) => node,
            Ok(None) => {
                tracing::debug!(node = %id, "delete signal for unknown node");
                return None;
            }
            Err(e) => {
                tracing::error!(node = %id, error = %e, "delete signal lookup failed");
                return None;
            }
        };

        let subtree = match self.subtree_ids(&id).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(node = %id, error = %e, "subtree walk failed, cleaning node only");
                vec![id.clone()]
            }
        };

        let pending = self.maintenance.before_delete(&subtree).await;
        tracing::info!(node = %id, subtree = subtree.len(), maintenance_pending = pending, "handled delete signal");
        node.external_id
    }

    /// Ids of `root` and its descendants, `root` first
    ///
    /// # Errors
    /// Returns storage error if a child lookup fails.
    pub async fn subtree_ids(&self, root: &NodeId) -> TreeResult<Vec<NodeId>> {
        let none = HashSet::new();
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![root.clone()];
        while let Some(id) = stack.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let children = self.store.children(&id, &none, &SortField::Base).await?;
            stack.extend(children.nodes.into_iter().rev().map(|c| c.id));
            out.push(id);
        }
        Ok(out)
    }
}
