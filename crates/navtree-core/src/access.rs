//! Portal based access filtering
//!
//! Computes, once per render or move session, which portal subtrees the
//! acting user may not see and which nodes only get a restricted menu.
//! The result is an [`AccessScope`] value owned by the caller; portal
//! membership can change between requests, so nothing here is cached.

use crate::error::TreeResult;
use navtree_model::{AccessContext, NodeId, Portal};
use navtree_store::{PortalDirectory, TreeStore};
use std::collections::HashSet;
use std::sync::Arc;

/// Request-scoped result of access filtering
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessScope {
    excluded: HashSet<NodeId>,
    restricted: HashSet<NodeId>,
    portal_count: usize,
}

impl AccessScope {
    /// Build a scope from precomputed sets
    #[must_use]
    pub fn new(excluded: HashSet<NodeId>, restricted: HashSet<NodeId>, portal_count: usize) -> Self {
        Self {
            excluded,
            restricted,
            portal_count,
        }
    }

    /// Main nodes of portals the user may not view
    #[inline]
    #[must_use]
    pub fn excluded(&self) -> &HashSet<NodeId> {
        &self.excluded
    }

    /// Portal main nodes and navigation starts
    #[inline]
    #[must_use]
    pub fn restricted(&self) -> &HashSet<NodeId> {
        &self.restricted
    }

    /// Number of known portals
    #[inline]
    #[must_use]
    pub fn portal_count(&self) -> usize {
        self.portal_count
    }

    /// Whether `id` is the main node of an excluded portal
    #[inline]
    #[must_use]
    pub fn is_excluded(&self, id: &NodeId) -> bool {
        self.excluded.contains(id)
    }

    /// Whether `id` gets a restricted interaction affordance
    #[inline]
    #[must_use]
    pub fn is_restricted(&self, id: &NodeId) -> bool {
        self.restricted.contains(id)
    }
}

/// Main node ids of every portal not in the caller's allowed set
#[must_use]
pub fn excluded_portal_nodes(portals: &[Portal], access: &AccessContext) -> HashSet<NodeId> {
    portals
        .iter()
        .filter(|p| !access.may_view(&p.id))
        .filter_map(|p| p.main_node.clone())
        .collect()
}

/// Main node ids and navigation start ids of every portal
#[must_use]
pub fn restricted_nodes(portals: &[Portal]) -> HashSet<NodeId> {
    portals
        .iter()
        .flat_map(|p| p.main_node.iter().chain(p.navigation_starts.iter()))
        .cloned()
        .collect()
}

/// Access filter over a portal directory
#[derive(Clone)]
pub struct AccessFilter {
    portals: Arc<dyn PortalDirectory>,
    store: Arc<dyn TreeStore>,
}

impl std::fmt::Debug for AccessFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessFilter").finish_non_exhaustive()
    }
}

impl AccessFilter {
    /// Create filter
    #[must_use]
    pub fn new(portals: Arc<dyn PortalDirectory>, store: Arc<dyn TreeStore>) -> Self {
        Self { portals, store }
    }

    /// Compute the scope for one render or move session
    ///
    /// # Errors
    /// Returns storage error if the portal list cannot be read.
    pub async fn scope(&self, access: &AccessContext) -> TreeResult<AccessScope> {
        let portals = self.portals.portals().await?;
        let scope = AccessScope {
            excluded: excluded_portal_nodes(&portals, access),
            restricted: restricted_nodes(&portals),
            portal_count: portals.len(),
        };
        tracing::debug!(
            user = ?access.user_id,
            excluded = scope.excluded.len(),
            restricted = scope.restricted.len(),
            portals = scope.portal_count,
            "computed access scope"
        );
        Ok(scope)
    }

    /// Main nodes of portals the user may not view
    ///
    /// # Errors
    /// Returns storage error if the portal list cannot be read.
    pub async fn excluded_portal_nodes(&self, access: &AccessContext) -> TreeResult<HashSet<NodeId>> {
        let portals = self.portals.portals().await?;
        Ok(excluded_portal_nodes(&portals, access))
    }

    /// Portal main nodes and navigation starts
    ///
    /// # Errors
    /// Returns storage error if the portal list cannot be read.
    pub async fn restricted_nodes(&self) -> TreeResult<HashSet<NodeId>> {
        let portals = self.portals.portals().await?;
        Ok(restricted_nodes(&portals))
    }

    /// Whether `node` or one of its ancestors is an excluded portal main node
    ///
    /// Walks parent links rather than the path cache, which may be stale
    /// during a reorder.
    ///
    /// # Errors
    /// Returns storage error if a node lookup fails.
    pub async fn is_within_excluded_portal(&self, node: &NodeId, scope: &AccessScope) -> TreeResult<bool> {
        if scope.excluded.is_empty() {
            return Ok(false);
        }
        let mut seen = HashSet::new();
        let mut current = Some(node.clone());
        while let Some(id) = current {
            if scope.is_excluded(&id) {
                return Ok(true);
            }
            if !seen.insert(id.clone()) {
                tracing::warn!(node = %id, "cycle in parent links");
                return Ok(false);
            }
            current = self
                .store
                .node(&id)
                .await?
                .and_then(|n| n.parent_id);
        }
        Ok(false)
    }
}
