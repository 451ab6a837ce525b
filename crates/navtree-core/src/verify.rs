//! Structural invariant checks
//!
//! Reports, without repairing:
//! - sibling groups whose ordering keys are not `0..n`
//! - nodes whose cached path disagrees with their parent chain
//! - nodes whose nested-set bounds drifted

use crate::error::TreeResult;
use crate::nested_set::NestedSetMaintainer;
use crate::path_cache::PathCacheMaintainer;
use navtree_model::{NodeId, SortField};
use navtree_store::TreeStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Sibling group with gaps or duplicate keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupViolation {
    /// Parent id
    pub parent: NodeId,
    /// Keys in child order
    pub keys: Vec<u32>,
}

/// Findings of a verification run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeReport {
    /// Nodes visited
    pub nodes: usize,
    /// Non-contiguous sibling groups
    pub non_contiguous: Vec<GroupViolation>,
    /// Nodes with a wrong cached path
    pub stale_paths: Vec<NodeId>,
    /// Nodes with wrong bounds
    pub bounds_drift: Vec<NodeId>,
}

impl TreeReport {
    /// No violation found
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.non_contiguous.is_empty() && self.stale_paths.is_empty() && self.bounds_drift.is_empty()
    }
}

/// Check every invariant below `root` using `sort_field` for key contiguity
///
/// Nodes without a cached path are not reported as stale.
///
/// # Errors
/// Returns storage error if reading fails.
pub async fn verify_tree(store: Arc<dyn TreeStore>, root: &NodeId, sort_field: &SortField) -> TreeResult<TreeReport> {
    let none = HashSet::new();
    let paths = PathCacheMaintainer::new(store.clone());
    let mut report = TreeReport::default();
    let mut seen = HashSet::new();
    let mut stack = vec![root.clone()];

    while let Some(id) = stack.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        report.nodes += 1;

        if let Some(node) = store.node(&id).await? {
            if let Some(cached) = node.path_cache() {
                if *cached != paths.path_of(&id).await? {
                    report.stale_paths.push(id.clone());
                }
            }
        }

        let group = store.children(&id, &none, sort_field).await?;
        let keys: Vec<u32> = group.nodes.iter().map(|n| n.sort_key(sort_field)).collect();
        let contiguous = keys
            .iter()
            .enumerate()
            .all(|(i, k)| u32::try_from(i).is_ok_and(|i| i == *k));
        if !contiguous {
            report.non_contiguous.push(GroupViolation {
                parent: id.clone(),
                keys,
            });
        }
        stack.extend(group.nodes.into_iter().map(|n| n.id));
    }

    report.bounds_drift = NestedSetMaintainer::new(store).verify(root).await?;

    tracing::info!(
        nodes = report.nodes,
        non_contiguous = report.non_contiguous.len(),
        stale_paths = report.stale_paths.len(),
        bounds_drift = report.bounds_drift.len(),
        "verified tree"
    );
    Ok(report)
}
