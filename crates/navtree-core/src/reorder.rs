//! Transactional node reordering
//!
//! A move places one node at a position among the children of a target
//! parent and rewrites sibling ordering keys so every group stays
//! contiguous:
//!
//! ```text
//! [A:0, B:1, C:2]  move C to 0  ->  [C:0, A:1, B:2]
//! [A:0, B:1, C:2]  move A to 1  ->  [B:0, A:1, C:2]
//! ```
//!
//! All key and parent writes of one move go to the store as a single
//! [`OrderingBatch`] guarded by the read versions of the touched sibling
//! groups. A conflicting concurrent move makes the batch fail as a whole and
//! the move is retried against fresh sibling state.

use crate::access::AccessFilter;
use crate::config::{NavTreeConfig, PermissionPolicy};
use crate::error::{TreeError, TreeResult};
use crate::locks::{GroupLocks, LockMode, SiblingLocks};
use crate::maintenance::StructuralMaintenance;
use navtree_model::{AccessContext, ModelError, NodeId, SortField, TreeNode};
use navtree_store::{OrderingBatch, SchemaIntrospector, StoreError, TreeStore};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

/// Raw move request as received from a drag-and-drop client
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MoveRequest {
    /// Node to move
    pub node_id: Option<String>,
    /// Target parent
    pub parent_id: Option<String>,
    /// Target position among the target's children
    pub position: Option<String>,
    /// Acting user
    pub access: AccessContext,
}

/// Move request after input validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedMove {
    /// Node to move
    pub node: NodeId,
    /// Target parent
    pub parent: NodeId,
    /// Target position
    pub position: u32,
}

impl MoveRequest {
    /// Request moving `node` under `parent` at `position`
    #[must_use]
    pub fn new(node: impl Into<String>, parent: impl Into<String>, position: u32) -> Self {
        Self {
            node_id: Some(node.into()),
            parent_id: Some(parent.into()),
            position: Some(position.to_string()),
            access: AccessContext::default(),
        }
    }

    /// Request from raw parameters
    #[must_use]
    pub fn from_raw(node: Option<&str>, parent: Option<&str>, position: Option<&str>) -> Self {
        Self {
            node_id: node.map(str::to_string),
            parent_id: parent.map(str::to_string),
            position: position.map(str::to_string),
            access: AccessContext::default(),
        }
    }

    /// With acting user
    #[inline]
    #[must_use]
    pub fn with_access(mut self, access: AccessContext) -> Self {
        self.access = access;
        self
    }

    /// Check presence and shape of every parameter
    ///
    /// # Errors
    /// Returns `TreeError::InvalidInput` for missing, empty, sentinel or
    /// non-numeric values.
    pub fn validate(&self) -> TreeResult<ValidatedMove> {
        let node = NodeId::from_input(self.node_id.as_deref(), "nodeID")?;
        let parent = NodeId::from_input(self.parent_id.as_deref(), "parentNodeID")?;
        let raw = self
            .position
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or(ModelError::MissingId("position"))?;
        let position = raw
            .parse::<u32>()
            .map_err(|_| ModelError::InvalidPosition(raw.to_string()))?;
        Ok(ValidatedMove {
            node,
            parent,
            position,
        })
    }
}

/// Result of a move
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    /// Move committed
    pub success: bool,
    /// Moved node plus every node whose ordering key changed
    pub affected: BTreeSet<NodeId>,
    /// Ordering committed but derived structure needs replay
    pub maintenance_pending: bool,
}

impl MoveOutcome {
    /// Failed move, nothing changed
    #[must_use]
    pub fn failed() -> Self {
        Self::default()
    }
}

/// Target keys for one sibling group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderingPlan {
    /// Key of the moved node
    pub moved_key: u32,
    /// Keys of the remaining siblings, in their current order
    pub keys: Vec<(NodeId, u32)>,
}

fn to_key(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

/// Keys after inserting the moved node at `position`
///
/// `siblings` are the target group's children in current order, moved node
/// excluded. They are renumbered from zero, skipping the slot the moved node
/// takes. Positions past the end are clamped to the group size.
#[must_use]
pub fn plan_ordering<'a>(siblings: impl IntoIterator<Item = &'a NodeId>, position: u32) -> OrderingPlan {
    let siblings: Vec<&NodeId> = siblings.into_iter().collect();
    let slot = position.min(to_key(siblings.len()));
    let mut next = 0u32;
    let keys = siblings
        .into_iter()
        .map(|id| {
            if next == slot {
                next += 1;
            }
            let key = next;
            next += 1;
            (id.clone(), key)
        })
        .collect();
    OrderingPlan { moved_key: slot, keys }
}

/// Keys `0..n` for a group in current order
#[must_use]
pub fn compact<'a>(siblings: impl IntoIterator<Item = &'a NodeId>) -> Vec<(NodeId, u32)> {
    siblings
        .into_iter()
        .enumerate()
        .map(|(i, id)| (id.clone(), to_key(i)))
        .collect()
}

struct Committed {
    affected: BTreeSet<NodeId>,
    changed: bool,
}

/// Moves nodes and keeps sibling groups contiguous
#[derive(Clone)]
pub struct NodeReorderer {
    store: Arc<dyn TreeStore>,
    access: AccessFilter,
    schema: Arc<dyn SchemaIntrospector>,
    config: Arc<NavTreeConfig>,
    locks: Arc<SiblingLocks>,
    maintenance: StructuralMaintenance,
}

impl std::fmt::Debug for NodeReorderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeReorderer")
            .field("move_retries", &self.config.move_retries)
            .field("locks", &self.locks)
            .finish_non_exhaustive()
    }
}

impl NodeReorderer {
    /// Create reorderer
    #[must_use]
    pub fn new(
        store: Arc<dyn TreeStore>,
        access: AccessFilter,
        schema: Arc<dyn SchemaIntrospector>,
        config: Arc<NavTreeConfig>,
        locks: Arc<SiblingLocks>,
        maintenance: StructuralMaintenance,
    ) -> Self {
        Self {
            store,
            access,
            schema,
            config,
            locks,
            maintenance,
        }
    }

    /// Move a node, reporting failure as `success = false`
    pub async fn move_node(&self, request: &MoveRequest) -> MoveOutcome {
        match self.try_move_node(request).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_no_op() => {
                tracing::warn!(error = %e, "move rejected");
                MoveOutcome::failed()
            }
            Err(e) => {
                tracing::error!(error = %e, "move failed");
                MoveOutcome::failed()
            }
        }
    }

    /// Move a node
    ///
    /// # Errors
    /// - `TreeError::InvalidInput` for bad parameters, moving the root, or
    ///   moving a node below itself
    /// - `TreeError::NotFound` if the node or the target parent is missing
    /// - `TreeError::PermissionDenied` under an enforced permission policy
    /// - `TreeError::OrderingConflict` if retries are exhausted
    /// - `TreeError::Storage` if the store fails
    pub async fn try_move_node(&self, request: &MoveRequest) -> TreeResult<MoveOutcome> {
        let mv = request.validate()?;
        if mv.node == self.config.root_id {
            return Err(TreeError::invalid_input("the root node cannot be moved"));
        }

        if self.store.node(&mv.parent).await?.is_none() {
            return Err(TreeError::NotFound(mv.parent.clone()));
        }

        if self.config.permission_policy == PermissionPolicy::Enforced {
            let scope = self.access.scope(&request.access).await?;
            for id in [&mv.node, &mv.parent] {
                if self.access.is_within_excluded_portal(id, &scope).await? {
                    return Err(TreeError::PermissionDenied { node: id.clone() });
                }
            }
        }

        let sort_field = self.schema.sort_field(&self.config.tree_table);
        let locks = self.lock_groups(&mv).await?;

        let max_attempts = self.config.move_retries.saturating_add(1);
        let mut attempt = 0u32;
        let committed = loop {
            attempt += 1;
            match self.attempt(&mv, &sort_field).await {
                Ok(committed) => break committed,
                Err(TreeError::Storage(StoreError::Conflict { parent, .. })) => {
                    if attempt >= max_attempts {
                        return Err(TreeError::OrderingConflict {
                            parent,
                            attempts: attempt,
                        });
                    }
                    tracing::warn!(
                        node = %mv.node,
                        parent = %parent,
                        attempt,
                        "ordering conflict, retrying against fresh siblings"
                    );
                }
                Err(e) => return Err(e),
            }
        };
        drop(locks);

        let maintenance_pending = if committed.changed {
            self.maintenance.after_move(&mv.node, &committed.affected).await
        } else {
            false
        };

        tracing::info!(
            node = %mv.node,
            parent = %mv.parent,
            position = mv.position,
            affected = committed.affected.len(),
            attempts = attempt,
            maintenance_pending,
            "moved node"
        );

        Ok(MoveOutcome {
            success: true,
            affected: committed.affected,
            maintenance_pending,
        })
    }

    /// Lock the source and target groups, re-reading the source parent once held
    async fn lock_groups(&self, mv: &ValidatedMove) -> TreeResult<GroupLocks> {
        loop {
            let source = self.current_parent(&mv.node).await?;
            let mode = if source.as_ref() == Some(&mv.parent) {
                LockMode::Reorder
            } else {
                LockMode::Reparent
            };
            let parents: Vec<&NodeId> = source.iter().chain([&mv.parent]).collect();
            let locks = self.locks.acquire(&parents, mode).await;
            if self.current_parent(&mv.node).await? == source {
                return Ok(locks);
            }
            tracing::debug!(node = %mv.node, "parent changed while waiting for locks, relocking");
        }
    }

    async fn current_parent(&self, id: &NodeId) -> TreeResult<Option<NodeId>> {
        let node = self
            .store
            .node(id)
            .await?
            .ok_or_else(|| TreeError::NotFound(id.clone()))?;
        Ok(node.parent_id)
    }

    async fn ensure_not_below_itself(&self, mv: &ValidatedMove) -> TreeResult<()> {
        let mut seen = HashSet::new();
        let mut current = Some(mv.parent.clone());
        while let Some(id) = current {
            if id == mv.node {
                return Err(TreeError::invalid_input(format!(
                    "cannot move {} below itself",
                    mv.node
                )));
            }
            if !seen.insert(id.clone()) {
                return Err(TreeError::invalid_input(format!("cycle in parent links at {id}")));
            }
            current = self.store.node(&id).await?.and_then(|n| n.parent_id);
        }
        Ok(())
    }

    async fn attempt(&self, mv: &ValidatedMove, sort_field: &SortField) -> TreeResult<Committed> {
        let node = self
            .store
            .node(&mv.node)
            .await?
            .ok_or_else(|| TreeError::NotFound(mv.node.clone()))?;
        let none = HashSet::new();
        let mut batch = OrderingBatch::new(sort_field.clone());
        let mut affected = BTreeSet::from([mv.node.clone()]);

        let target = self.store.children(&mv.parent, &none, sort_field).await?;
        batch.guard(target.guard());
        let siblings: Vec<&TreeNode> = target.nodes.iter().filter(|n| n.id != mv.node).collect();
        let plan = plan_ordering(siblings.iter().map(|n| &n.id), mv.position);
        queue_changed(&mut batch, &mut affected, &siblings, plan.keys, sort_field);

        let reparent = node.parent_id() != Some(&mv.parent);
        if reparent {
            self.ensure_not_below_itself(mv).await?;
            batch.write_parent(mv.node.clone(), mv.parent.clone());
            if let Some(source_parent) = node.parent_id() {
                let source = self.store.children(source_parent, &none, sort_field).await?;
                batch.guard(source.guard());
                let remaining: Vec<&TreeNode> =
                    source.nodes.iter().filter(|n| n.id != mv.node).collect();
                let keys = compact(remaining.iter().map(|n| &n.id));
                queue_changed(&mut batch, &mut affected, &remaining, keys, sort_field);
            }
        }
        if reparent || node.sort_key(sort_field) != plan.moved_key {
            batch.write_sort_key(mv.node.clone(), plan.moved_key);
        }

        if batch.is_empty() {
            tracing::debug!(node = %mv.node, "move leaves ordering unchanged");
            return Ok(Committed {
                affected,
                changed: false,
            });
        }

        tracing::debug!(node = %mv.node, writes = batch.len(), "committing ordering batch");
        self.store.commit(batch).await?;
        Ok(Committed {
            affected,
            changed: true,
        })
    }
}

fn queue_changed(
    batch: &mut OrderingBatch,
    affected: &mut BTreeSet<NodeId>,
    current: &[&TreeNode],
    keys: Vec<(NodeId, u32)>,
    sort_field: &SortField,
) {
    for (node, (id, key)) in current.iter().zip(keys) {
        if node.sort_key(sort_field) != key {
            affected.insert(id.clone());
            batch.write_sort_key(id, key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn ids(names: &[&str]) -> Vec<NodeId> {
        names.iter().map(|n| NodeId::from(*n)).collect()
    }

    #[test]
    fn position_zero_shifts_everything_up() {
        let siblings = ids(&["a", "b"]);
        let plan = plan_ordering(&siblings, 0);
        assert_eq!(plan.moved_key, 0);
        assert_eq!(plan.keys, vec![("a".into(), 1), ("b".into(), 2)]);
    }

    #[test]
    fn inner_position_skips_its_slot() {
        let siblings = ids(&["b", "c"]);
        let plan = plan_ordering(&siblings, 1);
        assert_eq!(plan.moved_key, 1);
        assert_eq!(plan.keys, vec![("b".into(), 0), ("c".into(), 2)]);
    }

    #[test]
    fn position_past_end_is_clamped() {
        let siblings = ids(&["a", "b"]);
        let plan = plan_ordering(&siblings, 10);
        assert_eq!(plan.moved_key, 2);
        assert_eq!(plan.keys, vec![("a".into(), 0), ("b".into(), 1)]);
    }

    #[test]
    fn empty_group_takes_key_zero() {
        let plan = plan_ordering(&[], 3);
        assert_eq!(plan.moved_key, 0);
        assert!(plan.keys.is_empty());
    }

    #[test]
    fn validate_rejects_sentinel_and_bad_position() {
        let sentinel = MoveRequest::from_raw(Some("undefined"), Some("p"), Some("0"));
        assert!(sentinel.validate().unwrap_err().is_no_op());

        let missing = MoveRequest::from_raw(Some("a"), None, Some("0"));
        assert!(matches!(missing.validate(), Err(TreeError::InvalidInput(_))));

        let negative = MoveRequest::from_raw(Some("a"), Some("p"), Some("-1"));
        assert!(matches!(negative.validate(), Err(TreeError::InvalidInput(_))));

        let ok = MoveRequest::from_raw(Some(" a "), Some("p"), Some("2")).validate().unwrap();
        assert_eq!(ok.node, NodeId::from("a"));
        assert_eq!(ok.position, 2);
    }

    proptest! {
        #[test]
        fn plan_is_a_permutation_of_group_keys(n in 0usize..20, position in 0u32..30) {
            let siblings: Vec<NodeId> = (0..n).map(|i| NodeId::from(format!("n{i}"))).collect();
            let plan = plan_ordering(&siblings, position);
            let mut keys: Vec<u32> = plan.keys.iter().map(|(_, k)| *k).collect();
            keys.push(plan.moved_key);
            keys.sort_unstable();
            let expected: Vec<u32> = (0..=to_key(n)).collect();
            prop_assert_eq!(keys, expected);
        }
    }
}
