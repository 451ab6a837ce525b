//! Post-commit maintenance of derived structure
//!
//! Runs after a committed move or before a subtree delete:
//! - structural cache invalidation
//! - path cache regeneration or purge
//! - nested-set rebuild
//! - recovery log append
//! - change event publication
//!
//! Failures never undo the committed ordering. They are logged and reported
//! as pending so the recovery log can be replayed.

use crate::cache::StructuralCache;
use crate::config::NavTreeConfig;
use crate::nested_set::NestedSetMaintainer;
use crate::notify::{ChangeKind, ChangeNotifier, StructuralChangeEvent};
use crate::path_cache::PathCacheMaintainer;
use crate::recovery::{RecoveryLog, ReplayCommand};
use navtree_model::{NodeId, SortField};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Derived-structure upkeep shared by move and delete
#[derive(Clone)]
pub struct StructuralMaintenance {
    cache: Arc<dyn StructuralCache>,
    paths: PathCacheMaintainer,
    nested_set: NestedSetMaintainer,
    recovery: Arc<dyn RecoveryLog>,
    notifier: Arc<dyn ChangeNotifier>,
    config: Arc<NavTreeConfig>,
}

impl std::fmt::Debug for StructuralMaintenance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StructuralMaintenance")
            .field("paths", &self.paths)
            .field("nested_set", &self.nested_set)
            .finish_non_exhaustive()
    }
}

impl StructuralMaintenance {
    /// Create maintenance pipeline
    #[must_use]
    pub fn new(
        cache: Arc<dyn StructuralCache>,
        paths: PathCacheMaintainer,
        nested_set: NestedSetMaintainer,
        recovery: Arc<dyn RecoveryLog>,
        notifier: Arc<dyn ChangeNotifier>,
        config: Arc<NavTreeConfig>,
    ) -> Self {
        Self {
            cache,
            paths,
            nested_set,
            recovery,
            notifier,
            config,
        }
    }

    /// Command that rebuilds the nested set of the configured tree table
    #[must_use]
    pub fn rebuild_command(&self) -> ReplayCommand {
        ReplayCommand::RebuildNestedSet {
            table: self.config.tree_table.clone(),
            parent_field: self.config.parent_field.clone(),
            sort_field: SortField::Base.column_name(),
        }
    }

    /// Maintenance after a committed move
    ///
    /// Returns `true` if some step failed and replay is pending.
    pub async fn after_move(&self, moved: &NodeId, affected: &BTreeSet<NodeId>) -> bool {
        let mut pending = false;

        self.cache
            .invalidate_by_table_and_id(&self.config.tree_table, Some(moved.as_str()))
            .await;

        if let Err(e) = self.paths.regenerate_subtree(moved).await {
            tracing::error!(node = %moved, error = %e, "path cache regeneration failed");
            pending = true;
            self.record(
                &format!("regenerate paths below {moved}"),
                ReplayCommand::RegeneratePaths { from: moved.clone() },
            );
        }

        if let Err(e) = self.nested_set.rebuild(&self.config.root_id).await {
            tracing::error!(error = %e, "nested set rebuild failed");
            pending = true;
        }

        if !self.record(&format!("move of {moved}"), self.rebuild_command()) {
            pending = true;
        }

        self.notifier
            .publish(StructuralChangeEvent::new(ChangeKind::Moved, affected.clone()));
        pending
    }

    /// Cleanup for a subtree about to be deleted
    ///
    /// Returns `true` if some step failed and replay is pending.
    pub async fn before_delete(&self, subtree: &[NodeId]) -> bool {
        let mut pending = false;

        for id in subtree {
            self.cache
                .invalidate_by_table_and_id(&self.config.tree_table, Some(id.as_str()))
                .await;
        }
        self.cache
            .invalidate_by_table_and_id(&self.config.tree_node_table, None)
            .await;

        if let Err(e) = self.paths.purge(subtree).await {
            tracing::error!(error = %e, "path cache purge failed");
            pending = true;
        }

        let root = subtree.first().map_or_else(String::new, ToString::to_string);
        if !self.record(&format!("delete of {root}"), self.rebuild_command()) {
            pending = true;
        }

        self.notifier.publish(StructuralChangeEvent::new(
            ChangeKind::Deleted,
            subtree.iter().cloned().collect(),
        ));
        pending
    }

    fn record(&self, description: &str, command: ReplayCommand) -> bool {
        match self.recovery.append(description, command) {
            Ok(_) => true,
            Err(e) => {
                tracing::error!(error = %e, description, "recovery log append failed");
                false
            }
        }
    }
}
