//! Per-parent move serialization
//!
//! Moves touching the same sibling group queue behind one async mutex per
//! parent id, so in-process writers rarely reach the store's optimistic
//! conflict path. Locks are taken in sorted parent order to avoid deadlock
//! when a reparent holds both the source and the target group.
//!
//! Parent links are additionally covered by a tree-wide structure lock:
//! reorders inside one group share it, reparents hold it exclusively. A
//! reparent's ancestor walk therefore sees links no other move can change
//! until it commits.

use dashmap::DashMap;
use navtree_model::NodeId;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// How a move holds the structure lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Reorder within the current parent; parent links stay untouched
    Reorder,
    /// Parent link changes
    Reparent,
}

/// Registry of sibling-group locks
#[derive(Debug, Default)]
pub struct SiblingLocks {
    structure: Arc<RwLock<()>>,
    groups: DashMap<NodeId, Arc<Mutex<()>>>,
}

#[derive(Debug)]
enum StructureGuard {
    Shared(OwnedRwLockReadGuard<()>),
    Exclusive(OwnedRwLockWriteGuard<()>),
}

/// Held locks for one move, released on drop
#[derive(Debug)]
pub struct GroupLocks {
    parents: Vec<NodeId>,
    _guards: Vec<OwnedMutexGuard<()>>,
    structure: StructureGuard,
}

impl GroupLocks {
    /// Parents held, in acquisition order
    #[must_use]
    pub fn parents(&self) -> &[NodeId] {
        &self.parents
    }

    /// Mode the structure lock is held in
    #[must_use]
    pub fn mode(&self) -> LockMode {
        match self.structure {
            StructureGuard::Shared(_) => LockMode::Reorder,
            StructureGuard::Exclusive(_) => LockMode::Reparent,
        }
    }
}

impl SiblingLocks {
    /// Create empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the structure lock in `mode`, then the locks of every listed parent
    pub async fn acquire(&self, parents: &[&NodeId], mode: LockMode) -> GroupLocks {
        let structure = match mode {
            LockMode::Reorder => StructureGuard::Shared(self.structure.clone().read_owned().await),
            LockMode::Reparent => StructureGuard::Exclusive(self.structure.clone().write_owned().await),
        };

        let mut sorted: Vec<NodeId> = parents.iter().map(|p| (*p).clone()).collect();
        sorted.sort();
        sorted.dedup();

        let mut guards = Vec::with_capacity(sorted.len());
        for parent in &sorted {
            let lock = self
                .groups
                .entry(parent.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone();
            guards.push(lock.lock_owned().await);
        }
        GroupLocks {
            parents: sorted,
            _guards: guards,
            structure,
        }
    }

    /// Number of parents seen so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// No parent locked yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}
