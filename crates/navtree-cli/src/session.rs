//! Snapshot-backed engine session
//!
//! Loads a tree snapshot, optional configuration and optional recovery log,
//! wires a [`NavigationTree`] over them and writes changed state back.

use anyhow::{Context, Result};
use navtree_core::{MemoryRecoveryLog, NavTreeConfig, NavigationTree};
use navtree_model::AccessContext;
use navtree_store::{MemoryTreeStore, TreeSnapshot};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Paths a session reads from and writes to
#[derive(Debug, Clone)]
pub(crate) struct SessionPaths {
    pub(crate) snapshot: PathBuf,
    pub(crate) config: Option<PathBuf>,
    pub(crate) recovery_log: Option<PathBuf>,
}

/// Loaded engine plus its backing state
pub(crate) struct Session {
    paths: SessionPaths,
    pub(crate) store: Arc<MemoryTreeStore>,
    pub(crate) log: Arc<MemoryRecoveryLog>,
    pub(crate) tree: NavigationTree,
}

impl Session {
    pub(crate) fn open(paths: SessionPaths) -> Result<Self> {
        let config = match &paths.config {
            Some(path) => NavTreeConfig::load(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => NavTreeConfig::default(),
        };

        let snapshot = TreeSnapshot::load(&paths.snapshot)
            .with_context(|| format!("loading snapshot {}", paths.snapshot.display()))?;
        anyhow::ensure!(
            snapshot.root_id == config.root_id,
            "snapshot root {} does not match configured root {}",
            snapshot.root_id,
            config.root_id
        );
        let store = Arc::new(MemoryTreeStore::from_snapshot(snapshot));

        let log = Arc::new(match &paths.recovery_log {
            Some(path) if path.exists() => load_log(path)?,
            _ => MemoryRecoveryLog::new(),
        });

        let tree = NavigationTree::builder(store.clone(), store.clone())
            .config(config)
            .recovery_log(log.clone())
            .build()?;

        tracing::debug!(snapshot = %paths.snapshot.display(), nodes = store.len(), "session opened");
        Ok(Self {
            paths,
            store,
            log,
            tree,
        })
    }

    /// Access context for `user`, allowed every portal unless `portals` is given
    pub(crate) fn access(&self, user: &str, portals: Option<&str>) -> AccessContext {
        let access = AccessContext::new(user);
        match portals {
            Some(list) => access.allow_all(list.split(',').map(str::trim).filter(|p| !p.is_empty())),
            None => access.allow_all(self.store.snapshot().portals.into_iter().map(|p| p.id)),
        }
    }

    /// Write the snapshot and recovery log back
    pub(crate) fn save(&self) -> Result<()> {
        self.store
            .snapshot()
            .save(&self.paths.snapshot)
            .with_context(|| format!("writing snapshot {}", self.paths.snapshot.display()))?;
        if let Some(path) = &self.paths.recovery_log {
            let lines = self.log.to_json_lines()?;
            std::fs::write(path, lines).with_context(|| format!("writing recovery log {}", path.display()))?;
        }
        Ok(())
    }
}

pub(crate) fn load_log(path: &Path) -> Result<MemoryRecoveryLog> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading recovery log {}", path.display()))?;
    MemoryRecoveryLog::from_json_lines(&raw).with_context(|| format!("parsing recovery log {}", path.display()))
}
