//! Serializable tree snapshots
//!
//! Snapshots are the fixture and CLI exchange format: a root id, the portal
//! list and a flat node list linked by parent ids.

use crate::error::SnapshotError;
use navtree_model::{NodeId, Portal, TreeNode};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Flat, serializable content of a tree store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    /// Root sentinel id
    pub root_id: NodeId,
    /// Known portals
    #[serde(default)]
    pub portals: Vec<Portal>,
    /// Every node except the root sentinel
    #[serde(default)]
    pub nodes: Vec<TreeNode>,
}

impl TreeSnapshot {
    /// Parse YAML and validate
    ///
    /// # Errors
    /// Returns error on malformed YAML or a structurally invalid tree.
    pub fn from_yaml_str(s: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_yaml::from_str(s)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Parse JSON and validate
    ///
    /// # Errors
    /// Returns error on malformed JSON or a structurally invalid tree.
    pub fn from_json_str(s: &str) -> Result<Self, SnapshotError> {
        let snapshot: Self = serde_json::from_str(s)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SnapshotError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| SnapshotError::io_error(path, e))?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&raw),
            _ => Self::from_yaml_str(&raw),
        }
    }

    /// Write as YAML, or JSON when the extension is `.json`
    ///
    /// # Errors
    /// Returns error if serialization or the write fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), SnapshotError> {
        let path = path.as_ref();
        let out = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::to_string_pretty(self)?,
            _ => serde_yaml::to_string(self)?,
        };
        std::fs::write(path, out).map_err(|e| SnapshotError::io_error(path, e))
    }

    /// Check unique ids, known parents and acyclic parent links
    ///
    /// # Errors
    /// Returns [`SnapshotError::Invalid`] describing the first violation.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let mut parents: HashMap<&NodeId, &NodeId> = HashMap::new();
        for node in &self.nodes {
            if node.id == self.root_id {
                return Err(SnapshotError::Invalid(format!(
                    "root sentinel {} listed as a node",
                    self.root_id
                )));
            }
            let parent = node.parent_id().ok_or_else(|| {
                SnapshotError::Invalid(format!("node {} has no parent", node.id))
            })?;
            if parents.insert(&node.id, parent).is_some() {
                return Err(SnapshotError::Invalid(format!("duplicate node id {}", node.id)));
            }
        }

        for node in &self.nodes {
            let mut seen = HashSet::new();
            let mut current = &node.id;
            while let Some(&parent) = parents.get(current) {
                if !seen.insert(parent) {
                    return Err(SnapshotError::Invalid(format!(
                        "cycle through node {}",
                        node.id
                    )));
                }
                current = parent;
            }
            if current != &self.root_id {
                return Err(SnapshotError::Invalid(format!(
                    "node {} is not connected to root {} (stops at {current})",
                    node.id, self.root_id
                )));
            }
        }
        Ok(())
    }
}
