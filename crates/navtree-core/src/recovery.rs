//! Recovery log
//!
//! Every structural change appends a replayable maintenance command, so a
//! crash between the ordering commit and derived-data maintenance can be
//! repaired by replaying the log. The in-memory log hash-chains entries:
//!
//! ```text
//! entry[n].prev_hash == entry[n-1].hash
//! entry[n].hash      == sha256(id, timestamp, description, command, prev_hash)
//! ```

use crate::error::TreeResult;
use crate::nested_set::NestedSetMaintainer;
use crate::path_cache::PathCacheMaintainer;
use chrono::{DateTime, Utc};
use navtree_model::NodeId;
use navtree_store::TreeStore;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

/// Maintenance command executable against a store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum ReplayCommand {
    /// Recompute nested-set bounds of a tree table
    RebuildNestedSet {
        table: String,
        parent_field: String,
        sort_field: String,
    },
    /// Recompute cached paths below a node
    RegeneratePaths { from: NodeId },
}

impl ReplayCommand {
    /// Execute against `store`, rooted at `root`
    ///
    /// Returns the number of nodes touched.
    ///
    /// # Errors
    /// Returns error if the underlying maintenance fails.
    pub async fn replay(&self, store: Arc<dyn TreeStore>, root: &NodeId) -> TreeResult<usize> {
        match self {
            Self::RebuildNestedSet { table, .. } => {
                tracing::info!(table = %table, "replaying nested set rebuild");
                NestedSetMaintainer::new(store).rebuild(root).await
            }
            Self::RegeneratePaths { from } => {
                tracing::info!(from = %from, "replaying path regeneration");
                PathCacheMaintainer::new(store).regenerate_subtree(from).await
            }
        }
    }
}

/// One hash-chained log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryEntry {
    /// Entry id
    pub id: Uuid,
    /// Append time
    pub recorded_at: DateTime<Utc>,
    /// Human readable reason
    pub description: String,
    /// Command to replay
    pub command: ReplayCommand,
    /// Hash of the previous entry, hex
    pub prev_hash: String,
    /// Hash of this entry, hex
    pub hash: String,
}

/// Recovery log errors
#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    /// An entry's hash or back link does not match
    #[error("recovery log integrity violation at entry {index}")]
    IntegrityViolation { index: usize },

    /// Entry could not be serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Append-only sink for replay commands
pub trait RecoveryLog: Send + Sync {
    /// Append a command
    ///
    /// # Errors
    /// Returns error if the entry cannot be recorded.
    fn append(&self, description: &str, command: ReplayCommand) -> Result<Uuid, RecoveryError>;
}

const GENESIS: [u8; 32] = [0u8; 32];

/// Hash-chained in-memory recovery log
#[derive(Debug, Default)]
pub struct MemoryRecoveryLog {
    entries: Mutex<Vec<RecoveryEntry>>,
}

impl MemoryRecoveryLog {
    /// Create empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from JSON lines
    ///
    /// # Errors
    /// Returns error on malformed lines or a broken chain.
    pub fn from_json_lines(raw: &str) -> Result<Self, RecoveryError> {
        let entries = raw
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(serde_json::from_str)
            .collect::<Result<Vec<RecoveryEntry>, _>>()?;
        let log = Self {
            entries: Mutex::new(entries),
        };
        log.verify_integrity()?;
        Ok(log)
    }

    /// All entries in append order
    #[must_use]
    pub fn entries(&self) -> Vec<RecoveryEntry> {
        self.entries.lock().clone()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// No entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Check every hash and back link
    ///
    /// # Errors
    /// Returns [`RecoveryError::IntegrityViolation`] naming the first bad entry.
    pub fn verify_integrity(&self) -> Result<(), RecoveryError> {
        let entries = self.entries.lock();
        let mut prev = hex::encode(GENESIS);
        for (index, entry) in entries.iter().enumerate() {
            if entry.prev_hash != prev {
                return Err(RecoveryError::IntegrityViolation { index });
            }
            if entry.hash != compute_hash(entry)? {
                return Err(RecoveryError::IntegrityViolation { index });
            }
            prev = entry.hash.clone();
        }
        Ok(())
    }

    /// Export as JSON lines
    ///
    /// # Errors
    /// Returns error if an entry cannot be serialized.
    pub fn to_json_lines(&self) -> Result<String, RecoveryError> {
        let mut out = String::new();
        for entry in self.entries.lock().iter() {
            out.push_str(&serde_json::to_string(entry)?);
            out.push('\n');
        }
        Ok(out)
    }
}

impl RecoveryLog for MemoryRecoveryLog {
    fn append(&self, description: &str, command: ReplayCommand) -> Result<Uuid, RecoveryError> {
        let mut entries = self.entries.lock();
        let prev_hash = entries
            .last()
            .map_or_else(|| hex::encode(GENESIS), |e| e.hash.clone());
        let mut entry = RecoveryEntry {
            id: Uuid::new_v4(),
            recorded_at: Utc::now(),
            description: description.to_string(),
            command,
            prev_hash,
            hash: String::new(),
        };
        entry.hash = compute_hash(&entry)?;
        let id = entry.id;
        tracing::debug!(entry = %id, description, "appended recovery entry");
        entries.push(entry);
        Ok(id)
    }
}

fn compute_hash(entry: &RecoveryEntry) -> Result<String, RecoveryError> {
    let mut hasher = Sha256::new();
    hasher.update(entry.id.as_bytes());
    hasher.update(entry.recorded_at.to_rfc3339().as_bytes());
    hasher.update([0]);
    hasher.update(entry.description.as_bytes());
    hasher.update([0]);
    hasher.update(serde_json::to_vec(&entry.command)?);
    hasher.update([0]);
    hasher.update(entry.prev_hash.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}
