//! Error types for store access

use navtree_model::NodeId;
use std::path::PathBuf;

/// Errors raised by a [`TreeStore`](crate::TreeStore)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Store cannot be reached
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Sibling group changed since it was read (optimistic concurrency failure)
    #[error("sibling group under {parent} changed: expected version {expected}, found {actual}")]
    Conflict {
        parent: NodeId,
        expected: u64,
        actual: u64,
    },

    /// Referenced node does not exist
    #[error("node not found: {0}")]
    NotFound(NodeId),

    /// Transaction was aborted before commit
    #[error("transaction aborted: {0}")]
    TransactionAborted(String),
}

impl StoreError {
    /// Create conflict error
    pub fn conflict(parent: impl Into<NodeId>, expected: u64, actual: u64) -> Self {
        Self::Conflict {
            parent: parent.into(),
            expected,
            actual,
        }
    }

    /// Check if error is an optimistic concurrency conflict
    #[inline]
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Errors loading or saving a [`TreeSnapshot`](crate::TreeSnapshot)
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// IO error reading or writing the snapshot file
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML syntax or shape error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON syntax or shape error
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Snapshot content violates a tree invariant
    #[error("invalid snapshot: {0}")]
    Invalid(String),
}

impl SnapshotError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_display() {
        let err = StoreError::conflict("12", 3, 4);
        assert_eq!(
            err.to_string(),
            "sibling group under 12 changed: expected version 3, found 4"
        );
        assert!(err.is_conflict());
        assert!(!StoreError::Unavailable("down".into()).is_conflict());
    }
}
