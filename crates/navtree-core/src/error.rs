//! Error types for the tree engine
//!
//! Provides error handling for:
//! - Input validation (missing ids, drag-and-drop sentinel)
//! - Store failures and ordering conflicts
//! - Portal permission checks
//! - Configuration loading

use navtree_model::{ModelError, NodeId};
use navtree_store::StoreError;
use std::path::PathBuf;

/// Main engine error type
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// Missing, empty or sentinel request parameters
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Referenced node or parent does not exist
    #[error("node not found: {0}")]
    NotFound(NodeId),

    /// Concurrent reorder of the same sibling group won the commit
    #[error("ordering conflict under {parent} after {attempts} attempt(s)")]
    OrderingConflict { parent: NodeId, attempts: u32 },

    /// Store unavailable or transaction aborted
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    /// Node lies in a portal the acting user may not view
    #[error("permission denied for node {node}")]
    PermissionDenied { node: NodeId },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl TreeError {
    /// Create invalid input error
    #[inline]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Check if error is retryable against refreshed state
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::OrderingConflict { .. } | Self::Storage(StoreError::Conflict { .. })
        )
    }

    /// Check if the request was rejected before touching the store
    #[inline]
    #[must_use]
    pub fn is_no_op(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::PermissionDenied { .. })
    }
}

impl From<ModelError> for TreeError {
    fn from(value: ModelError) -> Self {
        Self::InvalidInput(value.to_string())
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading config file
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or shape error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Inconsistent values
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

impl ConfigError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for engine operations
pub type TreeResult<T> = Result<T, TreeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_error_becomes_invalid_input() {
        let err: TreeError = ModelError::MissingId("nodeID").into();
        assert!(err.is_no_op());
        assert_eq!(err.to_string(), "invalid input: missing identifier for nodeID");
    }

    #[test]
    fn conflicts_are_retryable() {
        let err: TreeError = StoreError::conflict("p", 1, 2).into();
        assert!(err.is_retryable());
        assert!(!TreeError::NotFound("x".into()).is_retryable());
    }

    #[test]
    fn conflict_display() {
        let err = TreeError::OrderingConflict {
            parent: "p".into(),
            attempts: 2,
        };
        assert_eq!(err.to_string(), "ordering conflict under p after 2 attempt(s)");
    }
}
