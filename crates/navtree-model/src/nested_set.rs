//! Nested set range encoding

use crate::error::ModelError;
use serde::{Deserialize, Serialize};

/// Left/right bounds of a node in a nested set encoding
///
/// A node `d` is a descendant of `a` iff `a.left < d.left && d.right < a.right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NestedSetBounds {
    /// Left bound
    pub left: u32,
    /// Right bound
    pub right: u32,
}

impl NestedSetBounds {
    /// Create bounds without validation
    #[inline]
    #[must_use]
    pub const fn new(left: u32, right: u32) -> Self {
        Self { left, right }
    }

    /// Create bounds, rejecting inverted ranges
    ///
    /// # Errors
    /// Returns [`ModelError::InvalidBounds`] when `right <= left`.
    pub fn checked(left: u32, right: u32) -> Result<Self, ModelError> {
        if right <= left {
            return Err(ModelError::InvalidBounds { left, right });
        }
        Ok(Self { left, right })
    }

    /// Whether `other` lies strictly inside this range
    #[inline]
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.left < other.left && other.right < self.right
    }

    /// Number of descendants encoded by the range
    #[inline]
    #[must_use]
    pub fn descendant_count(&self) -> u32 {
        (self.right - self.left - 1) / 2
    }

    /// Leaf nodes have adjacent bounds
    #[inline]
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.right == self.left + 1
    }
}
