//! Cached ancestor chains
//!
//! Provides [`AncestorPath`], the denormalized list of ancestors stored per
//! node so breadcrumb and "is below" lookups need no recursive query.

use crate::error::ModelError;
use crate::id::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Ancestor chain of a node, ordered root first
///
/// The node itself is not part of its own path; the last segment is the
/// direct parent.
///
/// # Examples
/// - root `99`, parent `12` → `99/12`
/// - direct child of the root → `99`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AncestorPath(Vec<NodeId>);

impl AncestorPath {
    /// Create path from ancestor ids, root first
    #[inline]
    #[must_use]
    pub fn new(ancestors: Vec<NodeId>) -> Self {
        Self(ancestors)
    }

    /// Empty path (the root sentinel has no ancestors)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Ancestor ids
    #[inline]
    #[must_use]
    pub fn ancestors(&self) -> &[NodeId] {
        &self.0
    }

    /// Depth of the owning node (number of ancestors)
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.0.len()
    }

    /// Check if path is empty (root)
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Direct parent of the owning node
    #[inline]
    #[must_use]
    pub fn parent_id(&self) -> Option<&NodeId> {
        self.0.last()
    }

    /// Path of a child of the owning node `owner`
    #[inline]
    #[must_use]
    pub fn child(&self, owner: &NodeId) -> Self {
        let mut new = self.clone();
        new.0.push(owner.clone());
        new
    }

    /// Whether `id` is an ancestor
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &NodeId) -> bool {
        self.0.contains(id)
    }

    /// Check if this path is a prefix of another
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        if self.0.len() > other.0.len() {
            return false;
        }
        self.0 == other.0[..self.0.len()]
    }

    /// Get relative path from ancestor
    ///
    /// # Errors
    /// Returns error if `self` does not start with `ancestor`
    pub fn relative_to(&self, ancestor: &Self) -> Result<Self, ModelError> {
        if !ancestor.is_prefix_of(self) {
            return Err(ModelError::NotDescendant {
                path: self.to_string(),
                ancestor: ancestor.to_string(),
            });
        }
        Ok(Self(self.0[ancestor.0.len()..].to_vec()))
    }

    /// Iterator over ancestors, root first
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &NodeId> {
        self.0.iter()
    }
}

impl Display for AncestorPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let joined: Vec<&str> = self.0.iter().map(NodeId::as_str).collect();
        write!(f, "{}", joined.join("/"))
    }
}

impl FromStr for AncestorPath {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Ok(Self::root());
        }

        let ids = s
            .split('/')
            .map(|seg| {
                if seg.is_empty() {
                    Err(ModelError::EmptySegment)
                } else {
                    Ok(NodeId::from(seg))
                }
            })
            .collect::<Result<_, _>>()?;

        Ok(Self(ids))
    }
}

impl From<Vec<NodeId>> for AncestorPath {
    fn from(ancestors: Vec<NodeId>) -> Self {
        Self(ancestors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> AncestorPath {
        s.parse().unwrap()
    }

    #[test]
    fn path_root() {
        let root = AncestorPath::root();
        assert!(root.is_empty());
        assert_eq!(root.depth(), 0);
        assert!(root.parent_id().is_none());
    }

    #[test]
    fn path_child_appends_owner() {
        let p = path("99/3");
        let child = p.child(&NodeId::from("7"));
        assert_eq!(child.to_string(), "99/3/7");
        assert_eq!(child.parent_id(), Some(&NodeId::from("7")));
    }

    #[test]
    fn path_prefix_and_relative() {
        let a = path("99/3");
        let b = path("99/3/7/8");
        assert!(a.is_prefix_of(&b));
        assert!(!b.is_prefix_of(&a));
        assert_eq!(b.relative_to(&a).unwrap().to_string(), "7/8");
        assert!(matches!(
            a.relative_to(&path("1")),
            Err(ModelError::NotDescendant { .. })
        ));
    }

    #[test]
    fn path_from_str_empty_segment() {
        let result: Result<AncestorPath, _> = "99//3".parse();
        assert_eq!(result, Err(ModelError::EmptySegment));
    }

    #[test]
    fn path_serializes_as_list() {
        let json = serde_json::to_string(&path("99/3")).unwrap();
        assert_eq!(json, r#"["99","3"]"#);
    }
}
