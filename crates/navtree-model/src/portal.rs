//! Portals, access context and client open state

use crate::id::{NodeId, PortalId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// A portal (site) rooted at a node of the navigation tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portal {
    /// Portal id
    pub id: PortalId,
    /// Root of the portal's navigation subtree
    #[serde(default)]
    pub main_node: Option<NodeId>,
    /// Additional navigation start nodes
    #[serde(default)]
    pub navigation_starts: Vec<NodeId>,
}

impl Portal {
    /// Create portal rooted at `main_node`
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<PortalId>, main_node: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            main_node: Some(main_node.into()),
            navigation_starts: Vec::new(),
        }
    }

    /// Add a navigation start node
    #[inline]
    #[must_use]
    pub fn with_navigation_start(mut self, node: impl Into<NodeId>) -> Self {
        self.navigation_starts.push(node.into());
        self
    }
}

/// The acting user and the portals they may view
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessContext {
    /// Acting user
    pub user_id: Option<UserId>,
    /// Portals the user may view; an empty set grants none
    #[serde(default)]
    pub allowed_portals: BTreeSet<PortalId>,
}

impl AccessContext {
    /// Access context for `user`
    #[inline]
    #[must_use]
    pub fn new(user: impl Into<UserId>) -> Self {
        Self {
            user_id: Some(user.into()),
            allowed_portals: BTreeSet::new(),
        }
    }

    /// Allow a portal
    #[inline]
    #[must_use]
    pub fn allow(mut self, portal: impl Into<PortalId>) -> Self {
        self.allowed_portals.insert(portal.into());
        self
    }

    /// Allow several portals
    #[must_use]
    pub fn allow_all<I, P>(mut self, portals: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PortalId>,
    {
        self.allowed_portals
            .extend(portals.into_iter().map(Into::into));
        self
    }

    /// Whether the user may view `portal`
    #[inline]
    #[must_use]
    pub fn may_view(&self, portal: &PortalId) -> bool {
        self.allowed_portals.contains(portal)
    }
}

/// Node ids the client reports as expanded
///
/// Advisory only: it widens eager rendering but never changes data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpenState(BTreeSet<NodeId>);

impl OpenState {
    /// Prefix the client puts in front of node ids in the tree-state cookie
    pub const COOKIE_PREFIX: &'static str = "node";

    /// Empty open state
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the comma separated tree-state cookie (`node12,node40`)
    ///
    /// Entries without the `node` prefix are taken as plain ids; blanks are
    /// skipped.
    #[must_use]
    pub fn from_cookie(value: &str) -> Self {
        let ids = value
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| NodeId::from(s.strip_prefix(Self::COOKIE_PREFIX).unwrap_or(s)))
            .filter(|id| !id.as_str().is_empty())
            .collect();
        Self(ids)
    }

    /// Mark a node open
    #[inline]
    #[must_use]
    pub fn with(mut self, id: impl Into<NodeId>) -> Self {
        self.0.insert(id.into());
        self
    }

    /// Whether `id` is open
    #[inline]
    #[must_use]
    pub fn is_open(&self, id: &NodeId) -> bool {
        self.0.contains(id)
    }

    /// Number of open nodes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// No node open
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<I: Into<NodeId>> FromIterator<I> for OpenState {
    fn from_iter<T: IntoIterator<Item = I>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}
