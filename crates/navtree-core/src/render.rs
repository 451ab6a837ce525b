//! Tree rendering
//!
//! Produces a structural [`RenderResult`] for a navigation tree: decorated
//! nodes, expanded eagerly near the root or where the client reports them
//! open, and replaced by [`LazyPlaceholder`]s past a portal-count dependent
//! depth. Turning the result into markup is the presentation layer's job.
//!
//! # Expansion policy
//!
//! ```text
//! depth 0..=eager_depth      open, children rendered
//! open_state contains node   open, children rendered
//! depth + 1 >= cutoff        children replaced by a placeholder (if allow_ajax)
//! otherwise                  children rendered, node closed
//! ```

use crate::access::{AccessFilter, AccessScope};
use crate::config::{NavTreeConfig, PermissionPolicy};
use crate::error::{TreeError, TreeResult};
use futures::future::{BoxFuture, FutureExt};
use navtree_model::{AccessContext, ExternalId, LocaleId, NodeId, OpenState, PageId, SortField, TreeNode};
use navtree_store::{SchemaIntrospector, TreeStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Icon-like markers attached to a rendered node, in display order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Indicator {
    /// Node is hidden, or shows an extranet page it does not permit
    Hidden,
    /// Node links to an external URL
    ExternalLink { url: String },
    /// A connected page is extranet-restricted
    Lock,
}

/// Boolean classification of a rendered node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeFlags {
    /// The selected page is connected to this node
    pub active_connected: bool,
    /// Pages other than the selected one are connected
    pub other_connected: bool,
    /// Portal root or navigation start: restricted context menu
    pub restricted: bool,
    /// Name is untranslated in the active locale
    pub translation_fallback: bool,
}

/// Context needed to fetch an unexpanded subtree later
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LazyPlaceholder {
    /// Node whose children were not rendered
    pub parent_id: NodeId,
    /// Tree table the follow-up request targets
    pub tree_table: String,
    /// Selected page to carry into the follow-up request
    pub selected_page: Option<PageId>,
}

/// Children of a rendered node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "nodes", rename_all = "snake_case")]
pub enum Children {
    /// No children (or they could not be fetched)
    Leaf,
    /// Children rendered inline
    Expanded(Vec<RenderedNode>),
    /// Children deferred to a subtree request
    Lazy(LazyPlaceholder),
}

/// A decorated node in a render result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedNode {
    /// Node id
    pub id: NodeId,
    /// External id for client-side addressing
    pub external_id: Option<ExternalId>,
    /// Display name
    pub name: String,
    /// Depth relative to the render entry point
    pub depth: usize,
    /// Entry node of a full render
    pub is_root: bool,
    /// Rendered in open state
    pub open: bool,
    /// Classification flags
    pub flags: NodeFlags,
    /// Markers in display order
    pub indicators: Vec<Indicator>,
    /// Primary connected page
    pub primary_page: Option<PageId>,
    /// Children
    pub children: Children,
}

impl RenderedNode {
    /// Rendered child nodes, empty for leaves and placeholders
    #[must_use]
    pub fn expanded_children(&self) -> &[RenderedNode] {
        match &self.children {
            Children::Expanded(nodes) => nodes,
            Children::Leaf | Children::Lazy(_) => &[],
        }
    }

    /// Placeholder, if the children were deferred
    #[must_use]
    pub fn placeholder(&self) -> Option<&LazyPlaceholder> {
        match &self.children {
            Children::Lazy(p) => Some(p),
            _ => None,
        }
    }

    /// Whether `indicator` is present
    #[must_use]
    pub fn has_indicator(&self, indicator: &Indicator) -> bool {
        self.indicators.contains(indicator)
    }

    /// Number of `indicator` occurrences
    #[must_use]
    pub fn count_indicator(&self, indicator: &Indicator) -> usize {
        self.indicators.iter().filter(|i| *i == indicator).count()
    }
}

/// Structural result of a render pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderResult {
    /// Top-level nodes: the root for a full render, the children for a subtree
    pub nodes: Vec<RenderedNode>,
    /// Number of rendered nodes
    pub node_count: usize,
    /// A child fetch failed and some subtrees are missing
    pub incomplete: bool,
}

impl RenderResult {
    /// Ids in depth-first pre-order
    #[must_use]
    pub fn ids(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.node_count);
        let mut stack: Vec<&RenderedNode> = self.nodes.iter().rev().collect();
        while let Some(node) = stack.pop() {
            out.push(node.id.clone());
            stack.extend(node.expanded_children().iter().rev());
        }
        out
    }

    /// Find a rendered node by id
    #[must_use]
    pub fn find(&self, id: &NodeId) -> Option<&RenderedNode> {
        let mut stack: Vec<&RenderedNode> = self.nodes.iter().collect();
        while let Some(node) = stack.pop() {
            if &node.id == id {
                return Some(node);
            }
            stack.extend(node.expanded_children());
        }
        None
    }

    /// All placeholders in the result
    #[must_use]
    pub fn placeholders(&self) -> Vec<&LazyPlaceholder> {
        let mut out = Vec::new();
        let mut stack: Vec<&RenderedNode> = self.nodes.iter().collect();
        while let Some(node) = stack.pop() {
            if let Some(p) = node.placeholder() {
                out.push(p);
            }
            stack.extend(node.expanded_children());
        }
        out
    }
}

/// Parameters of a full render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    /// Entry node
    pub root_id: NodeId,
    /// Allow lazy placeholders
    pub allow_ajax: bool,
    /// Client expansion hints
    pub open_state: OpenState,
    /// Acting user
    pub access: AccessContext,
    /// Page currently edited, for connected-page classification
    pub selected_page: Option<PageId>,
}

impl RenderRequest {
    /// Request rendering from `root_id` with placeholders allowed
    #[must_use]
    pub fn new(root_id: impl Into<NodeId>, access: AccessContext) -> Self {
        Self {
            root_id: root_id.into(),
            allow_ajax: true,
            open_state: OpenState::new(),
            access,
            selected_page: None,
        }
    }

    /// With client open state
    #[inline]
    #[must_use]
    pub fn with_open_state(mut self, open_state: OpenState) -> Self {
        self.open_state = open_state;
        self
    }

    /// With selected page
    #[inline]
    #[must_use]
    pub fn with_selected_page(mut self, page: impl Into<PageId>) -> Self {
        self.selected_page = Some(page.into());
        self
    }

    /// With placeholder policy
    #[inline]
    #[must_use]
    pub fn with_allow_ajax(mut self, allow: bool) -> Self {
        self.allow_ajax = allow;
        self
    }
}

/// Per-pass values computed once before recursion
struct RenderPass<'a> {
    scope: AccessScope,
    sort_field: SortField,
    active_locale: LocaleId,
    base_locale: Option<LocaleId>,
    open_state: &'a OpenState,
    selected: Option<&'a PageId>,
    cutoff: usize,
}

#[derive(Debug, Default)]
struct PassStats {
    nodes: usize,
    incomplete: bool,
}

/// Decorations computed for a single node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoration {
    /// Display name
    pub name: String,
    /// Classification flags
    pub flags: NodeFlags,
    /// Markers in display order
    pub indicators: Vec<Indicator>,
}

/// Decorate one node
///
/// Pure function of the node, the selection and the pass settings, kept
/// separate from traversal so the classification rules are testable alone.
#[must_use]
pub fn decorate(
    node: &TreeNode,
    selected: Option<&PageId>,
    restricted: bool,
    active_locale: &LocaleId,
    base_locale: Option<&LocaleId>,
    config: &NavTreeConfig,
) -> Decoration {
    let mut indicators = Vec::new();
    let mut flags = NodeFlags {
        restricted,
        ..NodeFlags::default()
    };

    if node.hidden {
        indicators.push(Indicator::Hidden);
    }
    if let Some(url) = node.link.as_ref().filter(|l| !l.is_empty()) {
        indicators.push(Indicator::ExternalLink { url: url.clone() });
    }

    if config.translation_fallback {
        if let Some(base) = base_locale {
            if base != active_locale && node.name.translated(active_locale).is_none() {
                flags.translation_fallback = true;
            }
        }
    }

    let mut found_secured = false;
    for page in &node.linked_pages {
        if !node.hidden && !found_secured && page.is_extranet_restricted && !node.show_extranet_pages {
            indicators.push(Indicator::Hidden);
            found_secured = true;
        }
        if page.is_extranet_restricted {
            indicators.push(Indicator::Lock);
        }
    }

    if !node.linked_pages.is_empty() {
        match selected {
            Some(sel) if node.linked_pages.iter().any(|p| &p.id == sel) => {
                flags.active_connected = true;
                flags.other_connected = node.linked_pages.iter().any(|p| &p.id != sel);
            }
            _ => flags.other_connected = true,
        }
    }

    let resolved = node.name.resolve(Some(active_locale));
    let name = if resolved.is_empty() {
        config.unnamed_label.clone()
    } else {
        resolved.to_string()
    };

    Decoration {
        name,
        flags,
        indicators,
    }
}

/// Recursive tree renderer
#[derive(Clone)]
pub struct TreeRenderer {
    store: Arc<dyn TreeStore>,
    access: AccessFilter,
    schema: Arc<dyn SchemaIntrospector>,
    config: Arc<NavTreeConfig>,
}

impl std::fmt::Debug for TreeRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeRenderer")
            .field("tree_table", &self.config.tree_table)
            .finish_non_exhaustive()
    }
}

impl TreeRenderer {
    /// Create renderer
    #[must_use]
    pub fn new(
        store: Arc<dyn TreeStore>,
        access: AccessFilter,
        schema: Arc<dyn SchemaIntrospector>,
        config: Arc<NavTreeConfig>,
    ) -> Self {
        Self {
            store,
            access,
            schema,
            config,
        }
    }

    /// Render the tree below `request.root_id`
    ///
    /// Excluded portal subtrees are dropped below the root only. Under
    /// [`PermissionPolicy::Unenforced`] a root inside an excluded portal still
    /// renders its descendants.
    ///
    /// # Errors
    /// - `TreeError::NotFound` if the root does not exist
    /// - `TreeError::PermissionDenied` if enforcement is on and the root lies in an excluded portal
    /// - `TreeError::Storage` if the portal list or root cannot be read
    pub async fn render(&self, request: &RenderRequest) -> TreeResult<RenderResult> {
        if request.root_id.as_str().is_empty() {
            return Err(TreeError::invalid_input("root id is empty"));
        }

        let scope = self.access.scope(&request.access).await?;
        if self.config.permission_policy == PermissionPolicy::Enforced
            && self
                .access
                .is_within_excluded_portal(&request.root_id, &scope)
                .await?
        {
            return Err(TreeError::PermissionDenied {
                node: request.root_id.clone(),
            });
        }

        let root = self
            .store
            .node(&request.root_id)
            .await?
            .ok_or_else(|| TreeError::NotFound(request.root_id.clone()))?;

        let pass = self.pass(scope, &request.open_state, request.selected_page.as_ref());
        let mut stats = PassStats::default();
        let node = self
            .render_node(&pass, &mut stats, root, 0, request.allow_ajax, true)
            .await;

        tracing::info!(
            root = %request.root_id,
            nodes = stats.nodes,
            incomplete = stats.incomplete,
            "rendered navigation tree"
        );

        Ok(RenderResult {
            nodes: vec![node],
            node_count: stats.nodes,
            incomplete: stats.incomplete,
        })
    }

    /// Render the children of `parent_id` to resolve a lazy placeholder
    ///
    /// Each child is an entry node at depth 0 with placeholders disabled for
    /// its own children; deeper levels follow the normal policy. As with
    /// [`Self::render`], the parent itself is only checked for portal
    /// exclusion under [`PermissionPolicy::Enforced`].
    ///
    /// # Errors
    /// - `TreeError::NotFound` if the parent does not exist
    /// - `TreeError::PermissionDenied` if enforcement is on and the parent lies in an excluded portal
    /// - `TreeError::Storage` if the first level cannot be read
    pub async fn render_subtree(
        &self,
        parent_id: &NodeId,
        access: &AccessContext,
        selected_page: Option<&PageId>,
    ) -> TreeResult<RenderResult> {
        if parent_id.as_str().is_empty() {
            return Err(TreeError::invalid_input("parent id is empty"));
        }
        if self.store.node(parent_id).await?.is_none() {
            return Err(TreeError::NotFound(parent_id.clone()));
        }

        let scope = self.access.scope(access).await?;
        if self.config.permission_policy == PermissionPolicy::Enforced
            && self.access.is_within_excluded_portal(parent_id, &scope).await?
        {
            return Err(TreeError::PermissionDenied {
                node: parent_id.clone(),
            });
        }
        let open_state = OpenState::new();
        let pass = self.pass(scope, &open_state, selected_page);

        let group = self
            .store
            .children(parent_id, pass.scope.excluded(), &pass.sort_field)
            .await?;

        let mut stats = PassStats::default();
        let mut nodes = Vec::with_capacity(group.len());
        for child in group.nodes {
            nodes.push(self.render_node(&pass, &mut stats, child, 0, false, false).await);
        }

        tracing::debug!(parent = %parent_id, nodes = stats.nodes, "rendered subtree");

        Ok(RenderResult {
            nodes,
            node_count: stats.nodes,
            incomplete: stats.incomplete,
        })
    }

    fn pass<'a>(
        &self,
        scope: AccessScope,
        open_state: &'a OpenState,
        selected: Option<&'a PageId>,
    ) -> RenderPass<'a> {
        let cutoff = self.config.lazy_cutoff_for(scope.portal_count());
        RenderPass {
            sort_field: self.schema.sort_field(&self.config.tree_table),
            active_locale: self.schema.active_locale(),
            base_locale: self.schema.base_locale(),
            scope,
            open_state,
            selected,
            cutoff,
        }
    }

    fn render_node<'a>(
        &'a self,
        pass: &'a RenderPass<'a>,
        stats: &'a mut PassStats,
        node: TreeNode,
        depth: usize,
        allow_ajax: bool,
        is_root: bool,
    ) -> BoxFuture<'a, RenderedNode> {
        async move {
            stats.nodes += 1;

            let decoration = decorate(
                &node,
                pass.selected,
                pass.scope.is_restricted(&node.id),
                &pass.active_locale,
                pass.base_locale.as_ref(),
                &self.config,
            );
            let open = depth <= self.config.eager_depth || pass.open_state.is_open(&node.id);

            let children = match self
                .store
                .children(&node.id, pass.scope.excluded(), &pass.sort_field)
                .await
            {
                Err(e) => {
                    tracing::warn!(node = %node.id, error = %e, "child fetch failed, rendering node as leaf");
                    stats.incomplete = true;
                    Children::Leaf
                }
                Ok(group) if group.is_empty() => Children::Leaf,
                Ok(_) if allow_ajax && !open && depth + 1 >= pass.cutoff => {
                    Children::Lazy(LazyPlaceholder {
                        parent_id: node.id.clone(),
                        tree_table: self.config.tree_table.clone(),
                        selected_page: pass.selected.cloned(),
                    })
                }
                Ok(group) => {
                    let mut rendered = Vec::with_capacity(group.len());
                    for child in group.nodes {
                        rendered.push(
                            self.render_node(pass, &mut *stats, child, depth + 1, true, false)
                                .await,
                        );
                    }
                    Children::Expanded(rendered)
                }
            };

            RenderedNode {
                primary_page: node.primary_page().cloned(),
                external_id: node.external_id,
                id: node.id,
                name: decoration.name,
                depth,
                is_root,
                open,
                flags: decoration.flags,
                indicators: decoration.indicators,
                children,
            }
        }
        .boxed()
    }
}
