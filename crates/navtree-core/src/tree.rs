//! Navigation tree facade
//!
//! Wires the renderer, reorderer and delete handler to one store, one schema
//! and one configuration. Collaborators not supplied to the builder get
//! in-memory defaults.

use crate::access::AccessFilter;
use crate::cache::{CachePolicy, CompositeCache, FragmentCache, FragmentKey, StructuralCache};
use crate::config::NavTreeConfig;
use crate::delete::DeleteHandler;
use crate::error::TreeResult;
use crate::locks::SiblingLocks;
use crate::maintenance::StructuralMaintenance;
use crate::nested_set::NestedSetMaintainer;
use crate::notify::{ChangeNotifier, NoopNotifier};
use crate::path_cache::PathCacheMaintainer;
use crate::recovery::{MemoryRecoveryLog, RecoveryLog, ReplayCommand};
use crate::render::{RenderRequest, RenderResult, TreeRenderer};
use crate::reorder::{MoveOutcome, MoveRequest, NodeReorderer};
use crate::verify::{verify_tree, TreeReport};
use navtree_model::{AccessContext, ExternalId, NodeId, PageId};
use navtree_store::{PortalDirectory, SchemaIntrospector, StaticSchema, TreeStore};
use std::sync::Arc;

/// Builder for [`NavigationTree`]
pub struct NavigationTreeBuilder {
    store: Arc<dyn TreeStore>,
    portals: Arc<dyn PortalDirectory>,
    config: NavTreeConfig,
    schema: Option<Arc<dyn SchemaIntrospector>>,
    recovery: Option<Arc<dyn RecoveryLog>>,
    notifier: Option<Arc<dyn ChangeNotifier>>,
    external_cache: Option<Arc<dyn StructuralCache>>,
}

impl std::fmt::Debug for NavigationTreeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationTreeBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl NavigationTreeBuilder {
    /// Start from a store and portal directory
    #[must_use]
    pub fn new(store: Arc<dyn TreeStore>, portals: Arc<dyn PortalDirectory>) -> Self {
        Self {
            store,
            portals,
            config: NavTreeConfig::default(),
            schema: None,
            recovery: None,
            notifier: None,
            external_cache: None,
        }
    }

    /// With configuration
    #[must_use]
    pub fn config(mut self, config: NavTreeConfig) -> Self {
        self.config = config;
        self
    }

    /// With schema introspection; defaults to the configured static schema
    #[must_use]
    pub fn schema(mut self, schema: Arc<dyn SchemaIntrospector>) -> Self {
        self.schema = Some(schema);
        self
    }

    /// With recovery log; defaults to an in-memory log
    #[must_use]
    pub fn recovery_log(mut self, log: Arc<dyn RecoveryLog>) -> Self {
        self.recovery = Some(log);
        self
    }

    /// With change notifier; defaults to dropping events
    #[must_use]
    pub fn notifier(mut self, notifier: Arc<dyn ChangeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// With an additional structural cache to invalidate
    #[must_use]
    pub fn structural_cache(mut self, cache: Arc<dyn StructuralCache>) -> Self {
        self.external_cache = Some(cache);
        self
    }

    /// Validate configuration and assemble
    ///
    /// # Errors
    /// Returns `TreeError::Config` if the configuration is inconsistent.
    pub fn build(self) -> TreeResult<NavigationTree> {
        self.config.validate()?;
        let config = Arc::new(self.config);

        let schema: Arc<dyn SchemaIntrospector> = match self.schema {
            Some(schema) => schema,
            None => Arc::new(StaticSchema::from_config(&config.schema)),
        };
        let recovery: Arc<dyn RecoveryLog> = match self.recovery {
            Some(log) => log,
            None => Arc::new(MemoryRecoveryLog::new()),
        };
        let notifier: Arc<dyn ChangeNotifier> = match self.notifier {
            Some(notifier) => notifier,
            None => Arc::new(NoopNotifier),
        };

        let policy = CachePolicy::new(config.tree_table.clone(), config.tree_node_table.clone());
        let fragments = match config.cache.ttl() {
            Some(ttl) => FragmentCache::with_ttl(config.cache.max_capacity, ttl, policy),
            None => FragmentCache::new(config.cache.max_capacity, policy),
        };
        let mut caches: Vec<Arc<dyn StructuralCache>> = vec![Arc::new(fragments.clone())];
        caches.extend(self.external_cache);
        let cache: Arc<dyn StructuralCache> = Arc::new(CompositeCache::new(caches));

        let access = AccessFilter::new(self.portals, self.store.clone());
        let maintenance = StructuralMaintenance::new(
            cache,
            PathCacheMaintainer::new(self.store.clone()),
            NestedSetMaintainer::new(self.store.clone()),
            recovery,
            notifier,
            config.clone(),
        );

        Ok(NavigationTree {
            renderer: TreeRenderer::new(self.store.clone(), access.clone(), schema.clone(), config.clone()),
            reorderer: NodeReorderer::new(
                self.store.clone(),
                access,
                schema.clone(),
                config.clone(),
                Arc::new(SiblingLocks::new()),
                maintenance.clone(),
            ),
            deletes: DeleteHandler::new(self.store.clone(), maintenance),
            store: self.store,
            schema,
            fragments,
            config,
        })
    }
}

/// Navigation tree engine
#[derive(Clone)]
pub struct NavigationTree {
    store: Arc<dyn TreeStore>,
    schema: Arc<dyn SchemaIntrospector>,
    config: Arc<NavTreeConfig>,
    renderer: TreeRenderer,
    reorderer: NodeReorderer,
    deletes: DeleteHandler,
    fragments: FragmentCache,
}

impl std::fmt::Debug for NavigationTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationTree")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl NavigationTree {
    /// Start building
    #[must_use]
    pub fn builder(store: Arc<dyn TreeStore>, portals: Arc<dyn PortalDirectory>) -> NavigationTreeBuilder {
        NavigationTreeBuilder::new(store, portals)
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &NavTreeConfig {
        &self.config
    }

    /// Fragment cache
    #[inline]
    #[must_use]
    pub fn fragments(&self) -> &FragmentCache {
        &self.fragments
    }

    /// Render the tree
    ///
    /// # Errors
    /// See [`TreeRenderer::render`].
    pub async fn render(&self, request: &RenderRequest) -> TreeResult<RenderResult> {
        self.renderer.render(request).await
    }

    /// Render the children of a lazy placeholder's parent
    ///
    /// # Errors
    /// See [`TreeRenderer::render_subtree`].
    pub async fn render_subtree(
        &self,
        parent_id: &NodeId,
        access: &AccessContext,
        selected_page: Option<&PageId>,
    ) -> TreeResult<RenderResult> {
        self.renderer.render_subtree(parent_id, access, selected_page).await
    }

    /// Render a cacheable fragment with an empty open state
    ///
    /// # Errors
    /// See [`TreeRenderer::render`].
    pub async fn render_fragment(
        &self,
        root_id: &NodeId,
        access: &AccessContext,
        selected_page: Option<&PageId>,
        assignment_disabled: bool,
    ) -> TreeResult<Arc<RenderResult>> {
        let key = FragmentKey {
            user_id: access.user_id.clone(),
            allowed_portals: access.allowed_portals.clone(),
            assignment_disabled,
            selected_page: selected_page.cloned(),
            root_id: root_id.clone(),
            source_table: self.config.tree_table.clone(),
        };
        let mut request = RenderRequest::new(root_id.clone(), access.clone());
        if let Some(page) = selected_page {
            request = request.with_selected_page(page.clone());
        }
        self.fragments
            .try_get_or_render(key, || async move { self.renderer.render(&request).await })
            .await
    }

    /// Move a node; failures yield `success = false`
    pub async fn move_node(&self, request: &MoveRequest) -> MoveOutcome {
        self.reorderer.move_node(request).await
    }

    /// Move a node
    ///
    /// # Errors
    /// See [`NodeReorderer::try_move_node`].
    pub async fn try_move_node(&self, request: &MoveRequest) -> TreeResult<MoveOutcome> {
        self.reorderer.try_move_node(request).await
    }

    /// Handle a delete signal
    pub async fn on_node_deleted(&self, node_id: Option<&str>) -> Option<ExternalId> {
        self.deletes.on_node_deleted(node_id).await
    }

    /// Check structural invariants
    ///
    /// # Errors
    /// Returns storage error if reading fails.
    pub async fn verify(&self) -> TreeResult<TreeReport> {
        let sort_field = self.schema.sort_field(&self.config.tree_table);
        verify_tree(self.store.clone(), &self.config.root_id, &sort_field).await
    }

    /// Replay recovery commands in order
    ///
    /// Returns the number of nodes touched.
    ///
    /// # Errors
    /// Stops at the first failing command.
    pub async fn replay(&self, commands: &[ReplayCommand]) -> TreeResult<usize> {
        let mut touched = 0;
        for command in commands {
            touched += command.replay(self.store.clone(), &self.config.root_id).await?;
        }
        Ok(touched)
    }
}
