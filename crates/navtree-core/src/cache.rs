//! Render fragment caching
//!
//! Whole render results depend on client open state and are never cached.
//! Fragments rendered with an empty open state are cached in a moka cache,
//! keyed by everything that changes their content, and dropped when one of
//! the tables they depend on changes.

use crate::render::RenderResult;
use async_trait::async_trait;
use moka::future::Cache;
use navtree_model::{NodeId, PageId, PortalId, UserId};
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// User record table
pub const USER_TABLE: &str = "cms_user";

/// User association tables a fragment depends on
pub const USER_ASSOCIATION_TABLES: [&str; 4] = [
    "cms_user_cms_language_mlt",
    "cms_user_cms_portal_mlt",
    "cms_user_cms_role_mlt",
    "cms_user_cms_usergroup_mlt",
];

/// Role right association table
pub const ROLE_RIGHT_TABLE: &str = "cms_role_cms_right_mlt";

/// Invalidation sink for structural changes
#[async_trait]
pub trait StructuralCache: Send + Sync {
    /// Drop cached content depending on `table`, optionally only row `id`
    async fn invalidate_by_table_and_id(&self, table: &str, id: Option<&str>);
}

/// Everything a cached fragment varies by
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FragmentKey {
    /// Acting user
    pub user_id: Option<UserId>,
    /// Portals the user may view; excluded portal subtrees differ per set
    pub allowed_portals: BTreeSet<PortalId>,
    /// Page assignment interactions disabled
    pub assignment_disabled: bool,
    /// Selected page
    pub selected_page: Option<PageId>,
    /// Fragment root
    pub root_id: NodeId,
    /// Tree table
    pub source_table: String,
}

/// Table and optional row a cached fragment depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheTrigger {
    /// Table name
    pub table: String,
    /// Row id, `None` for any row
    pub id: Option<String>,
}

impl CacheTrigger {
    fn new(table: impl Into<String>, id: Option<String>) -> Self {
        Self {
            table: table.into(),
            id,
        }
    }
}

/// How a table change affects cached fragments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableDependency {
    /// Only the named user's fragments
    UserScoped,
    /// Every fragment
    Global,
    /// No fragment
    Unrelated,
}

/// Which render output may be cached and what invalidates it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    tree_table: String,
    tree_node_table: String,
}

impl CachePolicy {
    /// Create policy for a tree table pair
    #[must_use]
    pub fn new(tree_table: impl Into<String>, tree_node_table: impl Into<String>) -> Self {
        Self {
            tree_table: tree_table.into(),
            tree_node_table: tree_node_table.into(),
        }
    }

    /// Full renders depend on open state and are never cached
    #[inline]
    #[must_use]
    pub const fn whole_result_cacheable() -> bool {
        false
    }

    /// Invalidation triggers of a fragment rendered for `user_id`
    #[must_use]
    pub fn triggers(&self, user_id: Option<&UserId>) -> Vec<CacheTrigger> {
        let mut triggers = vec![CacheTrigger::new(USER_TABLE, user_id.map(|u| u.as_str().to_string()))];
        triggers.extend(USER_ASSOCIATION_TABLES.iter().map(|t| CacheTrigger::new(*t, None)));
        triggers.push(CacheTrigger::new(ROLE_RIGHT_TABLE, None));
        triggers.push(CacheTrigger::new(self.tree_table.clone(), None));
        triggers.push(CacheTrigger::new(self.tree_node_table.clone(), None));
        triggers
    }

    /// Classify a changed table
    #[must_use]
    pub fn dependency(&self, table: &str) -> TableDependency {
        if table == USER_TABLE {
            TableDependency::UserScoped
        } else if USER_ASSOCIATION_TABLES.contains(&table)
            || table == ROLE_RIGHT_TABLE
            || table == self.tree_table
            || table == self.tree_node_table
        {
            TableDependency::Global
        } else {
            TableDependency::Unrelated
        }
    }
}

/// Cache of rendered fragments
#[derive(Debug, Clone)]
pub struct FragmentCache {
    inner: Cache<FragmentKey, Arc<RenderResult>>,
    policy: CachePolicy,
}

impl FragmentCache {
    /// Create cache with max capacity
    #[must_use]
    pub fn new(max_capacity: u64, policy: CachePolicy) -> Self {
        Self::build(max_capacity, None, policy)
    }

    /// Create cache with time-based expiration
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: Duration, policy: CachePolicy) -> Self {
        Self::build(max_capacity, Some(ttl), policy)
    }

    fn build(max_capacity: u64, ttl: Option<Duration>, policy: CachePolicy) -> Self {
        let mut builder = Cache::builder()
            .max_capacity(max_capacity)
            .support_invalidation_closures();
        if let Some(ttl) = ttl {
            builder = builder.time_to_live(ttl);
        }
        Self {
            inner: builder.build(),
            policy,
        }
    }

    /// Invalidation policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Cached fragment
    pub async fn get(&self, key: &FragmentKey) -> Option<Arc<RenderResult>> {
        self.inner.get(key).await
    }

    /// Store a fragment
    pub async fn insert(&self, key: FragmentKey, fragment: RenderResult) {
        self.inner.insert(key, Arc::new(fragment)).await;
    }

    /// Get a fragment or render and store it
    ///
    /// Incomplete renders are returned but not stored.
    ///
    /// # Errors
    /// Returns the render error unchanged.
    pub async fn try_get_or_render<E, F, Fut>(&self, key: FragmentKey, render: F) -> Result<Arc<RenderResult>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<RenderResult, E>>,
    {
        if let Some(cached) = self.get(&key).await {
            tracing::trace!(root = %key.root_id, "fragment cache hit");
            return Ok(cached);
        }

        let fragment = Arc::new(render().await?);
        if fragment.incomplete {
            tracing::debug!(root = %key.root_id, "not caching incomplete fragment");
        } else {
            self.inner.insert(key, fragment.clone()).await;
        }
        Ok(fragment)
    }

    /// Drop every fragment
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Drop the fragments of one user
    pub fn invalidate_user(&self, user: &UserId) {
        let user = user.clone();
        if let Err(e) = self
            .inner
            .invalidate_entries_if(move |key, _| key.user_id.as_ref() == Some(&user))
        {
            tracing::warn!(error = %e, "predicate invalidation unavailable, dropping all fragments");
            self.inner.invalidate_all();
        }
    }

    /// Apply pending maintenance
    pub async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
    }

    /// Approximate entry count
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }
}

#[async_trait]
impl StructuralCache for FragmentCache {
    async fn invalidate_by_table_and_id(&self, table: &str, id: Option<&str>) {
        match (self.policy.dependency(table), id.filter(|i| !i.is_empty())) {
            (TableDependency::Unrelated, _) => {}
            (TableDependency::UserScoped, Some(user)) => self.invalidate_user(&UserId::from(user)),
            (TableDependency::UserScoped | TableDependency::Global, _) => self.invalidate_all(),
        }
        tracing::debug!(table, id = ?id, "invalidated fragment cache");
    }
}

/// Forwards invalidations to several caches
#[derive(Clone, Default)]
pub struct CompositeCache {
    caches: Vec<Arc<dyn StructuralCache>>,
}

impl std::fmt::Debug for CompositeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeCache")
            .field("caches", &self.caches.len())
            .finish()
    }
}

impl CompositeCache {
    /// Create from caches
    #[must_use]
    pub fn new(caches: Vec<Arc<dyn StructuralCache>>) -> Self {
        Self { caches }
    }
}

#[async_trait]
impl StructuralCache for CompositeCache {
    async fn invalidate_by_table_and_id(&self, table: &str, id: Option<&str>) {
        for cache in &self.caches {
            cache.invalidate_by_table_and_id(table, id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CachePolicy {
        CachePolicy::new("cms_tree", "cms_tree_node")
    }

    fn key(user: &str, root: &str) -> FragmentKey {
        FragmentKey {
            user_id: Some(user.into()),
            allowed_portals: BTreeSet::new(),
            assignment_disabled: false,
            selected_page: None,
            root_id: root.into(),
            source_table: "cms_tree".into(),
        }
    }

    #[test]
    fn whole_results_are_not_cacheable() {
        assert!(!CachePolicy::whole_result_cacheable());
    }

    #[test]
    fn triggers_cover_user_roles_and_tree_tables() {
        let triggers = policy().triggers(Some(&UserId::from("7")));
        assert_eq!(triggers[0], CacheTrigger::new(USER_TABLE, Some("7".into())));
        let tables: Vec<&str> = triggers.iter().map(|t| t.table.as_str()).collect();
        for table in ["cms_user_cms_portal_mlt", ROLE_RIGHT_TABLE, "cms_tree", "cms_tree_node"] {
            assert!(tables.contains(&table), "{table} missing");
        }
    }

    #[tokio::test]
    async fn tree_table_change_drops_everything() {
        let cache = FragmentCache::new(100, policy());
        cache.insert(key("1", "a"), RenderResult::default()).await;
        cache.insert(key("2", "a"), RenderResult::default()).await;

        cache.invalidate_by_table_and_id("cms_tree", Some("a")).await;
        cache.run_pending_tasks().await;

        assert!(cache.get(&key("1", "a")).await.is_none());
        assert!(cache.get(&key("2", "a")).await.is_none());
    }

    #[tokio::test]
    async fn user_change_drops_only_that_user() {
        let cache = FragmentCache::new(100, policy());
        cache.insert(key("1", "a"), RenderResult::default()).await;
        cache.insert(key("2", "a"), RenderResult::default()).await;

        cache.invalidate_by_table_and_id(USER_TABLE, Some("1")).await;
        cache.run_pending_tasks().await;

        assert!(cache.get(&key("1", "a")).await.is_none());
        assert!(cache.get(&key("2", "a")).await.is_some());
    }

    #[tokio::test]
    async fn unrelated_table_keeps_entries() {
        let cache = FragmentCache::new(100, policy());
        cache.insert(key("1", "a"), RenderResult::default()).await;
        cache.invalidate_by_table_and_id("shop_article", None).await;
        assert!(cache.get(&key("1", "a")).await.is_some());
    }

    #[tokio::test]
    async fn incomplete_fragments_are_not_stored() {
        let cache = FragmentCache::new(100, policy());
        let incomplete = RenderResult {
            incomplete: true,
            ..RenderResult::default()
        };
        let out: Result<_, ()> = cache
            .try_get_or_render(key("1", "a"), move || async move { Ok(incomplete) })
            .await;
        assert!(out.unwrap().incomplete);
        assert!(cache.get(&key("1", "a")).await.is_none());
    }
}
