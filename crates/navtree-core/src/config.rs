//! Engine configuration
//!
//! Every threshold the renderer and reorderer use lives here, with defaults
//! matching the classic page tree. Loaded from TOML or built in code.

use crate::error::ConfigError;
use navtree_model::NodeId;
use navtree_store::SchemaConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Whether render and move check the acting user's portals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionPolicy {
    /// Portal membership only filters what is rendered
    ///
    /// Exclusion applies to fetched children, so an entry node inside an
    /// excluded portal (a render root or a subtree parent) still renders
    /// its descendants.
    #[default]
    Unenforced,
    /// Render roots, subtree parents, moved nodes and move targets inside
    /// excluded portals are rejected
    Enforced,
}

/// Fragment cache sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum cached fragments
    pub max_capacity: u64,
    /// Time to live in seconds; `0` disables expiry
    pub ttl_secs: u64,
}

impl CacheConfig {
    /// TTL as duration, if enabled
    #[inline]
    #[must_use]
    pub fn ttl(&self) -> Option<Duration> {
        (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs))
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 1_000,
            ttl_secs: 0,
        }
    }
}

/// Navigation tree engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavTreeConfig {
    /// Root sentinel id
    pub root_id: NodeId,
    /// Table holding tree nodes
    pub tree_table: String,
    /// Table holding node-to-page connections
    pub tree_node_table: String,
    /// Parent column name, recorded in replay commands
    pub parent_field: String,
    /// Nodes at or above this depth render open
    pub eager_depth: usize,
    /// Lazy cutoff depth when few portals exist
    pub lazy_cutoff: usize,
    /// Lazy cutoff depth when more than `portal_threshold` portals exist
    pub lazy_cutoff_many_portals: usize,
    /// Portal count above which the lower cutoff applies
    pub portal_threshold: usize,
    /// Flag nodes whose name is untranslated in the active locale
    pub translation_fallback: bool,
    /// Label for nodes without any name
    pub unnamed_label: String,
    /// Retries of a move after an ordering conflict
    pub move_retries: u32,
    /// Portal permission enforcement
    pub permission_policy: PermissionPolicy,
    /// Fragment cache
    pub cache: CacheConfig,
    /// Translatable field description
    pub schema: SchemaConfig,
}

impl NavTreeConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With root sentinel id
    #[inline]
    #[must_use]
    pub fn with_root_id(mut self, root: impl Into<NodeId>) -> Self {
        self.root_id = root.into();
        self
    }

    /// With translation fallback flagging
    #[inline]
    #[must_use]
    pub fn with_translation_fallback(mut self, enabled: bool) -> Self {
        self.translation_fallback = enabled;
        self
    }

    /// With permission policy
    #[inline]
    #[must_use]
    pub fn with_permission_policy(mut self, policy: PermissionPolicy) -> Self {
        self.permission_policy = policy;
        self
    }

    /// With move retries
    #[inline]
    #[must_use]
    pub fn with_move_retries(mut self, retries: u32) -> Self {
        self.move_retries = retries;
        self
    }

    /// Depth at which subtrees become lazy placeholders
    #[inline]
    #[must_use]
    pub fn lazy_cutoff_for(&self, portal_count: usize) -> usize {
        if portal_count > self.portal_threshold {
            self.lazy_cutoff_many_portals
        } else {
            self.lazy_cutoff
        }
    }

    /// Parse from TOML
    ///
    /// # Errors
    /// Returns error on malformed TOML or inconsistent values.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns error if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::io_error(path, e))?;
        Self::from_toml_str(&raw)
    }

    /// Check value consistency
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.root_id.as_str().is_empty() {
            return Err(ConfigError::Invalid("root_id must not be empty".into()));
        }
        if self.tree_table.is_empty() {
            return Err(ConfigError::Invalid("tree_table must not be empty".into()));
        }
        if self.lazy_cutoff <= self.eager_depth || self.lazy_cutoff_many_portals <= self.eager_depth {
            return Err(ConfigError::Invalid(format!(
                "lazy cutoffs ({}, {}) must be deeper than eager_depth {}",
                self.lazy_cutoff, self.lazy_cutoff_many_portals, self.eager_depth
            )));
        }
        Ok(())
    }
}

impl Default for NavTreeConfig {
    fn default() -> Self {
        Self {
            root_id: NodeId::from("99"),
            tree_table: "cms_tree".to_string(),
            tree_node_table: "cms_tree_node".to_string(),
            parent_field: "parent_id".to_string(),
            eager_depth: 2,
            lazy_cutoff: 5,
            lazy_cutoff_many_portals: 4,
            portal_threshold: 3,
            translation_fallback: false,
            unnamed_label: "unnamed record".to_string(),
            move_retries: 1,
            permission_policy: PermissionPolicy::Unenforced,
            cache: CacheConfig::default(),
            schema: SchemaConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoff_depends_on_portal_count() {
        let config = NavTreeConfig::default();
        assert_eq!(config.lazy_cutoff_for(1), 5);
        assert_eq!(config.lazy_cutoff_for(3), 5);
        assert_eq!(config.lazy_cutoff_for(4), 4);
    }

    #[test]
    fn parses_partial_toml() {
        let config = NavTreeConfig::from_toml_str(
            r#"
            root_id = "1"
            translation_fallback = true
            permission_policy = "enforced"

            [cache]
            ttl_secs = 30

            [schema]
            translated_fields = ["cms_tree.entry_sort"]
            base_locale = "de"
            "#,
        )
        .unwrap();

        assert_eq!(config.root_id, NodeId::from("1"));
        assert!(config.translation_fallback);
        assert_eq!(config.permission_policy, PermissionPolicy::Enforced);
        assert_eq!(config.cache.ttl(), Some(Duration::from_secs(30)));
        assert_eq!(config.cache.max_capacity, 1_000);
        assert_eq!(config.eager_depth, 2);
    }

    #[test]
    fn rejects_cutoff_above_eager_depth() {
        let err = NavTreeConfig::from_toml_str("eager_depth = 5").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("navtree.toml");
        std::fs::write(&path, "tree_table = \"nav\"\n").unwrap();
        assert_eq!(NavTreeConfig::load(&path).unwrap().tree_table, "nav");
    }
}
