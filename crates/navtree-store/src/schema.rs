//! Static schema introspection

use crate::traits::SchemaIntrospector;
use navtree_model::LocaleId;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Schema description fixed at construction, with a switchable active locale
#[derive(Debug)]
pub struct StaticSchema {
    translated: BTreeSet<(String, String)>,
    base_locale: Option<LocaleId>,
    active_locale: RwLock<LocaleId>,
}

/// Serializable form of [`StaticSchema`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// `table.field` entries with per-locale columns
    #[serde(default)]
    pub translated_fields: Vec<String>,
    /// Base language of field based translation
    #[serde(default)]
    pub base_locale: Option<LocaleId>,
    /// Locale the acting user edits in
    #[serde(default)]
    pub active_locale: Option<LocaleId>,
}

impl StaticSchema {
    /// Schema without translated fields
    #[must_use]
    pub fn new(active_locale: impl Into<LocaleId>) -> Self {
        Self {
            translated: BTreeSet::new(),
            base_locale: None,
            active_locale: RwLock::new(active_locale.into()),
        }
    }

    /// Mark `table.field` as translated
    #[must_use]
    pub fn with_translated(mut self, table: &str, field: &str) -> Self {
        self.translated.insert((table.to_string(), field.to_string()));
        self
    }

    /// With base locale
    #[must_use]
    pub fn with_base_locale(mut self, locale: impl Into<LocaleId>) -> Self {
        self.base_locale = Some(locale.into());
        self
    }

    /// Switch the active edit locale
    pub fn set_active_locale(&self, locale: impl Into<LocaleId>) {
        *self.active_locale.write() = locale.into();
    }

    /// Build from serialized configuration
    ///
    /// Entries without a `.` separator are ignored with a warning.
    #[must_use]
    pub fn from_config(config: &SchemaConfig) -> Self {
        let base = config.base_locale.clone();
        let active = config
            .active_locale
            .clone()
            .or_else(|| base.clone())
            .unwrap_or_else(|| LocaleId::from(""));
        let mut schema = Self::new(active);
        schema.base_locale = base;
        for entry in &config.translated_fields {
            match entry.split_once('.') {
                Some((table, field)) => schema = schema.with_translated(table, field),
                None => tracing::warn!(entry = %entry, "ignoring translated field without table prefix"),
            }
        }
        schema
    }
}

impl SchemaIntrospector for StaticSchema {
    fn is_field_translated(&self, table: &str, field: &str) -> bool {
        self.translated
            .contains(&(table.to_string(), field.to_string()))
    }

    fn active_locale(&self) -> LocaleId {
        self.active_locale.read().clone()
    }

    fn base_locale(&self) -> Option<LocaleId> {
        self.base_locale.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use navtree_model::SortField;

    #[test]
    fn untranslated_sort_field_is_base() {
        let schema = StaticSchema::new("en").with_base_locale("de");
        assert_eq!(schema.sort_field("cms_tree"), SortField::Base);
    }

    #[test]
    fn translated_sort_field_uses_active_locale() {
        let schema = StaticSchema::new("en")
            .with_base_locale("de")
            .with_translated("cms_tree", "entry_sort");
        assert_eq!(
            schema.sort_field("cms_tree"),
            SortField::Localized(LocaleId::from("en"))
        );

        schema.set_active_locale("de");
        assert_eq!(schema.sort_field("cms_tree"), SortField::Base);
    }

    #[test]
    fn from_config_parses_table_field_pairs() {
        let config = SchemaConfig {
            translated_fields: vec!["cms_tree.entry_sort".into(), "broken".into()],
            base_locale: Some("de".into()),
            active_locale: None,
        };
        let schema = StaticSchema::from_config(&config);
        assert!(schema.is_field_translated("cms_tree", "entry_sort"));
        assert_eq!(schema.active_locale(), LocaleId::from("de"));
    }
}
