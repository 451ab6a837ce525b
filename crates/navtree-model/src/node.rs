//! Navigation tree nodes
//!
//! Provides [`TreeNode`], the record the engine reads and reorders, together
//! with its connected pages and translatable fields.

use crate::id::{ExternalId, LocaleId, NodeId, PageId};
use crate::nested_set::NestedSetBounds;
use crate::path::AncestorPath;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

/// Name of the untranslated ordering column
pub const BASE_SORT_FIELD: &str = "entry_sort";

/// Which ordering key a sibling group is sorted and written by
///
/// When the schema marks the sort field as translatable, every locale other
/// than the base locale keeps its own ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SortField {
    /// `entry_sort`
    #[default]
    Base,
    /// `entry_sort__<locale>`
    Localized(LocaleId),
}

impl SortField {
    /// Column name as stored by the record store
    #[must_use]
    pub fn column_name(&self) -> String {
        match self {
            Self::Base => BASE_SORT_FIELD.to_string(),
            Self::Localized(locale) => format!("{BASE_SORT_FIELD}__{locale}"),
        }
    }
}

impl Display for SortField {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.column_name())
    }
}

/// Text with a base value and optional per-locale values
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocalizedText {
    /// Value in the base language
    #[serde(default)]
    pub base: String,
    /// Values per locale; an empty string means "not translated"
    #[serde(default)]
    pub translations: BTreeMap<LocaleId, String>,
}

impl LocalizedText {
    /// Text with only a base value
    #[inline]
    #[must_use]
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            translations: BTreeMap::new(),
        }
    }

    /// Add a translation
    #[inline]
    #[must_use]
    pub fn with_translation(mut self, locale: impl Into<LocaleId>, value: impl Into<String>) -> Self {
        self.translations.insert(locale.into(), value.into());
        self
    }

    /// Raw value stored for `locale`, without falling back
    #[must_use]
    pub fn translated(&self, locale: &LocaleId) -> Option<&str> {
        self.translations
            .get(locale)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Value for `locale`, falling back to the base value
    #[must_use]
    pub fn resolve(&self, locale: Option<&LocaleId>) -> &str {
        locale
            .and_then(|l| self.translated(l))
            .unwrap_or(self.base.as_str())
    }
}

/// A page connected to a navigation node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedPage {
    /// Page id
    pub id: PageId,
    /// Page is only reachable for extranet users
    #[serde(default)]
    pub is_extranet_restricted: bool,
    /// Page is the node's primary page
    #[serde(default)]
    pub is_primary: bool,
}

impl LinkedPage {
    /// Plain public page
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<PageId>) -> Self {
        Self {
            id: id.into(),
            is_extranet_restricted: false,
            is_primary: false,
        }
    }

    /// Mark as extranet-restricted
    #[inline]
    #[must_use]
    pub fn restricted(mut self) -> Self {
        self.is_extranet_restricted = true;
        self
    }

    /// Mark as primary
    #[inline]
    #[must_use]
    pub fn primary(mut self) -> Self {
        self.is_primary = true;
        self
    }
}

/// A node of the navigation tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeNode {
    /// Node id
    pub id: NodeId,
    /// External id used by rendered views
    #[serde(default)]
    pub external_id: Option<ExternalId>,
    /// Parent id; `None` only for the root sentinel
    #[serde(default)]
    pub parent_id: Option<NodeId>,
    /// Ordering key in the base sort field
    #[serde(default)]
    pub entry_sort: u32,
    /// Ordering keys of translated sort fields
    #[serde(default)]
    pub localized_sort: BTreeMap<LocaleId, u32>,
    /// Display name
    #[serde(default)]
    pub name: LocalizedText,
    /// Node is hidden from the navigation
    #[serde(default)]
    pub hidden: bool,
    /// Extranet pages may be shown below this node
    #[serde(default)]
    pub show_extranet_pages: bool,
    /// Connected pages, in store order
    #[serde(default)]
    pub linked_pages: Vec<LinkedPage>,
    /// External link URL
    #[serde(default)]
    pub link: Option<String>,
    /// Cached ancestor chain
    #[serde(default)]
    pub path_cache: Option<AncestorPath>,
    /// Nested set range
    #[serde(default)]
    pub bounds: Option<NestedSetBounds>,
}

impl TreeNode {
    /// Create a node under `parent`
    #[must_use]
    pub fn new(id: impl Into<NodeId>, parent: impl Into<NodeId>) -> Self {
        Self {
            parent_id: Some(parent.into()),
            ..Self::root(id)
        }
    }

    /// Create a parentless root sentinel
    #[must_use]
    pub fn root(id: impl Into<NodeId>) -> Self {
        Self {
            id: id.into(),
            external_id: None,
            parent_id: None,
            entry_sort: 0,
            localized_sort: BTreeMap::new(),
            name: LocalizedText::default(),
            hidden: false,
            show_extranet_pages: false,
            linked_pages: Vec::new(),
            link: None,
            path_cache: None,
            bounds: None,
        }
    }

    /// With base name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name.base = name.into();
        self
    }

    /// With localized name
    #[inline]
    #[must_use]
    pub fn with_text(mut self, name: LocalizedText) -> Self {
        self.name = name;
        self
    }

    /// With base ordering key
    #[inline]
    #[must_use]
    pub fn with_sort(mut self, key: u32) -> Self {
        self.entry_sort = key;
        self
    }

    /// With ordering key for a translated sort field
    #[inline]
    #[must_use]
    pub fn with_localized_sort(mut self, locale: impl Into<LocaleId>, key: u32) -> Self {
        self.localized_sort.insert(locale.into(), key);
        self
    }

    /// With external id
    #[inline]
    #[must_use]
    pub fn with_external_id(mut self, id: u64) -> Self {
        self.external_id = Some(ExternalId(id));
        self
    }

    /// Mark hidden
    #[inline]
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Allow extranet pages below this node
    #[inline]
    #[must_use]
    pub fn showing_extranet_pages(mut self) -> Self {
        self.show_extranet_pages = true;
        self
    }

    /// Connect a page
    #[inline]
    #[must_use]
    pub fn with_page(mut self, page: LinkedPage) -> Self {
        self.linked_pages.push(page);
        self
    }

    /// With external link
    #[inline]
    #[must_use]
    pub fn with_link(mut self, url: impl Into<String>) -> Self {
        self.link = Some(url.into());
        self
    }

    /// With cached ancestor path
    #[inline]
    #[must_use]
    pub fn with_path_cache(mut self, path: AncestorPath) -> Self {
        self.path_cache = Some(path);
        self
    }

    /// With nested set bounds
    #[inline]
    #[must_use]
    pub fn with_bounds(mut self, bounds: NestedSetBounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Parent id
    #[inline]
    #[must_use]
    pub fn parent_id(&self) -> Option<&NodeId> {
        self.parent_id.as_ref()
    }

    /// Cached ancestor path
    #[inline]
    #[must_use]
    pub fn path_cache(&self) -> Option<&AncestorPath> {
        self.path_cache.as_ref()
    }

    /// Nested set bounds
    #[inline]
    #[must_use]
    pub fn bounds(&self) -> Option<&NestedSetBounds> {
        self.bounds.as_ref()
    }

    /// Ordering key for `field`
    ///
    /// A node that has never been sorted in a translated field falls back to
    /// its base key.
    #[must_use]
    pub fn sort_key(&self, field: &SortField) -> u32 {
        match field {
            SortField::Base => self.entry_sort,
            SortField::Localized(locale) => self
                .localized_sort
                .get(locale)
                .copied()
                .unwrap_or(self.entry_sort),
        }
    }

    /// Set the ordering key for `field`
    pub fn set_sort_key(&mut self, field: &SortField, key: u32) {
        match field {
            SortField::Base => self.entry_sort = key,
            SortField::Localized(locale) => {
                self.localized_sort.insert(locale.clone(), key);
            }
        }
    }

    /// Whether the node has any external link
    #[inline]
    #[must_use]
    pub fn has_link(&self) -> bool {
        self.link.as_deref().is_some_and(|l| !l.is_empty())
    }

    /// Primary connected page: the first flagged primary, else the first page
    #[must_use]
    pub fn primary_page(&self) -> Option<&PageId> {
        self.linked_pages
            .iter()
            .find(|p| p.is_primary)
            .or_else(|| self.linked_pages.first())
            .map(|p| &p.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_field_column_names() {
        assert_eq!(SortField::Base.column_name(), "entry_sort");
        assert_eq!(
            SortField::Localized(LocaleId::from("en")).column_name(),
            "entry_sort__en"
        );
    }

    #[test]
    fn localized_sort_falls_back_to_base() {
        let mut node = TreeNode::new("1", "99").with_sort(4);
        let en = SortField::Localized(LocaleId::from("en"));
        assert_eq!(node.sort_key(&en), 4);

        node.set_sort_key(&en, 1);
        assert_eq!(node.sort_key(&en), 1);
        assert_eq!(node.sort_key(&SortField::Base), 4);
    }

    #[test]
    fn localized_text_resolution() {
        let text = LocalizedText::new("Produkte")
            .with_translation("en", "Products")
            .with_translation("fr", "");

        assert_eq!(text.resolve(Some(&LocaleId::from("en"))), "Products");
        assert_eq!(text.resolve(Some(&LocaleId::from("fr"))), "Produkte");
        assert_eq!(text.resolve(None), "Produkte");
        assert!(text.translated(&LocaleId::from("fr")).is_none());
    }

    #[test]
    fn primary_page_prefers_flag() {
        let node = TreeNode::new("1", "99")
            .with_page(LinkedPage::new("a"))
            .with_page(LinkedPage::new("b").primary());
        assert_eq!(node.primary_page(), Some(&PageId::from("b")));

        let plain = TreeNode::new("2", "99").with_page(LinkedPage::new("c"));
        assert_eq!(plain.primary_page(), Some(&PageId::from("c")));
    }

    #[test]
    fn empty_link_is_no_link() {
        assert!(!TreeNode::new("1", "99").with_link("").has_link());
        assert!(TreeNode::new("1", "99").with_link("https://example.com").has_link());
    }
}
