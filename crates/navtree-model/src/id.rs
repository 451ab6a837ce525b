//! Identifier newtypes
//!
//! Node, portal and page ids are opaque strings owned by the record store.
//! Request input arrives as raw strings, so [`NodeId::from_input`] is the one
//! place that decides what counts as "absent".

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

/// Value a drag-and-drop client sends when a node was dropped on empty space
pub const UNDEFINED_SENTINEL: &str = "undefined";

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create id from any string-like value
            #[inline]
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the raw id
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id!(
    /// Navigation node identifier
    NodeId
);
string_id!(
    /// Portal (site) identifier
    PortalId
);
string_id!(
    /// Connected page identifier
    PageId
);
string_id!(
    /// Locale identifier, e.g. `de` or `en`
    LocaleId
);
string_id!(
    /// Acting backend user identifier
    UserId
);

impl NodeId {
    /// Parse a node id from raw request input
    ///
    /// Empty strings and the `undefined` sentinel are treated as absent.
    ///
    /// # Errors
    /// Returns [`ModelError::MissingId`] naming `field` when the input is absent.
    pub fn from_input(raw: Option<&str>, field: &'static str) -> Result<Self, ModelError> {
        match raw.map(str::trim) {
            Some(value) if !value.is_empty() && value != UNDEFINED_SENTINEL => Ok(Self::new(value)),
            _ => Err(ModelError::MissingId(field)),
        }
    }
}

/// Externally addressable node identifier used by rendered views
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(pub u64);

impl Display for ExternalId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
