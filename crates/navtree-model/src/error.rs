//! Error types for the data model

/// Errors raised while building or parsing model values
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// Identifier is empty or the drag-and-drop sentinel
    #[error("missing identifier for {0}")]
    MissingId(&'static str),

    /// Path contains an empty segment
    #[error("ancestor path contains empty segment")]
    EmptySegment,

    /// Path is not a descendant of the given ancestor
    #[error("path '{path}' is not a descendant of '{ancestor}'")]
    NotDescendant { path: String, ancestor: String },

    /// Nested set bounds are inverted or overlap incorrectly
    #[error("invalid nested set bounds: left {left}, right {right}")]
    InvalidBounds { left: u32, right: u32 },

    /// Position value could not be parsed
    #[error("invalid position: {0}")]
    InvalidPosition(String),
}
