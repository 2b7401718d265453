//! Error types for gloss.

use miette::Diagnostic;

use crate::anchor::AnchorId;

/// Main error type for gloss operations.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum GlossError {
    /// Persistence backend error
    #[error(transparent)]
    #[diagnostic_source]
    Storage(#[from] StorageError),

    /// Anchor could not be built from a selection
    #[error(transparent)]
    #[diagnostic_source]
    Build(#[from] BuildError),

    /// DOM mutation failed
    #[error(transparent)]
    #[diagnostic_source]
    Dom(#[from] DomError),

    /// Serialization/deserialization error
    #[error(transparent)]
    #[diagnostic(code(gloss::json))]
    Json(#[from] serde_json::Error),

    /// The anchor id is not present in the current document's list.
    #[error("annotation {0} not found")]
    #[diagnostic(code(gloss::unknown_anchor))]
    UnknownAnchor(AnchorId),

    /// The new anchor overlaps one that is already stored for the same block.
    #[error("annotation overlaps existing annotation {0}")]
    #[diagnostic(
        code(gloss::overlap),
        help("highlights cannot be nested or merged; select text outside existing highlights")
    )]
    Overlap(AnchorId),

    /// No document is mounted in the session.
    #[error("no document is mounted")]
    #[diagnostic(code(gloss::not_mounted))]
    NotMounted,
}

/// Errors from the local persistence backend.
#[derive(thiserror::Error, Debug, Diagnostic)]
#[non_exhaustive]
pub enum StorageError {
    #[error("storage backend unavailable: {0}")]
    #[diagnostic(code(gloss::storage::unavailable))]
    Unavailable(String),

    #[error("failed to write user data: {0}")]
    #[diagnostic(code(gloss::storage::write))]
    Write(String),
}

/// Reasons an eligible selection still cannot become an anchor.
#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum BuildError {
    #[error("selection is not inside an annotatable block")]
    #[diagnostic(code(gloss::build::no_block))]
    NoBlock,

    #[error("selection crosses block boundaries")]
    #[diagnostic(
        code(gloss::build::cross_block),
        help("only selections within a single paragraph are supported")
    )]
    CrossBlock,

    #[error("block cannot be located from the content root")]
    #[diagnostic(code(gloss::build::unlocatable))]
    Unlocatable,

    #[error("selection contains no text")]
    #[diagnostic(code(gloss::build::empty))]
    EmptySelection,
}

/// DOM surface errors.
#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DomError {
    #[error("node is not a text node")]
    #[diagnostic(code(gloss::dom::not_text))]
    NotText,

    #[error("offset {offset} is out of bounds for text of length {len}")]
    #[diagnostic(code(gloss::dom::offset))]
    OffsetOutOfBounds { offset: usize, len: usize },

    #[error("node has no parent")]
    #[diagnostic(code(gloss::dom::detached))]
    NoParent,

    #[error("malformed markup at byte {position}: {message}")]
    #[diagnostic(code(gloss::dom::markup))]
    Markup { position: usize, message: String },

    #[error("platform error: {0}")]
    #[diagnostic(code(gloss::dom::platform))]
    Platform(String),
}

impl From<&str> for DomError {
    fn from(s: &str) -> Self {
        DomError::Platform(s.to_string())
    }
}

impl From<String> for DomError {
    fn from(s: String) -> Self {
        DomError::Platform(s)
    }
}

/// Error parsing a stored block locator.
#[derive(thiserror::Error, Debug, Diagnostic, Clone, PartialEq, Eq)]
pub enum LocatorParseError {
    #[error("empty locator")]
    #[diagnostic(code(gloss::locator::empty))]
    Empty,

    #[error("invalid locator segment `{0}`")]
    #[diagnostic(code(gloss::locator::segment))]
    InvalidSegment(String),
}
