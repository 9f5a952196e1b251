//! Error handling for font loading and layout operations

use std::path::PathBuf;

/// Errors raised while constructing a bitmap font.
///
/// Font construction is the only fallible resource path: a failure here is
/// fatal to the font being built, never to the process. Layout itself
/// sanitizes bad data instead of failing (see `layout`).
#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("malformed font descriptor at line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("page image not found: {0:?}")]
    MissingPage(PathBuf),

    #[error("page id out of sequence: expected {expected}, found {found}")]
    PageOutOfSequence { expected: usize, found: usize },

    #[error("page count mismatch: descriptor declares {declared}, {supplied} supplied")]
    PageCountMismatch { declared: usize, supplied: usize },

    #[error("font is not in state {expected}: {found}")]
    InvalidState {
        expected: &'static str,
        found: &'static str,
    },

    #[error("IO operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("page image decode failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Errors surfaced at the layout API boundary.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("operation on a disposed font")]
    Disposed,
}
