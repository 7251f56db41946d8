//! Error types for the render and sync pipeline.
//!
//! Each layer has its own enum so callers can tell a render failure (the
//! previous artifact stays on screen) from a surface that is not ready yet
//! (a programming error on the caller's side).

use std::path::PathBuf;

use thiserror::Error;

/// Markdown transform failures.
#[derive(Error, Debug)]
pub enum RenderError {
    /// The HTML formatter failed while writing output.
    #[error("markdown formatting failed: {0}")]
    Format(#[from] std::io::Error),

    /// The formatter produced bytes that are not UTF-8.
    #[error("rendered HTML is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Failures while inlining styles or sanitizing markup.
#[derive(Error, Debug)]
pub enum SanitizeError {
    /// CSS could not be parsed or applied.
    #[error("style inlining failed: {0}")]
    Inline(String),
}

/// Errors raised by a display surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    /// The surface has no loaded document or window yet.
    #[error("preview surface is not interactable")]
    NotReady,

    /// A click target that does not belong to the current document.
    #[error("node {0} is not part of the current preview document")]
    UnknownNode(usize),
}

/// Persistent store failures.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Could not read the backing file.
    #[error("could not read store {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not write the backing file.
    #[error("could not write store {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The backing file is not a JSON object of strings.
    #[error("store {path} is corrupt")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors surfaced by a render pass of the session.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Sanitize(#[from] SanitizeError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type SessionResult<T> = Result<T, SessionError>;
