// Only allow lints that are either transitive-dependency noise or
// genuinely opinionated style choices that don't indicate real issues.
#![allow(
    // Transitive dependency version mismatches we can't control
    clippy::multiple_crate_versions,
    // module_name_repetitions is pure style preference (e.g. render::RenderError)
    clippy::module_name_repetitions
)]

//! # Stylemark
//!
//! The core of a live markdown and CSS editor: text goes in, a sanitized,
//! style-inlined preview comes out, and the preview follows the editor
//! cursor.
//!
//! ## Pipeline
//!
//! 1. [`render`] turns markdown into HTML, annotating block elements with
//!    the source line they came from in preview mode.
//! 2. [`sanitize`] inlines the stylesheet and strips anything that could run
//!    script.
//! 3. [`app::Session`] writes the result into the active [`surface`], driven
//!    by the debouncers in [`schedule`].
//! 4. [`scroll`] maps the cursor line to a scroll offset in the preview,
//!    interpolating between annotated elements.
//!
//! ## Modules
//!
//! - [`app`]: sync state machine and CLI driver
//! - [`editor`]: text editor capability and a rope-backed implementation
//! - [`storage`]: persisted editor contents
//! - [`highlight`]: colorized generated source
//! - [`watcher`]: file watching for `--watch`

pub mod app;
pub mod config;
pub mod editor;
pub mod error;
pub mod files;
pub mod highlight;
pub mod perf;
pub mod render;
pub mod sanitize;
pub mod schedule;
pub mod scroll;
pub mod storage;
pub mod surface;
pub mod watcher;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::app::{HeadlessSession, Message, Session, update};
    pub use crate::editor::{EditorBuffer, EditorEvent, TextEditor};
    pub use crate::error::{SessionError, SurfaceError};
    pub use crate::render::{OutputMode, Renderer};
    pub use crate::surface::{HeadlessPreview, PreviewSurface, SourcePane, SourceSurface};
}
