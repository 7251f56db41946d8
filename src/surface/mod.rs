//! Display surfaces the session renders into.
//!
//! The preview surface holds a written HTML document with layout geometry;
//! the source surface shows colorized generated markup. Both are toggled by
//! the session so that exactly one is visible at a time.

pub mod dom;
mod headless;
mod links;
mod source;

pub use dom::{DomTree, Element, NodeId, ROOT};
pub use headless::{HeadlessPreview, LayoutMetrics};
pub use links::{is_external, link_host, mark_external_links, normalize_host};
pub use source::SourcePane;

use crate::error::SurfaceError;
use crate::scroll::ScrollTarget;

/// A surface that can be shown or hidden.
pub trait DisplaySurface {
    /// Identifier; the session shows the surface whose id starts with the
    /// active mode name.
    fn id(&self) -> &str;

    fn set_visible(&mut self, visible: bool);

    fn is_visible(&self) -> bool;
}

/// The rendered document pane.
pub trait PreviewSurface: DisplaySurface + ScrollTarget {
    /// Replace the current document with `html`.
    ///
    /// # Errors
    /// [`SurfaceError::NotReady`] if the surface has not loaded yet.
    fn write_document(&mut self, html: &str) -> Result<(), SurfaceError>;

    /// The last written document, if any.
    fn document(&self) -> Option<&str>;

    /// Source line of the nearest annotated element at or above `node`.
    ///
    /// # Errors
    /// [`SurfaceError::NotReady`] before load, [`SurfaceError::UnknownNode`]
    /// for an id outside the current document.
    fn annotated_line_for(&self, node: NodeId) -> Result<Option<usize>, SurfaceError>;
}

/// The generated-source pane.
pub trait SourceSurface: DisplaySurface {
    /// Show colorized `markup` produced by render `generation`.
    ///
    /// Returns `false`, leaving the pane untouched, when a newer generation
    /// is already on display.
    fn show(&mut self, generation: u64, markup: String) -> bool;

    fn markup(&self) -> &str;
}

/// Whether a surface id selects the given mode name.
pub fn matches_mode(surface_id: &str, mode: &str) -> bool {
    surface_id.starts_with(mode)
}
