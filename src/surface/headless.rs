//! A preview surface that lays documents out on a fixed character grid.
//!
//! There is no browser engine here: each block element gets one row per
//! `columns` characters of inline text, headings are taller, and block
//! margins are constant. That is enough to give annotated elements stable,
//! monotonically increasing top offsets for scroll sync and click mapping.

use unicode_width::UnicodeWidthStr;

use crate::error::SurfaceError;
use crate::scroll::{ScrollBehavior, ScrollTarget};

use super::dom::{DomTree, NodeId, ROOT};
use super::{DisplaySurface, PreviewSurface};

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "details", "div", "dl", "dt",
    "figcaption", "figure", "footer", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li",
    "main", "nav", "ol", "p", "pre", "section", "summary", "table", "tbody", "td", "tfoot", "th",
    "thead", "tr", "ul",
];

/// Elements followed by a vertical margin.
const SPACED_ELEMENTS: &[&str] = &[
    "blockquote", "dl", "h1", "h2", "h3", "h4", "h5", "h6", "hr", "ol", "p", "pre", "table", "ul",
];

/// Grid used to lay out the preview.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutMetrics {
    pub line_height: f64,
    pub columns: usize,
    pub block_margin: f64,
    pub viewport_height: f64,
}

impl Default for LayoutMetrics {
    fn default() -> Self {
        Self {
            line_height: 20.0,
            columns: 80,
            block_margin: 10.0,
            viewport_height: 600.0,
        }
    }
}

#[derive(Debug, Clone)]
struct LoadedDocument {
    html: String,
    tree: DomTree,
    content_height: f64,
}

/// In-memory preview surface.
#[derive(Debug, Clone)]
pub struct HeadlessPreview {
    id: String,
    metrics: LayoutMetrics,
    attached: bool,
    document: Option<LoadedDocument>,
    scroll_top: f64,
    last_request: Option<(f64, ScrollBehavior)>,
    visible: bool,
}

impl HeadlessPreview {
    /// A loaded surface holding an empty document.
    pub fn new(metrics: LayoutMetrics) -> Self {
        let mut preview = Self::detached(metrics);
        preview.attach();
        preview
    }

    /// A surface whose document does not exist yet.
    pub fn detached(metrics: LayoutMetrics) -> Self {
        Self {
            id: "preview-frame".to_string(),
            metrics,
            attached: false,
            document: None,
            scroll_top: 0.0,
            last_request: None,
            visible: true,
        }
    }

    /// Finish loading: the surface gets an empty document.
    pub fn attach(&mut self) {
        self.attached = true;
        if self.document.is_none() {
            self.document = Some(layout(String::new(), &self.metrics));
        }
    }

    /// Drop the document, as when the frame is torn down.
    pub fn detach(&mut self) {
        self.attached = false;
        self.document = None;
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub const fn metrics(&self) -> &LayoutMetrics {
        &self.metrics
    }

    /// Clamped scroll position.
    pub const fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    /// Offset and behavior of the latest scroll request, before clamping.
    pub const fn last_scroll_request(&self) -> Option<(f64, ScrollBehavior)> {
        self.last_request
    }

    pub fn tree(&self) -> Option<&DomTree> {
        self.document.as_ref().map(|doc| &doc.tree)
    }

    /// Top offset of an element.
    pub fn element_top(&self, id: NodeId) -> Option<f64> {
        self.tree()?.get(id).map(|element| element.top)
    }

    fn loaded(&self) -> Result<&LoadedDocument, SurfaceError> {
        self.document
            .as_ref()
            .filter(|_| self.attached)
            .ok_or(SurfaceError::NotReady)
    }
}

impl Default for HeadlessPreview {
    fn default() -> Self {
        Self::new(LayoutMetrics::default())
    }
}

impl DisplaySurface for HeadlessPreview {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }
}

impl ScrollTarget for HeadlessPreview {
    fn scroll_height(&self) -> Result<f64, SurfaceError> {
        let doc = self.loaded()?;
        Ok(doc.content_height.max(self.metrics.viewport_height))
    }

    fn viewport_height(&self) -> Result<f64, SurfaceError> {
        self.loaded()?;
        Ok(self.metrics.viewport_height)
    }

    fn line_top(&self, line: usize) -> Result<Option<f64>, SurfaceError> {
        let doc = self.loaded()?;
        Ok(doc
            .tree
            .first_with_line(line)
            .and_then(|id| doc.tree.get(id))
            .map(|element| element.top))
    }

    fn scroll_to(&mut self, offset: f64, behavior: ScrollBehavior) -> Result<(), SurfaceError> {
        let max_scroll = (self.scroll_height()? - self.metrics.viewport_height).max(0.0);
        self.last_request = Some((offset, behavior));
        self.scroll_top = offset.clamp(0.0, max_scroll);
        Ok(())
    }
}

impl PreviewSurface for HeadlessPreview {
    fn write_document(&mut self, html: &str) -> Result<(), SurfaceError> {
        if !self.attached {
            return Err(SurfaceError::NotReady);
        }
        let _scope = crate::perf::scope("preview.layout");
        let doc = layout(html.to_string(), &self.metrics);
        let max_scroll = (doc.content_height - self.metrics.viewport_height).max(0.0);
        self.scroll_top = self.scroll_top.min(max_scroll);
        self.document = Some(doc);
        Ok(())
    }

    fn document(&self) -> Option<&str> {
        self.document.as_ref().map(|doc| doc.html.as_str())
    }

    fn annotated_line_for(&self, node: NodeId) -> Result<Option<usize>, SurfaceError> {
        let doc = self.loaded()?;
        if doc.tree.get(node).is_none() {
            return Err(SurfaceError::UnknownNode(node));
        }
        Ok(doc.tree.nearest_annotated_line(node))
    }
}

fn layout(html: String, metrics: &LayoutMetrics) -> LoadedDocument {
    let mut tree = DomTree::parse(&html);
    let content_height = layout_block(&mut tree, ROOT, 0.0, metrics);
    LoadedDocument {
        html,
        tree,
        content_height,
    }
}

fn is_block(tag: &str) -> bool {
    BLOCK_ELEMENTS.contains(&tag)
}

fn heading_scale(tag: &str) -> f64 {
    match tag {
        "h1" => 2.0,
        "h2" => 1.5,
        "h3" => 1.25,
        _ => 1.0,
    }
}

/// Lay out a block and its descendants starting at `y`; returns the y below it.
fn layout_block(tree: &mut DomTree, id: NodeId, mut y: f64, metrics: &LayoutMetrics) -> f64 {
    let Some(element) = tree.get(id) else {
        return y;
    };
    let tag = element.tag.clone();
    let top = y;

    let rows = if tag == "pre" {
        let text = collect_text(tree, id);
        if text.is_empty() {
            0
        } else {
            text.trim_end_matches('\n').lines().count().max(1)
        }
    } else {
        let width = inline_width(tree, id);
        width.div_ceil(metrics.columns.max(1))
    };
    let rows = if tag == "hr" { 1 } else { rows };
    y += rows as f64 * metrics.line_height * heading_scale(&tag);

    let children = tree.get(id).map(|el| el.children.clone()).unwrap_or_default();
    for child in children {
        y = layout_child(tree, child, top, y, metrics);
    }

    if SPACED_ELEMENTS.contains(&tag.as_str()) {
        y += metrics.block_margin;
    }
    if let Some(element) = tree.get_mut(id) {
        element.top = top;
        element.height = y - top;
    }
    y
}

/// Inline children sit on their block's first row; blocks nested inside
/// inline elements still get their own rows.
fn layout_child(
    tree: &mut DomTree,
    id: NodeId,
    block_top: f64,
    y: f64,
    metrics: &LayoutMetrics,
) -> f64 {
    let is_block_child = tree.get(id).is_some_and(|el| is_block(&el.tag));
    if is_block_child {
        return layout_block(tree, id, y, metrics);
    }
    let children = tree.get(id).map(|el| el.children.clone()).unwrap_or_default();
    let mut y = y;
    for child in children {
        y = layout_child(tree, child, block_top, y, metrics);
    }
    if let Some(element) = tree.get_mut(id) {
        element.top = block_top;
        element.height = metrics.line_height;
    }
    y
}

/// Display width of the text a block lays out itself, excluding nested blocks.
fn inline_width(tree: &DomTree, id: NodeId) -> usize {
    let Some(element) = tree.get(id) else {
        return 0;
    };
    let own = element.text.trim().width();
    element
        .children
        .iter()
        .filter(|child| tree.get(**child).is_some_and(|el| !is_block(&el.tag)))
        .map(|child| inline_width(tree, *child))
        .sum::<usize>()
        + own
}

fn collect_text(tree: &DomTree, id: NodeId) -> String {
    let Some(element) = tree.get(id) else {
        return String::new();
    };
    let mut text = element.text.clone();
    for child in &element.children {
        text.push_str(&collect_text(tree, *child));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> LayoutMetrics {
        LayoutMetrics {
            line_height: 10.0,
            columns: 10,
            block_margin: 5.0,
            viewport_height: 50.0,
        }
    }

    #[test]
    fn test_detached_surface_is_not_ready() {
        let mut preview = HeadlessPreview::detached(metrics());
        assert_eq!(preview.scroll_height(), Err(SurfaceError::NotReady));
        assert_eq!(preview.write_document("<p>x</p>"), Err(SurfaceError::NotReady));
        preview.attach();
        assert!(preview.write_document("<p>x</p>").is_ok());
    }

    #[test]
    fn test_blocks_stack_vertically() {
        let mut preview = HeadlessPreview::new(metrics());
        preview
            .write_document(
                r#"<h1 data-source-line="1">Hi</h1><p data-source-line="3">twelve chars</p><p data-source-line="5">x</p>"#,
            )
            .unwrap();
        // h1: 1 row * 10 * 2.0 + margin 5
        assert_eq!(preview.line_top(1), Ok(Some(0.0)));
        assert_eq!(preview.line_top(3), Ok(Some(25.0)));
        // "twelve chars" wraps onto two rows
        assert_eq!(preview.line_top(5), Ok(Some(50.0)));
        assert_eq!(preview.line_top(4), Ok(None));
    }

    #[test]
    fn test_scroll_height_is_at_least_viewport() {
        let mut preview = HeadlessPreview::new(metrics());
        preview.write_document("<p>x</p>").unwrap();
        assert_eq!(preview.scroll_height(), Ok(50.0));
    }

    #[test]
    fn test_scroll_is_clamped_but_request_recorded() {
        let mut preview = HeadlessPreview::new(metrics());
        let long = "<p>row</p>".repeat(20);
        preview.write_document(&long).unwrap();
        let height = preview.scroll_height().unwrap();
        preview.scroll_to(-30.0, ScrollBehavior::Smooth).unwrap();
        assert_eq!(preview.scroll_top(), 0.0);
        preview.scroll_to(height, ScrollBehavior::Smooth).unwrap();
        assert_eq!(preview.scroll_top(), height - 50.0);
        assert_eq!(
            preview.last_scroll_request(),
            Some((height, ScrollBehavior::Smooth))
        );
    }

    #[test]
    fn test_pre_rows_follow_source_lines() {
        let mut preview = HeadlessPreview::new(metrics());
        preview
            .write_document(
                "<pre data-source-line=\"1\"><code>a\nb\nc\n</code></pre><p data-source-line=\"6\">x</p>",
            )
            .unwrap();
        assert_eq!(preview.line_top(6), Ok(Some(35.0)));
    }

    #[test]
    fn test_click_maps_to_nearest_annotated_ancestor() {
        let mut preview = HeadlessPreview::new(metrics());
        preview
            .write_document(r#"<p data-source-line="7">see <a href="/x"><em>here</em></a></p>"#)
            .unwrap();
        let tree = preview.tree().unwrap();
        let em = tree.elements_by_tag("em").next().unwrap();
        assert_eq!(preview.annotated_line_for(em), Ok(Some(7)));
        assert_eq!(preview.annotated_line_for(ROOT), Ok(None));
        assert_eq!(
            preview.annotated_line_for(999),
            Err(SurfaceError::UnknownNode(999))
        );
    }

    #[test]
    fn test_inline_elements_share_block_top() {
        let mut preview = HeadlessPreview::new(metrics());
        preview
            .write_document(r#"<p>a</p><p data-source-line="2">b <strong>c</strong></p>"#)
            .unwrap();
        let tree = preview.tree().unwrap();
        let strong = tree.elements_by_tag("strong").next().unwrap();
        assert_eq!(preview.element_top(strong), preview.line_top(2).unwrap());
    }
}
