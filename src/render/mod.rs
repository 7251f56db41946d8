//! Markdown to HTML rendering.
//!
//! This module handles:
//! - Configuring comrak with the shared extension set
//! - Producing a `preview` variant annotated with source lines
//! - Producing a `source` variant without annotations

mod annotate;
mod extensions;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use comrak::{Arena, Options, format_html, parse_document};

use crate::error::RenderError;

pub use annotate::{
    LINE_ATTRIBUTE, clear_footnote_positions, neutralize_raw_annotations,
    rewrite_source_positions, scan_annotations,
};
pub use extensions::{
    Abbreviations, Containers, Extension, InsertMark, RenderContext, default_extensions,
};
pub(crate) use extensions::escape_html;

/// Which display surface the render targets.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputMode {
    /// Live document written into the preview surface.
    #[default]
    Preview,
    /// Sanitized HTML shown as highlighted text.
    Source,
}

impl OutputMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Source => "source",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preview" => Ok(Self::Preview),
            "source" => Ok(Self::Source),
            other => Err(format!("unknown view: {other}")),
        }
    }
}

type ExtensionSet = Arc<[Box<dyn Extension>]>;

/// One configured markdown transform.
pub struct MarkdownTransform {
    extensions: ExtensionSet,
    annotate_lines: bool,
}

impl MarkdownTransform {
    fn new(extensions: ExtensionSet) -> Self {
        Self {
            extensions,
            annotate_lines: false,
        }
    }

    /// Tag generated block elements with their source line.
    const fn with_line_annotations(mut self) -> Self {
        self.annotate_lines = true;
        self
    }

    pub const fn annotates_lines(&self) -> bool {
        self.annotate_lines
    }

    /// Names of the non-comrak extensions in application order.
    pub fn extension_names(&self) -> Vec<&'static str> {
        self.extensions.iter().map(|ext| ext.name()).collect()
    }

    /// Render markdown to an HTML fragment.
    ///
    /// # Errors
    /// Returns an error if the comrak formatter fails to write its output.
    pub fn render(&self, markdown: &str) -> Result<String, RenderError> {
        let _scope = crate::perf::scope("render.markdown");

        let mut ctx = RenderContext::new(markdown);
        for ext in self.extensions.iter() {
            ext.prepare(&mut ctx);
        }

        let arena = Arena::new();
        let mut options = Options::default();
        self.configure(&mut options);
        let root = parse_document(&arena, &ctx.text, &options);
        for ext in self.extensions.iter() {
            ext.transform(&arena, root);
        }
        neutralize_raw_annotations(root);
        if self.annotate_lines {
            clear_footnote_positions(root);
        }

        let mut bytes = Vec::with_capacity(ctx.text.len() * 2);
        format_html(root, &options, &mut bytes)?;
        let mut html = String::from_utf8(bytes)?;

        if self.annotate_lines {
            html = rewrite_source_positions(&html);
        }
        for ext in self.extensions.iter() {
            html = ext.finish(html, &ctx, self.annotate_lines);
        }
        Ok(html)
    }

    fn configure(&self, options: &mut Options) {
        // Base options
        options.render.unsafe_ = true;
        options.extension.autolink = true;
        options.parse.smart = true;

        // Extensions comrak handles itself
        options.extension.description_lists = true;
        options.extension.shortcodes = true;
        options.extension.footnotes = true;
        options.extension.superscript = true;
        options.extension.subscript = true;
        options.extension.strikethrough = true;
        options.extension.table = true;

        options.render.sourcepos = self.annotate_lines;
    }
}

/// Holds one transform per output mode.
pub struct Renderer {
    preview: MarkdownTransform,
    source: MarkdownTransform,
}

impl Renderer {
    pub fn new() -> Self {
        let extensions: ExtensionSet = default_extensions().into();
        Self {
            preview: MarkdownTransform::new(Arc::clone(&extensions)).with_line_annotations(),
            source: MarkdownTransform::new(extensions),
        }
    }

    pub const fn transform(&self, mode: OutputMode) -> &MarkdownTransform {
        match mode {
            OutputMode::Preview => &self.preview,
            OutputMode::Source => &self.source,
        }
    }

    /// Render `markdown` for the given mode.
    ///
    /// # Errors
    /// Propagates formatter failures from the underlying transform.
    pub fn render(&self, markdown: &str, mode: OutputMode) -> Result<String, RenderError> {
        let html = self.transform(mode).render(markdown)?;
        crate::perf::log_event(
            "render.html",
            format!("mode={mode} in={} out={}", markdown.len(), html.len()),
        );
        Ok(html)
    }
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new()
    }
}
