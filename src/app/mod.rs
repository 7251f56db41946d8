//! The sync state machine and the command-line driver around it.
//!
//! Organised the Elm way:
//! - [`Session`]: the complete editing state (texts, mode, cursor, timers)
//! - [`Message`]: everything a host can report to the session
//! - [`update`]: applies a message through the session's setters
//! - [`App::run`]: renders files once, or keeps re-rendering with `--watch`

mod effects;
mod event_loop;
mod model;
mod update;

pub use model::{RenderStats, Session};
pub use update::{Message, update};

use std::path::PathBuf;

use crate::editor::EditorBuffer;
use crate::files::SaveTarget;
use crate::render::OutputMode;
use crate::schedule::RENDER_DELAY_MS;
use crate::surface::{HeadlessPreview, SourcePane};

/// The session the CLI drives.
pub type HeadlessSession = Session<EditorBuffer, HeadlessPreview, SourcePane>;

/// Command-line driver: loads the inputs, renders, writes the output.
#[derive(Debug, Clone)]
pub struct App {
    markdown_path: Option<PathBuf>,
    css_path: Option<PathBuf>,
    output_path: Option<PathBuf>,
    export: SaveTarget,
    view: OutputMode,
    watch_enabled: bool,
    render_delay_ms: u64,
    store_path: Option<PathBuf>,
}

impl App {
    pub const fn new(markdown_path: Option<PathBuf>) -> Self {
        Self {
            markdown_path,
            css_path: None,
            output_path: None,
            export: SaveTarget::Html,
            view: OutputMode::Preview,
            watch_enabled: false,
            render_delay_ms: RENDER_DELAY_MS,
            store_path: None,
        }
    }

    #[must_use]
    pub fn with_css(mut self, path: Option<PathBuf>) -> Self {
        self.css_path = path;
        self
    }

    /// Write to `path` instead of stdout.
    #[must_use]
    pub fn with_output(mut self, path: Option<PathBuf>) -> Self {
        self.output_path = path;
        self
    }

    #[must_use]
    pub const fn with_export(mut self, export: SaveTarget) -> Self {
        self.export = export;
        self
    }

    #[must_use]
    pub const fn with_view(mut self, view: OutputMode) -> Self {
        self.view = view;
        self
    }

    #[must_use]
    pub const fn with_watch(mut self, enabled: bool) -> Self {
        self.watch_enabled = enabled;
        self
    }

    #[must_use]
    pub const fn with_render_delay(mut self, delay_ms: u64) -> Self {
        self.render_delay_ms = delay_ms;
        self
    }

    /// Persist edits in a JSON store at `path`.
    #[must_use]
    pub fn with_store(mut self, path: Option<PathBuf>) -> Self {
        self.store_path = path;
        self
    }
}

#[cfg(test)]
mod tests;
