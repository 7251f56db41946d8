use std::collections::VecDeque;

use tracing::{debug, info, warn};

use crate::editor::{EditorEvent, TextEditor};
use crate::error::{SessionError, SessionResult, StorageError};
use crate::render::{OutputMode, Renderer};
use crate::schedule::{Debouncer, LAYOUT_DELAY_MS, RENDER_DELAY_MS};
use crate::scroll::scroll_to_line;
use crate::storage::{KeyValueStore, Storage};
use crate::surface::{NodeId, PreviewSurface, SourceSurface, matches_mode};

use super::effects::ColorizeJob;

/// A persistent store plus the debounced values written into it.
pub(super) struct Persistence {
    pub(super) storage: Storage,
    pub(super) store: Box<dyn KeyValueStore>,
}

/// Counters for completed render actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub renders: usize,
    pub failures: usize,
}

/// The sync state machine between the editors and the output surfaces.
///
/// All state is private and changes only through the setters below. Time is
/// supplied by the host through [`Session::tick`]; setters schedule work
/// relative to the latest tick.
pub struct Session<E, P, S> {
    pub(super) markdown_editor: E,
    pub(super) style_editor: E,
    pub(super) preview: P,
    pub(super) source: S,
    pub(super) renderer: Renderer,

    pub(super) mode: OutputMode,
    pub(super) markdown: String,
    pub(super) css: String,
    pub(super) cursor_line: usize,
    pub(super) max_line: usize,

    pub(super) render_debouncer: Debouncer,
    pub(super) layout_debouncer: Debouncer,
    pub(super) now_ms: u64,

    /// Bumped by every source-mode render.
    pub(super) generation: u64,
    pub(super) colorize_queue: VecDeque<ColorizeJob>,
    /// Held while a render action runs.
    pub(super) rendering: bool,
    /// Set once a document has been written with click-to-source enabled.
    pub(super) click_to_source: bool,
    pub(super) page_host: String,

    pub(super) artifact: Option<String>,
    pub(super) stats: RenderStats,
    pub(super) last_error: Option<SessionError>,
    pub(super) persistence: Option<Persistence>,
}

impl<E, P, S> Session<E, P, S>
where
    E: TextEditor,
    P: PreviewSurface,
    S: SourceSurface,
{
    /// Build a session over the given editors and surfaces.
    ///
    /// The texts are read from the editors; nothing is rendered until
    /// [`Session::start`].
    pub fn new(mut markdown_editor: E, mut style_editor: E, preview: P, source: S) -> Self {
        markdown_editor.take_events();
        style_editor.take_events();
        let markdown = markdown_editor.value();
        let css = style_editor.value();
        let max_line = markdown_editor.line_count();
        Self {
            markdown_editor,
            style_editor,
            preview,
            source,
            renderer: Renderer::new(),
            mode: OutputMode::Preview,
            markdown,
            css,
            cursor_line: 0,
            max_line,
            render_debouncer: Debouncer::trailing(RENDER_DELAY_MS),
            layout_debouncer: Debouncer::leading(LAYOUT_DELAY_MS),
            now_ms: 0,
            generation: 0,
            colorize_queue: VecDeque::new(),
            rendering: false,
            click_to_source: false,
            page_host: String::new(),
            artifact: None,
            stats: RenderStats::default(),
            last_error: None,
            persistence: None,
        }
    }

    #[must_use]
    pub fn with_render_delay(mut self, delay_ms: u64) -> Self {
        self.render_debouncer = Debouncer::trailing(delay_ms);
        self
    }

    /// Start in `mode` instead of the preview.
    #[must_use]
    pub const fn with_view(mut self, mode: OutputMode) -> Self {
        self.mode = mode;
        self
    }

    /// Host the preview page is served from; links to other hosts open in
    /// a new window.
    #[must_use]
    pub fn with_page_host(mut self, host: impl Into<String>) -> Self {
        self.page_host = host.into();
        self
    }

    /// Persist markdown and CSS edits into `store`.
    #[must_use]
    pub fn with_store(mut self, store: Box<dyn KeyValueStore>) -> Self {
        self.persistence = Some(Persistence {
            storage: Storage::new(),
            store,
        });
        self
    }

    /// Show the surface for the initial mode and render immediately.
    ///
    /// # Errors
    /// Returns the render failure, if any.
    pub fn start(&mut self) -> SessionResult<()> {
        self.sync_visibility();
        self.render_now()
    }

    /// Replace the editors' contents with previously stored values.
    ///
    /// Returns whether anything was restored.
    ///
    /// # Errors
    /// Returns an error if the store cannot be read, or the cursor sync
    /// failure raised while applying the restored text. The editors and
    /// session texts are updated either way.
    pub fn restore_from_store(&mut self) -> SessionResult<bool> {
        let Some(persistence) = &self.persistence else {
            return Ok(false);
        };
        let markdown = persistence
            .storage
            .markdown
            .get_value(persistence.store.as_ref())?;
        let css = persistence.storage.css.get_value(persistence.store.as_ref())?;
        let restored = markdown.is_some() || css.is_some();
        if let Some(markdown) = markdown {
            self.markdown_editor.set_value(&markdown);
        }
        if let Some(css) = css {
            self.style_editor.set_value(&css);
        }
        if restored {
            info!("restored editor contents from store");
            self.pump_editor_events()?;
        }
        Ok(restored)
    }

    pub const fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn markdown(&self) -> &str {
        &self.markdown
    }

    pub fn css(&self) -> &str {
        &self.css
    }

    pub const fn cursor_line(&self) -> usize {
        self.cursor_line
    }

    pub const fn max_line(&self) -> usize {
        self.max_line
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub const fn stats(&self) -> RenderStats {
        self.stats
    }

    /// The sanitized document of the last successful render.
    pub fn artifact(&self) -> Option<&str> {
        self.artifact.as_deref()
    }

    pub const fn last_error(&self) -> Option<&SessionError> {
        self.last_error.as_ref()
    }

    pub const fn is_render_pending(&self) -> bool {
        self.render_debouncer.is_pending()
    }

    pub fn pending_colorize_jobs(&self) -> usize {
        self.colorize_queue.len()
    }

    pub const fn preview(&self) -> &P {
        &self.preview
    }

    pub const fn preview_mut(&mut self) -> &mut P {
        &mut self.preview
    }

    pub const fn source(&self) -> &S {
        &self.source
    }

    pub const fn markdown_editor(&self) -> &E {
        &self.markdown_editor
    }

    /// Edit through this handle, then call [`Session::pump_editor_events`]
    /// or [`Session::tick`].
    pub const fn markdown_editor_mut(&mut self) -> &mut E {
        &mut self.markdown_editor
    }

    pub const fn style_editor(&self) -> &E {
        &self.style_editor
    }

    pub const fn style_editor_mut(&mut self) -> &mut E {
        &mut self.style_editor
    }

    /// Switch the output mode.
    ///
    /// Renders synchronously into the new mode's surface, then shows it and
    /// hides the other one. Setting the current mode does nothing.
    ///
    /// # Errors
    /// Returns the render failure; visibility is switched regardless.
    pub fn set_view(&mut self, mode: OutputMode) -> SessionResult<()> {
        if self.mode == mode {
            return Ok(());
        }
        info!(from = %self.mode, to = %mode, "switching view");
        self.mode = mode;
        let result = if self.rendering {
            self.render_debouncer.schedule(self.now_ms);
            Ok(())
        } else {
            self.render_now()
        };
        self.sync_visibility();
        result
    }

    /// Store new markdown and schedule a render. Returns whether it changed.
    pub fn set_markdown_source(&mut self, text: &str) -> bool {
        if self.markdown == text {
            return false;
        }
        self.markdown = text.to_string();
        if let Some(persistence) = &mut self.persistence {
            persistence.storage.markdown.set_value(text, self.now_ms);
        }
        self.render_debouncer.schedule(self.now_ms);
        debug!(bytes = text.len(), "markdown changed");
        true
    }

    /// Store new CSS and schedule a render. Returns whether it changed.
    pub fn set_css_source(&mut self, text: &str) -> bool {
        if self.css == text {
            return false;
        }
        self.css = text.to_string();
        if let Some(persistence) = &mut self.persistence {
            persistence.storage.css.set_value(text, self.now_ms);
        }
        self.render_debouncer.schedule(self.now_ms);
        debug!(bytes = text.len(), "css changed");
        true
    }

    /// Line count of the markdown editor, the bottom line for scroll sync.
    pub const fn set_max_line(&mut self, max_line: usize) {
        self.max_line = max_line;
    }

    /// Store the cursor line and scroll the preview to it right away.
    ///
    /// Returns the requested scroll offset, or `None` if the line did not
    /// change.
    ///
    /// # Errors
    /// [`crate::error::SurfaceError::NotReady`] if the preview has not
    /// loaded.
    pub fn set_cursor_line(&mut self, line: usize) -> SessionResult<Option<f64>> {
        if self.cursor_line == line {
            return Ok(None);
        }
        self.cursor_line = line;
        let offset = scroll_to_line(&mut self.preview, line, self.max_line)?;
        Ok(Some(offset))
    }

    /// Cancel the pending render and run it now.
    ///
    /// # Errors
    /// Returns the render failure; the previous output stays visible.
    pub fn render_now(&mut self) -> SessionResult<()> {
        self.render_debouncer.flush_now();
        self.render_output()
    }

    /// Request relayout of both editors; leading-edge debounced.
    pub fn request_layout(&mut self) {
        if self.layout_debouncer.schedule(self.now_ms) {
            self.markdown_editor.layout();
            self.style_editor.layout();
        }
    }

    /// Reveal the source line of a clicked preview element in the editor.
    ///
    /// Returns the revealed line, or `None` if the click hit nothing
    /// annotated or click-to-source is not active.
    ///
    /// # Errors
    /// [`crate::error::SurfaceError::NotReady`] before the preview has
    /// loaded, [`crate::error::SurfaceError::UnknownNode`] for a node that is
    /// not in the current document.
    pub fn preview_clicked(&mut self, node: NodeId) -> SessionResult<Option<usize>> {
        let line = self.preview.annotated_line_for(node)?;
        if !self.click_to_source || self.mode != OutputMode::Preview {
            return Ok(None);
        }
        if let Some(line) = line {
            self.markdown_editor.reveal_line_in_center(line);
        }
        Ok(line)
    }

    /// Apply pending editor notifications through the setters.
    ///
    /// # Errors
    /// Returns the first cursor-sync failure; later events are still applied.
    pub fn pump_editor_events(&mut self) -> SessionResult<()> {
        let mut first_error = None;
        for event in self.markdown_editor.take_events() {
            let result = match event {
                EditorEvent::ContentChanged => {
                    self.set_max_line(self.markdown_editor.line_count());
                    let text = self.markdown_editor.value();
                    self.set_markdown_source(&text);
                    Ok(())
                }
                EditorEvent::CursorMoved { line } => self.set_cursor_line(line).map(|_| ()),
            };
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        }
        if self
            .style_editor
            .take_events()
            .contains(&EditorEvent::ContentChanged)
        {
            let text = self.style_editor.value();
            self.set_css_source(&text);
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Advance the clock to `now_ms` and run whatever is due.
    ///
    /// This is the error boundary of the host loop: failures are logged and
    /// kept in [`Session::last_error`] until the next tick, never returned.
    /// Returns whether a render ran.
    pub fn tick(&mut self, now_ms: u64) -> bool {
        self.now_ms = self.now_ms.max(now_ms);
        let now = self.now_ms;
        self.last_error = None;

        if let Err(err) = self.pump_editor_events() {
            warn!(%err, "cursor sync failed");
            self.last_error = Some(err);
        }

        let rendered = self.render_debouncer.take_ready(now);
        if rendered && let Err(err) = self.render_output() {
            self.last_error = Some(err);
        }
        self.layout_debouncer.take_ready(now);
        self.run_colorize_jobs();

        if let Some(persistence) = &mut self.persistence
            && let Err(err) = persistence.storage.tick(persistence.store.as_mut(), now)
        {
            warn!(%err, "failed to persist editor contents");
        }
        rendered
    }

    /// Write any queued store values now.
    ///
    /// # Errors
    /// Returns the store write failure.
    pub fn flush_storage(&mut self) -> Result<(), StorageError> {
        match &mut self.persistence {
            Some(persistence) => persistence.storage.flush(persistence.store.as_mut()),
            None => Ok(()),
        }
    }

    /// Show the surface whose id starts with the mode name; hide the other.
    pub(super) fn sync_visibility(&mut self) {
        let mode = self.mode.as_str();
        let show_preview = matches_mode(self.preview.id(), mode);
        let show_source = matches_mode(self.source.id(), mode);
        self.preview.set_visible(show_preview);
        self.source.set_visible(show_source);
    }
}

impl<E, P, S> std::fmt::Debug for Session<E, P, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("mode", &self.mode)
            .field("markdown_len", &self.markdown.len())
            .field("css_len", &self.css.len())
            .field("cursor_line", &self.cursor_line)
            .field("max_line", &self.max_line)
            .field("generation", &self.generation)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}
