use std::io::{Write, stdout};
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::editor::{EditorBuffer, TextEditor};
use crate::files::{STARTER_CSS, STARTER_MARKDOWN, SaveTarget, html_page, load_text, save_text};
use crate::render::OutputMode;
use crate::storage::JsonFileStore;
use crate::surface::{HeadlessPreview, PreviewSurface, SourcePane, SourceSurface};
use crate::watcher::FileWatcher;

use super::{App, HeadlessSession, Session};

const WATCH_DEBOUNCE: Duration = Duration::from_millis(50);
const POLL_INTERVAL: Duration = Duration::from_millis(16);

impl App {
    /// Render the inputs and write the output; with `--watch`, keep doing so
    /// whenever an input file changes.
    ///
    /// # Errors
    /// Returns an error if an input cannot be read, the first render fails,
    /// or the output cannot be written.
    pub fn run(&self) -> Result<()> {
        let _run_scope = crate::perf::scope("app.run.total");
        let mut session = self.build_session()?;
        session.start().context("Initial render failed")?;
        session.run_colorize_jobs();
        self.write_output(&session)?;

        if self.watch_enabled {
            self.watch_loop(&mut session)?;
        }
        session.flush_storage().context("Failed to persist editor contents")?;
        Ok(())
    }

    /// Editors, surfaces and store for the configured inputs.
    ///
    /// Files given on the command line win over stored contents; without
    /// them the store is consulted, then the bundled starter document.
    ///
    /// # Errors
    /// Returns an error if an input file or the store cannot be read.
    pub fn build_session(&self) -> Result<HeadlessSession> {
        let markdown = self.markdown_path.as_deref().map(load_text).transpose()?;
        let css = self.css_path.as_deref().map(load_text).transpose()?;
        let from_files = markdown.is_some() || css.is_some();

        let markdown_editor =
            EditorBuffer::from_text(markdown.as_deref().unwrap_or(STARTER_MARKDOWN));
        let style_editor = EditorBuffer::from_text(css.as_deref().unwrap_or(STARTER_CSS));
        let mut session = Session::new(
            markdown_editor,
            style_editor,
            HeadlessPreview::default(),
            SourcePane::new(),
        )
        .with_render_delay(self.render_delay_ms)
        .with_view(self.view);

        if let Some(path) = &self.store_path {
            let store = JsonFileStore::open(path)
                .with_context(|| format!("Failed to open store {}", path.display()))?;
            session = session.with_store(Box::new(store));
            if !from_files {
                session
                    .restore_from_store()
                    .context("Failed to restore editor contents")?;
            }
        }
        Ok(session)
    }

    fn output_title(&self) -> String {
        self.markdown_path
            .as_deref()
            .and_then(Path::file_stem)
            .map_or_else(|| "stylemark".to_string(), |stem| stem.to_string_lossy().into_owned())
    }

    /// What `--export` selects, from the current session state.
    pub fn output_content(&self, session: &HeadlessSession) -> String {
        match self.export {
            SaveTarget::Markdown => session.markdown().to_string(),
            SaveTarget::Css => session.css().to_string(),
            SaveTarget::Html => {
                let body = match session.mode() {
                    OutputMode::Preview => session.preview().document().unwrap_or_default(),
                    OutputMode::Source => session.source().markup(),
                };
                html_page(&self.output_title(), body)
            }
        }
    }

    fn write_output(&self, session: &HeadlessSession) -> Result<()> {
        let content = self.output_content(session);
        match &self.output_path {
            Some(path) => save_text(path, &content),
            None => {
                let mut out = stdout().lock();
                out.write_all(content.as_bytes())
                    .and_then(|()| out.flush())
                    .context("Failed to write to stdout")
            }
        }
    }

    fn watch_loop(&self, session: &mut HeadlessSession) -> Result<()> {
        let watched = [self.markdown_path.as_deref(), self.css_path.as_deref()];
        let paths = watched.iter().flatten().collect::<Vec<_>>();
        if paths.is_empty() {
            warn!("--watch needs a markdown or CSS file; nothing to watch");
            return Ok(());
        }
        let mut watcher = FileWatcher::new(&paths, WATCH_DEBOUNCE).context("Watch unavailable")?;
        info!(files = paths.len(), "watching for changes");

        let start = Instant::now();
        loop {
            for index in watcher.take_changed() {
                let Some(path) = watcher.target_path(index) else {
                    continue;
                };
                let is_markdown = self.markdown_path.is_some() && index == 0;
                match load_text(path) {
                    Ok(text) if is_markdown => session.markdown_editor_mut().set_value(&text),
                    Ok(text) => session.style_editor_mut().set_value(&text),
                    Err(err) => {
                        warn!(%err, "reload failed");
                        crate::perf::log_event("reload.error", format!("{err:#}"));
                    }
                }
            }

            let now_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            if session.tick(now_ms) {
                if let Some(err) = session.last_error() {
                    warn!(%err, "keeping previous output");
                }
                self.write_output(session)?;
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}
