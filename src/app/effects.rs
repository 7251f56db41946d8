use tracing::{debug, warn};

use crate::editor::TextEditor;
use crate::error::SessionResult;
use crate::highlight::{colorize_html, plain_html};
use crate::render::OutputMode;
use crate::sanitize::build_document;
use crate::surface::{PreviewSurface, SourceSurface, mark_external_links};

use super::Session;

/// Deferred colorizing of one source-mode render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct ColorizeJob {
    pub(super) generation: u64,
    pub(super) source: String,
}

impl<E, P, S> Session<E, P, S>
where
    E: TextEditor,
    P: PreviewSurface,
    S: SourceSurface,
{
    /// The render action: rebuild the artifact and write it to the active
    /// surface.
    ///
    /// While a render is in progress further requests are only scheduled.
    pub(super) fn render_output(&mut self) -> SessionResult<()> {
        if self.rendering {
            debug!("render requested while rendering; scheduling instead");
            self.render_debouncer.schedule(self.now_ms);
            return Ok(());
        }
        self.rendering = true;
        let result = self.write_active_surface();
        self.rendering = false;

        self.stats.renders += 1;
        if let Err(err) = &result {
            self.stats.failures += 1;
            warn!(%err, mode = %self.mode, "render failed, keeping previous output");
        }
        result
    }

    fn write_active_surface(&mut self) -> SessionResult<()> {
        let _scope = crate::perf::scope("session.render");
        let html = self.renderer.render(&self.markdown, self.mode)?;
        let document = build_document(&html, &self.css)?;

        match self.mode {
            OutputMode::Preview => {
                let linked = mark_external_links(&document, &self.page_host);
                self.preview.write_document(&linked)?;
                self.click_to_source = true;
            }
            OutputMode::Source => {
                self.generation += 1;
                self.source.show(self.generation, plain_html(&document));
                self.colorize_queue.push_back(ColorizeJob {
                    generation: self.generation,
                    source: document.clone(),
                });
            }
        }

        crate::perf::log_event(
            "session.render",
            format!(
                "mode={} markdown={} css={} artifact={} generation={}",
                self.mode,
                self.markdown.len(),
                self.css.len(),
                document.len(),
                self.generation
            ),
        );
        self.artifact = Some(document);
        Ok(())
    }

    /// Colorize queued source renders.
    ///
    /// Only the job of the newest generation is applied; results of renders
    /// that have since been superseded are dropped. Returns how many results
    /// reached the source surface.
    pub fn run_colorize_jobs(&mut self) -> usize {
        let mut applied = 0;
        while let Some(job) = self.colorize_queue.pop_front() {
            if job.generation != self.generation {
                debug!(
                    job = job.generation,
                    latest = self.generation,
                    "discarding stale colorize job"
                );
                continue;
            }
            let markup = colorize_html(&job.source);
            if self.source.show(job.generation, markup) {
                applied += 1;
            }
        }
        applied
    }
}
