use crate::editor::TextEditor;
use crate::error::SessionResult;
use crate::render::OutputMode;
use crate::surface::{NodeId, PreviewSurface, SourceSurface};

use super::Session;

/// Everything the host can tell a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// The view selector changed.
    SetView(OutputMode),
    /// New markdown text, as from an editor content notification.
    MarkdownChanged(String),
    /// New stylesheet text.
    CssChanged(String),
    /// The markdown editor cursor is now on this 1-based line.
    CursorMoved(usize),
    /// A preview element was clicked.
    PreviewClicked(NodeId),
    /// A split pane or the window changed size.
    Resized,
    /// Render now, skipping the debounce window.
    Flush,
    /// Time advanced to this many milliseconds.
    Tick(u64),
}

/// Apply `msg` to `session`.
///
/// # Errors
/// Returns the failure of a synchronous render, cursor sync or click lookup.
/// [`Message::Tick`] never fails; see [`Session::tick`].
pub fn update<E, P, S>(session: &mut Session<E, P, S>, msg: Message) -> SessionResult<()>
where
    E: TextEditor,
    P: PreviewSurface,
    S: SourceSurface,
{
    match msg {
        Message::SetView(mode) => session.set_view(mode)?,
        Message::MarkdownChanged(text) => {
            session.set_max_line(text.split('\n').count());
            session.set_markdown_source(&text);
        }
        Message::CssChanged(text) => {
            session.set_css_source(&text);
        }
        Message::CursorMoved(line) => {
            session.set_cursor_line(line)?;
        }
        Message::PreviewClicked(node) => {
            session.preview_clicked(node)?;
        }
        Message::Resized => session.request_layout(),
        Message::Flush => session.render_now()?,
        Message::Tick(now_ms) => {
            session.tick(now_ms);
        }
    }
    Ok(())
}
