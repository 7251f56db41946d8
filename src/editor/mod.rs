//! Text editor capability consumed by the session.
//!
//! The session never edits text itself: it reads the editor's value and
//! cursor, reveals lines, and asks for relayout. [`EditorBuffer`] is the
//! rope-backed implementation used by the CLI and the tests.

mod buffer;

pub use buffer::{Cursor, Direction, EditorBuffer};

/// Notification from an editor widget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorEvent {
    ContentChanged,
    /// The cursor moved to this 1-based line.
    CursorMoved { line: usize },
}

pub trait TextEditor {
    fn value(&self) -> String;

    fn set_value(&mut self, text: &str);

    fn line_count(&self) -> usize;

    /// 1-based line holding the cursor.
    fn cursor_line(&self) -> usize;

    /// Scroll so the 1-based `line` is vertically centred.
    fn reveal_line_in_center(&mut self, line: usize);

    /// Recompute the widget layout after its container changed size.
    fn layout(&mut self);

    /// Drain notifications raised since the last call.
    fn take_events(&mut self) -> Vec<EditorEvent>;
}
