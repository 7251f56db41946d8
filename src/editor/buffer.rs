use ropey::Rope;

use super::{EditorEvent, TextEditor};

/// Cursor position; both fields are zero-based, `col` counts chars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub line: usize,
    pub col: usize,
    /// Sticky column for vertical movement.
    col_memory: usize,
}

impl Cursor {
    pub const fn at(line: usize, col: usize) -> Self {
        Self {
            line,
            col,
            col_memory: col,
        }
    }

    const fn set_col(&mut self, col: usize) {
        self.col = col;
        self.col_memory = col;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

/// Rope-backed editor with a line viewport.
pub struct EditorBuffer {
    rope: Rope,
    cursor: Cursor,
    viewport_lines: usize,
    /// Zero-based first visible line.
    top_line: usize,
    layouts: usize,
    events: Vec<EditorEvent>,
}

impl EditorBuffer {
    pub fn from_text(text: &str) -> Self {
        Self {
            rope: Rope::from_str(text),
            cursor: Cursor::default(),
            viewport_lines: 40,
            top_line: 0,
            layouts: 0,
            events: Vec::new(),
        }
    }

    pub fn empty() -> Self {
        Self::from_text("")
    }

    pub const fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Zero-based first visible line.
    pub const fn top_line(&self) -> usize {
        self.top_line
    }

    pub const fn viewport_lines(&self) -> usize {
        self.viewport_lines
    }

    pub fn set_viewport_lines(&mut self, lines: usize) {
        self.viewport_lines = lines.max(1);
    }

    /// How many times [`TextEditor::layout`] has run.
    pub const fn layout_count(&self) -> usize {
        self.layouts
    }

    /// Content of a zero-based line without its line ending.
    pub fn line_at(&self, line_idx: usize) -> Option<String> {
        if line_idx >= self.rope.len_lines() {
            return None;
        }
        let line = self.rope.line(line_idx).to_string();
        Some(line.trim_end_matches(['\n', '\r']).to_string())
    }

    /// Length of a zero-based line in chars.
    pub fn line_len(&self, line_idx: usize) -> usize {
        self.line_at(line_idx).map_or(0, |line| line.chars().count())
    }

    /// Insert `text` at the cursor and move past it.
    pub fn insert_str(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let before = self.cursor.line;
        let at = self.cursor_char_idx();
        self.rope.insert(at, text);
        let end = at + text.chars().count();
        self.place_cursor_at_char(end);
        self.events.push(EditorEvent::ContentChanged);
        self.note_cursor_move(before);
    }

    /// Delete the char before the cursor, joining lines at column 0.
    pub fn delete_back(&mut self) -> bool {
        let at = self.cursor_char_idx();
        if at == 0 {
            return false;
        }
        let before = self.cursor.line;
        self.rope.remove(at - 1..at);
        self.place_cursor_at_char(at - 1);
        self.events.push(EditorEvent::ContentChanged);
        self.note_cursor_move(before);
        true
    }

    pub fn move_cursor(&mut self, direction: Direction) {
        let before = self.cursor.line;
        match direction {
            Direction::Left => {
                let at = self.cursor_char_idx();
                self.place_cursor_at_char(at.saturating_sub(1));
            }
            Direction::Right => {
                let at = self.cursor_char_idx();
                self.place_cursor_at_char((at + 1).min(self.rope.len_chars()));
            }
            Direction::Up if self.cursor.line > 0 => self.move_vertically(self.cursor.line - 1),
            Direction::Down if self.cursor.line + 1 < self.rope.len_lines() => {
                self.move_vertically(self.cursor.line + 1);
            }
            Direction::Up | Direction::Down => {}
        }
        self.note_cursor_move(before);
    }

    /// Move to a zero-based position, clamped to the buffer.
    pub fn move_to(&mut self, line: usize, col: usize) {
        let before = self.cursor.line;
        self.cursor.line = line.min(self.rope.len_lines().saturating_sub(1));
        self.cursor.set_col(col.min(self.line_len(self.cursor.line)));
        self.note_cursor_move(before);
    }

    fn move_vertically(&mut self, line: usize) {
        self.cursor.line = line;
        self.cursor.col = self.cursor.col_memory.min(self.line_len(line));
    }

    fn note_cursor_move(&mut self, before: usize) {
        if self.cursor.line != before {
            self.events.push(EditorEvent::CursorMoved {
                line: self.cursor.line + 1,
            });
        }
    }

    fn cursor_char_idx(&self) -> usize {
        let line_start = self.rope.line_to_char(self.cursor.line);
        line_start + self.cursor.col.min(self.line_len(self.cursor.line))
    }

    fn place_cursor_at_char(&mut self, char_idx: usize) {
        let line = self.rope.char_to_line(char_idx);
        self.cursor.line = line;
        self.cursor.set_col(char_idx - self.rope.line_to_char(line));
    }
}

impl TextEditor for EditorBuffer {
    fn value(&self) -> String {
        self.rope.to_string()
    }

    fn set_value(&mut self, text: &str) {
        let before = self.cursor.line;
        self.rope = Rope::from_str(text);
        self.cursor = Cursor::default();
        self.top_line = 0;
        self.events.push(EditorEvent::ContentChanged);
        self.note_cursor_move(before);
    }

    fn line_count(&self) -> usize {
        self.rope.len_lines()
    }

    fn cursor_line(&self) -> usize {
        self.cursor.line + 1
    }

    fn reveal_line_in_center(&mut self, line: usize) {
        let target = line.saturating_sub(1).min(self.rope.len_lines().saturating_sub(1));
        self.top_line = target.saturating_sub(self.viewport_lines / 2);
        tracing::debug!(line, top_line = self.top_line, "revealed editor line");
    }

    fn layout(&mut self) {
        self.layouts += 1;
    }

    fn take_events(&mut self) -> Vec<EditorEvent> {
        std::mem::take(&mut self.events)
    }
}

impl std::fmt::Debug for EditorBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorBuffer")
            .field(
                "rope",
                &format_args!("Rope({} lines)", self.rope.len_lines()),
            )
            .field("cursor", &self.cursor)
            .field("top_line", &self.top_line)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_count_counts_trailing_empty_line() {
        assert_eq!(EditorBuffer::from_text("# Hi\n\nWorld").line_count(), 3);
        assert_eq!(EditorBuffer::from_text("a\n").line_count(), 2);
        assert_eq!(EditorBuffer::empty().line_count(), 1);
    }

    #[test]
    fn test_insert_moves_cursor_and_reports_change() {
        let mut buf = EditorBuffer::from_text("ab");
        buf.move_to(0, 1);
        buf.take_events();
        buf.insert_str("x\ny");
        assert_eq!(buf.value(), "ax\nyb");
        assert_eq!(buf.cursor(), Cursor::at(1, 1));
        assert_eq!(
            buf.take_events(),
            vec![
                EditorEvent::ContentChanged,
                EditorEvent::CursorMoved { line: 2 }
            ]
        );
    }

    #[test]
    fn test_delete_back_joins_lines() {
        let mut buf = EditorBuffer::from_text("ab\ncd");
        buf.move_to(1, 0);
        assert!(buf.delete_back());
        assert_eq!(buf.value(), "abcd");
        assert_eq!(buf.cursor(), Cursor::at(0, 2));
        buf.move_to(0, 0);
        assert!(!buf.delete_back());
    }

    #[test]
    fn test_multibyte_chars() {
        let mut buf = EditorBuffer::from_text("héllo");
        buf.move_to(0, 2);
        buf.insert_str("ü");
        assert_eq!(buf.value(), "héüllo");
        assert!(buf.delete_back());
        assert!(buf.delete_back());
        assert_eq!(buf.value(), "hllo");
    }

    #[test]
    fn test_vertical_moves_keep_sticky_column() {
        let mut buf = EditorBuffer::from_text("long line\nab\nanother line");
        buf.move_to(0, 7);
        buf.move_cursor(Direction::Down);
        assert_eq!(buf.cursor().col, 2);
        buf.move_cursor(Direction::Down);
        assert_eq!(buf.cursor().col, 7);
        buf.move_cursor(Direction::Down);
        assert_eq!(buf.cursor().line, 2);
    }

    #[test]
    fn test_cursor_events_only_on_line_change() {
        let mut buf = EditorBuffer::from_text("a\nb\nc");
        buf.move_cursor(Direction::Right);
        assert!(buf.take_events().is_empty());
        buf.move_cursor(Direction::Right);
        assert_eq!(buf.take_events(), vec![EditorEvent::CursorMoved { line: 2 }]);
        assert_eq!(buf.cursor_line(), 2);
    }

    #[test]
    fn test_set_value_resets_cursor() {
        let mut buf = EditorBuffer::from_text("a\nb");
        buf.move_to(1, 1);
        buf.take_events();
        buf.set_value("x");
        assert_eq!(buf.cursor_line(), 1);
        assert_eq!(
            buf.take_events(),
            vec![
                EditorEvent::ContentChanged,
                EditorEvent::CursorMoved { line: 1 }
            ]
        );
    }

    #[test]
    fn test_reveal_line_in_center() {
        let text = "x\n".repeat(100);
        let mut buf = EditorBuffer::from_text(&text);
        buf.set_viewport_lines(10);
        buf.reveal_line_in_center(50);
        assert_eq!(buf.top_line(), 44);
        buf.reveal_line_in_center(2);
        assert_eq!(buf.top_line(), 0);
        buf.reveal_line_in_center(10_000);
        assert_eq!(buf.top_line(), 100 - 5);
    }

    #[test]
    fn test_layout_is_counted() {
        let mut buf = EditorBuffer::empty();
        buf.layout();
        buf.layout();
        assert_eq!(buf.layout_count(), 2);
    }
}
