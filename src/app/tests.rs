use tempfile::tempdir;

use crate::editor::{EditorBuffer, TextEditor};
use crate::error::{SessionError, SurfaceError};
use crate::render::OutputMode;
use crate::scroll::{ScrollBehavior, line_offset};
use crate::storage::{JsonFileStore, KeyValueStore, MemoryStore};
use crate::surface::{
    DisplaySurface, HeadlessPreview, LayoutMetrics, PreviewSurface, SourcePane, SourceSurface,
};

use super::{HeadlessSession, Message, Session, update};

fn create_session(markdown: &str) -> HeadlessSession {
    Session::new(
        EditorBuffer::from_text(markdown),
        EditorBuffer::from_text(""),
        HeadlessPreview::default(),
        SourcePane::new(),
    )
}

fn started(markdown: &str) -> HeadlessSession {
    let mut session = create_session(markdown);
    session.start().unwrap();
    session
}

fn document(session: &HeadlessSession) -> &str {
    session.preview().document().unwrap_or_default()
}

#[test]
fn test_initial_mode_is_preview_and_start_renders() {
    let session = started("# Hi\n\nWorld");
    assert_eq!(session.mode(), OutputMode::Preview);
    assert_eq!(session.stats().renders, 1);
    assert!(session.preview().is_visible());
    assert!(!session.source().is_visible());
    assert!(document(&session).contains(r#"data-source-line="1""#));
    assert!(document(&session).contains(r#"data-source-line="3""#));
}

#[test]
fn test_same_markdown_twice_schedules_one_render() {
    let mut session = started("start");
    assert!(session.set_markdown_source("next"));
    assert!(!session.set_markdown_source("next"));
    assert!(session.tick(100));
    assert!(!session.tick(400));
    assert_eq!(session.stats().renders, 2);
}

#[test]
fn test_unchanged_css_does_not_schedule() {
    let mut session = started("x");
    assert!(!session.set_css_source(""));
    assert!(!session.is_render_pending());
}

#[test]
fn test_burst_of_edits_renders_once_with_last_text() {
    let mut session = started("start");
    session.tick(0);
    session.set_markdown_source("first");
    session.tick(40);
    session.set_markdown_source("second");
    session.tick(80);
    session.set_markdown_source("third");
    assert!(!session.tick(150));
    assert!(session.tick(180));
    assert_eq!(session.stats().renders, 2);
    assert!(document(&session).contains("third"));
    assert!(!document(&session).contains("second"));
}

#[test]
fn test_css_edit_is_inlined_after_debounce() {
    let mut session = started("# Title");
    session.set_css_source("h1 { color: red; }");
    assert!(!document(&session).contains("color: red"));
    session.tick(100);
    assert!(document(&session).contains("color: red"), "{}", document(&session));
}

#[test]
fn test_render_now_is_synchronous() {
    let mut session = started("old");
    session.set_markdown_source("new text");
    assert!(session.is_render_pending());
    session.render_now().unwrap();
    assert!(!session.is_render_pending());
    assert!(document(&session).contains("new text"));
    // nothing left for the timer
    assert!(!session.tick(1_000));
}

#[test]
fn test_mode_switch_is_immediate() {
    let mut session = started("# Hi");
    session.set_view(OutputMode::Source).unwrap();
    assert_eq!(session.stats().renders, 2);
    assert!(session.source().is_visible());
    assert!(!session.preview().is_visible());
    assert!(session.source().markup().contains("&lt;h1&gt;Hi&lt;/h1&gt;"));
    assert_eq!(session.generation(), 1);
}

#[test]
fn test_setting_current_view_does_nothing() {
    let mut session = started("# Hi");
    session.set_view(OutputMode::Preview).unwrap();
    assert_eq!(session.stats().renders, 1);
}

#[test]
fn test_source_mode_has_no_line_annotations() {
    let mut session = create_session("# Hi\n\nWorld").with_view(OutputMode::Source);
    session.start().unwrap();
    assert!(session.source().is_visible());
    assert!(!session.artifact().unwrap().contains("data-source-line"));
    assert_eq!(session.pending_colorize_jobs(), 1);
}

#[test]
fn test_rapid_source_renders_leave_only_latest_visible() {
    let mut session = create_session("# First").with_view(OutputMode::Source);
    session.start().unwrap();
    session.set_markdown_source("# Second");
    session.render_now().unwrap();
    assert_eq!(session.pending_colorize_jobs(), 2);

    assert_eq!(session.run_colorize_jobs(), 1);
    assert_eq!(session.source().generation(), Some(2));
    let markup = session.source().markup();
    assert!(markup.contains("Second"), "{markup}");
    assert!(!markup.contains("First"), "{markup}");
    assert!(markup.contains("style=\""), "expected colorized markup: {markup}");
}

#[test]
fn test_colorize_job_is_dropped_after_newer_render() {
    let mut session = create_session("# First").with_view(OutputMode::Source);
    session.start().unwrap();
    session.set_markdown_source("# Second");
    session.render_now().unwrap();
    session.set_markdown_source("# Third");
    session.render_now().unwrap();
    assert_eq!(session.run_colorize_jobs(), 1);
    assert!(session.source().markup().contains("Third"));
    assert_eq!(session.pending_colorize_jobs(), 0);
}

#[test]
fn test_cursor_line_scrolls_to_interpolated_midpoint() {
    let mut session = started("# Hi\n\nWorld");
    assert_eq!(session.max_line(), 3);

    let tree = session.preview().tree().unwrap();
    let heading = tree.first_with_line(1).unwrap();
    let paragraph = tree.first_with_line(3).unwrap();
    let heading_top = session.preview().element_top(heading).unwrap();
    let paragraph_top = session.preview().element_top(paragraph).unwrap();
    let midpoint = (heading_top + paragraph_top) / 2.0;
    assert_eq!(line_offset(session.preview(), 2, 3), Ok(midpoint));

    let viewport = session.preview().metrics().viewport_height;
    let requested = session.set_cursor_line(2).unwrap();
    assert_eq!(requested, Some(midpoint - viewport * 0.4));
    assert_eq!(
        session.preview().last_scroll_request(),
        Some((midpoint - viewport * 0.4, ScrollBehavior::Smooth))
    );
}

#[test]
fn test_cursor_line_edges() {
    let mut session = started(&"line\n\n".repeat(100));
    let max = session.max_line();
    let bottom = session.set_cursor_line(max).unwrap().unwrap();
    assert_eq!(Ok(bottom), crate::scroll::ScrollTarget::scroll_height(session.preview()));
    assert_eq!(session.set_cursor_line(0).unwrap(), Some(0.0));
    assert_eq!(session.preview().scroll_top(), 0.0);
}

#[test]
fn test_unchanged_cursor_line_does_not_scroll() {
    let mut session = started("a\n\nb\n\nc");
    assert!(session.set_cursor_line(3).unwrap().is_some());
    assert_eq!(session.set_cursor_line(3).unwrap(), None);
}

#[test]
fn test_cursor_sync_before_preview_loads_fails_fast() {
    let mut session = Session::new(
        EditorBuffer::from_text("a\nb\nc"),
        EditorBuffer::empty(),
        HeadlessPreview::detached(LayoutMetrics::default()),
        SourcePane::new(),
    );
    let err = session.set_cursor_line(2).unwrap_err();
    assert!(matches!(err, SessionError::Surface(SurfaceError::NotReady)));
}

#[test]
fn test_failed_render_keeps_previous_output_and_scheduler_alive() {
    let mut session = started("one");
    session.preview_mut().detach();

    session.set_markdown_source("two");
    assert!(session.tick(100));
    assert!(matches!(
        session.last_error(),
        Some(SessionError::Surface(SurfaceError::NotReady))
    ));
    assert_eq!(session.stats().failures, 1);
    assert!(session.artifact().unwrap().contains("one"));

    session.preview_mut().attach();
    session.set_markdown_source("three");
    assert!(session.is_render_pending());
    assert!(session.tick(200));
    assert!(session.last_error().is_none());
    assert!(document(&session).contains("three"));
}

#[test]
fn test_view_switch_while_rendering_is_deferred() {
    let mut session = started("# Hi");
    session.rendering = true;
    session.set_view(OutputMode::Source).unwrap();
    assert_eq!(session.stats().renders, 1);
    assert!(session.source().is_visible());
    assert!(session.is_render_pending());

    session.rendering = false;
    assert!(session.tick(100));
    assert_eq!(session.generation(), 1);
}

#[test]
fn test_render_request_during_render_only_schedules() {
    let mut session = started("# Hi");
    session.rendering = true;
    session.render_output().unwrap();
    assert_eq!(session.stats().renders, 1);
    assert!(session.is_render_pending());
}

#[test]
fn test_click_reveals_source_line_in_editor() {
    let markdown = format!("{}last *word*", "para\n\n".repeat(30));
    let mut session = started(&markdown);
    let em = session
        .preview()
        .tree()
        .unwrap()
        .elements_by_tag("em")
        .next()
        .unwrap();
    assert_eq!(session.preview_clicked(em).unwrap(), Some(61));
    assert_eq!(session.markdown_editor().top_line(), 40);
}

#[test]
fn test_click_outside_annotations_is_ignored() {
    let mut session = started("text");
    assert_eq!(session.preview_clicked(crate::surface::ROOT).unwrap(), None);
    assert_eq!(session.markdown_editor().top_line(), 0);
}

#[test]
fn test_click_in_source_mode_is_ignored() {
    let mut session = started("# Hi");
    let heading = session.preview().tree().unwrap().first_with_line(1).unwrap();
    session.set_view(OutputMode::Source).unwrap();
    assert_eq!(session.preview_clicked(heading).unwrap(), None);
}

#[test]
fn test_click_before_preview_loads_is_an_error() {
    let mut session = Session::new(
        EditorBuffer::from_text("# Hi"),
        EditorBuffer::empty(),
        HeadlessPreview::detached(LayoutMetrics::default()),
        SourcePane::new(),
    );
    assert!(matches!(
        session.preview_clicked(1),
        Err(SessionError::Surface(SurfaceError::NotReady))
    ));
}

#[test]
fn test_external_links_open_in_new_window() {
    let mut session =
        create_session("[out](https://other.test/) and [in](/local)").with_page_host("me.test");
    session.start().unwrap();
    let doc = document(&session);
    assert_eq!(doc.matches(r#"target="_blank""#).count(), 1, "{doc}");
    assert!(doc.contains(r#"target="_blank" href="https://other.test/""#), "{doc}");
}

#[test]
fn test_editor_events_drive_the_setters() {
    let mut session = started("# Hi\n\nWorld");
    session.markdown_editor_mut().move_to(2, 5);
    session.markdown_editor_mut().insert_str("\n\nMore");
    session.tick(0);
    assert_eq!(session.max_line(), 5);
    assert!(session.markdown().ends_with("More"));
    assert_eq!(session.cursor_line(), 5);
    assert!(session.is_render_pending());

    session.markdown_editor_mut().move_to(1, 0);
    session.tick(10);
    assert_eq!(session.cursor_line(), 2);
    assert!(session.preview().last_scroll_request().is_some());
}

#[test]
fn test_style_editor_changes_update_css() {
    let mut session = started("# Hi");
    session.style_editor_mut().set_value("h1 { color: blue; }");
    session.tick(0);
    assert_eq!(session.css(), "h1 { color: blue; }");
    session.tick(100);
    assert!(document(&session).contains("color: blue"));
}

#[test]
fn test_layout_is_leading_edge_debounced() {
    let mut session = started("x");
    session.tick(0);
    session.request_layout();
    session.tick(50);
    session.request_layout();
    assert_eq!(session.markdown_editor().layout_count(), 1);
    assert_eq!(session.style_editor().layout_count(), 1);
    session.tick(200);
    session.request_layout();
    assert_eq!(session.markdown_editor().layout_count(), 2);
}

#[test]
fn test_restore_from_store_replaces_editor_contents() {
    let mut store = MemoryStore::new();
    store.set("md", "# Stored").unwrap();
    store.set("css", "h1 { color: green; }").unwrap();
    let mut session = create_session("# Fresh").with_store(Box::new(store));
    assert!(session.restore_from_store().unwrap());
    assert_eq!(session.markdown(), "# Stored");
    assert_eq!(session.markdown_editor().value(), "# Stored");
    assert_eq!(session.css(), "h1 { color: green; }");
}

#[test]
fn test_restore_into_unloaded_preview_reports_cursor_sync_failure() {
    let mut store = MemoryStore::new();
    store.set("md", "# Stored").unwrap();
    let mut markdown_editor = EditorBuffer::from_text("one\ntwo\nthree");
    markdown_editor.move_to(2, 0);
    let mut session = Session::new(
        markdown_editor,
        EditorBuffer::from_text(""),
        HeadlessPreview::detached(LayoutMetrics::default()),
        SourcePane::new(),
    )
    .with_store(Box::new(store));

    let err = session.restore_from_store().unwrap_err();
    assert!(
        matches!(err, SessionError::Surface(SurfaceError::NotReady)),
        "{err:?}"
    );
    assert_eq!(session.markdown(), "# Stored");
    assert_eq!(session.cursor_line(), 1);
    assert!(session.is_render_pending());
}

#[test]
fn test_restore_without_store_is_a_no_op() {
    let mut session = create_session("# Fresh");
    assert!(!session.restore_from_store().unwrap());
    assert_eq!(session.markdown(), "# Fresh");
}

#[test]
fn test_edits_are_persisted_after_quiet_period() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    let store = JsonFileStore::open(&path).unwrap();
    let mut session = started("# Fresh").with_store(Box::new(store));
    session.tick(0);
    session.set_markdown_source("# Edited");
    session.tick(50);
    assert!(!path.exists());
    session.tick(100);
    let reopened = JsonFileStore::open(&path).unwrap();
    assert_eq!(reopened.get("md").unwrap().as_deref(), Some("# Edited"));
}

#[test]
fn test_flush_storage_writes_pending_values() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    let store = JsonFileStore::open(&path).unwrap();
    let mut session = started("").with_store(Box::new(store));
    session.set_css_source("p { margin: 0; }");
    session.flush_storage().unwrap();
    let reopened = JsonFileStore::open(&path).unwrap();
    assert_eq!(reopened.get("css").unwrap().as_deref(), Some("p { margin: 0; }"));
}

#[test]
fn test_update_dispatches_messages() {
    let mut session = started("# Hi\n\nWorld");
    update(&mut session, Message::MarkdownChanged("# Hi\n\nWorld\n\nAgain".into())).unwrap();
    assert_eq!(session.max_line(), 5);
    update(&mut session, Message::Flush).unwrap();
    assert!(document(&session).contains("Again"));

    update(&mut session, Message::CursorMoved(4)).unwrap();
    assert_eq!(session.cursor_line(), 4);

    update(&mut session, Message::CssChanged("p { color: red; }".into())).unwrap();
    update(&mut session, Message::Tick(500)).unwrap();
    assert!(document(&session).contains("color: red"));

    update(&mut session, Message::SetView(OutputMode::Source)).unwrap();
    assert!(session.source().is_visible());
    update(&mut session, Message::Resized).unwrap();
    assert_eq!(session.markdown_editor().layout_count(), 1);
}

#[test]
fn test_update_propagates_click_errors() {
    let mut session = started("# Hi");
    let result = update(&mut session, Message::PreviewClicked(10_000));
    assert!(matches!(
        result,
        Err(SessionError::Surface(SurfaceError::UnknownNode(10_000)))
    ));
}
