//! Source-line annotations on rendered block elements.
//!
//! comrak emits `data-sourcepos="L:C-L:C"` when source positions are on.
//! The preview only needs the starting line, so the attribute is collapsed
//! into `data-source-line="L"`.

use std::sync::LazyLock;

use comrak::nodes::{AstNode, NodeValue};
use regex::Regex;

/// Attribute carrying the 1-based source line of a block element.
pub const LINE_ATTRIBUTE: &str = "data-source-line";

static SOURCEPOS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"data-sourcepos="(\d+):\d+-\d+:\d+""#).expect("sourcepos pattern")
});

static SOURCE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"data-source-line="(\d+)""#).expect("source line pattern"));

static RAW_ANNOTATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bdata-(source(?:pos|-line))\b").expect("raw annotation pattern")
});

/// Replace comrak source positions with line annotations.
///
/// Raw HTML must have gone through [`neutralize_raw_annotations`] first, so
/// every remaining position was written by comrak.
pub fn rewrite_source_positions(html: &str) -> String {
    SOURCEPOS
        .replace_all(html, r#"data-source-line="${1}""#)
        .into_owned()
}

/// Annotated lines in document order.
pub fn scan_annotations(html: &str) -> Vec<usize> {
    SOURCE_LINE
        .captures_iter(html)
        .filter_map(|caps| caps[1].parse().ok())
        .collect()
}

/// Rename position attributes typed into raw HTML to `data-raw-*`.
///
/// The sanitizer drops the renamed attributes, so user markup can never
/// pose as a line annotation.
pub fn neutralize_raw_annotations<'a>(root: &'a AstNode<'a>) {
    for node in root.descendants() {
        let mut ast = node.data.borrow_mut();
        let literal = match &mut ast.value {
            NodeValue::HtmlBlock(block) => &mut block.literal,
            NodeValue::HtmlInline(html) => html,
            _ => continue,
        };
        if RAW_ANNOTATION.is_match(literal.as_str()) {
            let renamed = RAW_ANNOTATION
                .replace_all(literal.as_str(), "data-raw-${1}")
                .into_owned();
            *literal = renamed;
        }
    }
}

/// Strip source positions from footnote definitions.
///
/// comrak renders footnotes after the last block, so their lines would run
/// backwards in document order. Returns how many definitions were cleared.
pub fn clear_footnote_positions<'a>(root: &'a AstNode<'a>) -> usize {
    let definitions = root
        .descendants()
        .filter(|node| matches!(node.data.borrow().value, NodeValue::FootnoteDefinition(_)))
        .collect::<Vec<_>>();
    for definition in &definitions {
        for node in definition.descendants() {
            // comrak skips positions on line 0
            node.data.borrow_mut().sourcepos.start.line = 0;
        }
    }
    definitions.len()
}
