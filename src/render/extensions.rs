//! Markdown extensions that comrak does not provide natively.
//!
//! Each extension may rewrite the markdown source before parsing, edit the
//! parsed tree, and rewrite the HTML after formatting. Source rewrites never
//! add or remove lines, so line annotations keep pointing at the editor's
//! lines.

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

use comrak::Arena;
use comrak::nodes::{AstNode, NodeValue};
use regex::{Captures, Regex};

/// Markdown text plus whatever the extensions collected from it.
#[derive(Debug, Clone, Default)]
pub struct RenderContext {
    /// Source handed to comrak.
    pub text: String,
    /// Abbreviation definitions, first definition wins.
    pub abbreviations: Vec<(String, String)>,
}

impl RenderContext {
    pub fn new(source: &str) -> Self {
        Self {
            text: source.to_string(),
            abbreviations: Vec::new(),
        }
    }
}

/// A pre/post pass around the comrak transform.
pub trait Extension: Send + Sync {
    fn name(&self) -> &'static str;

    /// Rewrite the source before parsing. Must preserve the line count.
    fn prepare(&self, _ctx: &mut RenderContext) {}

    /// Edit the parsed tree before it is formatted.
    fn transform<'a>(&self, _arena: &'a Arena<AstNode<'a>>, _root: &'a AstNode<'a>) {}

    /// Rewrite the formatted HTML.
    fn finish(&self, html: String, _ctx: &RenderContext, _annotate: bool) -> String {
        html
    }
}

/// The extension set shared by both output modes.
pub fn default_extensions() -> Vec<Box<dyn Extension>> {
    vec![
        Box::new(Containers),
        Box::new(Abbreviations),
        Box::new(InsertMark),
    ]
}

/// `*[HTML]: Hyper Text Markup Language` definitions.
pub struct Abbreviations;

static ABBR_DEF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}\*\[([^\]]+)\]:[ \t]*(.*?)\s*$").expect("abbreviation pattern")
});

impl Extension for Abbreviations {
    fn name(&self) -> &'static str {
        "abbr"
    }

    fn prepare(&self, ctx: &mut RenderContext) {
        let mut fences = FenceTracker::default();
        let mut out = String::with_capacity(ctx.text.len());
        let mut found = Vec::new();
        for line in ctx.text.split_inclusive('\n') {
            let (body, ending) = split_line_ending(line);
            if fences.in_fence(body) {
                out.push_str(line);
                continue;
            }
            match ABBR_DEF.captures(body) {
                Some(caps) => {
                    found.push((caps[1].to_string(), caps[2].to_string()));
                    out.push_str(ending);
                }
                None => out.push_str(line),
            }
        }
        if !found.is_empty() {
            ctx.text = out;
            ctx.abbreviations.extend(found);
        }
    }

    fn finish(&self, html: String, ctx: &RenderContext, _annotate: bool) -> String {
        if ctx.abbreviations.is_empty() {
            return html;
        }
        let mut titles: HashMap<&str, &str> = HashMap::new();
        for (abbr, title) in &ctx.abbreviations {
            titles.entry(abbr.as_str()).or_insert(title.as_str());
        }
        let mut keys: Vec<&str> = titles.keys().copied().collect();
        keys.sort_by_key(|key| std::cmp::Reverse(key.len()));
        let alternation = keys
            .iter()
            .map(|key| regex::escape(key))
            .collect::<Vec<_>>()
            .join("|");
        let Ok(pattern) = Regex::new(&format!(r"\b(?:{alternation})\b")) else {
            return html;
        };

        map_text_segments(&html, &["abbr"], |text| {
            pattern.replace_all(text, |caps: &Captures<'_>| {
                let word = &caps[0];
                let title = titles.get(word).copied().unwrap_or_default();
                format!(r#"<abbr title="{}">{word}</abbr>"#, escape_html(title))
            })
        })
    }
}

/// `++inserted++` and `==marked==` text.
///
/// Delimiters pair inside one inline container under the CommonMark
/// flanking rules, so they can wrap emphasis and links but leave `C++` as
/// written.
pub struct InsertMark;

#[derive(Debug, Clone, Copy)]
struct Delimiter {
    child: usize,
    offset: usize,
    marker: u8,
    can_open: bool,
    can_close: bool,
}

impl Extension for InsertMark {
    fn name(&self) -> &'static str {
        "ins-mark"
    }

    fn transform<'a>(&self, arena: &'a Arena<AstNode<'a>>, root: &'a AstNode<'a>) {
        let parents = root
            .descendants()
            .filter(|node| !matches!(node.data.borrow().value, NodeValue::Image(_)))
            .filter(|node| node.children().any(|child| is_text(child)))
            .collect::<Vec<_>>();
        for parent in parents {
            wrap_delimited_runs(arena, parent);
        }
    }
}

fn is_text(node: &AstNode<'_>) -> bool {
    matches!(node.data.borrow().value, NodeValue::Text(_))
}

fn wrap_delimited_runs<'a>(arena: &'a Arena<AstNode<'a>>, parent: &'a AstNode<'a>) {
    merge_adjacent_text(parent);
    let children = parent.children().collect::<Vec<_>>();
    let delimiters = find_delimiters(&children);
    let pairs = pair_delimiters(&delimiters);
    if pairs.is_empty() {
        return;
    }

    let mut cuts = Vec::with_capacity(pairs.len() * 2);
    for (open, close) in pairs {
        let (open_tag, close_tag) = match delimiters[open].marker {
            b'+' => ("<ins>", "</ins>"),
            _ => ("<mark>", "</mark>"),
        };
        cuts.push((delimiters[open].child, delimiters[open].offset, open_tag));
        cuts.push((delimiters[close].child, delimiters[close].offset, close_tag));
    }
    cuts.sort_unstable_by_key(|&(child, offset, _)| (child, offset));

    for (idx, &child) in children.iter().enumerate() {
        let here = cuts
            .iter()
            .filter(|(owner, ..)| *owner == idx)
            .map(|&(_, offset, tag)| (offset, tag))
            .collect::<Vec<_>>();
        if !here.is_empty() {
            split_text(arena, child, &here);
        }
    }
}

/// comrak may emit a text run as several nodes.
fn merge_adjacent_text<'a>(parent: &'a AstNode<'a>) {
    let mut current = parent.first_child();
    while let Some(node) = current {
        match node.next_sibling() {
            Some(next) if is_text(node) && is_text(next) => {
                let tail = match &next.data.borrow().value {
                    NodeValue::Text(text) => text.clone(),
                    _ => String::new(),
                };
                if let NodeValue::Text(text) = &mut node.data.borrow_mut().value {
                    text.push_str(&tail);
                }
                next.detach();
            }
            next => current = next,
        }
    }
}

fn find_delimiters(children: &[&AstNode<'_>]) -> Vec<Delimiter> {
    let mut found = Vec::new();
    for (idx, child) in children.iter().enumerate() {
        let ast = child.data.borrow();
        let NodeValue::Text(text) = &ast.value else {
            continue;
        };
        let bytes = text.as_bytes();
        let mut pos = 0;
        while pos < bytes.len() {
            let marker = bytes[pos];
            if marker != b'+' && marker != b'=' {
                pos += 1;
                continue;
            }
            let run = bytes[pos..].iter().take_while(|&&b| b == marker).count();
            if run == 2 {
                let before = text[..pos]
                    .chars()
                    .next_back()
                    .unwrap_or_else(|| boundary_char(idx.checked_sub(1).map(|i| children[i])));
                let after = text[pos + 2..]
                    .chars()
                    .next()
                    .unwrap_or_else(|| boundary_char(children.get(idx + 1).copied()));
                let (can_open, can_close) = flanking(before, after);
                if can_open || can_close {
                    found.push(Delimiter {
                        child: idx,
                        offset: pos,
                        marker,
                        can_open,
                        can_close,
                    });
                }
            }
            pos += run;
        }
    }
    found
}

/// The character a delimiter sees past the edge of its text node.
fn boundary_char(sibling: Option<&AstNode<'_>>) -> char {
    let Some(node) = sibling else {
        return ' ';
    };
    if matches!(
        node.data.borrow().value,
        NodeValue::SoftBreak | NodeValue::LineBreak
    ) {
        ' '
    } else {
        // inline markup starts and ends with punctuation in the source
        '*'
    }
}

/// Returns `(can_open, can_close)`.
fn flanking(before: char, after: char) -> (bool, bool) {
    let left = !after.is_whitespace()
        && (!is_punctuation(after) || before.is_whitespace() || is_punctuation(before));
    let right = !before.is_whitespace()
        && (!is_punctuation(before) || after.is_whitespace() || is_punctuation(after));
    (left, right)
}

fn is_punctuation(ch: char) -> bool {
    ch.is_ascii_punctuation() || (!ch.is_ascii() && !ch.is_alphanumeric() && !ch.is_whitespace())
}

fn pair_delimiters(delimiters: &[Delimiter]) -> Vec<(usize, usize)> {
    let mut openers: Vec<usize> = Vec::new();
    let mut pairs = Vec::new();
    for (idx, delimiter) in delimiters.iter().enumerate() {
        if delimiter.can_close {
            let matched = openers
                .iter()
                .rposition(|&open| delimiters[open].marker == delimiter.marker);
            if let Some(pos) = matched {
                pairs.push((openers[pos], idx));
                openers.truncate(pos);
                continue;
            }
        }
        if delimiter.can_open {
            openers.push(idx);
        }
    }
    pairs
}

/// Replace a text node by its pieces with a tag at each cut.
fn split_text<'a>(arena: &'a Arena<AstNode<'a>>, node: &'a AstNode<'a>, cuts: &[(usize, &str)]) {
    let text = match &node.data.borrow().value {
        NodeValue::Text(text) => text.clone(),
        _ => return,
    };
    let mut last = 0;
    for &(offset, tag) in cuts {
        insert_text(arena, node, &text[last..offset]);
        node.insert_before(arena.alloc(NodeValue::HtmlInline(tag.to_string()).into()));
        last = offset + 2;
    }
    insert_text(arena, node, &text[last..]);
    node.detach();
}

fn insert_text<'a>(arena: &'a Arena<AstNode<'a>>, anchor: &'a AstNode<'a>, text: &str) {
    if !text.is_empty() {
        anchor.insert_before(arena.alloc(NodeValue::Text(text.to_string()).into()));
    }
}

/// Fenced `::: name` containers rendered as `<div class="name">`.
pub struct Containers;

static CONTAINER_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^ {0,3}:{3,}[ \t]*([A-Za-z][\w-]*)?[ \t]*$").expect("container pattern")
});

static CONTAINER_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<!-- stylemark-container:open ([A-Za-z][\w-]*) (\d+) -->")
        .expect("container open marker")
});

const CONTAINER_CLOSE: &str = "<!-- stylemark-container:close -->";

impl Extension for Containers {
    fn name(&self) -> &'static str {
        "container"
    }

    fn prepare(&self, ctx: &mut RenderContext) {
        let mut fences = FenceTracker::default();
        let mut depth = 0usize;
        let mut changed = false;
        let mut out = String::with_capacity(ctx.text.len());
        for (idx, line) in ctx.text.split_inclusive('\n').enumerate() {
            let (body, ending) = split_line_ending(line);
            if fences.in_fence(body) {
                out.push_str(line);
                continue;
            }
            let Some(caps) = CONTAINER_FENCE.captures(body) else {
                out.push_str(line);
                continue;
            };
            if let Some(name) = caps.get(1) {
                depth += 1;
                out.push_str(&format!(
                    "<!-- stylemark-container:open {} {} -->",
                    name.as_str(),
                    idx + 1
                ));
                out.push_str(ending);
                changed = true;
            } else if depth > 0 {
                depth -= 1;
                out.push_str(CONTAINER_CLOSE);
                out.push_str(ending);
                changed = true;
            } else {
                out.push_str(line);
            }
        }
        for _ in 0..depth {
            if !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(CONTAINER_CLOSE);
        }
        if changed {
            ctx.text = out;
        }
    }

    fn finish(&self, html: String, _ctx: &RenderContext, annotate: bool) -> String {
        if !html.contains("stylemark-container:") {
            return html;
        }
        let opened = CONTAINER_OPEN.replace_all(&html, |caps: &Captures<'_>| {
            if annotate {
                format!(r#"<div class="{}" data-source-line="{}">"#, &caps[1], &caps[2])
            } else {
                format!(r#"<div class="{}">"#, &caps[1])
            }
        });
        opened.replace(CONTAINER_CLOSE, "</div>")
    }
}

/// Tracks fenced code blocks so source rewrites leave code alone.
#[derive(Debug, Default)]
struct FenceTracker {
    open: Option<(char, usize)>,
}

impl FenceTracker {
    /// True when `line` is a fence line or sits inside a fenced block.
    fn in_fence(&mut self, line: &str) -> bool {
        let trimmed = line.trim_start_matches(' ');
        let indent = line.len() - trimmed.len();
        let fence = (indent <= 3)
            .then(|| fence_run(trimmed))
            .flatten();

        match (self.open, fence) {
            (None, Some((ch, len))) => {
                self.open = Some((ch, len));
                true
            }
            (Some((open_ch, open_len)), Some((ch, len)))
                if ch == open_ch && len >= open_len && trimmed[len..].trim().is_empty() =>
            {
                self.open = None;
                true
            }
            (Some(_), _) => true,
            (None, None) => false,
        }
    }
}

fn fence_run(line: &str) -> Option<(char, usize)> {
    let ch = line.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = line.chars().take_while(|c| *c == ch).count();
    (len >= 3).then_some((ch, len))
}

fn split_line_ending(line: &str) -> (&str, &str) {
    let body = line.trim_end_matches(['\n', '\r']);
    (body, &line[body.len()..])
}

/// Elements whose text is never rewritten.
const OPAQUE_ELEMENTS: &[&str] = &["code", "pre", "script", "style", "kbd", "samp"];

/// Apply `rewrite` to every text run outside tags, comments and opaque
/// elements. `extra_opaque` adds element names to skip.
pub(crate) fn map_text_segments<'h, F>(html: &'h str, extra_opaque: &[&str], mut rewrite: F) -> String
where
    F: for<'t> FnMut(&'t str) -> Cow<'t, str>,
{
    let mut out = String::with_capacity(html.len());
    let mut rest: &'h str = html;
    let mut opaque_depth = 0usize;

    while !rest.is_empty() {
        if rest.starts_with("<!--") {
            let end = rest.find("-->").map_or(rest.len(), |i| i + 3);
            out.push_str(&rest[..end]);
            rest = &rest[end..];
            continue;
        }
        if rest.starts_with('<') {
            let end = rest.find('>').map_or(rest.len(), |i| i + 1);
            let tag = &rest[..end];
            if let Some((name, closing)) = tag_name(tag) {
                let opaque = OPAQUE_ELEMENTS
                    .iter()
                    .chain(extra_opaque)
                    .any(|candidate| candidate.eq_ignore_ascii_case(name));
                if opaque && !tag.ends_with("/>") {
                    if closing {
                        opaque_depth = opaque_depth.saturating_sub(1);
                    } else {
                        opaque_depth += 1;
                    }
                }
            }
            out.push_str(tag);
            rest = &rest[end..];
            continue;
        }
        let end = rest.find('<').unwrap_or(rest.len());
        let text = &rest[..end];
        if opaque_depth == 0 {
            out.push_str(&rewrite(text));
        } else {
            out.push_str(text);
        }
        rest = &rest[end..];
    }
    out
}

fn tag_name(tag: &str) -> Option<(&str, bool)> {
    let inner = tag.strip_prefix('<')?;
    let (inner, closing) = match inner.strip_prefix('/') {
        Some(stripped) => (stripped, true),
        None => (inner, false),
    };
    let len = inner
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(inner.len());
    (len > 0).then(|| (&inner[..len], closing))
}

/// Escape text for element content or a quoted attribute value.
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = Vec::with_capacity(text.len());
    comrak::html::escape(&mut out, text.as_bytes())
        .ok()
        .and_then(|()| String::from_utf8(out).ok())
        .unwrap_or_default()
}
