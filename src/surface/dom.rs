//! A lightweight element tree over sanitized HTML.
//!
//! Only what the preview needs: element names, parent links, the line
//! annotation and the text each element owns. The input is expected to be
//! sanitizer output, so the tokenizer stays forgiving rather than complete.

use std::sync::LazyLock;

use regex::Regex;

use crate::render::LINE_ATTRIBUTE;

pub type NodeId = usize;

/// The synthetic document node; always id 0.
pub const ROOT: NodeId = 0;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"([^\s"'=<>/]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
        .expect("attribute pattern")
});

#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    pub tag: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub attributes: Vec<(String, String)>,
    /// Text directly inside this element, in order.
    pub text: String,
    /// Layout top, filled in by the preview.
    pub top: f64,
    pub height: f64,
}

impl Element {
    fn new(tag: &str, parent: Option<NodeId>) -> Self {
        Self {
            tag: tag.to_string(),
            parent,
            children: Vec::new(),
            attributes: Vec::new(),
            text: String::new(),
            top: 0.0,
            height: 0.0,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// The 1-based source line this element was rendered from.
    pub fn source_line(&self) -> Option<usize> {
        self.attribute(LINE_ATTRIBUTE)?.trim().parse().ok()
    }
}

/// Elements in document order; ids are indices.
#[derive(Debug, Clone, PartialEq)]
pub struct DomTree {
    nodes: Vec<Element>,
}

impl DomTree {
    pub fn parse(html: &str) -> Self {
        let mut nodes = vec![Element::new("#document", None)];
        let mut stack: Vec<NodeId> = vec![ROOT];
        let mut rest = html;

        while !rest.is_empty() {
            let current = *stack.last().unwrap_or(&ROOT);

            if let Some(after) = rest.strip_prefix("<!--") {
                rest = after.find("-->").map_or("", |i| &after[i + 3..]);
                continue;
            }
            if rest.starts_with("<!") || rest.starts_with("<?") {
                rest = rest.find('>').map_or("", |i| &rest[i + 1..]);
                continue;
            }
            if let Some(after) = rest.strip_prefix("</") {
                let end = after.find('>').unwrap_or(after.len());
                let name = after[..end].trim().to_ascii_lowercase();
                if let Some(pos) = stack.iter().rposition(|id| nodes[*id].tag == name)
                    && pos > 0
                {
                    stack.truncate(pos);
                }
                rest = after.get(end + 1..).unwrap_or("");
                continue;
            }
            if rest.starts_with('<') && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
                let end = tag_end(rest).unwrap_or(rest.len());
                let inner = &rest[1..end];
                rest = rest.get(end + 1..).unwrap_or("");

                let self_closing = inner.ends_with('/');
                let inner = inner.trim_end_matches('/');
                let name_len = inner
                    .find(|c: char| c.is_whitespace())
                    .unwrap_or(inner.len());
                let tag = inner[..name_len].to_ascii_lowercase();

                let id = nodes.len();
                let mut element = Element::new(&tag, Some(current));
                element.attributes = parse_attributes(&inner[name_len..]);
                nodes.push(element);
                nodes[current].children.push(id);

                if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
                    let close = format!("</{tag}");
                    let raw_end = find_ascii_case_insensitive(rest, &close).unwrap_or(rest.len());
                    nodes[id].text.push_str(&decode_entities(&rest[..raw_end]));
                    rest = &rest[raw_end..];
                    rest = rest.find('>').map_or("", |i| &rest[i + 1..]);
                    continue;
                }
                if !self_closing && !VOID_ELEMENTS.contains(&tag.as_str()) {
                    stack.push(id);
                }
                continue;
            }

            // Text run (a stray '<' is treated as text).
            let skip = usize::from(rest.starts_with('<'));
            let end = rest[skip..].find('<').map_or(rest.len(), |i| i + skip);
            nodes[current].text.push_str(&decode_entities(&rest[..end]));
            rest = &rest[end..];
        }

        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn get(&self, id: NodeId) -> Option<&Element> {
        self.nodes.get(id)
    }

    pub(super) fn get_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        self.nodes.get_mut(id)
    }

    /// `id` followed by its ancestors up to the document node.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.nodes.get(id).map(|_| id), |current| {
            self.nodes[*current].parent
        })
    }

    /// Nearest element, starting at `id` itself, that satisfies `pred`.
    pub fn nearest_ancestor<F>(&self, id: NodeId, mut pred: F) -> Option<NodeId>
    where
        F: FnMut(&Element) -> bool,
    {
        self.ancestors(id).find(|ancestor| pred(&self.nodes[*ancestor]))
    }

    /// Source line of the nearest annotated element at or above `id`.
    pub fn nearest_annotated_line(&self, id: NodeId) -> Option<usize> {
        self.ancestors(id)
            .find_map(|ancestor| self.nodes[ancestor].source_line())
    }

    /// First element in document order annotated with `line`.
    pub fn first_with_line(&self, line: usize) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|element| element.source_line() == Some(line))
    }

    /// All elements named `tag`, in document order.
    pub fn elements_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = NodeId> + 'a {
        self.nodes
            .iter()
            .enumerate()
            .filter(move |(_, element)| element.tag == tag)
            .map(|(id, _)| id)
    }
}

fn parse_attributes(source: &str) -> Vec<(String, String)> {
    ATTRIBUTE
        .captures_iter(source)
        .map(|caps| {
            let name = caps[1].to_ascii_lowercase();
            let value = caps
                .get(2)
                .or_else(|| caps.get(3))
                .or_else(|| caps.get(4))
                .map_or_else(String::new, |m| decode_entities(m.as_str()));
            (name, value)
        })
        .collect()
}

/// Index of the `>` closing the tag at the start of `source`, skipping quoted values.
fn tag_end(source: &str) -> Option<usize> {
    let mut quote = None;
    for (idx, ch) in source.char_indices() {
        match (quote, ch) {
            (None, '"' | '\'') => quote = Some(ch),
            (Some(open), _) if ch == open => quote = None,
            (None, '>') => return Some(idx),
            _ => {}
        }
    }
    None
}

fn find_ascii_case_insensitive(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|window| window.eq_ignore_ascii_case(needle.as_bytes()))
}

/// Decode the entities a serializer emits; anything else is kept verbatim.
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}
