//! External-link handling for the preview document.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use url::{ParseError, Url};

/// Scheme assumed for the page itself.
const DEFAULT_SCHEME: &str = "https";

static ANCHOR_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a\b(?:[^>"']|"[^"]*"|'[^']*')*>"#).expect("anchor pattern")
});

static HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\shref\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("href pattern")
});

static TARGET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\starget\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).expect("target pattern")
});

/// Host (with any non-default port) a link resolves to when opened from a
/// page on `page_host`.
///
/// Relative links inherit `page_host`. Links without an authority, such as
/// `mailto:`, and hrefs that do not parse have an empty host.
pub fn link_host(href: &str, page_host: &str) -> String {
    let href = href.trim();
    let resolved = match Url::parse(href) {
        Err(ParseError::RelativeUrlWithoutBase) => match page_base(page_host) {
            Some(base) => base.join(href),
            None if href.starts_with("//") => Url::parse(&format!("{DEFAULT_SCHEME}:{href}")),
            None => return String::new(),
        },
        parsed => parsed,
    };
    resolved.map_or_else(|_| String::new(), |url| host_with_port(&url))
}

/// `page_host` as a browser reports it: lowercased, default port dropped.
pub fn normalize_host(page_host: &str) -> String {
    page_base(page_host).map_or_else(String::new, |base| host_with_port(&base))
}

pub fn is_external(href: &str, page_host: &str) -> bool {
    link_host(href, page_host) != normalize_host(page_host)
}

fn page_base(page_host: &str) -> Option<Url> {
    let page_host = page_host.trim();
    if page_host.is_empty() {
        return None;
    }
    Url::parse(&format!("{DEFAULT_SCHEME}://{page_host}/")).ok()
}

fn host_with_port(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    }
}

/// Give every link whose host differs from `page_host` `target="_blank"`.
///
/// Any existing target on such a link is replaced. Anchors without an `href`
/// are left alone.
pub fn mark_external_links(html: &str, page_host: &str) -> String {
    let page = normalize_host(page_host);
    let mut rewritten = 0usize;
    let out = ANCHOR_OPEN.replace_all(html, |caps: &Captures<'_>| {
        let tag = &caps[0];
        let Some(href) = HREF
            .captures(tag)
            .and_then(|href| href.get(1).or_else(|| href.get(2)))
        else {
            return tag.to_string();
        };
        let href = href.as_str().replace("&amp;", "&");
        if link_host(&href, page_host) == page {
            return tag.to_string();
        }
        rewritten += 1;
        let without_target = TARGET.replace_all(tag, "");
        format!("<a target=\"_blank\"{}", &without_target[2..])
    });
    if rewritten > 0 {
        tracing::debug!(rewritten, page_host, "marked external links");
    }
    out.into_owned()
}
