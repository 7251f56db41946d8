//! Sanitized, style-inlined HTML generation.
//!
//! The generated markup is safe to insert as an HTML fragment or to write as
//! a complete document: CSS from the style block is copied into `style`
//! attributes, then scripts, event handlers and unsafe URLs are removed.

use std::sync::OnceLock;

use ammonia::Builder;
use css_inline::CSSInliner;

use crate::error::SanitizeError;
use crate::render::LINE_ATTRIBUTE;

/// Merge `css` into `html_body` as inline styles and sanitize the result.
///
/// # Errors
/// Returns an error if the style block cannot be applied.
pub fn build_document(html_body: &str, css: &str) -> Result<String, SanitizeError> {
    let _scope = crate::perf::scope("sanitize.build_document");
    let styled = inline_styles(&format!("<style>{css}</style>{html_body}"))?;
    Ok(sanitize(&styled))
}

/// Apply every `<style>` rule in `html` to the matching elements.
///
/// Linked stylesheets are never fetched.
///
/// # Errors
/// Returns an error if css-inline rejects the document.
pub fn inline_styles(html: &str) -> Result<String, SanitizeError> {
    CSSInliner::options()
        .load_remote_stylesheets(false)
        .build()
        .inline(html)
        .map_err(|err| SanitizeError::Inline(err.to_string()))
}

/// Remove markup capable of running script.
///
/// Idempotent: sanitizing sanitized output returns it unchanged.
pub fn sanitize(html: &str) -> String {
    sanitizer().clean(html).to_string()
}

fn sanitizer() -> &'static Builder<'static> {
    static SANITIZER: OnceLock<Builder<'static>> = OnceLock::new();
    SANITIZER.get_or_init(|| {
        let mut builder = Builder::default();
        builder
            .add_tags(["section"])
            .add_generic_attributes(["style", "class", "id", LINE_ATTRIBUTE]);
        builder
    })
}
