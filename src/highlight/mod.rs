//! Syntax highlighting for the generated-source view.
//!
//! Uses syntect with Sublime Text syntax definitions and emits HTML with
//! inline colors, so the highlighted source needs no extra stylesheet.

use std::sync::{Mutex, OnceLock};

use syntect::highlighting::{Theme, ThemeSet};
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use crate::render::escape_html;

/// Colorize `code` as `language`, returning highlighted markup.
///
/// The text is escaped, so markup in `code` is shown literally. Unknown
/// languages and highlighter failures fall back to an uncolored `<pre>`.
pub fn colorize(language: &str, code: &str) -> String {
    let _scope = crate::perf::scope("highlight.colorize");
    let syntax_set = syntax_set();
    let Some(syntax) = syntax_set
        .find_syntax_by_token(language)
        .or_else(|| syntax_set.find_syntax_by_name(language))
    else {
        return plain_html(code);
    };

    match highlighted_html_for_string(code, syntax_set, syntax, theme()) {
        Ok(html) => html,
        Err(err) => {
            tracing::warn!(%err, language, "highlighting failed, showing plain source");
            plain_html(code)
        }
    }
}

/// Colorize generated HTML source.
pub fn colorize_html(source: &str) -> String {
    colorize("html", source)
}

/// `code` escaped into an uncolored `<pre>` block.
pub fn plain_html(code: &str) -> String {
    format!("<pre>{}</pre>", escape_html(code))
}

fn syntax_set() -> &'static SyntaxSet {
    static SYNTAX_SET: OnceLock<SyntaxSet> = OnceLock::new();
    SYNTAX_SET.get_or_init(|| {
        let _scope = crate::perf::scope("highlight.syntax_set.load_defaults");
        SyntaxSet::load_defaults_newlines()
    })
}

fn theme() -> &'static Theme {
    static THEME: OnceLock<Theme> = OnceLock::new();
    THEME.get_or_init(|| {
        let _scope = crate::perf::scope("highlight.theme.load_defaults");
        let theme_set = ThemeSet::load_defaults();
        let preferred = match background_mode() {
            BackgroundMode::Dark => [
                "base16-ocean.dark",
                "Solarized (dark)",
                "base16-eighties.dark",
                "base16-mocha.dark",
            ]
            .as_slice(),
            BackgroundMode::Light => [
                "InspiredGitHub",
                "Solarized (light)",
                "base16-ocean.light",
            ]
            .as_slice(),
        };

        for name in preferred {
            if let Some(theme) = theme_set.themes.get(*name) {
                return theme.clone();
            }
        }

        theme_set
            .themes
            .values()
            .next()
            .cloned()
            .unwrap_or_default()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BackgroundMode {
    Dark,
    Light,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightBackground {
    Light,
    Dark,
}

static BACKGROUND_OVERRIDE: OnceLock<Mutex<Option<HighlightBackground>>> = OnceLock::new();

/// Force the theme background. Takes effect before the first colorize call.
pub fn set_background_mode(mode: Option<HighlightBackground>) {
    let lock = BACKGROUND_OVERRIDE.get_or_init(|| Mutex::new(None));
    if let Ok(mut guard) = lock.lock() {
        *guard = mode;
    }
}

fn background_mode() -> BackgroundMode {
    let lock = BACKGROUND_OVERRIDE.get_or_init(|| Mutex::new(None));
    if let Ok(guard) = lock.lock()
        && let Some(mode) = *guard
    {
        return match mode {
            HighlightBackground::Light => BackgroundMode::Light,
            HighlightBackground::Dark => BackgroundMode::Dark,
        };
    }
    background_mode_from_colorfgbg(std::env::var("COLORFGBG").ok().as_deref())
}

fn background_mode_from_colorfgbg(colorfgbg: Option<&str>) -> BackgroundMode {
    let Some(value) = colorfgbg else {
        return BackgroundMode::Light;
    };
    let bg_str = value.rsplit(';').next().unwrap_or(value);
    let Ok(bg) = bg_str.parse::<u8>() else {
        return BackgroundMode::Light;
    };

    if bg >= 7 {
        BackgroundMode::Light
    } else {
        BackgroundMode::Dark
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colorize_html_escapes_markup() {
        let out = colorize_html("<p class=\"x\">hi</p>");
        assert!(out.contains("&lt;"), "{out}");
        assert!(!out.contains("<p class"), "{out}");
        assert!(out.contains("style=\""), "expected inline colors: {out}");
    }

    #[test]
    fn test_unknown_language_falls_back_to_plain() {
        let out = colorize("no-such-language", "<b>");
        assert_eq!(out, "<pre>&lt;b&gt;</pre>");
    }

    #[test]
    fn test_colorfgbg_dark_background() {
        let mode = background_mode_from_colorfgbg(Some("15;0"));
        assert_eq!(mode, BackgroundMode::Dark);
    }

    #[test]
    fn test_colorfgbg_light_background() {
        let mode = background_mode_from_colorfgbg(Some("0;15"));
        assert_eq!(mode, BackgroundMode::Light);
    }

    #[test]
    fn test_missing_colorfgbg_defaults_to_light() {
        assert_eq!(background_mode_from_colorfgbg(None), BackgroundMode::Light);
        assert_eq!(
            background_mode_from_colorfgbg(Some("garbage")),
            BackgroundMode::Light
        );
    }

    #[test]
    fn test_background_override() {
        set_background_mode(Some(HighlightBackground::Dark));
        assert_eq!(background_mode(), BackgroundMode::Dark);
        set_background_mode(Some(HighlightBackground::Light));
        assert_eq!(background_mode(), BackgroundMode::Light);
        set_background_mode(None);
    }
}
