//! Loading and saving editor contents and rendered output.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Markdown shown when there is nothing to restore.
pub const STARTER_MARKDOWN: &str = include_str!("../assets/starter.md");

/// Stylesheet shown when there is nothing to restore.
pub const STARTER_CSS: &str = include_str!("../assets/starter.css");

/// What a save writes.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveTarget {
    Markdown,
    Css,
    Html,
}

impl SaveTarget {
    pub const fn default_file_name(self) -> &'static str {
        match self {
            Self::Markdown => "document.md",
            Self::Css => "style.css",
            Self::Html => "document.html",
        }
    }
}

/// Read a user-picked text file.
///
/// # Errors
/// Returns an error if the file cannot be read or is not UTF-8.
pub fn load_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

/// Write `text` to `path`, creating parent directories.
///
/// # Errors
/// Returns an error if the directory or file cannot be written.
pub fn save_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), bytes = text.len(), "saved file");
    Ok(())
}

/// Wrap a sanitized body into a standalone HTML page.
pub fn html_page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{body}\n</body>\n</html>\n",
        crate::render::escape_html(title)
    )
}
