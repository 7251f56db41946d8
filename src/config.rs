//! Saved command-line defaults.
//!
//! Flags live one or more per line in a plain text file, `#` starts a
//! comment. A global file in the platform config directory is unioned with a
//! local `.stylemarkrc`, and command-line flags win over both.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::render::OutputMode;

#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Auto,
    Light,
    Dark,
}

impl ThemeMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConfigFlags {
    pub watch: bool,
    pub perf: bool,
    pub view: Option<OutputMode>,
    pub theme: Option<ThemeMode>,
    pub render_delay_ms: Option<u64>,
    pub render_debug_log: Option<PathBuf>,
    pub store: Option<PathBuf>,
}

impl ConfigFlags {
    /// Combine with `other`; switches are or-ed, options from `other` win.
    pub fn union(&self, other: &Self) -> Self {
        Self {
            watch: self.watch || other.watch,
            perf: self.perf || other.perf,
            view: other.view.or(self.view),
            theme: other.theme.or(self.theme),
            render_delay_ms: other.render_delay_ms.or(self.render_delay_ms),
            render_debug_log: other
                .render_debug_log
                .clone()
                .or_else(|| self.render_debug_log.clone()),
            store: other.store.clone().or_else(|| self.store.clone()),
        }
    }
}

pub fn global_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("stylemark").join("config");
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support")
                .join("stylemark")
                .join("config");
        }
    }

    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
            return PathBuf::from(xdg).join("stylemark").join("config");
        }
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home)
                .join(".config")
                .join("stylemark")
                .join("config");
        }
    }

    local_override_path()
}

pub fn local_override_path() -> PathBuf {
    PathBuf::from(".stylemarkrc")
}

/// Load flags from `path`; a missing file yields the defaults.
///
/// # Errors
/// Returns an error if the file exists but cannot be read.
pub fn load_config_flags(path: &Path) -> Result<ConfigFlags> {
    if !path.exists() {
        return Ok(ConfigFlags::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let tokens = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .flat_map(|line| line.split_whitespace().map(ToOwned::to_owned))
        .collect::<Vec<_>>();
    Ok(parse_flag_tokens(&tokens))
}

/// # Errors
/// Returns an error if the config directory or file cannot be written.
pub fn save_config_flags(path: &Path, flags: &ConfigFlags) -> Result<()> {
    let mut lines = vec!["# stylemark defaults (saved with --save)".to_string()];
    if flags.watch {
        lines.push("--watch".to_string());
    }
    if flags.perf {
        lines.push("--perf".to_string());
    }
    if let Some(view) = flags.view {
        lines.push(format!("--view {view}"));
    }
    if let Some(theme) = flags.theme {
        lines.push(format!("--theme {}", theme.as_str()));
    }
    if let Some(delay) = flags.render_delay_ms {
        lines.push(format!("--render-delay-ms {delay}"));
    }
    if let Some(path) = &flags.render_debug_log {
        lines.push(format!("--render-debug-log {}", path.display()));
    }
    if let Some(path) = &flags.store {
        lines.push(format!("--store {}", path.display()));
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config dir {}", parent.display()))?;
    }
    fs::write(path, format!("{}\n", lines.join("\n")))
        .with_context(|| format!("Failed to write config {}", path.display()))
}

/// # Errors
/// Returns an error if the file exists but cannot be removed.
pub fn clear_config_flags(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

/// Pick the saveable flags out of raw arguments; everything else is ignored.
pub fn parse_flag_tokens(tokens: &[String]) -> ConfigFlags {
    let mut flags = ConfigFlags::default();
    let mut i = 0;
    while i < tokens.len() {
        let token = tokens[i].as_str();
        let (name, inline_value) = match token.split_once('=') {
            Some((name, value)) if name.starts_with("--") => (name, Some(value)),
            _ => (token, None),
        };
        let takes_value = matches!(
            name,
            "--view" | "--theme" | "--render-delay-ms" | "--render-debug-log" | "--store"
        );
        let value = if takes_value && inline_value.is_none() {
            i += 1;
            tokens.get(i).map(String::as_str)
        } else {
            inline_value
        };

        match (name, value) {
            ("--watch" | "-w", _) => flags.watch = true,
            ("--perf", _) => flags.perf = true,
            ("--view", Some(value)) => flags.view = value.parse().ok(),
            ("--theme", Some(value)) => flags.theme = parse_theme(value),
            ("--render-delay-ms", Some(value)) => flags.render_delay_ms = value.parse().ok(),
            ("--render-debug-log", Some(value)) => {
                flags.render_debug_log = Some(PathBuf::from(value));
            }
            ("--store", Some(value)) => flags.store = Some(PathBuf::from(value)),
            _ => {}
        }
        i += 1;
    }
    flags
}

fn parse_theme(s: &str) -> Option<ThemeMode> {
    match s {
        "auto" => Some(ThemeMode::Auto),
        "light" => Some(ThemeMode::Light),
        "dark" => Some(ThemeMode::Dark),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn tokens(args: &[&str]) -> Vec<String> {
        args.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_parse_flag_tokens_extracts_known_flags() {
        let args = tokens(&[
            "stylemark",
            "--watch",
            "--view",
            "source",
            "--theme",
            "dark",
            "--render-delay-ms=250",
            "--render-debug-log=render.log",
            "--store",
            "state.json",
            "README.md",
        ]);
        let flags = parse_flag_tokens(&args);
        assert!(flags.watch);
        assert_eq!(flags.view, Some(OutputMode::Source));
        assert_eq!(flags.theme, Some(ThemeMode::Dark));
        assert_eq!(flags.render_delay_ms, Some(250));
        assert_eq!(flags.render_debug_log, Some(PathBuf::from("render.log")));
        assert_eq!(flags.store, Some(PathBuf::from("state.json")));
        assert!(!flags.perf);
    }

    #[test]
    fn test_unsaveable_flags_and_bad_values_are_ignored() {
        let flags = parse_flag_tokens(&tokens(&[
            "--css",
            "style.css",
            "--view=sideways",
            "--render-delay-ms",
            "soon",
        ]));
        assert_eq!(flags, ConfigFlags::default());
    }

    #[test]
    fn test_config_union_merges_cli_over_file_for_options() {
        let file = ConfigFlags {
            watch: true,
            theme: Some(ThemeMode::Light),
            render_delay_ms: Some(300),
            ..ConfigFlags::default()
        };
        let cli = ConfigFlags {
            perf: true,
            theme: Some(ThemeMode::Dark),
            ..ConfigFlags::default()
        };
        let merged = file.union(&cli);
        assert!(merged.watch);
        assert!(merged.perf);
        assert_eq!(merged.theme, Some(ThemeMode::Dark));
        assert_eq!(merged.render_delay_ms, Some(300));
    }

    #[test]
    fn test_save_load_and_clear_config() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".stylemarkrc");
        let flags = ConfigFlags {
            watch: true,
            perf: true,
            view: Some(OutputMode::Source),
            theme: Some(ThemeMode::Dark),
            render_delay_ms: Some(50),
            render_debug_log: Some(PathBuf::from("render.log")),
            store: Some(PathBuf::from("state.json")),
        };

        save_config_flags(&path, &flags).unwrap();
        assert_eq!(load_config_flags(&path).unwrap(), flags);

        clear_config_flags(&path).unwrap();
        assert!(!path.exists());
        assert_eq!(load_config_flags(&path).unwrap(), ConfigFlags::default());
    }
}
