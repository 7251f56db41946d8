//! Stylemark - render markdown with a stylesheet into sanitized HTML.
//!
//! # Usage
//!
//! ```bash
//! stylemark README.md --css style.css --output README.html
//! stylemark --watch README.md --css style.css --output README.html
//! stylemark --view source README.md
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use stylemark::app::App;
use stylemark::config::{
    ConfigFlags, ThemeMode, clear_config_flags, global_config_path, load_config_flags,
    local_override_path, parse_flag_tokens, save_config_flags,
};
use stylemark::files::SaveTarget;
use stylemark::highlight::{HighlightBackground, set_background_mode};
use stylemark::perf;
use stylemark::render::OutputMode;
use stylemark::schedule::RENDER_DELAY_MS;

/// Render markdown with a stylesheet into sanitized, style-inlined HTML
#[derive(Parser, Debug)]
#[command(name = "stylemark", version, about, long_about = None)]
struct Cli {
    /// Markdown file to render; without it the stored or starter document is used
    #[arg(value_name = "MARKDOWN")]
    markdown: Option<PathBuf>,

    /// Stylesheet to inline into the output
    #[arg(long, value_name = "PATH")]
    css: Option<PathBuf>,

    /// Output view: the rendered preview or its colorized source
    #[arg(long, value_enum)]
    view: Option<OutputMode>,

    /// What to write: the rendered page, or the markdown or CSS text
    #[arg(long, value_enum, default_value = "html")]
    export: SaveTarget,

    /// Write to this file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Re-render whenever the markdown or CSS file changes
    #[arg(short, long)]
    watch: bool,

    /// Highlight theme background for the source view
    #[arg(long, value_enum)]
    theme: Option<ThemeMode>,

    /// Quiet period before an edit is re-rendered
    #[arg(long, value_name = "MS")]
    render_delay_ms: Option<u64>,

    /// Print timing of pipeline stages to stderr
    #[arg(long)]
    perf: bool,

    /// Write detailed render/sync debug events to a file
    #[arg(long, value_name = "PATH")]
    render_debug_log: Option<PathBuf>,

    /// Keep editor contents in this JSON store between runs
    #[arg(long, value_name = "PATH")]
    store: Option<PathBuf>,

    /// Save current command-line flags as defaults
    #[arg(long)]
    save: bool,

    /// Clear saved defaults
    #[arg(long)]
    clear: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let raw_args = std::env::args().collect::<Vec<_>>();
    let cli = Cli::parse();
    let global_path = global_config_path();
    let local_path = local_override_path();
    let cli_flags = parse_flag_tokens(&raw_args);

    if cli.clear {
        clear_config_flags(&global_path)?;
    }
    if cli.save {
        save_config_flags(&global_path, &cli_flags)?;
    }

    let file_flags = if cli.clear {
        ConfigFlags::default()
    } else {
        let global_flags = load_config_flags(&global_path)?;
        let local_flags = load_config_flags(&local_path)?;
        global_flags.union(&local_flags)
    };
    let effective = file_flags.union(&cli_flags);

    perf::set_enabled(effective.perf || cli.perf);
    let render_debug_log_path = effective
        .render_debug_log
        .clone()
        .or_else(|| std::env::var_os("STYLEMARK_RENDER_DEBUG_LOG").map(PathBuf::from));
    if let Err(err) = perf::set_debug_log_path(render_debug_log_path.as_deref()) {
        tracing::warn!(
            path = ?render_debug_log_path,
            %err,
            "failed to initialize render debug log"
        );
    }

    match cli.theme.or(effective.theme).unwrap_or(ThemeMode::Auto) {
        ThemeMode::Auto => set_background_mode(None),
        ThemeMode::Light => set_background_mode(Some(HighlightBackground::Light)),
        ThemeMode::Dark => set_background_mode(Some(HighlightBackground::Dark)),
    }

    if let Some(path) = &cli.markdown
        && !path.exists()
    {
        anyhow::bail!("File not found: {}", path.display());
    }

    let app = App::new(cli.markdown)
        .with_css(cli.css)
        .with_output(cli.output)
        .with_export(cli.export)
        .with_view(cli.view.or(effective.view).unwrap_or_default())
        .with_watch(cli.watch || effective.watch)
        .with_render_delay(
            cli.render_delay_ms
                .or(effective.render_delay_ms)
                .unwrap_or(RENDER_DELAY_MS),
        )
        .with_store(cli.store.or(effective.store));

    app.run().context("Application error")
}
