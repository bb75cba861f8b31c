//! SchemaConsole TUI: interactive terminal console for schema intelligence.
//!
//! Screens for connecting, generating metadata, reviewing mappings and
//! chatting with the knowledge graph, built with `ratatui` + `crossterm`.

mod app;
mod screens;
mod widgets;

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;
use schemaconsole_shared::{config_dir, load_config, load_config_from, session_db_path};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const LOG_FILE: &str = "schemaconsole-tui.log";

#[derive(Parser, Debug)]
#[command(name = "schemaconsole-tui", version, about = "SchemaConsole terminal UI")]
struct Args {
    /// Backend base URL
    #[arg(long, env = "SCHEMACONSOLE_BACKEND_URL")]
    backend: Option<String>,

    /// Path to a config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Session database path
    #[arg(long, env = "SCHEMACONSOLE_SESSION_DB")]
    session_db: Option<PathBuf>,
}

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    let _guard = init_logging()?;

    let mut config = match &args.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(url) = args.backend {
        config.backend.base_url = url;
    }
    let session_db = match args.session_db {
        Some(p) => p,
        None => session_db_path()?,
    };

    app::run(config, &session_db)
}

/// Log to a daily file under the config dir; the terminal belongs to the UI.
fn init_logging() -> Result<WorkerGuard> {
    let dir = config_dir()?.join("logs");
    std::fs::create_dir_all(&dir)?;

    let appender = tracing_appender::rolling::daily(&dir, LOG_FILE);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_env("SCHEMACONSOLE_LOG")
        .unwrap_or_else(|_| EnvFilter::new("schemaconsole=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(guard)
}
