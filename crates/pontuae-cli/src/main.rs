//! Pontuae - a command-line client for the Pontuae weekly habit tracker.

mod app;
mod commands;
mod utils;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pontuae_core::Config;

use app::App;
use commands::{Cli, Command};

const LOG_FILE_NAME: &str = "pontuae.log";

/// Initialize the tracing subscriber for logging.
///
/// RUST_LOG controls the level (default "warn"). Output goes to stderr and,
/// when a log directory is available, to a daily file in it.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr_layer = fmt::layer().with_writer(io::stderr);

    match log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(filter)
                .init();
            None
        }
    }
}

async fn run(config: Config, command: Command, ephemeral: bool) -> Result<()> {
    let mut app = App::init(config, ephemeral)?;
    app.restore().await;
    let result = app.run(command).await;
    app.teardown()?;
    result
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let config = Config::load().unwrap_or_default();
    let log_dir = config
        .data_dir()
        .ok()
        .filter(|dir| std::fs::create_dir_all(dir).is_ok());
    let guard = init_tracing(log_dir.as_deref());

    let cli = Cli::parse();

    info!(command = ?cli.command, ephemeral = cli.ephemeral, "Pontuae starting");
    if let Err(e) = run(config, cli.command, cli.ephemeral).await {
        debug!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        drop(guard);
        std::process::exit(1);
    }
}
