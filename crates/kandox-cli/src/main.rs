//! Kandox console - a command-line shell over the Kandox backend.
//!
//! Each invocation bootstraps the stored session, runs one command through
//! the authenticated client and reports any session change it caused.

mod app;
mod cli;

use std::io;
use std::path::Path;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;
use cli::Args;
use kandox_core::Config;

/// Initialize the tracing subscriber for logging.
///
/// Use RUST_LOG to control the level (e.g. RUST_LOG=kandox_core=debug).
/// When `log_dir` is set, logs are also written to a daily rolling file;
/// keep the returned guard alive until exit so it is flushed.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "kandox.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let mut config = Config::load()?;
    if let Some(url) = args.base_url.clone() {
        config.base_url = url;
    }

    let _guard = init_tracing(config.log_dir.as_deref());
    info!(base_url = %config.base_url, "Kandox console starting");

    let app = App::new(config, &args.route)?;
    app.run(args.command).await
}
