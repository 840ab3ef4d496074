//! CLI entry point for the episode tracker.

use anyhow::Result;
use clap::Parser;
use tracing::debug;

mod cli;
mod commands;
mod config;

use cli::Args;
use config::{SettingsOverrides, TrackerSettings};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    let loaded = config::load_config(args.config.as_deref())?;
    debug!(
        path = ?loaded.path,
        from_file = loaded.config.is_some(),
        "Configuration resolved"
    );

    let overrides = SettingsOverrides {
        database_path: args.db.clone(),
        proxy_url: args.proxy.clone(),
    };
    let settings = TrackerSettings::resolve(
        loaded.config.as_ref(),
        &overrides,
        TrackerSettings::proxy_from_env(),
    );

    commands::dispatch(args.command, &settings).await
}
