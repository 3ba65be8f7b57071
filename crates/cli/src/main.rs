mod cli;
mod commands;
mod render;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xconvert_core::{load_config, load_config_from_env, validate_config, Config};

use cli::{Cli, Command};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.config.clone())?;
    let show_progress = !cli.no_progress;

    match cli.command {
        Command::Convert {
            file,
            to,
            from,
            output,
        } => commands::run_convert(&config, &file, to, from, output, show_progress).await,
        Command::Batch { files, to, output } => {
            commands::run_batch(&config, &files, to, output, show_progress).await
        }
    }
}

/// Load the configuration named by `--config` or `XCONVERT_CONFIG`, or the
/// defaults when neither is given.
fn resolve_config(explicit: Option<PathBuf>) -> Result<Config> {
    let config_path = explicit.or_else(|| std::env::var("XCONVERT_CONFIG").ok().map(PathBuf::from));

    let config = match config_path {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            load_config(&path).with_context(|| format!("Failed to load config from {:?}", path))?
        }
        None => {
            info!("No configuration file given, using defaults");
            load_config_from_env().context("Failed to read configuration from environment")?
        }
    };

    validate_config(&config).context("Configuration validation failed")?;
    info!("Conversion service: {}", config.service.url);
    Ok(config)
}
