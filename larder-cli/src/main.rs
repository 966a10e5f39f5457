//! larder - Main entry point

use std::fs::OpenOptions;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use larder_cli::Cli;
use larder_common::config::{resolve_config_path, TomlConfig};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Not load_or_default: the subscriber needs the config first, so the
    // missing-file warning is logged once logging is up
    let config_path = resolve_config_path(cli.config.as_deref());
    let config_found = config_path.exists();
    let config = if config_found {
        TomlConfig::load(&config_path)
            .with_context(|| format!("Failed to load {}", config_path.display()))?
    } else {
        TomlConfig::default()
    };

    // Logs go to stderr so reports on stdout stay clean
    let file_layer = match &config.logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    info!("Starting larder v{}", env!("CARGO_PKG_VERSION"));
    if config_found {
        info!(path = %config_path.display(), "Configuration loaded");
    } else {
        warn!(path = %config_path.display(), "Config file not found, using defaults");
    }

    let mut stdout = std::io::stdout();
    larder_cli::run(cli, config, &mut stdout).await
}
