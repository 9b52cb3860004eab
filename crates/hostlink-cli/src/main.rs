//! Hostlink CLI entry point

use clap::Parser;
use tracing::{error, info};

use hostlink_cli::{cli::Cli, commands::CommandDispatcher, config::AppConfig, error::Result};
use hostlink_core::LogLevel;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration before logging so its level applies
    let config = load_configuration(&cli)?;

    // Initialize logging
    setup_logging(cli.verbose, config.hostlink.logging.level);
    match &cli.config {
        Some(path) => info!("Loaded configuration from: {}", path),
        None => info!("Using default configuration"),
    }

    // Execute the command
    if let Err(e) = CommandDispatcher::execute(cli, config).await {
        error!("Command execution failed: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Setup logging; `--verbose` wins over the configured level
///
/// Logs go to stderr so stdout only carries command output.
fn setup_logging(verbose: bool, configured: LogLevel) {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::from(configured)
    };

    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}

/// Load configuration from file or use defaults
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    match &cli.config {
        Some(config_path) => AppConfig::load_from_file(config_path),
        None => Ok(AppConfig::default()),
    }
}
