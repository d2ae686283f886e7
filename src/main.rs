//! Paywire - purchases backend client
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use paywire::cli::{Cli, Commands};
use paywire::config::ConfigManager;
use paywire::error::PaywireResult;
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> PaywireResult<()> {
    let cli = Cli::parse();

    // 0 = warn, 1 = info, 2+ = debug
    let filter = match cli.verbose {
        0 => EnvFilter::new("paywire=warn"),
        1 => EnvFilter::new("paywire=info"),
        _ => EnvFilter::new("paywire=debug"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    debug!("Using config {}", config_manager.path().display());

    let config = config_manager.load().await?;

    match cli.command {
        Commands::Subscriber(args) => paywire::cli::commands::subscriber(args, &config).await,
        Commands::Offerings(args) => paywire::cli::commands::offerings(args, &config).await,
        Commands::Login(args) => paywire::cli::commands::login(args, &config).await,
        Commands::Cache(args) => paywire::cli::commands::cache(args, &config).await,
        Commands::Config(args) => {
            paywire::cli::commands::config(args, &config, &config_manager).await
        }
    }
}
