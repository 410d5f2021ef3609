//! Audio Device Renamer - command-line front end
//!
//! Edits the persisted names maps and runs the synchronization engine
//! against a simulated host.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;

use audio_device_renamer::config::AppConfig;
use audio_device_renamer::settings::{ChannelType, FileNamesStore};

/// Audio Device Renamer - persistent custom names for audio devices
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Names file, overriding the configuration
    #[arg(short, long, env = "NAMES_FILE")]
    names_file: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the persisted names maps
    List {
        /// Only show one channel (output or input)
        #[arg(long)]
        channel: Option<ChannelType>,
    },
    /// Give a device a custom name
    Rename {
        channel: ChannelType,
        original: String,
        custom: String,
    },
    /// Show the provider name for a device again
    Reset { channel: ChannelType, original: String },
    /// Run the engine against an in-memory host seeded from the config
    Simulate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    let config = AppConfig::load_or_default(&args.config).await?;
    let names_file = args
        .names_file
        .clone()
        .unwrap_or_else(|| config.names_file_path());

    if let Some(parent) = names_file.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let store = FileNamesStore::open(&names_file)
        .with_context(|| format!("Failed to open names file: {}", names_file.display()))?;

    match args.command {
        Command::List { channel } => cli::list(&store, channel),
        Command::Rename {
            channel,
            original,
            custom,
        } => cli::rename(&store, channel, &original, &custom)?,
        Command::Reset { channel, original } => cli::reset(&store, channel, &original)?,
        Command::Simulate => {
            info!("Configuration file: {}", args.config.display());
            info!("Names file: {}", names_file.display());
            cli::simulate(&config, store, shutdown_signal()).await?;
            info!("Simulation stopped");
        }
    }

    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
