mod chat_cmd;
mod config_cmd;
mod doctor_cmd;
mod session;
mod terminal_output;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use sightline_config::{config_dir, config_file_path, load_and_prepare, load_config, LoggingConfig};
use sightline_logging::init_logger;
use tracing::info;

use config_cmd::ConfigAction;

#[derive(Parser)]
#[command(name = "sightline")]
#[command(about = "Sightline: ask questions about an image, answered through perception tools")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.sightline/config.yaml or $SIGHTLINE_CONFIG_DIR/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level or filter directive, used when RUST_LOG is unset
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question and print the answer
    Ask {
        /// Image to attach
        #[arg(short, long)]
        image: Option<PathBuf>,
        /// Print answer, detections and tool ledger as JSON
        #[arg(long)]
        json: bool,
        question: String,
    },
    /// Interactive conversation about an image
    Chat {
        #[arg(short, long)]
        image: Option<PathBuf>,
    },
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Check config and perception backends
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| config_file_path(&config_dir()));

    init_logging(&path, cli.log_level.as_deref()).await;

    match cli.command {
        Commands::Ask { image, json, question } => {
            let orchestrator = session::build_orchestrator(&load_and_prepare(&path).await?)?;
            chat_cmd::ask(&orchestrator, &question, image.as_deref(), json).await?;
        }
        Commands::Chat { image } => {
            let orchestrator = session::build_orchestrator(&load_and_prepare(&path).await?)?;
            chat_cmd::chat(&orchestrator, image.as_deref()).await?;
        }
        Commands::Config { action } => config_cmd::run(action, &path).await?,
        Commands::Doctor => doctor_cmd::run(&path).await?,
    }

    Ok(())
}

/// Logging comes up before the full load so config warnings are visible.
/// A broken file falls back to default logging; the real load reports it.
async fn init_logging(path: &Path, level_override: Option<&str>) {
    let logging = match load_config(path).await {
        Ok(config) => config.logging,
        Err(_) => LoggingConfig::default(),
    };
    init_logger(&session::log_options(&logging, level_override));
    info!(config = %path.display(), "Sightline starting");
}
