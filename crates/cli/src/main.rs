//! Proctor CLI: the main entry point.
//!
//! Commands:
//! - `init`      Create the config directory and default config
//! - `assemble`  Assemble exam segments from a fixture
//! - `config`    Show, locate, or validate configuration
//! - `status`    Show effective settings

use clap::{Parser, Subcommand};
use proctor_config::AppConfig;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(
    name = "proctor",
    about = "Proctor — exam segment assembly",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the config directory and a default config file
    Init,

    /// Assemble exam segments from an assessment fixture
    Assemble {
        /// Fixture file with assessments, exams, and accommodations
        #[arg(short, long, env = "PROCTOR_FIXTURE")]
        fixture: Option<PathBuf>,

        /// Assemble only this exam (default: every exam in the fixture)
        #[arg(short, long)]
        exam: Option<String>,

        /// Append results to this JSONL segment log instead of memory
        #[arg(short, long, env = "PROCTOR_STORE")]
        store: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Show effective settings
    Status,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Print the config file path
    Path,
    /// Load and validate the configuration
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logging settings come from config; a broken config is reported by the command itself
    let logging = AppConfig::load().map(|c| c.logging).unwrap_or_default();
    let level = if cli.verbose { "debug".to_string() } else { logging.level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if logging.json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Assemble { fixture, exam, store } => commands::assemble::run(fixture, exam, store).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show().await?,
            ConfigAction::Path => commands::config_cmd::path().await?,
            ConfigAction::Validate => commands::config_cmd::validate().await?,
        },
        Commands::Status => commands::status::run().await?,
    }

    Ok(())
}
