//! pagesync CLI - publish a converted page tree to a wiki space
//!
//! Provides commands for:
//! - Publishing a page-tree manifest (optionally as a dry run)
//! - Showing and validating the configuration

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod manifest;
mod output;

use commands::{config::ConfigCommand, publish::PublishCommand};
use output::OutputFormat;
use pagesync_core::config::Config;

#[derive(Debug, Parser)]
#[command(name = "pagesync", version, about = "Publish page trees to a wiki space")]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    json: bool,

    /// Verbose output (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Use alternate config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Publish a page-tree manifest
    Publish(PublishCommand),
    /// View and validate configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    fn config_path(&self) -> PathBuf {
        self.config.clone().unwrap_or_else(Config::default_path)
    }
}

/// Log filter: `-v` wins over the configured level
fn log_filter(verbose: u8, configured: &str) -> String {
    match verbose {
        0 => configured.to_string(),
        1 => "debug".to_string(),
        _ => "trace".to_string(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config_path();

    // Setup tracing
    let configured = Config::load_or_default(&config_path).logging.level;
    let filter = log_filter(cli.verbose, &configured);
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .init();

    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };

    match &cli.command {
        Commands::Publish(cmd) => cmd.execute(&config_path, format).await,
        Commands::Config(cmd) => cmd.execute(&config_path, format).await,
    }
}
