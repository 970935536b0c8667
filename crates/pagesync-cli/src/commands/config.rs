//! Config command - view and validate pagesync configuration
//!
//! Provides the `pagesync config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON) with secrets masked
//! 2. Validates the configuration file and reports every error

use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use tracing::info;

use pagesync_core::config::Config;

use crate::commands::load_config;
use crate::output::{Output, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the current configuration
    Show,
    /// Validate the configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(config_path, format),
            ConfigCommand::Validate => execute_validate(config_path, format),
        }
    }
}

fn masked(mut config: Config) -> Config {
    if config.remote.auth.token.is_some() {
        config.remote.auth.token = Some("********".to_string());
    }
    config
}

fn execute_show(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = Output::new(format);
    let config = masked(load_config(config_path)?);

    info!(config_path = %config_path.display(), "Showing configuration");

    if formatter.is_json() {
        formatter.json(&config)?;
    } else {
        formatter.success(&format!("Configuration ({})", config_path.display()));
        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }
    Ok(())
}

fn execute_validate(config_path: &Path, format: OutputFormat) -> Result<()> {
    let formatter = Output::new(format);
    let config = load_config(config_path)?;

    let errors = config.validate();
    if errors.is_empty() {
        formatter.success(&format!("Configuration is valid ({})", config_path.display()));
        return Ok(());
    }
    for error in &errors {
        formatter.error(&error.to_string());
    }
    bail!("Configuration has {} errors", errors.len())
}
