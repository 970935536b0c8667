pub mod config;
pub mod publish;

use std::path::Path;

use anyhow::{Context, Result};
use pagesync_core::config::Config;

/// Environment variable overriding `remote.auth.token`
pub const TOKEN_ENV: &str = "PAGESYNC_TOKEN";

/// Loads the configuration file and applies the token override
pub fn load_config(path: &Path) -> Result<Config> {
    let mut config = Config::load(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    apply_token_override(&mut config, std::env::var(TOKEN_ENV).ok());
    Ok(config)
}

fn apply_token_override(config: &mut Config, token: Option<String>) {
    if let Some(token) = token.filter(|t| !t.is_empty()) {
        config.remote.auth.token = Some(token);
    }
}
