//! Publish command - upload a page tree to the configured space
//!
//! Provides the `pagesync publish` CLI command which:
//! 1. Loads and validates the configuration
//! 2. Builds the REST client with its rate limiter and retry policy
//! 3. Optionally wraps it in the dry-run client
//! 4. Uploads the manifest's page tree and cleans up orphans

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;

use pagesync_core::config::{AuthScheme, Config};
use pagesync_core::domain::{ChangeDetector, Cleanup};
use pagesync_core::ports::ContentClient;
use pagesync_remote::rate_limit::{RateLimiter, RetryPolicy};
use pagesync_remote::{Credentials, RestClient, RestContentClient};
use pagesync_sync::{
    ContentUploader, DryRunClient, LoggingTracker, PageUploadOperations, UploadSettings,
};

use crate::commands::load_config;
use crate::manifest;
use crate::output::{Output, OutputFormat};

#[derive(Debug, Args)]
pub struct PublishCommand {
    /// Page-tree manifest written by the converter
    pub manifest: PathBuf,

    /// Log what would change without modifying the space
    #[arg(long)]
    pub dry_run: bool,

    /// Target space key (overrides `publish.space_key`)
    #[arg(long)]
    pub space: Option<String>,

    /// Orphan cleanup policy: none, managed or all
    #[arg(long)]
    pub cleanup: Option<Cleanup>,

    /// Change detection: hash or content
    #[arg(long)]
    pub change_detector: Option<ChangeDetector>,

    /// Tenant tag written to and checked on every page
    #[arg(long)]
    pub tenant: Option<String>,
}

impl PublishCommand {
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = Output::new(format);

        let mut config = load_config(config_path)?;
        self.apply_overrides(&mut config);

        let errors = config.validate();
        if !errors.is_empty() {
            for error in &errors {
                formatter.error(&error.to_string());
            }
            bail!("Invalid configuration ({} errors)", errors.len());
        }
        info!(config_path = %config_path.display(), "Loaded configuration");

        let pages = manifest::load(&self.manifest)?;
        let total: usize = pages.iter().map(|p| p.count()).sum();
        info!(manifest = %self.manifest.display(), pages = total, "Loaded page tree");

        let client = build_client(&config)?;
        let publish = &config.publish;
        let root_parent_id = match &publish.root_parent_id {
            Some(id) => id.clone(),
            None => client
                .space_home_page(&publish.space_key)
                .await
                .with_context(|| format!("Failed to resolve home page of {}", publish.space_key))?,
        };

        let client: Arc<dyn ContentClient> = if publish.dry_run {
            formatter.info("Dry run mode - no changes will be made");
            Arc::new(DryRunClient::new(client))
        } else {
            client
        };

        let tracker = Arc::new(LoggingTracker::new());
        let operations = PageUploadOperations::new(client, UploadSettings::from_config(publish));
        let uploader = ContentUploader::new(operations, tracker.clone(), publish.cleanup);

        formatter.info(&format!(
            "Publishing {total} pages to {} under {root_parent_id}...",
            publish.space_key
        ));
        uploader
            .upload_pages(&pages, &publish.space_key, &root_parent_id)
            .await?;

        let summary = tracker.summary();
        if formatter.is_json() {
            formatter.json(&summary)?;
        } else {
            formatter.success(&format!("Published {} pages", summary.total_pages()));
            formatter.info(&format!("Created:            {}", summary.created));
            formatter.info(&format!("Content modified:   {}", summary.content_modified));
            formatter.info(&format!("Location modified:  {}", summary.location_modified));
            formatter.info(&format!("Not modified:       {}", summary.not_modified));
            formatter.info(&format!("Labels updated:     {}", summary.labels_updated));
            formatter.info(&format!("Attachments updated: {}", summary.attachments_updated));
            formatter.info(&format!("Deleted:            {}", summary.deleted));
        }
        Ok(())
    }

    fn apply_overrides(&self, config: &mut Config) {
        let publish = &mut config.publish;
        if self.dry_run {
            publish.dry_run = true;
        }
        if let Some(space) = &self.space {
            publish.space_key = space.clone();
        }
        if let Some(cleanup) = self.cleanup {
            publish.cleanup = cleanup;
        }
        if let Some(detector) = self.change_detector {
            publish.change_detector = detector;
        }
        if let Some(tenant) = &self.tenant {
            publish.tenant = Some(tenant.clone());
        }
    }
}

fn credentials(config: &Config) -> Credentials {
    let auth = &config.remote.auth;
    let token = auth.token.clone().unwrap_or_default();
    match auth.scheme {
        AuthScheme::Bearer => Credentials::bearer(token),
        AuthScheme::Basic => match &auth.username {
            Some(username) => Credentials::basic(username.clone(), token),
            None => Credentials::Anonymous,
        },
    }
}

fn retry_policy(config: &Config) -> RetryPolicy {
    let limits = &config.rate_limiting;
    RetryPolicy {
        max_retries: limits.max_retries,
        base_delay: Duration::from_millis(limits.backoff_base_ms),
        max_delay: Duration::from_millis(limits.backoff_max_ms),
    }
}

fn build_client(config: &Config) -> Result<Arc<RestContentClient>> {
    let mut rest = RestClient::new(config.remote.base_url.clone(), credentials(config))?
        .with_retry_policy(retry_policy(config));
    if let Some(rps) = config.rate_limiting.requests_per_second {
        rest = rest.with_rate_limiter(Arc::new(RateLimiter::per_second(rps)));
    }
    Ok(Arc::new(RestContentClient::new(rest)))
}
