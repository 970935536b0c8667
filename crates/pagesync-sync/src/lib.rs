//! pagesync Sync - page tree publishing engine
//!
//! Provides:
//! - Per-page reconciliation (create / update / move / skip)
//! - Label and attachment convergence
//! - Concurrent recursive tree upload with orphan cleanup
//! - A dry-run decorator for the content client
//!
//! ## Modules
//!
//! - [`reconciler`] - single page decisions ([`PageUploadOperations`])
//! - [`uploader`] - whole tree orchestration ([`ContentUploader`])
//! - [`dry_run`] - [`DryRunClient`] simulating every mutation
//! - [`task_group`] - fan-out with first-failure cancellation
//! - [`tracker`] - a tracker that logs a run summary

pub mod dry_run;
pub mod reconciler;
pub mod task_group;
pub mod tracker;
pub mod uploader;

pub use dry_run::DryRunClient;
pub use reconciler::{PageUploadOperations, UploadSettings};
pub use tracker::LoggingTracker;
pub use uploader::ContentUploader;

use std::path::PathBuf;

use pagesync_core::domain::Cleanup;
use thiserror::Error;

/// Errors that abort a publishing run
#[derive(Debug, Error)]
pub enum PublishError {
    /// The remote page is tagged for a different tenant
    #[error(
        "Page '{title}' belongs to {}, this run is configured for {}",
        tenant_label(.actual),
        tenant_label(.expected)
    )]
    TenantMismatch {
        title: String,
        expected: Option<String>,
        actual: Option<String>,
    },

    /// The resolved parent is the page itself
    #[error("Page '{title}' ({page_id}) cannot be moved under itself")]
    ParentCycle { title: String, page_id: String },

    /// A virtual page has no remote counterpart
    #[error("Virtual page '{title}' declared in {} does not exist remotely", .file.display())]
    VirtualPageNotFound { title: String, file: PathBuf },

    /// A title lookup matched more than one page
    #[error("Found {count} pages titled '{title}' in space {space}")]
    AmbiguousLookup {
        title: String,
        space: String,
        count: usize,
    },

    /// The parent named by a page's `parent` attribute does not exist
    #[error("Parent page '{parent}' of '{title}' not found")]
    ParentNotFound { title: String, parent: String },

    /// Orphan cleanup failed
    #[error("Orphan cleanup failed (cleanup policy: {policy})")]
    Cleanup {
        policy: Cleanup,
        #[source]
        source: anyhow::Error,
    },
}

fn tenant_label(tenant: &Option<String>) -> String {
    match tenant {
        Some(tenant) => format!("tenant '{tenant}'"),
        None => "no tenant".to_string(),
    }
}
