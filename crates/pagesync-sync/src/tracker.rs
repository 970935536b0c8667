//! Logging upload tracker
//!
//! Counts page outcomes and deletions of a run and logs a summary when the
//! upload and the cleanup phases finish.

use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use pagesync_core::domain::{
    AttachmentsUpdateResult, LabelsUpdateResult, PageOperationResult, PageOutcome, RemotePage,
};
use pagesync_core::ports::UploadTracker;

/// Counters of a publishing run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadSummary {
    pub started_at: DateTime<Utc>,
    pub created: usize,
    pub content_modified: usize,
    pub location_modified: usize,
    pub not_modified: usize,
    pub failed: usize,
    /// Pages whose labels changed
    pub labels_updated: usize,
    /// Pages whose attachments changed
    pub attachments_updated: usize,
    /// Pages deleted during cleanup, descendants included
    pub deleted: usize,
}

impl UploadSummary {
    pub fn total_pages(&self) -> usize {
        self.created
            + self.content_modified
            + self.location_modified
            + self.not_modified
            + self.failed
    }
}

/// Tracker that logs every outcome and a run summary
#[derive(Debug)]
pub struct LoggingTracker {
    started_at: DateTime<Utc>,
    created: AtomicUsize,
    content_modified: AtomicUsize,
    location_modified: AtomicUsize,
    not_modified: AtomicUsize,
    failed: AtomicUsize,
    labels_updated: AtomicUsize,
    attachments_updated: AtomicUsize,
    deleted: AtomicUsize,
}

impl Default for LoggingTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingTracker {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            created: AtomicUsize::new(0),
            content_modified: AtomicUsize::new(0),
            location_modified: AtomicUsize::new(0),
            not_modified: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            labels_updated: AtomicUsize::new(0),
            attachments_updated: AtomicUsize::new(0),
            deleted: AtomicUsize::new(0),
        }
    }

    pub fn summary(&self) -> UploadSummary {
        UploadSummary {
            started_at: self.started_at,
            created: self.created.load(Ordering::Relaxed),
            content_modified: self.content_modified.load(Ordering::Relaxed),
            location_modified: self.location_modified.load(Ordering::Relaxed),
            not_modified: self.not_modified.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            labels_updated: self.labels_updated.load(Ordering::Relaxed),
            attachments_updated: self.attachments_updated.load(Ordering::Relaxed),
            deleted: self.deleted.load(Ordering::Relaxed),
        }
    }
}

impl UploadTracker for LoggingTracker {
    fn page_completed(&self, outcome: &PageOutcome) {
        let counter = match &outcome.result {
            PageOperationResult::Created { .. } => &self.created,
            PageOperationResult::ContentModified { .. } => &self.content_modified,
            PageOperationResult::LocationModified { .. } => &self.location_modified,
            PageOperationResult::NotModified { .. } => &self.not_modified,
            PageOperationResult::Failed { status, body, local } => {
                warn!(title = %local.title, ?status, %body, "Page upload failed");
                &self.failed
            }
        };
        counter.fetch_add(1, Ordering::Relaxed);

        if let LabelsUpdateResult::Updated { .. } = outcome.labels {
            self.labels_updated.fetch_add(1, Ordering::Relaxed);
        }
        if let AttachmentsUpdateResult::Updated { .. } = outcome.attachments {
            self.attachments_updated.fetch_add(1, Ordering::Relaxed);
        }

        debug!(
            title = %outcome.result.local().title,
            result = outcome.result.kind(),
            page_id = outcome.result.server_page().map(|p| p.id.as_str()),
            "Page done"
        );
    }

    fn uploads_finished(&self) {
        let summary = self.summary();
        let elapsed = Utc::now() - summary.started_at;
        info!(
            total = summary.total_pages(),
            created = summary.created,
            content_modified = summary.content_modified,
            location_modified = summary.location_modified,
            not_modified = summary.not_modified,
            failed = summary.failed,
            elapsed_ms = elapsed.num_milliseconds(),
            "Upload finished"
        );
    }

    fn pages_deleted(&self, orphan: &RemotePage, deleted: &[RemotePage]) {
        self.deleted.fetch_add(deleted.len(), Ordering::Relaxed);
        info!(
            page_id = %orphan.id,
            title = %orphan.title,
            count = deleted.len(),
            "Deleted orphan page"
        );
    }

    fn cleanup_finished(&self) {
        info!(
            deleted = self.deleted.load(Ordering::Relaxed),
            "Cleanup finished"
        );
    }
}
