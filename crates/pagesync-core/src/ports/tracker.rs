//! Upload tracker port
//!
//! The orchestrator reports every page outcome and every deleted subtree
//! through this trait. Implementations only observe; they must not fail
//! and must not block for long since they are called from concurrent
//! upload tasks.

use crate::domain::{PageOutcome, RemotePage};

pub trait UploadTracker: Send + Sync {
    /// Called once per page, in completion order
    fn page_completed(&self, outcome: &PageOutcome);

    /// Called once after the whole tree has been uploaded
    fn uploads_finished(&self);

    /// Called once per deleted orphan subtree
    ///
    /// `deleted` holds the orphan itself and all of its descendants.
    fn pages_deleted(&self, orphan: &RemotePage, deleted: &[RemotePage]);

    /// Called once after orphan cleanup completed
    fn cleanup_finished(&self) {}
}
