//! Port definitions (hexagonal architecture interfaces)
//!
//! - [`ContentClient`] - the remote wiki-style content store
//! - [`UploadTracker`] - sink for per-page and per-deletion outcomes

pub mod content_client;
pub mod tracker;

pub use content_client::{AttachmentUpload, ContentClient, NewPage, PageUpdate};
pub use tracker::UploadTracker;
