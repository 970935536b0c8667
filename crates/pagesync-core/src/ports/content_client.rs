//! Remote content client port (driven/secondary port)
//!
//! This module defines the interface to the remote wiki-style content
//! store: page, property, label and attachment CRUD plus child listing.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are
//!   adapter-specific; the engine downcasts when it needs the HTTP status.
//! - Implementations are expected to apply rate limiting and throttling
//!   retries internally, uniformly for every call.
//! - Every versioned write takes the *new* version number
//!   (`current + 1`); a stale version is rejected by the server and
//!   surfaces as an ordinary error.

use std::io;
use std::path::PathBuf;

use crate::domain::{Attachment, Expansion, RemoteAttachment, RemotePage, RemoteProperty};

/// Parameters for creating a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPage {
    pub space: String,
    pub parent_id: String,
    pub title: String,
    pub body: String,
}

/// Parameters for updating a page body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUpdate {
    pub id: String,
    /// New parent, when the page must also be moved
    pub parent_id: Option<String>,
    pub title: String,
    pub body: String,
    /// New version number (`current + 1`)
    pub version: u32,
    /// Version comment shown in the page history
    pub message: Option<String>,
    /// When false the edit is marked minor and watchers are not notified
    pub notify_watchers: bool,
}

/// A file to upload as a page attachment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentUpload {
    pub name: String,
    pub path: PathBuf,
    pub content_type: String,
    /// Carries the `HASH:<hex>` integrity marker
    pub comment: String,
}

impl AttachmentUpload {
    /// Builds an upload for a local attachment, hashing it if needed
    pub fn from_attachment(attachment: &Attachment) -> io::Result<Self> {
        Ok(Self {
            name: attachment.attachment_name.clone(),
            path: attachment.resource_location.clone(),
            content_type: attachment.content_type().to_string(),
            comment: attachment.hash_comment()?,
        })
    }
}

/// Port trait for the remote content store
#[async_trait::async_trait]
pub trait ContentClient: Send + Sync {
    /// Finds pages titled `title` in `space`
    ///
    /// Returns every match; more than one is an error condition for the
    /// caller to decide on.
    async fn find_page(
        &self,
        space: &str,
        title: &str,
        expansions: &[Expansion],
    ) -> anyhow::Result<Vec<RemotePage>>;

    /// Creates a page under `parent_id`, returning its id and version
    async fn create_page(&self, page: &NewPage) -> anyhow::Result<RemotePage>;

    /// Updates a page body (and optionally title/parent), returning the new version
    async fn update_page(&self, update: &PageUpdate) -> anyhow::Result<u32>;

    /// Renames a page without touching its body
    async fn rename_page(&self, page_id: &str, title: &str, version: u32) -> anyhow::Result<()>;

    /// Moves a page under `new_parent_id` without touching its body
    async fn change_parent(
        &self,
        page_id: &str,
        title: &str,
        version: u32,
        new_parent_id: &str,
    ) -> anyhow::Result<()>;

    async fn get_property(&self, page_id: &str, key: &str)
        -> anyhow::Result<Option<RemoteProperty>>;

    /// Creates a property at version 1
    async fn create_property(
        &self,
        page_id: &str,
        key: &str,
        value: &serde_json::Value,
    ) -> anyhow::Result<RemoteProperty>;

    /// Updates `property` to `value`, writing version `property.version + 1`
    async fn update_property(
        &self,
        page_id: &str,
        property: &RemoteProperty,
        value: &serde_json::Value,
    ) -> anyhow::Result<RemoteProperty>;

    async fn list_labels(&self, page_id: &str) -> anyhow::Result<Vec<String>>;

    async fn add_labels(&self, page_id: &str, names: &[String]) -> anyhow::Result<()>;

    async fn delete_label(&self, page_id: &str, name: &str) -> anyhow::Result<()>;

    async fn list_attachments(&self, page_id: &str) -> anyhow::Result<Vec<RemoteAttachment>>;

    /// Uploads several new attachments in one call
    async fn add_attachments(
        &self,
        page_id: &str,
        items: &[AttachmentUpload],
    ) -> anyhow::Result<Vec<RemoteAttachment>>;

    /// Uploads new content for an existing attachment
    async fn update_attachment(
        &self,
        page_id: &str,
        attachment_id: &str,
        item: &AttachmentUpload,
    ) -> anyhow::Result<RemoteAttachment>;

    async fn delete_attachment(&self, attachment_id: &str) -> anyhow::Result<()>;

    /// Lists all direct children of a page, following pagination
    async fn find_child_pages(
        &self,
        page_id: &str,
        expansions: &[Expansion],
    ) -> anyhow::Result<Vec<RemotePage>>;

    /// Deletes a single page; children are not deleted
    async fn delete_page(&self, page_id: &str) -> anyhow::Result<()>;

    /// Id of the space's home page
    async fn space_home_page(&self, space: &str) -> anyhow::Result<String>;
}
