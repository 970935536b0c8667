//! Dry-run content client
//!
//! [`DryRunClient`] wraps a real client. Reads are forwarded unchanged;
//! mutations are logged and answered with synthesized results that echo
//! the input (title, version, names) so the engine above keeps working.
//! Identifiers the server would have assigned are replaced by
//! [`PLACEHOLDER_ID`], and child lookups for that id return nothing since
//! such a page does not exist yet.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;

use pagesync_core::domain::{Expansion, RemoteAttachment, RemotePage, RemoteProperty};
use pagesync_core::ports::{AttachmentUpload, ContentClient, NewPage, PageUpdate};

/// Id handed out for pages and attachments that were never created
pub const PLACEHOLDER_ID: &str = "dry-run-placeholder";

/// Content client that simulates every mutation
pub struct DryRunClient {
    inner: Arc<dyn ContentClient>,
}

impl DryRunClient {
    pub fn new(inner: Arc<dyn ContentClient>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl ContentClient for DryRunClient {
    async fn find_page(
        &self,
        space: &str,
        title: &str,
        expansions: &[Expansion],
    ) -> Result<Vec<RemotePage>> {
        self.inner.find_page(space, title, expansions).await
    }

    async fn create_page(&self, page: &NewPage) -> Result<RemotePage> {
        info!(
            space = %page.space,
            parent_id = %page.parent_id,
            title = %page.title,
            "[dry-run] Would create page"
        );
        let mut created = RemotePage::new(PLACEHOLDER_ID, page.title.clone());
        created.version = Some(1);
        created.parent_id = Some(page.parent_id.clone());
        Ok(created)
    }

    async fn update_page(&self, update: &PageUpdate) -> Result<u32> {
        info!(
            page_id = %update.id,
            title = %update.title,
            version = update.version,
            parent_id = ?update.parent_id,
            "[dry-run] Would update page"
        );
        Ok(update.version)
    }

    async fn rename_page(&self, page_id: &str, title: &str, version: u32) -> Result<()> {
        info!(page_id, title, version, "[dry-run] Would rename page");
        Ok(())
    }

    async fn change_parent(
        &self,
        page_id: &str,
        title: &str,
        version: u32,
        new_parent_id: &str,
    ) -> Result<()> {
        info!(
            page_id,
            title,
            version,
            new_parent_id,
            "[dry-run] Would move page"
        );
        Ok(())
    }

    async fn get_property(&self, page_id: &str, key: &str) -> Result<Option<RemoteProperty>> {
        self.inner.get_property(page_id, key).await
    }

    async fn create_property(
        &self,
        page_id: &str,
        key: &str,
        value: &Value,
    ) -> Result<RemoteProperty> {
        info!(page_id, key, %value, "[dry-run] Would create property");
        Ok(RemoteProperty {
            key: key.to_string(),
            value: value.clone(),
            version: 1,
        })
    }

    async fn update_property(
        &self,
        page_id: &str,
        property: &RemoteProperty,
        value: &Value,
    ) -> Result<RemoteProperty> {
        let version = property.version + 1;
        info!(
            page_id,
            key = %property.key,
            %value,
            version,
            "[dry-run] Would update property"
        );
        Ok(RemoteProperty {
            key: property.key.clone(),
            value: value.clone(),
            version,
        })
    }

    async fn list_labels(&self, page_id: &str) -> Result<Vec<String>> {
        self.inner.list_labels(page_id).await
    }

    async fn add_labels(&self, page_id: &str, names: &[String]) -> Result<()> {
        info!(page_id, labels = ?names, "[dry-run] Would add labels");
        Ok(())
    }

    async fn delete_label(&self, page_id: &str, name: &str) -> Result<()> {
        info!(page_id, label = name, "[dry-run] Would delete label");
        Ok(())
    }

    async fn list_attachments(&self, page_id: &str) -> Result<Vec<RemoteAttachment>> {
        self.inner.list_attachments(page_id).await
    }

    async fn add_attachments(
        &self,
        page_id: &str,
        items: &[AttachmentUpload],
    ) -> Result<Vec<RemoteAttachment>> {
        Ok(items
            .iter()
            .map(|item| {
                info!(
                    page_id,
                    name = %item.name,
                    content_type = %item.content_type,
                    "[dry-run] Would upload attachment"
                );
                RemoteAttachment {
                    id: PLACEHOLDER_ID.to_string(),
                    title: item.name.clone(),
                    comment: Some(item.comment.clone()),
                    version: 1,
                }
            })
            .collect())
    }

    async fn update_attachment(
        &self,
        page_id: &str,
        attachment_id: &str,
        item: &AttachmentUpload,
    ) -> Result<RemoteAttachment> {
        info!(
            page_id,
            attachment_id,
            name = %item.name,
            "[dry-run] Would re-upload attachment"
        );
        Ok(RemoteAttachment {
            id: attachment_id.to_string(),
            title: item.name.clone(),
            comment: Some(item.comment.clone()),
            version: 1,
        })
    }

    async fn delete_attachment(&self, attachment_id: &str) -> Result<()> {
        info!(attachment_id, "[dry-run] Would delete attachment");
        Ok(())
    }

    async fn find_child_pages(
        &self,
        page_id: &str,
        expansions: &[Expansion],
    ) -> Result<Vec<RemotePage>> {
        if page_id == PLACEHOLDER_ID {
            return Ok(Vec::new());
        }
        self.inner.find_child_pages(page_id, expansions).await
    }

    async fn delete_page(&self, page_id: &str) -> Result<()> {
        info!(page_id, "[dry-run] Would delete page");
        Ok(())
    }

    async fn space_home_page(&self, space: &str) -> Result<String> {
        self.inner.space_home_page(space).await
    }
}
