//! RestContentClient - ContentClient implementation for the wiki REST API
//!
//! Wraps the [`RestClient`] and maps every [`ContentClient`] operation onto
//! the `/rest/api/content` and `/rest/api/space` endpoints.
//!
//! ## Design Notes
//!
//! - Collections (`find_page`, child pages, labels, attachments) are read
//!   through [`fetch_all`], including the label and attachment lists that
//!   come embedded in an expanded page.
//! - Bodies are sent in the `storage` representation.
//! - Attachment uploads are multipart and need the `X-Atlassian-Token`
//!   header; file bytes are read once and the form is rebuilt per attempt.
//! - Space home page ids are cached in the per-instance [`SpaceCache`].

use std::collections::HashMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use pagesync_core::domain::{Expansion, RemoteAttachment, RemotePage, RemoteProperty};
use pagesync_core::ports::{AttachmentUpload, ContentClient, NewPage, PageUpdate};

use crate::client::RestClient;
use crate::pagination::{fetch_all, Paged};
use crate::space_cache::{SpaceCache, SpaceInfo};
use crate::RemoteError;

const CONTENT_PATH: &str = "/rest/api/content";

/// Page size requested for child listings
const CHILD_PAGE_LIMIT: u32 = 100;

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct VersionDto {
    number: u32,
}

#[derive(Debug, Deserialize)]
struct IdDto {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StorageDto {
    value: String,
}

#[derive(Debug, Deserialize)]
struct BodyDto {
    storage: Option<StorageDto>,
}

#[derive(Debug, Deserialize)]
struct LabelDto {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PropertyDto {
    key: String,
    #[serde(default)]
    value: Value,
    version: Option<VersionDto>,
}

impl From<PropertyDto> for RemoteProperty {
    fn from(dto: PropertyDto) -> Self {
        RemoteProperty {
            key: dto.key,
            value: dto.value,
            version: dto.version.map_or(1, |v| v.number),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct AttachmentMetadataDto {
    comment: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AttachmentDto {
    id: String,
    title: String,
    #[serde(default)]
    metadata: AttachmentMetadataDto,
    version: Option<VersionDto>,
}

impl From<AttachmentDto> for RemoteAttachment {
    fn from(dto: AttachmentDto) -> Self {
        RemoteAttachment {
            id: dto.id,
            title: dto.title,
            comment: dto.metadata.comment,
            version: dto.version.map_or(1, |v| v.number),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MetadataDto {
    labels: Option<Paged<LabelDto>>,
    #[serde(default)]
    properties: HashMap<String, PropertyDto>,
}

#[derive(Debug, Deserialize)]
struct ChildrenDto {
    attachment: Option<Paged<AttachmentDto>>,
}

/// A content object as returned by the API, with optional expansions
#[derive(Debug, Deserialize)]
struct ContentDto {
    id: String,
    title: String,
    version: Option<VersionDto>,
    /// Root first; the last entry is the direct parent
    ancestors: Option<Vec<IdDto>>,
    body: Option<BodyDto>,
    metadata: Option<MetadataDto>,
    children: Option<ChildrenDto>,
}

#[derive(Debug, Deserialize)]
struct SpaceDto {
    key: String,
    homepage: Option<IdDto>,
}

/// Maps an expansion to the API's `expand` token
fn expand_token(expansion: &Expansion) -> String {
    match expansion {
        Expansion::Body => "body.storage".to_string(),
        Expansion::Version => "version".to_string(),
        Expansion::Labels => "metadata.labels".to_string(),
        Expansion::Attachments => "children.attachment".to_string(),
        Expansion::Ancestors => "ancestors".to_string(),
        Expansion::Property(key) => format!("metadata.properties.{key}"),
    }
}

/// Joins expansions into a comma separated `expand` parameter, deduplicated
fn expand_param(expansions: &[Expansion]) -> Option<String> {
    let mut tokens: Vec<String> = Vec::new();
    for token in expansions.iter().map(expand_token) {
        if !tokens.contains(&token) {
            tokens.push(token);
        }
    }
    (!tokens.is_empty()).then(|| tokens.join(","))
}

fn storage_body(body: &str) -> Value {
    json!({ "storage": { "value": body, "representation": "storage" } })
}

// ============================================================================
// RestContentClient
// ============================================================================

/// Remote content client backed by the wiki REST API
#[derive(Debug)]
pub struct RestContentClient {
    rest: RestClient,
    spaces: SpaceCache,
}

impl RestContentClient {
    pub fn new(rest: RestClient) -> Self {
        Self {
            rest,
            spaces: SpaceCache::new(),
        }
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn space_cache(&self) -> &SpaceCache {
        &self.spaces
    }

    fn content_url(&self, suffix: &str) -> Result<Url, RemoteError> {
        self.rest.url(&format!("{CONTENT_PATH}{suffix}"))
    }

    /// Loads every item of a collection whose first page is already known
    async fn collect_pages<T: DeserializeOwned>(
        &self,
        first: Paged<T>,
        first_url: Option<Url>,
    ) -> Result<Vec<T>, RemoteError> {
        fetch_all(first, first_url, self.rest.base_url(), |url| {
            self.rest.get_json(url)
        })
        .await
    }

    /// Loads a whole collection starting at `url`
    async fn get_all<T: DeserializeOwned>(&self, url: Url) -> Result<Vec<T>, RemoteError> {
        let first: Paged<T> = self.rest.get_json(url.clone()).await?;
        self.collect_pages(first, Some(url)).await
    }

    /// Converts an API content object into the port DTO, following the
    /// pagination of embedded label and attachment lists
    async fn to_remote_page(&self, dto: ContentDto) -> Result<RemotePage, RemoteError> {
        let mut page = RemotePage::new(dto.id, dto.title);
        page.version = dto.version.map(|v| v.number);
        page.parent_id = dto
            .ancestors
            .and_then(|ancestors| ancestors.into_iter().last())
            .map(|a| a.id);
        page.body = dto.body.and_then(|b| b.storage).map(|s| s.value);

        if let Some(metadata) = dto.metadata {
            if let Some(labels) = metadata.labels {
                let labels = self.collect_pages(labels, None).await?;
                page.labels = Some(labels.into_iter().map(|l| l.name).collect());
            }
            page.properties = metadata
                .properties
                .into_values()
                .map(|p| (p.key.clone(), RemoteProperty::from(p)))
                .collect();
        }

        if let Some(attachments) = dto.children.and_then(|c| c.attachment) {
            let attachments = self.collect_pages(attachments, None).await?;
            page.attachments = Some(attachments.into_iter().map(Into::into).collect());
        }

        Ok(page)
    }

    /// Sends a content update without a body (rename or move)
    async fn put_location(
        &self,
        page_id: &str,
        title: &str,
        version: u32,
        parent_id: Option<&str>,
    ) -> Result<(), RemoteError> {
        let mut payload = json!({
            "id": page_id,
            "type": "page",
            "title": title,
            "version": { "number": version },
        });
        if let Some(parent_id) = parent_id {
            payload["ancestors"] = json!([{ "id": parent_id }]);
        }
        let url = self.content_url(&format!("/{page_id}"))?;
        let _: Value = self.rest.send_json(Method::PUT, url, &payload).await?;
        Ok(())
    }

    /// Posts a multipart attachment form, rebuilding it for every attempt
    async fn post_attachments(
        &self,
        url: Url,
        items: &[AttachmentUpload],
    ) -> Result<reqwest::Response, RemoteError> {
        let mut files = Vec::with_capacity(items.len());
        for item in items {
            files.push(tokio::fs::read(&item.path).await?);
        }

        self.rest
            .execute(Method::POST, url, |builder| {
                let mut form = Form::new().text("minorEdit", "true");
                for (item, bytes) in items.iter().zip(&files) {
                    let part = Part::bytes(bytes.clone())
                        .file_name(item.name.clone())
                        .mime_str(&item.content_type)?;
                    form = form
                        .part("file", part)
                        .text("comment", item.comment.clone());
                }
                Ok(builder
                    .header("X-Atlassian-Token", "no-check")
                    .multipart(form))
            })
            .await
    }
}

#[async_trait]
impl ContentClient for RestContentClient {
    async fn find_page(
        &self,
        space: &str,
        title: &str,
        expansions: &[Expansion],
    ) -> Result<Vec<RemotePage>> {
        let mut url = self.content_url("")?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("type", "page")
                .append_pair("spaceKey", space)
                .append_pair("title", title);
            if let Some(expand) = expand_param(expansions) {
                query.append_pair("expand", &expand);
            }
        }

        let found: Vec<ContentDto> = self.get_all(url).await?;
        debug!(space, title, matches = found.len(), "Page lookup");

        let mut pages = Vec::with_capacity(found.len());
        for dto in found {
            pages.push(self.to_remote_page(dto).await?);
        }
        Ok(pages)
    }

    async fn create_page(&self, page: &NewPage) -> Result<RemotePage> {
        let payload = json!({
            "type": "page",
            "title": page.title,
            "space": { "key": page.space },
            "ancestors": [{ "id": page.parent_id }],
            "body": storage_body(&page.body),
        });
        let url = self.content_url("")?;
        let created: ContentDto = self
            .rest
            .send_json(Method::POST, url, &payload)
            .await
            .with_context(|| format!("Failed to create page '{}'", page.title))?;

        let mut remote = self.to_remote_page(created).await?;
        remote.version = Some(remote.version.unwrap_or(1));
        remote.parent_id.get_or_insert_with(|| page.parent_id.clone());
        Ok(remote)
    }

    async fn update_page(&self, update: &PageUpdate) -> Result<u32> {
        let mut payload = json!({
            "id": update.id,
            "type": "page",
            "title": update.title,
            "body": storage_body(&update.body),
            "version": {
                "number": update.version,
                "minorEdit": !update.notify_watchers,
            },
        });
        if let Some(message) = &update.message {
            payload["version"]["message"] = json!(message);
        }
        if let Some(parent_id) = &update.parent_id {
            payload["ancestors"] = json!([{ "id": parent_id }]);
        }

        let url = self.content_url(&format!("/{}", update.id))?;
        let updated: ContentDto = self.rest.send_json(Method::PUT, url, &payload).await?;
        Ok(updated.version.map_or(update.version, |v| v.number))
    }

    async fn rename_page(&self, page_id: &str, title: &str, version: u32) -> Result<()> {
        Ok(self.put_location(page_id, title, version, None).await?)
    }

    async fn change_parent(
        &self,
        page_id: &str,
        title: &str,
        version: u32,
        new_parent_id: &str,
    ) -> Result<()> {
        Ok(self
            .put_location(page_id, title, version, Some(new_parent_id))
            .await?)
    }

    async fn get_property(&self, page_id: &str, key: &str) -> Result<Option<RemoteProperty>> {
        let url = self.content_url(&format!("/{page_id}/property/{key}"))?;
        match self.rest.get_json::<PropertyDto>(url).await {
            Ok(dto) => Ok(Some(dto.into())),
            Err(err) if err.is_not_found() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn create_property(
        &self,
        page_id: &str,
        key: &str,
        value: &Value,
    ) -> Result<RemoteProperty> {
        let url = self.content_url(&format!("/{page_id}/property"))?;
        let payload = json!({ "key": key, "value": value });
        let created: PropertyDto = self.rest.send_json(Method::POST, url, &payload).await?;
        Ok(created.into())
    }

    async fn update_property(
        &self,
        page_id: &str,
        property: &RemoteProperty,
        value: &Value,
    ) -> Result<RemoteProperty> {
        let url = self.content_url(&format!("/{page_id}/property/{}", property.key))?;
        let payload = json!({
            "key": property.key,
            "value": value,
            "version": { "number": property.version + 1 },
        });
        let updated: PropertyDto = self.rest.send_json(Method::PUT, url, &payload).await?;
        Ok(updated.into())
    }

    async fn list_labels(&self, page_id: &str) -> Result<Vec<String>> {
        let url = self.content_url(&format!("/{page_id}/label"))?;
        let labels: Vec<LabelDto> = self.get_all(url).await?;
        Ok(labels.into_iter().map(|l| l.name).collect())
    }

    async fn add_labels(&self, page_id: &str, names: &[String]) -> Result<()> {
        let url = self.content_url(&format!("/{page_id}/label"))?;
        let payload: Vec<Value> = names
            .iter()
            .map(|name| json!({ "prefix": "global", "name": name }))
            .collect();
        let _: Value = self.rest.send_json(Method::POST, url, &payload).await?;
        Ok(())
    }

    async fn delete_label(&self, page_id: &str, name: &str) -> Result<()> {
        let mut url = self.content_url(&format!("/{page_id}/label"))?;
        url.query_pairs_mut().append_pair("name", name);
        Ok(self.rest.send_empty(Method::DELETE, url).await?)
    }

    async fn list_attachments(&self, page_id: &str) -> Result<Vec<RemoteAttachment>> {
        let mut url = self.content_url(&format!("/{page_id}/child/attachment"))?;
        url.query_pairs_mut().append_pair("expand", "version,metadata");
        let attachments: Vec<AttachmentDto> = self.get_all(url).await?;
        Ok(attachments.into_iter().map(Into::into).collect())
    }

    async fn add_attachments(
        &self,
        page_id: &str,
        items: &[AttachmentUpload],
    ) -> Result<Vec<RemoteAttachment>> {
        let url = self.content_url(&format!("/{page_id}/child/attachment"))?;
        let response = self.post_attachments(url, items).await?;
        let added: Paged<AttachmentDto> = response
            .json()
            .await
            .context("Failed to parse attachment upload response")?;
        Ok(added.results.into_iter().map(Into::into).collect())
    }

    async fn update_attachment(
        &self,
        page_id: &str,
        attachment_id: &str,
        item: &AttachmentUpload,
    ) -> Result<RemoteAttachment> {
        let url = self.content_url(&format!("/{page_id}/child/attachment/{attachment_id}/data"))?;
        let response = self.post_attachments(url, std::slice::from_ref(item)).await?;
        let updated: AttachmentDto = response
            .json()
            .await
            .context("Failed to parse attachment update response")?;
        Ok(updated.into())
    }

    async fn delete_attachment(&self, attachment_id: &str) -> Result<()> {
        let url = self.content_url(&format!("/{attachment_id}"))?;
        Ok(self.rest.send_empty(Method::DELETE, url).await?)
    }

    async fn find_child_pages(
        &self,
        page_id: &str,
        expansions: &[Expansion],
    ) -> Result<Vec<RemotePage>> {
        let mut url = self.content_url(&format!("/{page_id}/child/page"))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &CHILD_PAGE_LIMIT.to_string());
            if let Some(expand) = expand_param(expansions) {
                query.append_pair("expand", &expand);
            }
        }

        let children: Vec<ContentDto> = self.get_all(url).await?;
        let mut pages = Vec::with_capacity(children.len());
        for dto in children {
            pages.push(self.to_remote_page(dto).await?);
        }
        debug!(page_id, count = pages.len(), "Listed child pages");
        Ok(pages)
    }

    async fn delete_page(&self, page_id: &str) -> Result<()> {
        let url = self.content_url(&format!("/{page_id}"))?;
        Ok(self.rest.send_empty(Method::DELETE, url).await?)
    }

    async fn space_home_page(&self, space: &str) -> Result<String> {
        if let Some(info) = self.spaces.get(space) {
            return Ok(info.home_page_id);
        }

        let mut url = self.rest.url(&format!("/rest/api/space/{space}"))?;
        url.query_pairs_mut().append_pair("expand", "homepage");
        let dto: SpaceDto = self.rest.get_json(url).await?;
        let home_page_id = dto
            .homepage
            .map(|h| h.id)
            .ok_or_else(|| {
                RemoteError::InvalidResponse(format!("space {space} has no home page"))
            })?;

        self.spaces.insert(SpaceInfo {
            key: dto.key,
            home_page_id: home_page_id.clone(),
        });
        Ok(home_page_id)
    }
}
