//! Single page reconciliation
//!
//! [`PageUploadOperations`] decides, for one local page, whether the remote
//! counterpart must be created, updated, moved or left alone, then
//! converges page properties, labels and attachments.
//!
//! ## Decision order for an existing page
//!
//! 1. Tenant guard, then cycle guard; both fail before any mutation
//! 2. Body changed (per [`ChangeDetector`]) → one body update
//! 3. Else title or parent changed → one rename / move call
//! 4. Else nothing
//!
//! Every versioned write sends `remote version + 1`. A stale version is
//! rejected by the server and surfaces as an ordinary error.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use anyhow::{Context, Result};
use futures_util::future::{BoxFuture, FutureExt};
use serde_json::Value;
use tracing::{debug, info};

use pagesync_core::config::PublishConfig;
use pagesync_core::domain::page::extract_hash_marker;
use pagesync_core::domain::{
    AttachmentsUpdateResult, ChangeDetector, Expansion, LabelsUpdateResult, LocalPageRef, Page,
    PageContent, PageOperationResult, PageOutcome, PropertyKeys, RemotePage, ServerPage,
};
use pagesync_core::ports::{AttachmentUpload, ContentClient, NewPage, PageUpdate};

use crate::task_group;
use crate::PublishError;

/// Per-run settings of the reconciler
#[derive(Debug, Clone, Default)]
pub struct UploadSettings {
    /// Version comment for body updates
    pub message: Option<String>,
    pub notify_watchers: bool,
    pub change_detector: ChangeDetector,
    /// Value written to the editor-version property
    pub editor_version: String,
    pub tenant: Option<String>,
    pub property_keys: PropertyKeys,
}

impl UploadSettings {
    pub fn from_config(config: &PublishConfig) -> Self {
        Self {
            message: config.message.clone(),
            notify_watchers: config.notify_watchers,
            change_detector: config.change_detector,
            editor_version: config.editor_version.clone(),
            tenant: config.tenant.clone(),
            property_keys: config.property_keys.clone(),
        }
    }
}

/// Reconciles single pages against the remote content store
///
/// Cheap to clone; clones share the client and settings.
#[derive(Clone)]
pub struct PageUploadOperations {
    client: Arc<dyn ContentClient>,
    settings: Arc<UploadSettings>,
}

impl PageUploadOperations {
    pub fn new(client: Arc<dyn ContentClient>, settings: UploadSettings) -> Self {
        Self {
            client,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &UploadSettings {
        &self.settings
    }

    pub fn client(&self) -> &Arc<dyn ContentClient> {
        &self.client
    }

    /// Reconciles a page, then converges its labels and attachments
    pub async fn upload(&self, page: &Page, space: &str, parent_id: &str) -> Result<PageOutcome> {
        let result = self.reconcile(page, space, parent_id).await?;
        let Some(server_page) = result.server_page().cloned() else {
            return Ok(PageOutcome::bare(result));
        };

        let labels = self.update_page_labels(&server_page, &page.content).await?;
        let attachments = self
            .update_page_attachments(&server_page, &page.content)
            .await?;

        Ok(PageOutcome {
            result,
            labels,
            attachments,
        })
    }

    /// Decides and applies create / update / move / skip for one page
    ///
    /// The returned result always carries the [`ServerPage`] the page's
    /// children must be uploaded under.
    pub async fn reconcile(
        &self,
        page: &Page,
        space: &str,
        parent_id: &str,
    ) -> Result<PageOperationResult> {
        let keys = &self.settings.property_keys;
        let content = &page.content;

        let expansions = self.lookup_expansions(content);
        let remote = self.find_single(space, &page.title, &expansions).await?;

        let Some(remote) = remote else {
            return self.create(page, space, parent_id).await;
        };

        self.check_tenant(&page.title, &remote)?;
        check_cycle(&page.title, &remote, parent_id)?;

        let next_version = remote.version_or_default() + 1;
        let parent_changed = remote.parent_id.as_deref() != Some(parent_id);
        let title_changed = remote.title != page.title;

        let result = if self
            .settings
            .change_detector
            .is_changed(&remote, content, keys)
        {
            info!(
                title = %page.title,
                page_id = %remote.id,
                version = next_version,
                parent_changed,
                "Updating page content"
            );
            self.client
                .update_page(&PageUpdate {
                    id: remote.id.clone(),
                    parent_id: parent_changed.then(|| parent_id.to_string()),
                    title: page.title.clone(),
                    body: content.body.clone(),
                    version: next_version,
                    message: self.settings.message.clone(),
                    notify_watchers: self.settings.notify_watchers,
                })
                .await
                .with_context(|| format!("Failed to update page '{}'", page.title))?;

            PageOperationResult::ContentModified {
                local: LocalPageRef::from(page),
                server_page: server_page_of(&remote, &page.title, parent_id),
                parent_changed,
            }
        } else if parent_changed || title_changed {
            info!(
                title = %page.title,
                page_id = %remote.id,
                from_parent = ?remote.parent_id,
                to_parent = parent_id,
                version = next_version,
                "Moving page"
            );
            if parent_changed {
                self.client
                    .change_parent(&remote.id, &page.title, next_version, parent_id)
                    .await?;
            } else {
                self.client
                    .rename_page(&remote.id, &page.title, next_version)
                    .await?;
            }

            PageOperationResult::LocationModified {
                local: LocalPageRef::from(page),
                server_page: server_page_of(&remote, &page.title, parent_id),
                previous_parent: remote.parent_id.clone(),
                previous_title: remote.title.clone(),
            }
        } else {
            debug!(title = %page.title, page_id = %remote.id, "Page not modified");
            PageOperationResult::NotModified {
                local: LocalPageRef::from(page),
                server_page: server_page_of(&remote, &page.title, parent_id),
            }
        };

        self.sync_properties(&remote, content).await?;
        Ok(result)
    }

    /// Virtual page path: locate an existing page and move it if needed
    ///
    /// Never writes the body or the hash property. Returns `None` when no
    /// page with the title exists.
    pub async fn check_page_and_update_parent_if_required(
        &self,
        page: &Page,
        space: &str,
        parent_id: &str,
    ) -> Result<Option<PageOperationResult>> {
        let expansions = [
            Expansion::Version,
            Expansion::Ancestors,
            Expansion::Property(self.settings.property_keys.tenant.clone()),
        ];
        let Some(remote) = self.find_single(space, &page.title, &expansions).await? else {
            return Ok(None);
        };

        self.check_tenant(&page.title, &remote)?;
        check_cycle(&page.title, &remote, parent_id)?;

        let local = LocalPageRef::from(page);
        let server_page = server_page_of(&remote, &remote.title, parent_id);

        if remote.parent_id.as_deref() == Some(parent_id) {
            debug!(title = %page.title, page_id = %remote.id, "Virtual page in place");
            return Ok(Some(PageOperationResult::NotModified { local, server_page }));
        }

        let next_version = remote.version_or_default() + 1;
        info!(
            title = %page.title,
            page_id = %remote.id,
            to_parent = parent_id,
            version = next_version,
            "Moving virtual page"
        );
        self.client
            .change_parent(&remote.id, &remote.title, next_version, parent_id)
            .await?;

        Ok(Some(PageOperationResult::LocationModified {
            local,
            server_page,
            previous_parent: remote.parent_id.clone(),
            previous_title: remote.title.clone(),
        }))
    }

    /// Makes the remote label set equal to the local one
    ///
    /// Deletions are issued one by one before a single batched addition.
    pub async fn update_page_labels(
        &self,
        server_page: &ServerPage,
        content: &PageContent,
    ) -> Result<LabelsUpdateResult> {
        let remote: HashSet<&str> = server_page.labels.iter().map(String::as_str).collect();
        let local: HashSet<&str> = content.labels.iter().map(String::as_str).collect();

        let mut removed: Vec<String> = Vec::new();
        for label in &server_page.labels {
            if !local.contains(label.as_str()) && !removed.contains(label) {
                removed.push(label.clone());
            }
        }
        let mut added: Vec<String> = Vec::new();
        for label in &content.labels {
            if !remote.contains(label.as_str()) && !added.contains(label) {
                added.push(label.clone());
            }
        }

        if added.is_empty() && removed.is_empty() {
            return Ok(LabelsUpdateResult::NotChanged);
        }

        for label in &removed {
            debug!(page_id = %server_page.id, label = %label, "Removing label");
            self.client.delete_label(&server_page.id, label).await?;
        }
        if !added.is_empty() {
            debug!(page_id = %server_page.id, labels = ?added, "Adding labels");
            self.client.add_labels(&server_page.id, &added).await?;
        }

        Ok(LabelsUpdateResult::Updated { added, removed })
    }

    /// Makes the remote attachments match the local ones, by name
    ///
    /// The batched upload of new attachments, each re-upload and each
    /// deletion run concurrently; the first failure cancels the rest.
    pub async fn update_page_attachments(
        &self,
        server_page: &ServerPage,
        content: &PageContent,
    ) -> Result<AttachmentsUpdateResult> {
        let remote_by_name: HashMap<&str, _> = server_page
            .attachments
            .iter()
            .map(|a| (a.title.as_str(), a))
            .collect();
        let local_names: HashSet<&str> = content
            .attachments
            .iter()
            .map(|a| a.attachment_name.as_str())
            .collect();

        let mut new_uploads = Vec::new();
        let mut modified = Vec::new();
        for attachment in &content.attachments {
            let upload = AttachmentUpload::from_attachment(attachment).with_context(|| {
                format!(
                    "Failed to read attachment {}",
                    attachment.resource_location.display()
                )
            })?;
            match remote_by_name.get(attachment.attachment_name.as_str()) {
                None => new_uploads.push(upload),
                Some(remote) => {
                    let local_hash = attachment.hash()?;
                    let remote_hash = remote.comment.as_deref().and_then(extract_hash_marker);
                    if remote_hash != Some(local_hash.as_str()) {
                        modified.push((remote.id.clone(), upload));
                    }
                }
            }
        }
        let removed: Vec<_> = server_page
            .attachments
            .iter()
            .filter(|a| !local_names.contains(a.title.as_str()))
            .cloned()
            .collect();

        if new_uploads.is_empty() && modified.is_empty() && removed.is_empty() {
            return Ok(AttachmentsUpdateResult::NotChanged);
        }

        let added_names: Vec<String> = new_uploads.iter().map(|u| u.name.clone()).collect();
        let modified_names: Vec<String> = modified.iter().map(|(_, u)| u.name.clone()).collect();
        debug!(
            page_id = %server_page.id,
            added = ?added_names,
            modified = ?modified_names,
            removed = removed.len(),
            "Updating attachments"
        );

        let page_id: Arc<str> = Arc::from(server_page.id.as_str());
        let mut tasks: Vec<BoxFuture<'static, Result<()>>> = Vec::new();
        if !new_uploads.is_empty() {
            let client = Arc::clone(&self.client);
            let page_id = Arc::clone(&page_id);
            tasks.push(
                async move {
                    client.add_attachments(&page_id, &new_uploads).await?;
                    Ok(())
                }
                .boxed(),
            );
        }
        for (attachment_id, upload) in modified {
            let client = Arc::clone(&self.client);
            let page_id = Arc::clone(&page_id);
            tasks.push(
                async move {
                    client
                        .update_attachment(&page_id, &attachment_id, &upload)
                        .await?;
                    Ok(())
                }
                .boxed(),
            );
        }
        for attachment in &removed {
            let client = Arc::clone(&self.client);
            let attachment_id = attachment.id.clone();
            tasks.push(async move { client.delete_attachment(&attachment_id).await }.boxed());
        }
        task_group::run_all(tasks).await?;

        Ok(AttachmentsUpdateResult::Updated {
            added: added_names,
            modified: modified_names,
            removed,
        })
    }

    /// Lists the direct remote children of a page
    pub async fn find_child_pages(
        &self,
        page_id: &str,
        expansions: &[Expansion],
    ) -> Result<Vec<RemotePage>> {
        self.client.find_child_pages(page_id, expansions).await
    }

    /// Deletes a page and all of its descendants, children first
    ///
    /// Sibling subtrees are deleted concurrently. Returns every deleted
    /// page, the root first.
    pub fn delete_page_with_children(
        &self,
        page: RemotePage,
    ) -> BoxFuture<'static, Result<Vec<RemotePage>>> {
        let ops = self.clone();
        async move {
            let children = ops.client.find_child_pages(&page.id, &[]).await?;
            let branches = children
                .into_iter()
                .map(|child| ops.delete_page_with_children(child));
            let descendants = task_group::run_all(branches).await?;

            info!(page_id = %page.id, title = %page.title, "Deleting page");
            ops.client.delete_page(&page.id).await?;

            let mut deleted = vec![page];
            deleted.extend(descendants.into_iter().flatten());
            Ok(deleted)
        }
        .boxed()
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    /// Expansions for the reconcile lookup: detector needs, engine
    /// properties, custom property keys and the page's location
    fn lookup_expansions(&self, content: &PageContent) -> Vec<Expansion> {
        let keys = &self.settings.property_keys;
        let mut expansions = vec![
            Expansion::Version,
            Expansion::Ancestors,
            Expansion::Labels,
            Expansion::Attachments,
        ];
        expansions.extend(self.settings.change_detector.expansions(keys));
        for key in self.desired_properties(content).keys() {
            let expansion = Expansion::Property(key.clone());
            if !expansions.contains(&expansion) {
                expansions.push(expansion);
            }
        }
        let tenant = Expansion::Property(keys.tenant.clone());
        if !expansions.contains(&tenant) {
            expansions.push(tenant);
        }
        expansions
    }

    /// Looks up a page by title; more than one match is an error
    async fn find_single(
        &self,
        space: &str,
        title: &str,
        expansions: &[Expansion],
    ) -> Result<Option<RemotePage>> {
        let mut found = self.client.find_page(space, title, expansions).await?;
        match found.len() {
            0 => Ok(None),
            1 => Ok(found.pop()),
            count => Err(PublishError::AmbiguousLookup {
                title: title.to_string(),
                space: space.to_string(),
                count,
            }
            .into()),
        }
    }

    async fn create(
        &self,
        page: &Page,
        space: &str,
        parent_id: &str,
    ) -> Result<PageOperationResult> {
        info!(title = %page.title, parent_id, "Creating page");
        let created = self
            .client
            .create_page(&NewPage {
                space: space.to_string(),
                parent_id: parent_id.to_string(),
                title: page.title.clone(),
                body: page.content.body.clone(),
            })
            .await
            .with_context(|| format!("Failed to create page '{}'", page.title))?;

        for (key, value) in self.desired_properties(&page.content) {
            self.client.create_property(&created.id, &key, &value).await?;
        }

        Ok(PageOperationResult::Created {
            local: LocalPageRef::from(page),
            server_page: ServerPage::new(
                created.id,
                page.title.clone(),
                Some(parent_id.to_string()),
            ),
        })
    }

    /// Properties the remote page must carry
    ///
    /// Custom properties first; the engine's own keys override them and the
    /// hash key is never taken from the page attributes.
    fn desired_properties(&self, content: &PageContent) -> BTreeMap<String, Value> {
        let keys = &self.settings.property_keys;
        let mut desired: BTreeMap<String, Value> = content
            .attributes
            .properties
            .iter()
            .filter(|(key, _)| **key != keys.hash)
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        desired.insert(keys.hash.clone(), Value::String(content.hash()));
        desired.insert(
            keys.editor.clone(),
            Value::String(self.settings.editor_version.clone()),
        );
        if let Some(tenant) = &self.settings.tenant {
            desired.insert(keys.tenant.clone(), Value::String(tenant.clone()));
        }
        desired
    }

    /// Creates missing properties and updates changed ones; unchanged
    /// values keep their version
    async fn sync_properties(&self, remote: &RemotePage, content: &PageContent) -> Result<()> {
        for (key, value) in self.desired_properties(content) {
            match remote.property(&key) {
                None => {
                    debug!(page_id = %remote.id, key = %key, "Creating property");
                    self.client.create_property(&remote.id, &key, &value).await?;
                }
                Some(existing) if existing.value != value => {
                    debug!(
                        page_id = %remote.id,
                        key = %key,
                        version = existing.version + 1,
                        "Updating property"
                    );
                    self.client
                        .update_property(&remote.id, existing, &value)
                        .await?;
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Fails when the remote page carries a tenant tag other than ours
    fn check_tenant(&self, title: &str, remote: &RemotePage) -> Result<(), PublishError> {
        let tenant_key = &self.settings.property_keys.tenant;
        let Some(property) = remote.property(tenant_key) else {
            return Ok(());
        };
        let actual = property.value_str();
        let expected = self.settings.tenant.as_deref();
        if actual == expected {
            return Ok(());
        }
        Err(PublishError::TenantMismatch {
            title: title.to_string(),
            expected: expected.map(str::to_string),
            actual: Some(actual.map_or_else(|| property.value.to_string(), str::to_string)),
        })
    }
}

fn check_cycle(title: &str, remote: &RemotePage, parent_id: &str) -> Result<(), PublishError> {
    if remote.id == parent_id {
        return Err(PublishError::ParentCycle {
            title: title.to_string(),
            page_id: remote.id.clone(),
        });
    }
    Ok(())
}

fn server_page_of(remote: &RemotePage, title: &str, parent_id: &str) -> ServerPage {
    ServerPage {
        id: remote.id.clone(),
        title: title.to_string(),
        parent_id: Some(parent_id.to_string()),
        labels: remote.labels.clone().unwrap_or_default(),
        attachments: remote.attachments.clone().unwrap_or_default(),
    }
}
