//! Shared helpers for engine tests
//!
//! [`FakeContentClient`] is an in-memory content store that enforces
//! version numbers like the real server and records every mutating call.
//! [`RecordingTracker`] keeps everything the orchestrator reports.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;

use pagesync_core::domain::{
    Cleanup, Expansion, Page, PageContent, PageOutcome, PropertyKeys, RemoteAttachment,
    RemotePage, RemoteProperty,
};
use pagesync_core::ports::{AttachmentUpload, ContentClient, NewPage, PageUpdate, UploadTracker};
use pagesync_remote::RemoteError;
use pagesync_sync::{ContentUploader, PageUploadOperations, UploadSettings};

pub const SPACE: &str = "DOCS";
pub const ROOT: &str = "root";
pub const EDITOR: &str = "v2";

// ============================================================================
// Fake remote store
// ============================================================================

/// A page stored in the fake
#[derive(Debug, Clone)]
pub struct FakePage {
    pub id: String,
    pub space: String,
    pub title: String,
    pub parent_id: Option<String>,
    pub body: String,
    pub version: u32,
    pub labels: Vec<String>,
    pub attachments: Vec<RemoteAttachment>,
    pub properties: HashMap<String, RemoteProperty>,
}

impl FakePage {
    pub fn new(id: &str, title: &str, parent_id: &str) -> Self {
        Self {
            id: id.to_string(),
            space: SPACE.to_string(),
            title: title.to_string(),
            parent_id: Some(parent_id.to_string()),
            body: String::new(),
            version: 1,
            labels: Vec::new(),
            attachments: Vec::new(),
            properties: HashMap::new(),
        }
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.to_string();
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_property(mut self, key: &str, value: Value, version: u32) -> Self {
        self.properties.insert(
            key.to_string(),
            RemoteProperty {
                key: key.to_string(),
                value,
                version,
            },
        );
        self
    }

    /// Marks the page as published with `body`: hash and editor properties
    pub fn managed(self, body: &str) -> Self {
        let hash = PageContent::new(body).hash();
        let keys = PropertyKeys::default();
        self.with_body(body)
            .with_property(&keys.hash, Value::String(hash), 1)
            .with_property(&keys.editor, Value::String(EDITOR.into()), 1)
    }

    pub fn with_tenant(self, tenant: &str) -> Self {
        let key = PropertyKeys::default().tenant;
        self.with_property(&key, Value::String(tenant.into()), 1)
    }

    pub fn with_labels(mut self, labels: &[&str]) -> Self {
        self.labels = labels.iter().map(|l| l.to_string()).collect();
        self
    }

    pub fn with_attachment(mut self, id: &str, title: &str, comment: Option<String>) -> Self {
        self.attachments.push(RemoteAttachment {
            id: id.to_string(),
            title: title.to_string(),
            comment,
            version: 1,
        });
        self
    }

    fn to_remote(&self, expansions: &[Expansion]) -> RemotePage {
        let mut page = RemotePage::new(self.id.clone(), self.title.clone());
        for expansion in expansions {
            match expansion {
                Expansion::Body => page.body = Some(self.body.clone()),
                Expansion::Version => page.version = Some(self.version),
                Expansion::Labels => page.labels = Some(self.labels.clone()),
                Expansion::Attachments => page.attachments = Some(self.attachments.clone()),
                Expansion::Ancestors => page.parent_id = self.parent_id.clone(),
                Expansion::Property(key) => {
                    if let Some(property) = self.properties.get(key) {
                        page.properties.insert(key.clone(), property.clone());
                    }
                }
            }
        }
        page
    }
}

/// A mutating call received by the fake
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    CreatePage {
        parent_id: String,
        title: String,
    },
    UpdatePage {
        id: String,
        version: u32,
        parent_id: Option<String>,
    },
    RenamePage {
        id: String,
        title: String,
        version: u32,
    },
    ChangeParent {
        id: String,
        title: String,
        version: u32,
        parent_id: String,
    },
    CreateProperty {
        page_id: String,
        key: String,
        value: Value,
    },
    UpdateProperty {
        page_id: String,
        key: String,
        version: u32,
    },
    AddLabels {
        page_id: String,
        names: Vec<String>,
    },
    DeleteLabel {
        page_id: String,
        name: String,
    },
    AddAttachments {
        page_id: String,
        names: Vec<String>,
    },
    UpdateAttachment {
        page_id: String,
        attachment_id: String,
    },
    DeleteAttachment {
        attachment_id: String,
    },
    DeletePage {
        id: String,
    },
}

#[derive(Debug, Default)]
struct FakeState {
    pages: Vec<FakePage>,
    next_id: u32,
    calls: Vec<Call>,
    /// Operation name to the status every call of it fails with
    failures: HashMap<&'static str, StatusCode>,
}

/// In-memory content store
#[derive(Debug, Default)]
pub struct FakeContentClient {
    state: Mutex<FakeState>,
    child_lookups: AtomicUsize,
}

fn api_error(status: StatusCode, body: &str) -> anyhow::Error {
    RemoteError::Api {
        status,
        body: body.to_string(),
    }
    .into()
}

impl FakeContentClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed(&self, page: FakePage) {
        self.state.lock().unwrap().pages.push(page);
    }

    /// Makes every call of `operation` fail with `status`
    pub fn fail_on(&self, operation: &'static str, status: StatusCode) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(operation, status);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn child_lookups(&self) -> usize {
        self.child_lookups.load(Ordering::SeqCst)
    }

    pub fn page(&self, title: &str) -> Option<FakePage> {
        self.state
            .lock()
            .unwrap()
            .pages
            .iter()
            .find(|p| p.title == title)
            .cloned()
    }

    pub fn page_count(&self) -> usize {
        self.state.lock().unwrap().pages.len()
    }

    fn check(&self, state: &FakeState, operation: &'static str) -> Result<()> {
        match state.failures.get(operation) {
            Some(status) => Err(api_error(*status, &format!("{operation} rejected"))),
            None => Ok(()),
        }
    }

    fn with_page<T>(
        &self,
        operation: &'static str,
        page_id: &str,
        call: Option<Call>,
        f: impl FnOnce(&mut FakePage) -> Result<T>,
    ) -> Result<T> {
        let mut state = self.state.lock().unwrap();
        self.check(&state, operation)?;
        if let Some(call) = call {
            state.calls.push(call);
        }
        let page = state
            .pages
            .iter_mut()
            .find(|p| p.id == page_id)
            .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "no such page"))?;
        f(page)
    }
}

fn check_version(page: &FakePage, version: u32) -> Result<()> {
    if version != page.version + 1 {
        return Err(api_error(StatusCode::CONFLICT, "version mismatch"));
    }
    Ok(())
}

#[async_trait]
impl ContentClient for FakeContentClient {
    async fn find_page(
        &self,
        space: &str,
        title: &str,
        expansions: &[Expansion],
    ) -> Result<Vec<RemotePage>> {
        let state = self.state.lock().unwrap();
        self.check(&state, "find_page")?;
        Ok(state
            .pages
            .iter()
            .filter(|p| p.space == space && p.title.eq_ignore_ascii_case(title))
            .map(|p| p.to_remote(expansions))
            .collect())
    }

    async fn create_page(&self, page: &NewPage) -> Result<RemotePage> {
        let mut state = self.state.lock().unwrap();
        self.check(&state, "create_page")?;
        state.calls.push(Call::CreatePage {
            parent_id: page.parent_id.clone(),
            title: page.title.clone(),
        });
        state.next_id += 1;
        let id = format!("p{}", state.next_id);
        let stored = FakePage::new(&id, &page.title, &page.parent_id).with_body(&page.body);
        let remote = stored.to_remote(&[Expansion::Version, Expansion::Ancestors]);
        state.pages.push(stored);
        Ok(remote)
    }

    async fn update_page(&self, update: &PageUpdate) -> Result<u32> {
        let call = Call::UpdatePage {
            id: update.id.clone(),
            version: update.version,
            parent_id: update.parent_id.clone(),
        };
        self.with_page("update_page", &update.id, Some(call), |page| {
            check_version(page, update.version)?;
            page.version = update.version;
            page.title = update.title.clone();
            page.body = update.body.clone();
            if let Some(parent_id) = &update.parent_id {
                page.parent_id = Some(parent_id.clone());
            }
            Ok(page.version)
        })
    }

    async fn rename_page(&self, page_id: &str, title: &str, version: u32) -> Result<()> {
        let call = Call::RenamePage {
            id: page_id.to_string(),
            title: title.to_string(),
            version,
        };
        self.with_page("rename_page", page_id, Some(call), |page| {
            check_version(page, version)?;
            page.version = version;
            page.title = title.to_string();
            Ok(())
        })
    }

    async fn change_parent(
        &self,
        page_id: &str,
        title: &str,
        version: u32,
        new_parent_id: &str,
    ) -> Result<()> {
        let call = Call::ChangeParent {
            id: page_id.to_string(),
            title: title.to_string(),
            version,
            parent_id: new_parent_id.to_string(),
        };
        self.with_page("change_parent", page_id, Some(call), |page| {
            check_version(page, version)?;
            page.version = version;
            page.title = title.to_string();
            page.parent_id = Some(new_parent_id.to_string());
            Ok(())
        })
    }

    async fn get_property(&self, page_id: &str, key: &str) -> Result<Option<RemoteProperty>> {
        self.with_page("get_property", page_id, None, |page| {
            Ok(page.properties.get(key).cloned())
        })
    }

    async fn create_property(
        &self,
        page_id: &str,
        key: &str,
        value: &Value,
    ) -> Result<RemoteProperty> {
        let call = Call::CreateProperty {
            page_id: page_id.to_string(),
            key: key.to_string(),
            value: value.clone(),
        };
        self.with_page("create_property", page_id, Some(call), |page| {
            if page.properties.contains_key(key) {
                return Err(api_error(StatusCode::CONFLICT, "property exists"));
            }
            let property = RemoteProperty {
                key: key.to_string(),
                value: value.clone(),
                version: 1,
            };
            page.properties.insert(key.to_string(), property.clone());
            Ok(property)
        })
    }

    async fn update_property(
        &self,
        page_id: &str,
        property: &RemoteProperty,
        value: &Value,
    ) -> Result<RemoteProperty> {
        let version = property.version + 1;
        let call = Call::UpdateProperty {
            page_id: page_id.to_string(),
            key: property.key.clone(),
            version,
        };
        self.with_page("update_property", page_id, Some(call), |page| {
            let stored = page
                .properties
                .get_mut(&property.key)
                .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "no such property"))?;
            if version != stored.version + 1 {
                return Err(api_error(StatusCode::CONFLICT, "property version mismatch"));
            }
            stored.version = version;
            stored.value = value.clone();
            Ok(stored.clone())
        })
    }

    async fn list_labels(&self, page_id: &str) -> Result<Vec<String>> {
        self.with_page("list_labels", page_id, None, |page| Ok(page.labels.clone()))
    }

    async fn add_labels(&self, page_id: &str, names: &[String]) -> Result<()> {
        let call = Call::AddLabels {
            page_id: page_id.to_string(),
            names: names.to_vec(),
        };
        self.with_page("add_labels", page_id, Some(call), |page| {
            for name in names {
                if !page.labels.contains(name) {
                    page.labels.push(name.clone());
                }
            }
            Ok(())
        })
    }

    async fn delete_label(&self, page_id: &str, name: &str) -> Result<()> {
        let call = Call::DeleteLabel {
            page_id: page_id.to_string(),
            name: name.to_string(),
        };
        self.with_page("delete_label", page_id, Some(call), |page| {
            page.labels.retain(|l| l != name);
            Ok(())
        })
    }

    async fn list_attachments(&self, page_id: &str) -> Result<Vec<RemoteAttachment>> {
        self.with_page("list_attachments", page_id, None, |page| {
            Ok(page.attachments.clone())
        })
    }

    async fn add_attachments(
        &self,
        page_id: &str,
        items: &[AttachmentUpload],
    ) -> Result<Vec<RemoteAttachment>> {
        let call = Call::AddAttachments {
            page_id: page_id.to_string(),
            names: items.iter().map(|i| i.name.clone()).collect(),
        };
        self.with_page("add_attachments", page_id, Some(call), |page| {
            let added: Vec<RemoteAttachment> = items
                .iter()
                .map(|item| RemoteAttachment {
                    id: format!("att-{}-{}", page.id, item.name),
                    title: item.name.clone(),
                    comment: Some(item.comment.clone()),
                    version: 1,
                })
                .collect();
            page.attachments.extend(added.iter().cloned());
            Ok(added)
        })
    }

    async fn update_attachment(
        &self,
        page_id: &str,
        attachment_id: &str,
        item: &AttachmentUpload,
    ) -> Result<RemoteAttachment> {
        let call = Call::UpdateAttachment {
            page_id: page_id.to_string(),
            attachment_id: attachment_id.to_string(),
        };
        self.with_page("update_attachment", page_id, Some(call), |page| {
            let attachment = page
                .attachments
                .iter_mut()
                .find(|a| a.id == attachment_id)
                .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "no such attachment"))?;
            attachment.version += 1;
            attachment.comment = Some(item.comment.clone());
            Ok(attachment.clone())
        })
    }

    async fn delete_attachment(&self, attachment_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.check(&state, "delete_attachment")?;
        state.calls.push(Call::DeleteAttachment {
            attachment_id: attachment_id.to_string(),
        });
        for page in &mut state.pages {
            page.attachments.retain(|a| a.id != attachment_id);
        }
        Ok(())
    }

    async fn find_child_pages(
        &self,
        page_id: &str,
        expansions: &[Expansion],
    ) -> Result<Vec<RemotePage>> {
        self.child_lookups.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        self.check(&state, "find_child_pages")?;
        Ok(state
            .pages
            .iter()
            .filter(|p| p.parent_id.as_deref() == Some(page_id))
            .map(|p| p.to_remote(expansions))
            .collect())
    }

    async fn delete_page(&self, page_id: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        self.check(&state, "delete_page")?;
        state.calls.push(Call::DeletePage {
            id: page_id.to_string(),
        });
        let before = state.pages.len();
        state.pages.retain(|p| p.id != page_id);
        if state.pages.len() == before {
            return Err(api_error(StatusCode::NOT_FOUND, "no such page"));
        }
        Ok(())
    }

    async fn space_home_page(&self, _space: &str) -> Result<String> {
        Ok(ROOT.to_string())
    }
}

// ============================================================================
// Tracker
// ============================================================================

/// Tracker keeping every report for assertions
#[derive(Debug, Default)]
pub struct RecordingTracker {
    pub outcomes: Mutex<Vec<PageOutcome>>,
    pub deleted: Mutex<Vec<(RemotePage, Vec<RemotePage>)>>,
    pub uploads_finished: AtomicUsize,
    pub cleanup_finished: AtomicUsize,
}

impl RecordingTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn outcomes(&self) -> Vec<PageOutcome> {
        self.outcomes.lock().unwrap().clone()
    }

    /// Outcome kind per page title
    pub fn kinds(&self) -> HashMap<String, &'static str> {
        self.outcomes()
            .iter()
            .map(|o| (o.result.local().title.clone(), o.result.kind()))
            .collect()
    }

    pub fn outcome(&self, title: &str) -> PageOutcome {
        self.outcomes()
            .into_iter()
            .find(|o| o.result.local().title == title)
            .unwrap_or_else(|| panic!("no outcome for {title}"))
    }

    /// Ids of every deleted page, across all reported subtrees
    pub fn deleted_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .deleted
            .lock()
            .unwrap()
            .iter()
            .flat_map(|(_, pages)| pages.iter().map(|p| p.id.clone()))
            .collect();
        ids.sort();
        ids
    }
}

impl UploadTracker for RecordingTracker {
    fn page_completed(&self, outcome: &PageOutcome) {
        self.outcomes.lock().unwrap().push(outcome.clone());
    }

    fn uploads_finished(&self) {
        self.uploads_finished.fetch_add(1, Ordering::SeqCst);
    }

    fn pages_deleted(&self, orphan: &RemotePage, deleted: &[RemotePage]) {
        self.deleted
            .lock()
            .unwrap()
            .push((orphan.clone(), deleted.to_vec()));
    }

    fn cleanup_finished(&self) {
        self.cleanup_finished.fetch_add(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Builders
// ============================================================================

pub fn settings(tenant: Option<&str>) -> UploadSettings {
    UploadSettings {
        message: Some("published".into()),
        notify_watchers: false,
        editor_version: EDITOR.into(),
        tenant: tenant.map(str::to_string),
        ..UploadSettings::default()
    }
}

pub fn operations(
    client: Arc<dyn ContentClient>,
    settings: UploadSettings,
) -> PageUploadOperations {
    PageUploadOperations::new(client, settings)
}

pub fn uploader(
    client: Arc<dyn ContentClient>,
    settings: UploadSettings,
    tracker: Arc<RecordingTracker>,
    cleanup: Cleanup,
) -> ContentUploader {
    ContentUploader::new(operations(client, settings), tracker, cleanup)
}

/// A page with a body and a source file named after its title
pub fn page(title: &str, body: &str) -> Page {
    Page::new(title, PageContent::new(body)).with_source(PathBuf::from(format!("{title}.md")))
}
