//! Page tree upload orchestration
//!
//! [`ContentUploader`] walks the local tree level by level. Siblings are
//! uploaded concurrently; a page's children start once the page itself
//! is fully reconciled, under its freshly resolved remote id. After the
//! whole tree is uploaded, remote children that were not part of the run
//! are deleted according to the [`Cleanup`] policy.
//!
//! ## Failure semantics
//!
//! The first failure anywhere aborts the run: sibling tasks at the same
//! level are cancelled and the error bubbles up. Pages reconciled before
//! the failure stay applied remotely.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{anyhow, Result};
use futures_util::future::{BoxFuture, FutureExt};
use tracing::{debug, info};

use pagesync_core::domain::{Cleanup, LocalPageRef, Page, PageOperationResult, PageOutcome};
use pagesync_core::ports::UploadTracker;
use pagesync_remote::RemoteError;

use crate::reconciler::PageUploadOperations;
use crate::task_group;
use crate::PublishError;

/// A page uploaded during the current run
#[derive(Debug, Clone)]
struct UploadedPage {
    parent_id: String,
    id: String,
    title: String,
}

type Registry = Arc<Mutex<Vec<UploadedPage>>>;

/// Uploads a local page tree and cleans up orphans
#[derive(Clone)]
pub struct ContentUploader {
    operations: PageUploadOperations,
    tracker: Arc<dyn UploadTracker>,
    cleanup: Cleanup,
}

impl ContentUploader {
    pub fn new(
        operations: PageUploadOperations,
        tracker: Arc<dyn UploadTracker>,
        cleanup: Cleanup,
    ) -> Self {
        Self {
            operations,
            tracker,
            cleanup,
        }
    }

    /// Uploads `pages` under `root_parent_id`, then deletes orphans
    #[tracing::instrument(skip(self, pages), fields(pages = pages.len(), cleanup = %self.cleanup))]
    pub async fn upload_pages(
        &self,
        pages: &[Page],
        space: &str,
        root_parent_id: &str,
    ) -> Result<()> {
        let registry = Registry::default();
        self.upload_level(
            pages.to_vec(),
            Arc::from(space),
            root_parent_id.to_string(),
            Arc::clone(&registry),
        )
        .await?;
        self.tracker.uploads_finished();

        let uploaded = std::mem::take(
            &mut *registry.lock().unwrap_or_else(PoisonError::into_inner),
        );
        info!(uploaded = uploaded.len(), "Page tree uploaded");

        self.delete_orphans(managed_titles(&uploaded))
            .await
            .map_err(|source| PublishError::Cleanup {
                policy: self.cleanup,
                source,
            })?;
        self.tracker.cleanup_finished();
        Ok(())
    }

    /// Uploads one level of siblings concurrently
    fn upload_level(
        &self,
        pages: Vec<Page>,
        space: Arc<str>,
        parent_id: String,
        registry: Registry,
    ) -> BoxFuture<'static, Result<()>> {
        let uploader = self.clone();
        async move {
            let tasks = pages.into_iter().map(|page| {
                uploader.upload_tree(
                    page,
                    Arc::clone(&space),
                    parent_id.clone(),
                    Arc::clone(&registry),
                )
            });
            task_group::run_all(tasks).await?;
            Ok(())
        }
        .boxed()
    }

    /// Uploads a page, reports it, then uploads its children under it
    fn upload_tree(
        &self,
        page: Page,
        space: Arc<str>,
        default_parent: String,
        registry: Registry,
    ) -> BoxFuture<'static, Result<()>> {
        let uploader = self.clone();
        async move {
            let parent_id = uploader
                .resolve_parent(&page, &space, &default_parent)
                .await?;
            let outcome = uploader.upload_page(&page, &space, &parent_id).await?;
            let server_page = outcome
                .result
                .server_page()
                .cloned()
                .ok_or_else(|| anyhow!("No remote page for '{}'", page.title))?;
            uploader.tracker.page_completed(&outcome);

            registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(UploadedPage {
                    parent_id,
                    id: server_page.id.clone(),
                    title: server_page.title.clone(),
                });

            if !page.children.is_empty() {
                uploader
                    .upload_level(page.children, space, server_page.id, registry)
                    .await?;
            }
            Ok(())
        }
        .boxed()
    }

    /// Effective parent: explicit id, else parent title lookup, else default
    async fn resolve_parent(
        &self,
        page: &Page,
        space: &str,
        default_parent: &str,
    ) -> Result<String> {
        let attributes = &page.content.attributes;
        if let Some(parent_id) = &attributes.parent_id {
            return Ok(parent_id.clone());
        }
        let Some(parent_title) = &attributes.parent else {
            return Ok(default_parent.to_string());
        };

        let mut found = self
            .operations
            .client()
            .find_page(space, parent_title, &[])
            .await?;
        match found.len() {
            0 => Err(PublishError::ParentNotFound {
                title: page.title.clone(),
                parent: parent_title.clone(),
            }
            .into()),
            1 => {
                let parent = found.remove(0);
                debug!(
                    title = %page.title,
                    parent = %parent_title,
                    parent_id = %parent.id,
                    "Resolved custom parent"
                );
                Ok(parent.id)
            }
            count => Err(PublishError::AmbiguousLookup {
                title: parent_title.clone(),
                space: space.to_string(),
                count,
            }
            .into()),
        }
    }

    /// Reconciles one page; remote failures are reported before propagating
    async fn upload_page(
        &self,
        page: &Page,
        space: &str,
        parent_id: &str,
    ) -> Result<PageOutcome> {
        let result = if page.is_virtual {
            self.operations
                .check_page_and_update_parent_if_required(page, space, parent_id)
                .await
                .and_then(|found| {
                    found.map(PageOutcome::bare).ok_or_else(|| {
                        PublishError::VirtualPageNotFound {
                            title: page.title.clone(),
                            file: page.source.clone(),
                        }
                        .into()
                    })
                })
        } else {
            self.operations.upload(page, space, parent_id).await
        };

        result.map_err(|err| {
            if let Some(failed) = failed_result(page, &err) {
                self.tracker.page_completed(&PageOutcome::bare(failed));
            }
            err
        })
    }

    async fn delete_orphans(&self, managed: BTreeMap<String, BTreeSet<String>>) -> Result<()> {
        if self.cleanup == Cleanup::None {
            debug!("Cleanup disabled, keeping orphans");
            return Ok(());
        }
        let tasks = managed
            .into_iter()
            .map(|(parent_id, titles)| self.clone().clean_parent(parent_id, titles).boxed());
        task_group::run_all(tasks).await?;
        Ok(())
    }

    /// Deletes the orphans of one parent, each subtree concurrently
    async fn clean_parent(self, parent_id: String, managed: BTreeSet<String>) -> Result<()> {
        let settings = self.operations.settings();
        let keys = &settings.property_keys;
        let tenant = settings.tenant.as_deref();

        let children = self
            .operations
            .find_child_pages(&parent_id, &self.cleanup.expansions(keys))
            .await?;
        let orphans: Vec<_> = children
            .into_iter()
            .filter(|child| !managed.contains(&child.title))
            .filter(|child| {
                let delete = self.cleanup.should_delete(child, keys, tenant);
                if !delete {
                    debug!(
                        page_id = %child.id,
                        title = %child.title,
                        "Keeping orphan outside cleanup scope"
                    );
                }
                delete
            })
            .collect();

        if orphans.is_empty() {
            return Ok(());
        }
        info!(parent_id = %parent_id, count = orphans.len(), "Deleting orphans");

        let tasks = orphans.into_iter().map(|orphan| {
            let uploader = self.clone();
            async move {
                let deleted = uploader
                    .operations
                    .delete_page_with_children(orphan.clone())
                    .await?;
                uploader.tracker.pages_deleted(&orphan, &deleted);
                Ok(())
            }
        });
        task_group::run_all(tasks).await?;
        Ok(())
    }
}

/// Parent id to titles uploaded under it; every uploaded page also gets
/// an entry for its own id, empty when it has no uploaded children
fn managed_titles(uploaded: &[UploadedPage]) -> BTreeMap<String, BTreeSet<String>> {
    let mut managed: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    for page in uploaded {
        managed
            .entry(page.parent_id.clone())
            .or_default()
            .insert(page.title.clone());
        managed.entry(page.id.clone()).or_default();
    }
    managed
}

/// `Failed` outcome for an error caused by a remote call
fn failed_result(page: &Page, err: &anyhow::Error) -> Option<PageOperationResult> {
    let remote = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<RemoteError>())?;
    let body = match remote {
        RemoteError::Api { body, .. } => body.clone(),
        other => other.to_string(),
    };
    Some(PageOperationResult::Failed {
        local: LocalPageRef::from(page),
        status: remote.status().map(|s| s.as_u16()),
        body,
    })
}
