//! Tagged outcome types produced by a publishing run

use std::path::PathBuf;

use serde::Serialize;

use super::page::Page;
use super::remote::{RemoteAttachment, ServerPage};

/// Identifies the local page an outcome belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalPageRef {
    pub title: String,
    pub source: PathBuf,
}

impl From<&Page> for LocalPageRef {
    fn from(page: &Page) -> Self {
        Self {
            title: page.title.clone(),
            source: page.source.clone(),
        }
    }
}

/// Result of reconciling one local page against the remote store
///
/// Produced exactly once per page per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PageOperationResult {
    /// The page did not exist and was created
    Created {
        local: LocalPageRef,
        server_page: ServerPage,
    },
    /// The body changed and was updated; title/parent corrected in the same call
    ContentModified {
        local: LocalPageRef,
        server_page: ServerPage,
        parent_changed: bool,
    },
    /// Only the title and/or parent changed
    LocationModified {
        local: LocalPageRef,
        server_page: ServerPage,
        previous_parent: Option<String>,
        previous_title: String,
    },
    NotModified {
        local: LocalPageRef,
        server_page: ServerPage,
    },
    /// A remote call failed while reconciling the page
    Failed {
        local: LocalPageRef,
        status: Option<u16>,
        body: String,
    },
}

impl PageOperationResult {
    pub fn local(&self) -> &LocalPageRef {
        match self {
            PageOperationResult::Created { local, .. }
            | PageOperationResult::ContentModified { local, .. }
            | PageOperationResult::LocationModified { local, .. }
            | PageOperationResult::NotModified { local, .. }
            | PageOperationResult::Failed { local, .. } => local,
        }
    }

    /// Server page after reconciling; `None` for [`PageOperationResult::Failed`]
    pub fn server_page(&self) -> Option<&ServerPage> {
        match self {
            PageOperationResult::Created { server_page, .. }
            | PageOperationResult::ContentModified { server_page, .. }
            | PageOperationResult::LocationModified { server_page, .. }
            | PageOperationResult::NotModified { server_page, .. } => Some(server_page),
            PageOperationResult::Failed { .. } => None,
        }
    }

    /// Whether the run changed anything remotely for this page
    pub fn is_mutation(&self) -> bool {
        match self {
            PageOperationResult::Created { .. }
            | PageOperationResult::ContentModified { .. }
            | PageOperationResult::LocationModified { .. } => true,
            PageOperationResult::NotModified { .. } | PageOperationResult::Failed { .. } => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PageOperationResult::Created { .. } => "created",
            PageOperationResult::ContentModified { .. } => "content_modified",
            PageOperationResult::LocationModified { .. } => "location_modified",
            PageOperationResult::NotModified { .. } => "not_modified",
            PageOperationResult::Failed { .. } => "failed",
        }
    }
}

/// Result of converging the remote label set on the local one
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LabelsUpdateResult {
    NotChanged,
    Updated {
        added: Vec<String>,
        removed: Vec<String>,
    },
}

/// Result of converging remote attachments on the local ones
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttachmentsUpdateResult {
    NotChanged,
    Updated {
        /// Names uploaded for the first time
        added: Vec<String>,
        /// Names re-uploaded because their content hash changed
        modified: Vec<String>,
        /// Remote attachments deleted because they are gone locally
        removed: Vec<RemoteAttachment>,
    },
}

/// Everything the tracker learns about one uploaded page
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageOutcome {
    pub result: PageOperationResult,
    pub labels: LabelsUpdateResult,
    pub attachments: AttachmentsUpdateResult,
}

impl PageOutcome {
    /// Outcome without label or attachment work (virtual and failed pages)
    pub fn bare(result: PageOperationResult) -> Self {
        Self {
            result,
            labels: LabelsUpdateResult::NotChanged,
            attachments: AttachmentsUpdateResult::NotChanged,
        }
    }
}
