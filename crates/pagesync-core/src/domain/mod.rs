//! Domain types
//!
//! - [`page`] - the local page tree produced by the converter
//! - [`remote`] - remote page snapshots and the normalized [`ServerPage`]
//! - [`outcome`] - per-page, label and attachment results
//! - [`policy`] - change detection and cleanup policies

pub mod errors;
pub mod outcome;
pub mod page;
pub mod policy;
pub mod remote;

pub use errors::DomainError;
pub use outcome::{
    AttachmentsUpdateResult, LabelsUpdateResult, LocalPageRef, PageOperationResult, PageOutcome,
};
pub use page::{Attachment, Page, PageAttributes, PageContent};
pub use policy::{ChangeDetector, Cleanup, PropertyKeys};
pub use remote::{Expansion, RemoteAttachment, RemotePage, RemoteProperty, ServerPage};
