//! Local page tree
//!
//! A [`Page`] is what the document converter hands to the engine: a title,
//! the rendered storage-format body, labels, attachments and header
//! attributes, plus child pages. The tree is immutable once produced and
//! the engine only ever reads it.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Prefix of the integrity marker stored in a remote attachment comment
pub const HASH_MARKER_PREFIX: &str = "HASH:";

/// Length of a hex-encoded SHA-256 digest
const SHA256_HEX_LEN: usize = 64;

/// Hex-encodes a SHA-256 digest of `bytes`
pub fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Extracts the `HASH:<hex>` marker from an attachment comment.
///
/// The marker may appear anywhere in the comment; only a full 64 hex
/// character digest is accepted.
pub fn extract_hash_marker(comment: &str) -> Option<&str> {
    comment.match_indices(HASH_MARKER_PREFIX).find_map(|(idx, _)| {
        let start = idx + HASH_MARKER_PREFIX.len();
        let candidate = comment.get(start..start + SHA256_HEX_LEN)?;
        let well_formed = candidate.chars().all(|c| c.is_ascii_hexdigit());
        let terminated = comment[start + SHA256_HEX_LEN..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_ascii_hexdigit());
        (well_formed && terminated).then_some(candidate)
    })
}

// ============================================================================
// Attachment
// ============================================================================

/// A local file referenced by a page
///
/// The content digest is computed on first use and memoized, since the
/// same attachment is compared against the remote state at most once per
/// run but may be hashed again when the upload request is built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attachment {
    /// Storage key under which the file is attached to the remote page
    #[serde(rename = "name")]
    pub attachment_name: String,
    /// Reference as written in the source document
    #[serde(rename = "link", default)]
    pub link_name: String,
    /// Location of the file on disk
    #[serde(rename = "path")]
    pub resource_location: PathBuf,
    #[serde(skip)]
    hash: OnceLock<String>,
}

impl Attachment {
    pub fn new(
        attachment_name: impl Into<String>,
        link_name: impl Into<String>,
        resource_location: impl Into<PathBuf>,
    ) -> Self {
        Self {
            attachment_name: attachment_name.into(),
            link_name: link_name.into(),
            resource_location: resource_location.into(),
            hash: OnceLock::new(),
        }
    }

    /// SHA-256 of the file content, hex encoded
    pub fn hash(&self) -> io::Result<String> {
        if let Some(hash) = self.hash.get() {
            return Ok(hash.clone());
        }
        let bytes = fs::read(&self.resource_location)?;
        let hash = sha256_hex(&bytes);
        Ok(self.hash.get_or_init(|| hash).clone())
    }

    /// Comment stored alongside the remote attachment (`HASH:<hex>`)
    pub fn hash_comment(&self) -> io::Result<String> {
        Ok(format!("{HASH_MARKER_PREFIX}{}", self.hash()?))
    }

    /// MIME type derived from the file extension
    pub fn content_type(&self) -> &'static str {
        content_type_for(&self.resource_location)
    }
}

fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "pdf" => "application/pdf",
        "txt" | "md" => "text/plain",
        "csv" => "text/csv",
        "json" => "application/json",
        "xml" => "application/xml",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

// ============================================================================
// PageAttributes / PageContent
// ============================================================================

/// Header attributes parsed from the source document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageAttributes {
    /// Explicit remote id of the parent page
    #[serde(rename = "parentId", default)]
    pub parent_id: Option<String>,
    /// Title of the parent page, resolved remotely
    #[serde(default)]
    pub parent: Option<String>,
    /// Custom page properties to write on the remote page
    #[serde(default)]
    pub properties: BTreeMap<String, serde_json::Value>,
}

/// Converted content of a single page
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageContent {
    #[serde(default)]
    pub attributes: PageAttributes,
    /// Rendered body in the destination storage format
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub labels: Vec<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

impl PageContent {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    /// Content hash; a pure function of the rendered body
    pub fn hash(&self) -> String {
        sha256_hex(self.body.as_bytes())
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attributes.properties.insert(key.into(), value);
        self
    }

    pub fn with_parent_id(mut self, parent_id: impl Into<String>) -> Self {
        self.attributes.parent_id = Some(parent_id.into());
        self
    }

    pub fn with_parent_title(mut self, parent: impl Into<String>) -> Self {
        self.attributes.parent = Some(parent.into());
        self
    }
}

// ============================================================================
// Page
// ============================================================================

/// A node of the local document tree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub title: String,
    #[serde(flatten)]
    pub content: PageContent,
    #[serde(default)]
    pub children: Vec<Page>,
    /// Stands for a page that already exists remotely and is only located
    /// and re-parented, never edited
    #[serde(rename = "virtual", default)]
    pub is_virtual: bool,
    /// Source file the page was converted from
    #[serde(default)]
    pub source: PathBuf,
}

impl Page {
    pub fn new(title: impl Into<String>, content: PageContent) -> Self {
        Self {
            title: title.into(),
            content,
            children: Vec::new(),
            is_virtual: false,
            source: PathBuf::new(),
        }
    }

    /// Creates a virtual page: a placeholder for an existing remote page
    pub fn virtual_page(title: impl Into<String>, source: impl Into<PathBuf>) -> Self {
        Self {
            is_virtual: true,
            source: source.into(),
            ..Self::new(title, PageContent::default())
        }
    }

    pub fn with_children(mut self, children: Vec<Page>) -> Self {
        self.children = children;
        self
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source = source.into();
        self
    }

    /// Number of pages in this subtree, including this one
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Page::count).sum::<usize>()
    }
}
