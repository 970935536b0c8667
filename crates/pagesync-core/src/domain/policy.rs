//! Change detection and orphan cleanup policies

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::page::PageContent;
use super::remote::{Expansion, RemotePage};

/// Keys of the page properties the engine maintains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropertyKeys {
    /// Content hash of the last published body
    pub hash: String,
    /// Editor version marker
    pub editor: String,
    /// Tenant tag
    pub tenant: String,
}

impl Default for PropertyKeys {
    fn default() -> Self {
        Self {
            hash: "content-hash".to_string(),
            editor: "editor".to_string(),
            tenant: "pagesync-tenant".to_string(),
        }
    }
}

// ============================================================================
// ChangeDetector
// ============================================================================

/// Strategy deciding whether a page body must be re-uploaded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeDetector {
    /// Compare the local content hash with the remote hash property
    #[default]
    Hash,
    /// Compare the local body with the stored remote body
    Content,
}

impl ChangeDetector {
    /// Remote expansions the predicate needs
    pub fn expansions(&self, keys: &PropertyKeys) -> Vec<Expansion> {
        match self {
            ChangeDetector::Hash => vec![Expansion::Property(keys.hash.clone())],
            ChangeDetector::Content => vec![Expansion::Body],
        }
    }

    /// Whether the local content differs from the remote page
    pub fn is_changed(
        &self,
        remote: &RemotePage,
        content: &PageContent,
        keys: &PropertyKeys,
    ) -> bool {
        match self {
            ChangeDetector::Hash => {
                remote.property_str(&keys.hash) != Some(content.hash().as_str())
            }
            ChangeDetector::Content => remote.body.as_deref() != Some(content.body.as_str()),
        }
    }
}

impl fmt::Display for ChangeDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChangeDetector::Hash => "hash",
            ChangeDetector::Content => "content",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ChangeDetector {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hash" => Ok(ChangeDetector::Hash),
            "content" => Ok(ChangeDetector::Content),
            _ => Err(DomainError::InvalidChangeDetector(s.to_string())),
        }
    }
}

// ============================================================================
// Cleanup
// ============================================================================

/// Scope of orphan deletion after an upload
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cleanup {
    /// Never delete remote pages
    #[default]
    None,
    /// Delete orphans previously published by this tool for the same tenant
    Managed,
    /// Delete every orphan
    All,
}

impl Cleanup {
    /// Expansions needed on child lookups to evaluate [`Cleanup::should_delete`]
    pub fn expansions(&self, keys: &PropertyKeys) -> Vec<Expansion> {
        match self {
            Cleanup::Managed => vec![
                Expansion::Property(keys.hash.clone()),
                Expansion::Property(keys.tenant.clone()),
            ],
            Cleanup::None | Cleanup::All => Vec::new(),
        }
    }

    /// Whether an orphan must be deleted under this policy
    pub fn should_delete(
        &self,
        orphan: &RemotePage,
        keys: &PropertyKeys,
        tenant: Option<&str>,
    ) -> bool {
        match self {
            Cleanup::None => false,
            Cleanup::All => true,
            Cleanup::Managed => {
                orphan.property(&keys.hash).is_some() && orphan.property_str(&keys.tenant) == tenant
            }
        }
    }
}

impl fmt::Display for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Cleanup::None => "none",
            Cleanup::Managed => "managed",
            Cleanup::All => "all",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Cleanup {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(Cleanup::None),
            "managed" => Ok(Cleanup::Managed),
            "all" => Ok(Cleanup::All),
            _ => Err(DomainError::InvalidCleanup(s.to_string())),
        }
    }
}
