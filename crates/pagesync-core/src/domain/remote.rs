//! Remote-side views of pages
//!
//! [`RemotePage`] is the port-level DTO returned by the content client; its
//! optional fields are populated only for the [`Expansion`]s the caller
//! asked for. [`ServerPage`] is the engine's normalized view of a page
//! after it has been reconciled.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Optional parts of a remote page a lookup can ask for
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Expansion {
    /// Stored body
    Body,
    /// Current version number
    Version,
    Labels,
    Attachments,
    /// Ancestor chain, used to derive the parent id
    Ancestors,
    /// A single page property by key
    Property(String),
}

impl fmt::Display for Expansion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expansion::Body => write!(f, "body"),
            Expansion::Version => write!(f, "version"),
            Expansion::Labels => write!(f, "labels"),
            Expansion::Attachments => write!(f, "attachments"),
            Expansion::Ancestors => write!(f, "ancestors"),
            Expansion::Property(key) => write!(f, "property:{key}"),
        }
    }
}

/// A versioned key/value item attached to a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteProperty {
    pub key: String,
    pub value: serde_json::Value,
    /// Starts at 1, every write supplies `version + 1`
    pub version: u32,
}

impl RemoteProperty {
    /// Returns the value as a string, unwrapping JSON strings
    pub fn value_str(&self) -> Option<&str> {
        self.value.as_str()
    }
}

/// A file attached to a remote page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteAttachment {
    pub id: String,
    /// Attachment file name; matched against the local attachment name
    pub title: String,
    /// Free-text comment, carries the `HASH:<hex>` marker
    pub comment: Option<String>,
    pub version: u32,
}

/// A page as returned by the content client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RemotePage {
    pub id: String,
    pub title: String,
    /// Present when [`Expansion::Version`] was requested
    pub version: Option<u32>,
    /// Present when [`Expansion::Ancestors`] was requested
    pub parent_id: Option<String>,
    /// Present when [`Expansion::Body`] was requested
    pub body: Option<String>,
    /// Present when [`Expansion::Labels`] was requested
    pub labels: Option<Vec<String>>,
    /// Present when [`Expansion::Attachments`] was requested
    pub attachments: Option<Vec<RemoteAttachment>>,
    /// Requested properties that exist on the page
    #[serde(default)]
    pub properties: HashMap<String, RemoteProperty>,
}

impl RemotePage {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn property(&self, key: &str) -> Option<&RemoteProperty> {
        self.properties.get(key)
    }

    /// String value of a property, if the property exists and holds a string
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.property(key).and_then(RemoteProperty::value_str)
    }

    /// Version number, defaulting to 1 when it was not expanded
    pub fn version_or_default(&self) -> u32 {
        self.version.unwrap_or(1)
    }
}

/// Normalized view of a page after a reconcile step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerPage {
    pub id: String,
    pub title: String,
    pub parent_id: Option<String>,
    pub labels: Vec<String>,
    pub attachments: Vec<RemoteAttachment>,
}

impl ServerPage {
    pub fn new(id: impl Into<String>, title: impl Into<String>, parent_id: Option<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            parent_id,
            labels: Vec::new(),
            attachments: Vec::new(),
        }
    }
}
