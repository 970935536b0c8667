//! pagesync Remote - REST client for the wiki content store
//!
//! Provides an async client for:
//! - Page, property, label and attachment operations over the REST API
//! - Cursor pagination following `_links.next`
//! - Proactive rate limiting and retry of throttled requests
//!
//! ## Modules
//!
//! - [`client`] - authenticated HTTP client with retry handling
//! - [`rate_limit`] - token bucket limiter and retry policy
//! - [`pagination`] - generic "follow next link" fetcher
//! - [`space_cache`] - per-client cache of space metadata
//! - [`provider`] - [`ContentClient`](pagesync_core::ports::ContentClient) implementation

pub mod client;
pub mod pagination;
pub mod provider;
pub mod rate_limit;
pub mod space_cache;

pub use client::{Credentials, RestClient};
pub use provider::RestContentClient;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors that can occur when talking to the remote REST API
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The API answered with an error status
    #[error("API returned {status}: {body}")]
    Api {
        /// HTTP status of the response
        status: StatusCode,
        /// Response body, as text
        body: String,
    },

    /// Throttling responses kept coming after every retry
    #[error("Retry limit exhausted after {attempts} attempts (last status {status})")]
    RetriesExhausted {
        /// Number of requests sent
        attempts: u32,
        /// Status of the last throttling response
        status: StatusCode,
    },

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A URL could not be built or resolved
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A local attachment could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RemoteError {
    /// HTTP status of the failure, when the server answered
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RemoteError::Api { status, .. } | RemoteError::RetriesExhausted { status, .. } => {
                Some(*status)
            }
            RemoteError::Network(err) => err.status(),
            _ => None,
        }
    }

    /// Whether the server reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}
