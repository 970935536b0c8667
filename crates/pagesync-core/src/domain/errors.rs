//! Domain error types

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Unknown change detector name
    #[error("Invalid change detector: {0} (expected `hash` or `content`)")]
    InvalidChangeDetector(String),

    /// Unknown cleanup policy name
    #[error("Invalid cleanup policy: {0} (expected `none`, `managed` or `all`)")]
    InvalidCleanup(String),

    /// A page in the local tree is malformed
    #[error("Invalid page: {0}")]
    InvalidPage(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}
