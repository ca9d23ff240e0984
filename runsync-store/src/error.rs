//! Error types for store adapters

use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur when talking to a record or engine-run store
#[derive(Debug, Error)]
pub enum StoreError {
    /// Resource not found
    ///
    /// Benign in several reconciliation paths: a missing record means it was
    /// already deleted, a missing engine run during cleanup means there is
    /// nothing left to delete.
    #[error("resource not found: {0}")]
    NotFound(String),

    /// Optimistic-concurrency conflict on update
    ///
    /// The record changed since it was fetched; re-fetch and re-apply.
    #[error("conflict updating {0}: resource version is stale")]
    Conflict(String),

    /// A resource with the target name already exists
    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    /// API returned an error status code
    #[error("API error (status {status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Failed to parse response
    #[error("failed to parse response: {0}")]
    Parse(String),
}

impl StoreError {
    /// Create an API error from status code and message
    pub fn api_error(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Check if this error means the resource does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Check if this error is an optimistic-concurrency conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Check if this error means the resource already exists
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}
