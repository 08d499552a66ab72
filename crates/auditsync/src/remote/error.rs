//! Remote collaborator error types.

use thiserror::Error;

/// Errors returned by an [`AuditService`](super::AuditService).
#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{command} returned HTTP {status}: {body}")]
    Status {
        command: String,
        status: u16,
        body: String,
    },

    #[error("Failed to decode {command} response: {message}")]
    Decode { command: String, message: String },

    #[error("Mailbox not found: {0}")]
    NotFound(String),

    #[error("Update rejected for '{identity}': {message}")]
    Rejected { identity: String, message: String },

    #[error("Invalid remote configuration: {0}")]
    Config(String),

    #[error("Failed to read tenant snapshot: {0}")]
    Snapshot(String),
}

impl RemoteError {
    /// Returns true if the service refused the caller's credentials.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, RemoteError::Status { status: 401 | 403, .. })
    }

    /// Returns true if the service asked the caller to slow down.
    pub fn is_throttled(&self) -> bool {
        matches!(self, RemoteError::Status { status: 429, .. })
    }
}

/// Result type for remote operations.
pub type Result<T> = std::result::Result<T, RemoteError>;
