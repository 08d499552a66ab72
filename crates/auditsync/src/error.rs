use std::path::PathBuf;
use thiserror::Error;

use crate::remote::RemoteError;

/// Errors raised while setting up a run from configuration.
#[derive(Error, Debug)]
pub enum AuditSyncError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Unknown audit action '{action}' in {list}")]
    UnknownAction { list: String, action: String },
}

/// Conditions that abort a run before any mailbox is touched.
#[derive(Error, Debug)]
pub enum PreconditionError {
    #[error("Auditing is disabled at the organization level; enable it before reconciling mailboxes")]
    OrgAuditDisabled,

    #[error("Could not determine organization audit state: {0}")]
    OrgCheckFailed(#[source] RemoteError),

    #[error("Bulk mailbox fetch failed: {0}")]
    BulkFetchFailed(#[source] RemoteError),
}

pub type Result<T> = std::result::Result<T, AuditSyncError>;
