/// Error taxonomy for the resource.
/// Every variant is fatal: the command aborts and the process exits non-zero.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ResourceError>;

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("file data source '{}' does not exist and has no default", path.display())]
    MissingFile { path: PathBuf },

    #[error("no value for placeholder '{{{0}}}'")]
    MissingSubstitutionKey(String),

    #[error("malformed template {template:?}: {reason}")]
    MalformedTemplate { template: String, reason: &'static str },

    #[error("unexpected response status {0}")]
    UnexpectedStatus(u16),

    #[error("response has no '{0}' header")]
    MissingVersionHeader(String),

    #[error("invalid file data spec for '{key}': {reason}")]
    InvalidFileData { key: String, reason: &'static str },

    #[error("invalid payload: {0}")]
    InvalidPayload(#[source] serde_json::Error),

    #[error("invalid params: {0}")]
    InvalidParams(#[source] serde_json::Error),

    #[error("invalid value for '{option}': {reason}")]
    InvalidOption { option: &'static str, reason: String },

    #[error("response body is not a JSON object: {0}")]
    InvalidResponseBody(String),

    #[error("unknown command '{0}' (expected check, in or out)")]
    UnknownCommand(String),

    #[error("cannot {action} '{}': {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
}

impl ResourceError {
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { action, path: path.into(), source }
    }

    pub fn option(option: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidOption { option, reason: reason.into() }
    }
}
