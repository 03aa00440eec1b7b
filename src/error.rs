// Error taxonomy shared by the orchestrators.
// - `UsageError` is anything the user can fix on the command line or in
//   the environment. `main` maps it to exit status 2.
// - `StoreError` is what the remote store reports. Conflict and NotFound
//   are recovered by the upload/download orchestrators; the rest is fatal.
// - `AuthError` and `RunError` cover the two polling loops.

use thiserror::Error;

/// Bad or missing command line input or configuration.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct UsageError(pub String);

impl UsageError {
    pub fn new(msg: impl Into<String>) -> Self {
        UsageError(msg.into())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),

    /// Create on an existing path, or update with a stale sha.
    #[error("{0} already exists or was modified concurrently")]
    Conflict(String),

    #[error("{0} is a directory")]
    IsDirectory(String),

    #[error("GitHub API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("could not decode content of {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("timed out waiting for authorization")]
    Expired,

    #[error("authorization failed: {0}")]
    Denied(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("timed out after {0}s waiting for the workflow run")]
    Timeout(u64),

    #[error("workflow run {0} has no jobs")]
    NoJob(u64),
}
