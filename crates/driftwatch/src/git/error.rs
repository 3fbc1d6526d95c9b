//! Transport errors raised while listing remote references.

use thiserror::Error;

/// Errors that can occur while talking to a git remote.
#[derive(Error, Debug)]
pub enum GitError {
    #[error("Git network error: {0}")]
    Network(String),

    #[error("Git authentication failed: {0}")]
    AuthFailed(String),

    #[error("Git operation failed: {0}")]
    Operation(String),

    #[error("Failed to spawn git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Unexpected ls-remote output: {0}")]
    InvalidOutput(String),

    #[error("No references found for {url}")]
    NoReferences { url: String },
}

impl GitError {
    /// Returns true if the error is likely transient and a later check may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GitError::Network(_))
    }
}

/// Classifies a git stderr string into a more specific error variant.
pub fn classify_git_error(stderr: &str) -> GitError {
    let lower = stderr.to_lowercase();

    if lower.contains("could not resolve host")
        || lower.contains("connection refused")
        || lower.contains("connection timed out")
        || lower.contains("network is unreachable")
        || lower.contains("unable to access")
        || lower.contains("failed to connect")
        || lower.contains("couldn't connect to server")
        || lower.contains("the remote end hung up unexpectedly")
    {
        return GitError::Network(stderr.trim().to_string());
    }

    if lower.contains("authentication failed")
        || lower.contains("permission denied")
        || lower.contains("could not read username")
        || lower.contains("invalid credentials")
    {
        return GitError::AuthFailed(stderr.trim().to_string());
    }

    GitError::Operation(stderr.trim().to_string())
}
