//! Resource store error types.

use std::path::PathBuf;
use thiserror::Error;

use super::resource::NamespacedName;

/// Errors from managed resource storage.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Managed resource not found: {key}")]
    NotFound { key: NamespacedName },

    #[error("Managed resource already exists: {key}")]
    AlreadyExists { key: NamespacedName },

    /// The resource was modified since it was read.
    #[error("Conflict updating {key}: expected resource version {expected}, found {actual}")]
    Conflict {
        key: NamespacedName,
        expected: u64,
        actual: u64,
    },

    /// SQLite error from rusqlite.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to (de)serialize conditions: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error when creating directories or files.
    #[error("IO error for path '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A migration failed to apply.
    #[error("Migration failed at version {version}: {reason}")]
    Migration { version: u32, reason: String },

    /// The database lock was poisoned.
    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Blocking store task failed: {0}")]
    Task(String),
}

impl StoreError {
    /// Returns true for optimistic concurrency failures.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
