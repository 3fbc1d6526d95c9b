use std::path::PathBuf;
use thiserror::Error;

use crate::drift::DriftError;
use crate::git::GitError;
use crate::store::{NamespacedName, StoreError};

#[derive(Error, Debug)]
pub enum DriftwatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Drift check error: {0}")]
    Drift(#[from] DriftError),

    #[error("Git error: {0}")]
    Git(#[from] GitError),

    #[error("Logging setup failed: {0}")]
    Logging(String),
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

    #[error("Config schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Errors returned synchronously by the watcher's public operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WatchError {
    #[error("Already watching {key}")]
    DuplicateWatch { key: NamespacedName },

    #[error("Not watching {key}")]
    NotWatched { key: NamespacedName },

    #[error("Invalid poll interval for {key}: {secs}s")]
    InvalidInterval { key: NamespacedName, secs: u64 },

    #[error("Drift watcher is already running")]
    AlreadyRunning,
}

pub type Result<T> = std::result::Result<T, DriftwatchError>;
