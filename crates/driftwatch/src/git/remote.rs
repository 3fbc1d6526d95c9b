//! Capabilities for listing the references advertised by a remote.

use async_trait::async_trait;

use super::error::GitError;
use super::reference::Reference;

/// Name and URLs of a remote, e.g. `origin` / `https://github.com/org/repo`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub name: String,
    pub urls: Vec<String>,
}

impl RemoteConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            urls: vec![url.into()],
        }
    }

    /// First configured URL, the one that is contacted.
    pub fn url(&self) -> Option<&str> {
        self.urls.first().map(String::as_str)
    }
}

/// Lists the references of one configured remote.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Fetches the current reference list. Results are never cached.
    async fn list(&self) -> Result<Vec<Reference>, GitError>;
}

/// Factory for [`RemoteClient`]s.
pub trait GitClient: Send + Sync {
    fn new_remote_client(&self, config: &RemoteConfig) -> Box<dyn RemoteClient>;
}
