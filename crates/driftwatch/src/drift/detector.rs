//! Drift detection between an origin repository and its mirror.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::git::{
    resolve_tracked, CommitHash, GitClient, GitError, Reference, ReferenceName, RemoteConfig,
    ResolveError,
};
use crate::store::NamespacedName;

/// Which remote of a pair an operation concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteSide {
    Origin,
    Target,
}

impl RemoteSide {
    /// Remote name handed to the git client.
    pub fn remote_name(self) -> &'static str {
        match self {
            RemoteSide::Origin => "origin",
            RemoteSide::Target => "target",
        }
    }
}

impl std::fmt::Display for RemoteSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.remote_name())
    }
}

/// Errors raised while comparing the two remotes of a pair.
#[derive(Error, Debug)]
pub enum DriftError {
    #[error("failed to list references for {side} {url}: {source}")]
    Transport {
        side: RemoteSide,
        url: String,
        #[source]
        source: GitError,
    },

    #[error("unable to find HEAD for {side} {url}")]
    HeadNotFound { side: RemoteSide, url: String },

    #[error("unable to find {revision} for {side} {url}")]
    RevisionNotFound {
        side: RemoteSide,
        revision: ReferenceName,
        url: String,
    },
}

impl DriftError {
    /// The remote the failure occurred on.
    pub fn side(&self) -> RemoteSide {
        match self {
            DriftError::Transport { side, .. }
            | DriftError::HeadNotFound { side, .. }
            | DriftError::RevisionNotFound { side, .. } => *side,
        }
    }

    fn unresolved(side: RemoteSide, url: &str, err: ResolveError) -> Self {
        match err {
            ResolveError::HeadNotFound => DriftError::HeadNotFound {
                side,
                url: url.to_string(),
            },
            ResolveError::RevisionNotFound { revision } => DriftError::RevisionNotFound {
                side,
                revision,
                url: url.to_string(),
            },
        }
    }
}

/// One watched origin/target relationship.
#[derive(Clone)]
pub struct RepositoryPair {
    pub key: NamespacedName,
    pub origin: String,
    pub target: String,
    /// Branch compared on both sides; `None` follows each side's `HEAD`.
    pub target_revision: Option<String>,
    pub interval: Duration,
    pub next_check: DateTime<Utc>,
    /// Distinguishes re-added pairs that share an identity.
    pub(crate) generation: u64,
    git_client: Arc<dyn GitClient>,
}

impl std::fmt::Debug for RepositoryPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryPair")
            .field("key", &self.key)
            .field("origin", &self.origin)
            .field("target", &self.target)
            .field("target_revision", &self.target_revision)
            .field("interval", &self.interval)
            .field("next_check", &self.next_check)
            .finish()
    }
}

impl RepositoryPair {
    /// Creates a pair due one interval from now. An empty revision means `HEAD`.
    ///
    /// Returns `None` when that first deadline is not a representable time.
    pub(crate) fn new(
        key: NamespacedName,
        origin: impl Into<String>,
        target: impl Into<String>,
        target_revision: impl Into<String>,
        interval: Duration,
        git_client: Arc<dyn GitClient>,
    ) -> Option<Self> {
        let next_check = Utc::now().checked_add_signed(interval)?;
        let target_revision = target_revision.into();
        Some(Self {
            key,
            origin: origin.into(),
            target: target.into(),
            target_revision: Some(target_revision).filter(|r| !r.is_empty()),
            interval,
            next_check,
            generation: 0,
            git_client,
        })
    }

    /// Deadline one interval after `now`, saturating at the latest representable time.
    pub fn next_check_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now.checked_add_signed(self.interval)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Overrides the next check time.
    pub fn with_next_check(mut self, next_check: DateTime<Utc>) -> Self {
        self.next_check = next_check;
        self
    }

    /// Compares the commit tracked by origin with the one tracked by target.
    ///
    /// Returns `true` when the hashes differ. The branch names `HEAD` points to
    /// on each side are irrelevant. Target is not contacted if listing origin
    /// fails.
    pub async fn has_drifted(&self) -> Result<bool, DriftError> {
        let origin_refs = self.list(RemoteSide::Origin, &self.origin).await?;
        let target_refs = self.list(RemoteSide::Target, &self.target).await?;

        let origin_commit = self.resolve(RemoteSide::Origin, &self.origin, &origin_refs)?;
        let target_commit = self.resolve(RemoteSide::Target, &self.target, &target_refs)?;

        Ok(origin_commit != target_commit)
    }

    async fn list(&self, side: RemoteSide, url: &str) -> Result<Vec<Reference>, DriftError> {
        let remote = self
            .git_client
            .new_remote_client(&RemoteConfig::new(side.remote_name(), url));
        remote.list().await.map_err(|source| DriftError::Transport {
            side,
            url: url.to_string(),
            source,
        })
    }

    fn resolve(
        &self,
        side: RemoteSide,
        url: &str,
        references: &[Reference],
    ) -> Result<CommitHash, DriftError> {
        resolve_tracked(references, self.target_revision.as_deref())
            .map_err(|e| DriftError::unresolved(side, url, e))
    }
}
