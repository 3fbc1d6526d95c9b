//! Remote reference types and the tracked-commit resolver.
//!
//! A remote advertises a flat list of references. Symbolic references (such as
//! `HEAD`) name another reference; direct references carry a commit hash.
//! Nothing here follows a symbolic target implicitly: [`lookup`] returns the raw
//! entry and [`resolve_tracked`] performs exactly one hop from `HEAD`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the symbolic reference pointing to the default branch.
pub const HEAD: &str = "HEAD";

/// Prefix of local branch references.
pub const BRANCH_PREFIX: &str = "refs/heads/";

/// Fully-qualified reference name, e.g. `HEAD` or `refs/heads/main`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceName(String);

impl ReferenceName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The `HEAD` reference name.
    pub fn head() -> Self {
        Self(HEAD.to_string())
    }

    /// Builds a branch reference name (`refs/heads/<branch>`).
    ///
    /// A name that is already qualified with `refs/heads/` is kept as is.
    pub fn branch(branch: &str) -> Self {
        if branch.starts_with(BRANCH_PREFIX) {
            Self(branch.to_string())
        } else {
            Self(format!("{}{}", BRANCH_PREFIX, branch))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReferenceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReferenceName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Commit object id as advertised by the remote (hex encoded).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CommitHash(String);

impl CommitHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CommitHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a reference points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReferenceTarget {
    /// Points to another reference by name.
    Symbolic(ReferenceName),
    /// Points directly to a commit.
    Hash(CommitHash),
}

/// A single advertised reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    name: ReferenceName,
    target: ReferenceTarget,
}

impl Reference {
    /// Creates a symbolic reference, e.g. `HEAD -> refs/heads/main`.
    pub fn symbolic(name: impl Into<ReferenceName>, target: impl Into<ReferenceName>) -> Self {
        Self {
            name: name.into(),
            target: ReferenceTarget::Symbolic(target.into()),
        }
    }

    /// Creates a direct reference to a commit.
    pub fn hash(name: impl Into<ReferenceName>, hash: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: ReferenceTarget::Hash(CommitHash::new(hash)),
        }
    }

    pub fn name(&self) -> &ReferenceName {
        &self.name
    }

    pub fn target(&self) -> &ReferenceTarget {
        &self.target
    }

    /// Returns the referenced name for symbolic references.
    pub fn symbolic_target(&self) -> Option<&ReferenceName> {
        match &self.target {
            ReferenceTarget::Symbolic(name) => Some(name),
            ReferenceTarget::Hash(_) => None,
        }
    }

    /// Returns the commit hash for direct references.
    pub fn commit(&self) -> Option<&CommitHash> {
        match &self.target {
            ReferenceTarget::Hash(hash) => Some(hash),
            ReferenceTarget::Symbolic(_) => None,
        }
    }
}

impl From<String> for ReferenceName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Failure to resolve the tracked commit from a reference list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// `HEAD` is missing, or the branch it points to is missing.
    #[error("unable to find HEAD")]
    HeadNotFound,

    /// The explicitly requested revision is not advertised.
    #[error("unable to find {revision}")]
    RevisionNotFound { revision: ReferenceName },
}

/// Finds a reference by exact name. Symbolic targets are not followed.
pub fn lookup<'a>(references: &'a [Reference], name: &ReferenceName) -> Option<&'a Reference> {
    references.iter().find(|r| &r.name == name)
}

/// Resolves the commit a pair tracks on one remote.
///
/// With no explicit revision the commit of the branch `HEAD` points to is
/// returned. A `HEAD` advertised as a direct reference (detached) resolves to
/// its own hash. With an explicit revision, `refs/heads/<revision>` is looked up
/// directly and `HEAD` is ignored.
pub fn resolve_tracked(
    references: &[Reference],
    explicit_revision: Option<&str>,
) -> Result<CommitHash, ResolveError> {
    match explicit_revision.filter(|r| !r.is_empty()) {
        None => {
            let head =
                lookup(references, &ReferenceName::head()).ok_or(ResolveError::HeadNotFound)?;
            match head.target() {
                ReferenceTarget::Hash(hash) => Ok(hash.clone()),
                ReferenceTarget::Symbolic(branch) => lookup(references, branch)
                    .and_then(Reference::commit)
                    .cloned()
                    .ok_or(ResolveError::HeadNotFound),
            }
        }
        Some(revision) => {
            let name = ReferenceName::branch(revision);
            match lookup(references, &name).and_then(Reference::commit) {
                Some(hash) => Ok(hash.clone()),
                None => Err(ResolveError::RevisionNotFound { revision: name }),
            }
        }
    }
}
