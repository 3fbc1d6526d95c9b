//! Read-only access to git remotes: reference model, resolver and transport.

pub mod command;
pub mod error;
pub mod parse;
pub mod reference;
pub mod remote;

pub use command::CommandGitClient;
pub use error::{classify_git_error, GitError};
pub use reference::{
    lookup, resolve_tracked, CommitHash, Reference, ReferenceName, ReferenceTarget, ResolveError,
    BRANCH_PREFIX, HEAD,
};
pub use remote::{GitClient, RemoteClient, RemoteConfig};
