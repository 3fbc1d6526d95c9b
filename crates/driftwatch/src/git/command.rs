//! [`GitClient`] backed by the `git` executable.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command as TokioCommand;

use super::error::{classify_git_error, GitError};
use super::parse::{format_git_error, parse_ls_remote};
use super::reference::Reference;
use super::remote::{GitClient, RemoteClient, RemoteConfig};

/// Lists remote references with `git ls-remote --symref`.
#[derive(Debug, Clone)]
pub struct CommandGitClient {
    git_binary: PathBuf,
}

impl CommandGitClient {
    /// Uses the `git` found on `PATH`.
    pub fn new() -> Self {
        Self::with_binary("git")
    }

    pub fn with_binary(git_binary: impl Into<PathBuf>) -> Self {
        Self {
            git_binary: git_binary.into(),
        }
    }
}

impl Default for CommandGitClient {
    fn default() -> Self {
        Self::new()
    }
}

impl GitClient for CommandGitClient {
    fn new_remote_client(&self, config: &RemoteConfig) -> Box<dyn RemoteClient> {
        Box::new(CommandRemoteClient {
            git_binary: self.git_binary.clone(),
            config: config.clone(),
        })
    }
}

/// One remote reachable through the `git` executable.
#[derive(Debug)]
pub struct CommandRemoteClient {
    git_binary: PathBuf,
    config: RemoteConfig,
}

#[async_trait]
impl RemoteClient for CommandRemoteClient {
    async fn list(&self) -> Result<Vec<Reference>, GitError> {
        let url = self.config.url().ok_or_else(|| {
            GitError::Operation(format!("remote '{}' has no URL", self.config.name))
        })?;
        // Keep the URL from being parsed as an option.
        if url.starts_with('-') {
            return Err(GitError::Operation(format!("invalid remote URL '{}'", url)));
        }

        log::debug!("Listing references of {} ({})", self.config.name, url);

        let output = TokioCommand::new(&self.git_binary)
            .args(["ls-remote", "--symref", url])
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            return Err(classify_git_error(&format_git_error(&output)));
        }

        let references = parse_ls_remote(&String::from_utf8_lossy(&output.stdout))?;
        if references.is_empty() {
            return Err(GitError::NoReferences {
                url: url.to_string(),
            });
        }

        Ok(references)
    }
}
