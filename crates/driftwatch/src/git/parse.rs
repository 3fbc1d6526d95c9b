//! Git output parsing helpers.

use std::collections::HashSet;
use std::process::Output;

use super::error::GitError;
use super::reference::{Reference, ReferenceName};

/// Formats a git error with both stdout and stderr for better debugging.
pub fn format_git_error(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();

    match (stderr.is_empty(), stdout.is_empty()) {
        (true, true) => format!(
            "Command failed with exit code {}",
            output.status.code().unwrap_or(-1)
        ),
        (true, false) => stdout,
        (false, true) => stderr,
        (false, false) => format!("{}\n{}", stderr, stdout),
    }
}

/// Parses the output of `git ls-remote --symref`.
///
/// Symbolic lines look like `ref: refs/heads/main\tHEAD`, direct lines like
/// `<hash>\trefs/heads/main`. Git prints the resolved hash of a symbolic
/// reference on a second line with the same name; that line is dropped so a
/// lookup by name yields the symbolic entry.
pub fn parse_ls_remote(output: &str) -> Result<Vec<Reference>, GitError> {
    let mut references = Vec::new();
    let mut symbolic = HashSet::new();

    for line in output.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }

        let (left, name) = line
            .split_once('\t')
            .ok_or_else(|| GitError::InvalidOutput(line.to_string()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(GitError::InvalidOutput(line.to_string()));
        }

        if let Some(target) = left.strip_prefix("ref:") {
            let target = target.trim();
            if target.is_empty() {
                return Err(GitError::InvalidOutput(line.to_string()));
            }
            symbolic.insert(name.to_string());
            references.push(Reference::symbolic(
                ReferenceName::new(name),
                ReferenceName::new(target),
            ));
        } else {
            let hash = left.trim();
            if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(GitError::InvalidOutput(line.to_string()));
            }
            if symbolic.contains(name) {
                continue;
            }
            references.push(Reference::hash(ReferenceName::new(name), hash));
        }
    }

    Ok(references)
}
