//! Shared helpers for driftwatch integration tests.
//!
//! This module provides:
//! - `ScriptedGitClient`, a fake git client answering listings per URL from a script
//! - Reference fixtures and polling helpers

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use driftwatch::git::HEAD;
use driftwatch::{GitClient, GitError, Reference, RemoteClient, RemoteConfig};

pub const MAIN: &str = "refs/heads/main";
pub const HASH_A: &str = "667679cce3942d3dec754b29d0f97500bba57978";
pub const HASH_B: &str = "6ffb7b8f89075d66fba48c4d0000f8fb52720cf1";

/// `HEAD -> main` with main at `hash`.
pub fn head_at(hash: &str) -> Vec<Reference> {
    vec![Reference::symbolic(HEAD, MAIN), Reference::hash(MAIN, hash)]
}

pub type Response = Result<Vec<Reference>, String>;

#[derive(Default)]
struct Inner {
    scripts: Mutex<HashMap<String, VecDeque<Response>>>,
    calls: Mutex<Vec<RemoteConfig>>,
    delay: Option<Duration>,
}

/// Answers listings from per-URL scripts.
///
/// Each listing consumes the next scripted response; the last one repeats.
/// URLs without a script report `HEAD` at [`HASH_A`].
#[derive(Clone, Default)]
pub struct ScriptedGitClient {
    inner: Arc<Inner>,
}

impl ScriptedGitClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays every listing, keeping checks in progress for a while.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                delay: Some(delay),
                ..Inner::default()
            }),
        }
    }

    pub fn script(&self, url: &str, responses: Vec<Response>) {
        self.inner
            .scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), responses.into());
    }

    /// Every listing made so far, in order.
    pub fn calls(&self) -> Vec<RemoteConfig> {
        self.inner.calls.lock().unwrap().clone()
    }

    /// URLs listed under the given remote name, in order.
    pub fn listed_urls(&self, remote: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.name == remote)
            .filter_map(|c| c.url().map(str::to_string))
            .collect()
    }
}

impl GitClient for ScriptedGitClient {
    fn new_remote_client(&self, config: &RemoteConfig) -> Box<dyn RemoteClient> {
        Box::new(ScriptedRemote {
            config: config.clone(),
            inner: Arc::clone(&self.inner),
        })
    }
}

struct ScriptedRemote {
    config: RemoteConfig,
    inner: Arc<Inner>,
}

#[async_trait]
impl RemoteClient for ScriptedRemote {
    async fn list(&self) -> Result<Vec<Reference>, GitError> {
        self.inner.calls.lock().unwrap().push(self.config.clone());
        if let Some(delay) = self.inner.delay {
            tokio::time::sleep(delay).await;
        }

        let url = self.config.url().unwrap_or_default().to_string();
        let response = {
            let mut scripts = self.inner.scripts.lock().unwrap();
            match scripts.get_mut(&url) {
                Some(queue) if queue.len() > 1 => queue.pop_front(),
                Some(queue) => queue.front().cloned(),
                None => None,
            }
        };

        match response {
            Some(response) => response.map_err(GitError::Operation),
            None => Ok(head_at(HASH_A)),
        }
    }
}

/// Polls `f` until it holds or `timeout` elapses.
pub async fn eventually<F, Fut>(timeout: Duration, mut f: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if f().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
