//! End-to-end tests for the drift watcher loop.
//!
//! Tests run the real background task against a scripted git client and check
//! what ends up recorded on the managed resources.

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::{eventually, head_at, ScriptedGitClient, HASH_A, HASH_B};
use driftwatch::{
    ConditionStatus, ConditionType, DriftWatcher, ManagedResource, MemoryStore, NamespacedName,
    ResourceStore, SqliteStore, StoreError, WatchError, WatcherState,
};

const TIMEOUT: Duration = Duration::from_secs(10);

fn origin(name: &str) -> String {
    format!("https://origin.example/{}.git", name)
}

fn target(name: &str) -> String {
    format!("https://mirror.example/{}.git", name)
}

fn watcher_with(git: &ScriptedGitClient) -> (DriftWatcher, MemoryStore) {
    let store = MemoryStore::new();
    let watcher = DriftWatcher::new(Arc::new(store.clone()), Arc::new(git.clone()));
    (watcher, store)
}

fn add(watcher: &DriftWatcher, name: &str, interval_secs: u64) -> Result<(), WatchError> {
    watcher.add(
        name,
        "default",
        &origin(name),
        &target(name),
        "",
        interval_secs,
    )
}

async fn condition_count(store: &MemoryStore, key: &NamespacedName) -> usize {
    store
        .get(key)
        .await
        .map(|r| r.status.conditions.len())
        .unwrap_or(0)
}

fn first_listed(git: &ScriptedGitClient, name: &str) -> Option<usize> {
    let url = origin(name);
    git.listed_urls("origin").iter().position(|u| *u == url)
}

#[tokio::test]
async fn test_in_sync_then_out_of_sync() {
    let git = ScriptedGitClient::new();
    git.script(&target("foo"), vec![Ok(head_at(HASH_A)), Ok(head_at(HASH_B))]);
    let (watcher, store) = watcher_with(&git);
    let key = NamespacedName::new("foo", "default");
    store.create(&key).await.unwrap();

    let before_first = Utc::now();
    add(&watcher, "foo", 1).unwrap();
    let handle = watcher.watch().unwrap();

    let s = &store;
    let k = &key;
    assert!(eventually(TIMEOUT, || async move { condition_count(s, k).await == 1 }).await);
    let first = store.get(&key).await.unwrap().status.conditions[0].clone();
    assert_eq!(first.condition_type, ConditionType::GitInSync);
    assert_eq!(first.status, ConditionStatus::True);
    assert_eq!(first.message, "Git repositories are in sync");
    assert!(first.last_transition_time >= before_first);
    let t1 = first.last_transition_time;

    assert!(eventually(TIMEOUT, || async move { condition_count(s, k).await == 2 }).await);
    handle.shutdown().await;

    let conditions = store.get(&key).await.unwrap().status.conditions;
    let in_sync = conditions
        .iter()
        .find(|c| c.condition_type == ConditionType::GitInSync)
        .unwrap();
    let out_of_sync = conditions
        .iter()
        .find(|c| c.condition_type == ConditionType::GitOutOfSync)
        .unwrap();

    assert_eq!(in_sync.status, ConditionStatus::False);
    assert_eq!(in_sync.last_transition_time, t1);
    assert!(in_sync.last_update_time > t1);

    assert_eq!(out_of_sync.status, ConditionStatus::True);
    assert_eq!(out_of_sync.message, "Git repositories are out of sync");
    assert_eq!(out_of_sync.last_transition_time, out_of_sync.last_update_time);
    assert_eq!(out_of_sync.last_update_time, in_sync.last_update_time);
}

#[tokio::test]
async fn test_processes_shortest_interval_first() {
    let git = ScriptedGitClient::new();
    let (watcher, _) = watcher_with(&git);

    add(&watcher, "slow", 3).unwrap();
    add(&watcher, "medium", 2).unwrap();
    add(&watcher, "fast", 1).unwrap();

    let order: Vec<String> = watcher.pairs().into_iter().map(|(k, _)| k.name).collect();
    assert_eq!(order, vec!["fast", "medium", "slow"]);

    let handle = watcher.watch().unwrap();
    let git_ref = &git;
    assert!(
        eventually(TIMEOUT, || async move { first_listed(git_ref, "slow").is_some() }).await
    );
    handle.shutdown().await;

    let fast = first_listed(&git, "fast").unwrap();
    let medium = first_listed(&git, "medium").unwrap();
    let slow = first_listed(&git, "slow").unwrap();
    assert!(fast < medium && medium < slow, "order {} {} {}", fast, medium, slow);
}

#[tokio::test]
async fn test_readded_pair_takes_new_interval() {
    let git = ScriptedGitClient::new();
    let (watcher, _) = watcher_with(&git);

    add(&watcher, "foo", 1).unwrap();
    add(&watcher, "bar", 2).unwrap();
    watcher.remove("foo", "default").unwrap();
    add(&watcher, "foo", 3).unwrap();

    let order: Vec<String> = watcher.pairs().into_iter().map(|(k, _)| k.name).collect();
    assert_eq!(order, vec!["bar", "foo"]);

    let handle = watcher.watch().unwrap();
    let git_ref = &git;
    assert!(eventually(TIMEOUT, || async move { first_listed(git_ref, "foo").is_some() }).await);
    handle.shutdown().await;

    assert!(first_listed(&git, "bar").unwrap() < first_listed(&git, "foo").unwrap());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_add_and_remove_converge() {
    let git = ScriptedGitClient::new();
    let (watcher, _) = watcher_with(&git);
    let handle = watcher.watch().unwrap();

    on_threads(&watcher, |w, i| {
        let name = format!("pair-{}", i);
        add(w, &name, 1 + i % 5).unwrap();
        assert!(w.is_watching(&name, "default"));
        w.remove(&name, "default").unwrap();
    })
    .await;

    assert!(watcher.is_empty());
    let w = &watcher;
    assert!(eventually(TIMEOUT, || async move { w.state() == WatcherState::Idle }).await);
    handle.shutdown().await;
}

/// Runs `op(watcher, i)` for i in 0..100, each on its own OS thread.
async fn on_threads(watcher: &DriftWatcher, op: fn(&DriftWatcher, u64)) {
    let w = watcher.clone();
    tokio::task::spawn_blocking(move || {
        let threads: Vec<_> = (0..100)
            .map(|i| {
                let w = w.clone();
                thread::spawn(move || op(&w, i))
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
    })
    .await
    .unwrap();
}

fn add_numbered(watcher: &DriftWatcher, i: u64) {
    add(watcher, &format!("pair-{}", i), 60 + i % 7).unwrap();
}

fn remove_numbered(watcher: &DriftWatcher, i: u64) {
    watcher.remove(&format!("pair-{}", i), "default").unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_adds_keep_schedule_sorted() {
    let git = ScriptedGitClient::new();
    let (watcher, _) = watcher_with(&git);
    let handle = watcher.watch().unwrap();

    on_threads(&watcher, add_numbered).await;
    assert_eq!(watcher.len(), 100);
    let deadlines: Vec<_> = watcher.pairs().into_iter().map(|(_, at)| at).collect();
    assert!(deadlines.windows(2).all(|w| w[0] <= w[1]));
    assert!(watcher.is_watching("pair-42", "default"));

    on_threads(&watcher, remove_numbered).await;
    assert!(watcher.is_empty());
    handle.shutdown().await;
}

/// Reports a conflict for the first `conflicts` updates, then delegates.
struct ConflictingStore {
    inner: MemoryStore,
    conflicts: usize,
    updates: AtomicUsize,
}

#[async_trait]
impl ResourceStore for ConflictingStore {
    async fn get(&self, key: &NamespacedName) -> Result<ManagedResource, StoreError> {
        self.inner.get(key).await
    }

    async fn update(&self, resource: ManagedResource) -> Result<ManagedResource, StoreError> {
        let attempt = self.updates.fetch_add(1, Ordering::SeqCst);
        if attempt < self.conflicts {
            return Err(StoreError::Conflict {
                key: resource.key.clone(),
                expected: resource.resource_version,
                actual: resource.resource_version + 1,
            });
        }
        self.inner.update(resource).await
    }
}

#[tokio::test]
async fn test_conflict_is_absorbed_and_next_check_records() {
    let git = ScriptedGitClient::new();
    let memory = MemoryStore::new();
    let key = NamespacedName::new("foo", "default");
    memory.create(&key).await.unwrap();

    let store = Arc::new(ConflictingStore {
        inner: memory.clone(),
        conflicts: 1,
        updates: AtomicUsize::new(0),
    });
    let watcher = DriftWatcher::new(store.clone(), Arc::new(git.clone()));
    add(&watcher, "foo", 1).unwrap();
    let handle = watcher.watch().unwrap();

    let s = &memory;
    let k = &key;
    assert!(eventually(TIMEOUT, || async move { condition_count(s, k).await == 1 }).await);
    handle.shutdown().await;

    // The first check hit the conflict and wrote nothing.
    assert!(store.updates.load(Ordering::SeqCst) >= 2);
    assert!(git.listed_urls("origin").len() >= 2);
    assert!(watcher.is_watching("foo", "default"));

    let resource = memory.get(&key).await.unwrap();
    assert_eq!(resource.status.conditions[0].condition_type, ConditionType::GitInSync);
    assert!(resource.status.conditions[0].is_true());
}

#[tokio::test]
async fn test_failed_check_is_rescheduled() {
    let git = ScriptedGitClient::new();
    git.script(&origin("foo"), vec![Err("connection refused".to_string())]);
    let (watcher, store) = watcher_with(&git);
    let key = NamespacedName::new("foo", "default");
    store.create(&key).await.unwrap();

    add(&watcher, "foo", 1).unwrap();
    let handle = watcher.watch().unwrap();

    let git_ref = &git;
    assert!(
        eventually(TIMEOUT, || async move { git_ref.listed_urls("origin").len() >= 2 }).await
    );
    handle.shutdown().await;

    // Origin failed every time so target was never contacted.
    assert!(git.listed_urls("target").is_empty());
    assert!(watcher.is_watching("foo", "default"));
    assert_eq!(condition_count(&store, &key).await, 0);
}

#[tokio::test]
async fn test_pair_removed_during_check_is_not_rescheduled() {
    let git = ScriptedGitClient::with_delay(Duration::from_millis(500));
    let (watcher, store) = watcher_with(&git);
    let key = NamespacedName::new("foo", "default");
    store.create(&key).await.unwrap();

    add(&watcher, "foo", 1).unwrap();
    let handle = watcher.watch().unwrap();

    let git_ref = &git;
    assert!(eventually(TIMEOUT, || async move { !git_ref.calls().is_empty() }).await);
    // Still scheduled while its check runs.
    assert!(watcher.is_watching("foo", "default"));
    watcher.remove("foo", "default").unwrap();

    let s = &store;
    let k = &key;
    assert!(eventually(TIMEOUT, || async move { condition_count(s, k).await == 1 }).await);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!watcher.is_watching("foo", "default"));
    assert!(watcher.pairs().is_empty());
    handle.shutdown().await;
}

#[tokio::test]
async fn test_pair_readded_during_check_keeps_new_schedule() {
    let git = ScriptedGitClient::with_delay(Duration::from_millis(500));
    let (watcher, store) = watcher_with(&git);
    let key = NamespacedName::new("foo", "default");
    store.create(&key).await.unwrap();

    add(&watcher, "foo", 1).unwrap();
    let handle = watcher.watch().unwrap();

    let git_ref = &git;
    assert!(eventually(TIMEOUT, || async move { !git_ref.calls().is_empty() }).await);
    watcher.remove("foo", "default").unwrap();
    add(&watcher, "foo", 3600).unwrap();
    assert_eq!(
        add(&watcher, "foo", 1),
        Err(WatchError::DuplicateWatch { key: key.clone() })
    );

    let s = &store;
    let k = &key;
    assert!(eventually(TIMEOUT, || async move { condition_count(s, k).await == 1 }).await);
    tokio::time::sleep(Duration::from_millis(200)).await;

    let pairs = watcher.pairs();
    assert_eq!(pairs.len(), 1);
    assert!(pairs[0].1 > Utc::now() + chrono::Duration::seconds(3000));
    handle.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_checks() {
    let git = ScriptedGitClient::new();
    let (watcher, _) = watcher_with(&git);
    add(&watcher, "foo", 1).unwrap();
    let handle = watcher.watch().unwrap();

    let git_ref = &git;
    assert!(eventually(TIMEOUT, || async move { !git_ref.calls().is_empty() }).await);
    handle.shutdown().await;
    assert_eq!(watcher.state(), WatcherState::Stopped);

    let seen = git.calls().len();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(git.calls().len(), seen);
}

#[tokio::test]
async fn test_conditions_persist_in_sqlite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("driftwatch.db");
    let key = NamespacedName::new("foo", "default");

    {
        let store = SqliteStore::open(&path).unwrap();
        store.ensure(&key).await.unwrap();

        let git = ScriptedGitClient::new();
        git.script(&target("foo"), vec![Ok(head_at(HASH_B))]);
        let watcher = DriftWatcher::new(Arc::new(store.clone()), Arc::new(git));
        add(&watcher, "foo", 1).unwrap();
        let handle = watcher.watch().unwrap();

        let s = &store;
        let k = &key;
        assert!(
            eventually(TIMEOUT, || async move {
                s.get(k)
                    .await
                    .map(|r| !r.status.conditions.is_empty())
                    .unwrap_or(false)
            })
            .await
        );
        handle.shutdown().await;
    }

    let reopened = SqliteStore::open(&path).unwrap();
    let resource = reopened.get(&key).await.unwrap();
    assert!(resource.resource_version >= 2);
    let condition = &resource.status.conditions[0];
    assert_eq!(condition.condition_type, ConditionType::GitOutOfSync);
    assert!(condition.is_true());
}
