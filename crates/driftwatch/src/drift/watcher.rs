//! Background scheduler checking watched pairs for drift.
//!
//! A single task sleeps until the earliest pair is due, checks it, records the
//! result as a condition on the pair's managed resource and reschedules it.
//! `add`/`remove`/`is_watching` may be called from any thread at any time; the
//! schedule lock is never held across a remote or store call.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tokio::sync::{oneshot, Notify};
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::detector::RepositoryPair;
use super::schedule::PairSchedule;
use crate::conditions::{update_conditions, ConditionType};
use crate::error::WatchError;
use crate::git::GitClient;
use crate::store::{NamespacedName, ResourceStore, StoreError};

/// What the background task is currently doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WatcherState {
    /// Nothing scheduled; parked until a pair is added or shutdown.
    Idle,
    /// Sleeping until the earliest pair is due.
    Waiting,
    /// Running a drift check.
    Checking,
    /// Shut down, or never started.
    Stopped,
}

struct Shared {
    schedule: Mutex<PairSchedule>,
    state: Mutex<WatcherState>,
    /// Signalled when the earliest deadline may have changed.
    changed: Notify,
    store: Arc<dyn ResourceStore>,
    git_client: Arc<dyn GitClient>,
    next_generation: AtomicU64,
    running: AtomicBool,
}

impl Shared {
    fn schedule(&self) -> MutexGuard<'_, PairSchedule> {
        // Every mutation leaves the schedule sorted before the guard drops.
        self.schedule.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: WatcherState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

/// Schedules drift checks for repository pairs.
///
/// Cloning is cheap and every clone controls the same schedule.
#[derive(Clone)]
pub struct DriftWatcher {
    shared: Arc<Shared>,
}

impl DriftWatcher {
    pub fn new(store: Arc<dyn ResourceStore>, git_client: Arc<dyn GitClient>) -> Self {
        Self {
            shared: Arc::new(Shared {
                schedule: Mutex::new(PairSchedule::new()),
                state: Mutex::new(WatcherState::Stopped),
                changed: Notify::new(),
                store,
                git_client,
                next_generation: AtomicU64::new(0),
                running: AtomicBool::new(false),
            }),
        }
    }

    /// Starts watching a pair; its first check is due one interval from now.
    ///
    /// An empty `target_revision` compares the commits `HEAD` points to.
    pub fn add(
        &self,
        name: &str,
        namespace: &str,
        origin: &str,
        target: &str,
        target_revision: &str,
        interval_secs: u64,
    ) -> Result<(), WatchError> {
        let key = NamespacedName::new(name, namespace);
        let interval = Some(interval_secs)
            .filter(|secs| *secs >= 1)
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(Duration::try_seconds);
        let pair = interval.and_then(|interval| {
            RepositoryPair::new(
                key.clone(),
                origin,
                target,
                target_revision,
                interval,
                Arc::clone(&self.shared.git_client),
            )
        });
        let Some(mut pair) = pair else {
            return Err(WatchError::InvalidInterval {
                key,
                secs: interval_secs,
            });
        };
        pair.generation = self.shared.next_generation.fetch_add(1, Ordering::Relaxed);

        let wake = {
            let mut schedule = self.shared.schedule();
            if schedule.contains(&key) {
                return Err(WatchError::DuplicateWatch { key });
            }
            schedule.insert(pair);
            schedule.is_first(&key)
        };
        if wake {
            self.shared.changed.notify_one();
        }

        log::info!(
            "Watching {} ({} -> {}) every {}s",
            key,
            origin,
            target,
            interval_secs
        );
        Ok(())
    }

    /// Stops watching a pair.
    pub fn remove(&self, name: &str, namespace: &str) -> Result<(), WatchError> {
        let key = NamespacedName::new(name, namespace);
        let was_first = {
            let mut schedule = self.shared.schedule();
            let was_first = schedule.is_first(&key);
            if schedule.remove(&key).is_none() {
                return Err(WatchError::NotWatched { key });
            }
            was_first
        };
        if was_first {
            self.shared.changed.notify_one();
        }

        log::info!("Stopped watching {}", key);
        Ok(())
    }

    pub fn is_watching(&self, name: &str, namespace: &str) -> bool {
        self.shared
            .schedule()
            .contains(&NamespacedName::new(name, namespace))
    }

    pub fn len(&self) -> usize {
        self.shared.schedule().len()
    }

    pub fn is_empty(&self) -> bool {
        self.shared.schedule().is_empty()
    }

    /// Snapshot of the schedule in processing order.
    pub fn pairs(&self) -> Vec<(NamespacedName, DateTime<Utc>)> {
        self.shared
            .schedule()
            .iter()
            .map(|p| (p.key.clone(), p.next_check))
            .collect()
    }

    pub fn state(&self) -> WatcherState {
        *self
            .shared
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Spawns the background task on the current tokio runtime.
    ///
    /// The loop runs until [`WatchHandle::shutdown`] is called or the handle
    /// is dropped. A check already in progress is completed first.
    pub fn watch(&self) -> Result<WatchHandle, WatchError> {
        if self.shared.running.swap(true, Ordering::AcqRel) {
            return Err(WatchError::AlreadyRunning);
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let shared = Arc::clone(&self.shared);
        let task = tokio::spawn(run(shared, shutdown_rx));

        Ok(WatchHandle {
            shutdown: Some(shutdown_tx),
            task,
        })
    }
}

/// Controls a running drift watcher loop.
///
/// Dropping the handle closes the shutdown signal and stops the loop.
#[derive(Debug)]
pub struct WatchHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl WatchHandle {
    /// Signals the loop to stop without waiting for it.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }

    /// Signals the loop to stop and waits until it has.
    pub async fn shutdown(mut self) {
        self.stop();
        if let Err(e) = self.task.await {
            log::error!("Drift watcher task failed: {}", e);
        }
    }
}

async fn run(shared: Arc<Shared>, mut shutdown: oneshot::Receiver<()>) {
    log::debug!("Drift watcher started");

    loop {
        let next_check = shared.schedule().next_check();

        match next_check {
            None => {
                shared.set_state(WatcherState::Idle);
                tokio::select! {
                    biased;
                    _ = &mut shutdown => break,
                    _ = shared.changed.notified() => continue,
                }
            }
            Some(deadline) => {
                shared.set_state(WatcherState::Waiting);
                let wait = (deadline - Utc::now())
                    .to_std()
                    .unwrap_or(std::time::Duration::ZERO);
                tokio::select! {
                    biased;
                    _ = &mut shutdown => break,
                    _ = shared.changed.notified() => continue,
                    _ = tokio::time::sleep(wait) => {}
                }
            }
        }

        let due = shared.schedule().due(Utc::now()).cloned();
        if let Some(pair) = due {
            shared.set_state(WatcherState::Checking);
            let span = tracing::info_span!("drift.check", pair = %pair.key);
            check(&shared, pair).instrument(span).await;
        }
    }

    shared.set_state(WatcherState::Stopped);
    shared.running.store(false, Ordering::Release);
    log::info!("Drift watcher stopped");
}

/// Checks one pair outside the schedule lock and reschedules it.
async fn check(shared: &Shared, pair: RepositoryPair) {
    let now = Utc::now();

    match pair.has_drifted().await {
        Ok(drifted) => {
            let observed = ConditionType::from_drift(drifted);
            if drifted {
                log::info!("{} is out of sync", pair.key);
            } else {
                log::debug!("{} is in sync", pair.key);
            }

            if let Err(e) = update_conditions(shared.store.as_ref(), &pair.key, observed, now).await
            {
                match e {
                    StoreError::Conflict { .. } => log::warn!(
                        "Conflict recording {} on {}, will retry on next check: {}",
                        observed,
                        pair.key,
                        e
                    ),
                    StoreError::NotFound { .. } => {
                        log::warn!("Managed resource {} not found: {}", pair.key, e)
                    }
                    _ => log::error!("Failed to record {} on {}: {}", observed, pair.key, e),
                }
            }
        }
        Err(e) => log::error!("Drift check failed for {}: {}", pair.key, e),
    }

    let next_check = pair.next_check_after(Utc::now());
    if !shared
        .schedule()
        .reschedule(&pair.key, pair.generation, next_check)
    {
        log::debug!("{} was removed during its check", pair.key);
    }
}
