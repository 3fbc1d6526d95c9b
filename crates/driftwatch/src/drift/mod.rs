//! Drift detection and the scheduler that drives it.

pub mod detector;
pub mod schedule;
pub mod watcher;

pub use detector::{DriftError, RemoteSide, RepositoryPair};
pub use schedule::{PairKey, PairSchedule};
pub use watcher::{DriftWatcher, WatchHandle, WatcherState};
