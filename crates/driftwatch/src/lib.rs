pub mod conditions;
pub mod config;
pub mod drift;
pub mod error;
pub mod git;
pub mod logging;
pub mod store;

pub use conditions::{
    apply_observation, update_conditions, Condition, ConditionGroup, ConditionStatus,
    ConditionType,
};
pub use config::{load_config, LoggingConfig, PairConfig, WatcherConfig};
pub use drift::{
    DriftError, DriftWatcher, PairKey, RemoteSide, RepositoryPair, WatchHandle, WatcherState,
};
pub use error::{ConfigError, DriftwatchError, Result, WatchError};
pub use git::{CommandGitClient, GitClient, GitError, Reference, RemoteClient, RemoteConfig};
pub use logging::init_logging;
pub use store::{
    ManagedResource, MemoryStore, NamespacedName, ResourceStore, SqliteStore, StoreError,
};
