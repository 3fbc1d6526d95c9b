//! Storage for managed resources and their condition lists.
//!
//! The drift watcher only needs `get` and `update`; updates use optimistic
//! concurrency on [`ManagedResource::resource_version`].

use async_trait::async_trait;

pub mod error;
pub mod memory;
pub mod migrations;
pub mod resource;
pub mod sqlite;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use resource::{ManagedResource, NamespacedName, ResourceStatus};
pub use sqlite::{default_database_path, SqliteStore};

/// Get/update access to managed resources.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Returns the current state of a resource, or [`StoreError::NotFound`].
    async fn get(&self, key: &NamespacedName) -> Result<ManagedResource, StoreError>;

    /// Replaces the stored resource if its version still matches.
    ///
    /// Returns the stored resource with its new version, or
    /// [`StoreError::Conflict`] when the resource changed since it was read.
    async fn update(&self, resource: ManagedResource) -> Result<ManagedResource, StoreError>;
}
