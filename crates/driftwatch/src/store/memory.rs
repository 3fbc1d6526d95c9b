//! In-process resource store.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{ManagedResource, NamespacedName, ResourceStore, StoreError};

/// Resource store kept in memory. Cloning is cheap and shares the contents.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    resources: Arc<RwLock<HashMap<NamespacedName, ManagedResource>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty resource.
    pub async fn create(&self, key: &NamespacedName) -> Result<ManagedResource, StoreError> {
        let mut resources = self.resources.write().await;
        if resources.contains_key(key) {
            return Err(StoreError::AlreadyExists { key: key.clone() });
        }
        let resource = ManagedResource::new(key.clone());
        resources.insert(key.clone(), resource.clone());
        Ok(resource)
    }

    /// Returns the resource, creating it if missing.
    pub async fn ensure(&self, key: &NamespacedName) -> ManagedResource {
        self.resources
            .write()
            .await
            .entry(key.clone())
            .or_insert_with(|| ManagedResource::new(key.clone()))
            .clone()
    }

    pub async fn delete(&self, key: &NamespacedName) -> Result<(), StoreError> {
        self.resources
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })
    }
}

#[async_trait]
impl ResourceStore for MemoryStore {
    async fn get(&self, key: &NamespacedName) -> Result<ManagedResource, StoreError> {
        self.resources
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { key: key.clone() })
    }

    async fn update(&self, mut resource: ManagedResource) -> Result<ManagedResource, StoreError> {
        let mut resources = self.resources.write().await;
        let stored = resources
            .get_mut(&resource.key)
            .ok_or_else(|| StoreError::NotFound {
                key: resource.key.clone(),
            })?;

        if stored.resource_version != resource.resource_version {
            return Err(StoreError::Conflict {
                key: resource.key.clone(),
                expected: resource.resource_version,
                actual: stored.resource_version,
            });
        }

        resource.resource_version += 1;
        *stored = resource.clone();
        Ok(resource)
    }
}
