//! Managed resource model.

use serde::{Deserialize, Serialize};

use crate::conditions::Condition;

/// Identity of a managed resource and of the repository pair watched for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Observed state of a managed resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

/// A managed resource as seen through a [`ResourceStore`](super::ResourceStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedResource {
    #[serde(flatten)]
    pub key: NamespacedName,
    /// Incremented on every successful update; used for conflict detection.
    pub resource_version: u64,
    #[serde(default)]
    pub status: ResourceStatus,
}

impl ManagedResource {
    pub fn new(key: NamespacedName) -> Self {
        Self {
            key,
            resource_version: 1,
            status: ResourceStatus::default(),
        }
    }
}
