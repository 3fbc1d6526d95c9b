//! Status conditions recorded on managed resources.
//!
//! Condition types are partitioned into mutually exclusive groups. Observing a
//! type activates it and deactivates every other active member of its group,
//! so at most one member of a group is `True` at any time. Entries are never
//! removed and keep their insertion position.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::{NamespacedName, ResourceStore, StoreError};

/// Known condition types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    /// Origin and target track the same commit.
    GitInSync,
    /// Origin and target track different commits.
    GitOutOfSync,
}

impl ConditionType {
    /// The mutually exclusive group this type belongs to.
    pub fn group(self) -> ConditionGroup {
        match self {
            ConditionType::GitInSync | ConditionType::GitOutOfSync => ConditionGroup::GitSync,
        }
    }

    /// Fixed human readable message recorded with the condition.
    pub fn message(self) -> &'static str {
        match self {
            ConditionType::GitInSync => "Git repositories are in sync",
            ConditionType::GitOutOfSync => "Git repositories are out of sync",
        }
    }

    /// Maps a drift check result to the type that should become active.
    pub fn from_drift(drifted: bool) -> Self {
        if drifted {
            ConditionType::GitOutOfSync
        } else {
            ConditionType::GitInSync
        }
    }
}

impl std::fmt::Display for ConditionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionType::GitInSync => write!(f, "GitInSync"),
            ConditionType::GitOutOfSync => write!(f, "GitOutOfSync"),
        }
    }
}

/// A set of condition types of which at most one may be `True`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConditionGroup {
    GitSync,
}

/// Condition status, serialized the way status APIs spell it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionStatus {
    True,
    False,
}

/// One entry of a resource's condition list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: ConditionType,
    pub status: ConditionStatus,
    pub last_update_time: DateTime<Utc>,
    /// Last instant this condition became `True`.
    pub last_transition_time: DateTime<Utc>,
    pub message: String,
}

impl Condition {
    /// A freshly observed, active condition.
    pub fn active(condition_type: ConditionType, now: DateTime<Utc>) -> Self {
        Self {
            condition_type,
            status: ConditionStatus::True,
            last_update_time: now,
            last_transition_time: now,
            message: condition_type.message().to_string(),
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == ConditionStatus::True
    }
}

/// Applies an observation of `observed` at `now` to a condition list.
pub fn apply_observation(
    conditions: &mut Vec<Condition>,
    observed: ConditionType,
    now: DateTime<Utc>,
) {
    let group = observed.group();

    for condition in conditions.iter_mut() {
        if condition.condition_type == observed {
            if !condition.is_true() {
                condition.status = ConditionStatus::True;
                condition.last_transition_time = now;
            }
            condition.last_update_time = now;
        } else if condition.condition_type.group() == group && condition.is_true() {
            // Displacement is not a transition of the displaced member.
            condition.status = ConditionStatus::False;
            condition.last_update_time = now;
        }
    }

    if !conditions.iter().any(|c| c.condition_type == observed) {
        conditions.push(Condition::active(observed, now));
    }
}

/// Fetches the resource, applies the observation and persists the result.
///
/// A concurrent modification surfaces as [`StoreError::Conflict`]; it is not
/// retried here.
pub async fn update_conditions(
    store: &dyn ResourceStore,
    key: &NamespacedName,
    observed: ConditionType,
    now: DateTime<Utc>,
) -> Result<(), StoreError> {
    let mut resource = store.get(key).await?;
    apply_observation(&mut resource.status.conditions, observed, now);
    store.update(resource).await?;
    Ok(())
}
