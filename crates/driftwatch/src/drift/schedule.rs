//! Watched pairs ordered by their next check time.

use chrono::{DateTime, Utc};

use super::detector::RepositoryPair;
use crate::store::NamespacedName;

/// Identity of a watched pair.
pub type PairKey = NamespacedName;

/// Repository pairs sorted ascending by `next_check`.
///
/// Pairs with equal deadlines keep their insertion order. Identities are
/// unique; callers check [`contains`](Self::contains) before inserting.
#[derive(Debug, Default)]
pub struct PairSchedule {
    pairs: Vec<RepositoryPair>,
}

impl PairSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RepositoryPair> {
        self.pairs.iter()
    }

    pub fn contains(&self, key: &NamespacedName) -> bool {
        self.position(key).is_some()
    }

    /// Inserts a pair after every pair due no later than it.
    pub fn insert(&mut self, pair: RepositoryPair) {
        let index = self
            .pairs
            .partition_point(|p| p.next_check <= pair.next_check);
        self.pairs.insert(index, pair);
    }

    /// Removes a pair by identity, returning it if present.
    pub fn remove(&mut self, key: &NamespacedName) -> Option<RepositoryPair> {
        let index = self.position(key)?;
        Some(self.pairs.remove(index))
    }

    /// The earliest due pair.
    pub fn first(&self) -> Option<&RepositoryPair> {
        self.pairs.first()
    }

    /// Deadline of the earliest due pair.
    pub fn next_check(&self) -> Option<DateTime<Utc>> {
        self.first().map(|p| p.next_check)
    }

    pub fn is_first(&self, key: &NamespacedName) -> bool {
        self.first().is_some_and(|p| &p.key == key)
    }

    /// The earliest pair if it is due at `now`.
    pub fn due(&self, now: DateTime<Utc>) -> Option<&RepositoryPair> {
        self.first().filter(|p| p.next_check <= now)
    }

    /// Moves the pair to a new deadline if the same entry is still scheduled.
    ///
    /// Returns false when the pair was removed, or removed and added again,
    /// since `generation` was observed.
    pub fn reschedule(
        &mut self,
        key: &NamespacedName,
        generation: u64,
        next_check: DateTime<Utc>,
    ) -> bool {
        let Some(index) = self.position(key) else {
            return false;
        };
        if self.pairs[index].generation != generation {
            return false;
        }
        let mut pair = self.pairs.remove(index);
        pair.next_check = next_check;
        self.insert(pair);
        true
    }

    #[cfg(test)]
    pub(crate) fn is_sorted(&self) -> bool {
        self.pairs
            .windows(2)
            .all(|w| w[0].next_check <= w[1].next_check)
    }

    fn position(&self, key: &NamespacedName) -> Option<usize> {
        self.pairs.iter().position(|p| &p.key == key)
    }
}
