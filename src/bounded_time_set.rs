use std::time::SystemTime;

use crate::{
    MaxCount, ScoredMember, SortedSetStore, StoreKey, TimebucketError, common::unix_seconds,
};

/// Time-ordered set of unique members that keeps only the newest `max_count`.
///
/// Members are scored by a timestamp in Unix seconds. Adding a new member past
/// the bound evicts the oldest entries; nothing is evicted outside of
/// [`add`](Self::add) and [`shrink`](Self::shrink).
///
/// Trimming is a separate store call from the insert, so concurrent writers can
/// briefly push the set above `max_count` until the next shrink.
///
/// # Examples
///
/// ```no_run
/// use timebucket::{BoundedTimeSet, MaxCount, MemoryStore, StoreKey};
///
/// # async fn run() -> Result<(), timebucket::TimebucketError> {
/// let grades = BoundedTimeSet::new(
///     MemoryStore::new(),
///     StoreKey::try_from("students_grades:1")?,
///     MaxCount::try_from(3)?,
/// );
///
/// for (i, grade) in ["A", "B", "C", "D"].into_iter().enumerate() {
///     grades.add(grade, i as f64).await?;
/// }
///
/// assert_eq!(grades.len().await?, 3);
/// assert_eq!(grades.latest().await?, Some(("D".to_string(), 3.0)));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct BoundedTimeSet<S> {
    store: S,
    key: StoreKey,
    max_count: MaxCount,
}

impl<S: SortedSetStore> BoundedTimeSet<S> {
    /// Create a bounded set stored under `key`.
    pub fn new(store: S, key: StoreKey, max_count: MaxCount) -> Self {
        Self {
            store,
            key,
            max_count,
        }
    }

    /// Store key holding the set.
    pub fn key(&self) -> &StoreKey {
        &self.key
    }

    /// Maximum number of members kept.
    pub fn max_count(&self) -> MaxCount {
        self.max_count
    }

    /// Add `member` at `timestamp` unless it is already present.
    ///
    /// Returns `true` if the member was new, in which case the set is trimmed
    /// back to `max_count`.
    pub async fn add(&self, member: &str, timestamp: f64) -> Result<bool, TimebucketError> {
        let added = self.store.add_if_absent(&self.key, member, timestamp).await?;

        if added {
            self.shrink().await?;
        }

        Ok(added)
    }

    /// Add `member` at the current wall-clock time.
    pub async fn add_now(&self, member: &str) -> Result<bool, TimebucketError> {
        self.add(member, unix_seconds(SystemTime::now())).await
    }

    /// Evict the oldest members until at most `max_count` remain.
    ///
    /// Returns how many members were evicted.
    pub async fn shrink(&self) -> Result<u64, TimebucketError> {
        let count = self.store.cardinality(&self.key).await?;

        if count <= *self.max_count {
            return Ok(0);
        }

        let evicted = self
            .store
            .remove_lowest(&self.key, count - *self.max_count)
            .await?;

        tracing::trace!(key = %self.key, evicted, "bounded_time_set.shrink");

        Ok(evicted)
    }

    /// The newest member and its timestamp, if the set is not empty.
    pub async fn latest(&self) -> Result<Option<ScoredMember>, TimebucketError> {
        self.store.peek_max(&self.key).await
    }

    /// Number of members.
    pub async fn len(&self) -> Result<u64, TimebucketError> {
        self.store.cardinality(&self.key).await
    }

    /// Whether the set is empty.
    pub async fn is_empty(&self) -> Result<bool, TimebucketError> {
        Ok(self.len().await? == 0)
    }

    /// Delete the set.
    pub async fn clear(&self) -> Result<(), TimebucketError> {
        self.store.delete(&self.key).await
    }
}
