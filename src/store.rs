use std::time::Duration;

use async_trait::async_trait;

use crate::TimebucketError;

/// A member together with its score.
pub type ScoredMember = (String, f64);

/// Reject NaN and infinite scores before they reach a store.
pub(crate) fn check_score(member: &str, score: f64) -> Result<(), TimebucketError> {
    if score.is_finite() {
        Ok(())
    } else {
        Err(TimebucketError::InvalidScore {
            member: member.to_string(),
            score,
        })
    }
}

/// Sorted-set operations the task queue, bounded set and shared limiter are
/// built on.
///
/// Every method is a single atomic step on one key. Members are unique per key
/// and ordered by score, with ties ordered by member bytes. A key whose set
/// becomes empty is treated as absent.
///
/// Two implementations ship with the crate: [`MemoryStore`](crate::MemoryStore)
/// for single-process use and tests, and `RedisStore` (feature `redis-tokio`)
/// for sharing state across processes.
#[async_trait]
pub trait SortedSetStore: Send + Sync {
    /// Add `member` with `score` unless it is already present.
    ///
    /// Returns `true` if the member was newly added. An existing member keeps
    /// its score. Non-finite scores are rejected with
    /// [`TimebucketError::InvalidScore`].
    async fn add_if_absent(
        &self,
        key: &str,
        member: &str,
        score: f64,
    ) -> Result<bool, TimebucketError>;

    /// Add or overwrite every entry, returning how many members were new.
    ///
    /// If any score is non-finite nothing is written.
    async fn add_many(&self, key: &str, entries: &[ScoredMember]) -> Result<u64, TimebucketError>;

    /// Remove and return up to `count` entries with the lowest scores, lowest first.
    async fn pop_min(&self, key: &str, count: usize) -> Result<Vec<ScoredMember>, TimebucketError>;

    /// Remove and return the lowest-scored entry, waiting up to `timeout` for one
    /// to appear.
    ///
    /// Callers must pass a non-zero timeout; a zero timeout means "forever" to
    /// some stores. Timeouts too large to represent (e.g. [`Duration::MAX`])
    /// wait until an entry arrives.
    async fn blocking_pop_min(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<ScoredMember>, TimebucketError>;

    /// Number of members under `key`.
    async fn cardinality(&self, key: &str) -> Result<u64, TimebucketError>;

    /// Remove the `count` lowest-scored entries, returning how many were removed.
    async fn remove_lowest(&self, key: &str, count: u64) -> Result<u64, TimebucketError>;

    /// Remove every entry with a score strictly below `max_exclusive`.
    async fn remove_below(&self, key: &str, max_exclusive: f64) -> Result<u64, TimebucketError>;

    /// The highest-scored entry, if any.
    async fn peek_max(&self, key: &str) -> Result<Option<ScoredMember>, TimebucketError>;

    /// Delete the whole set.
    async fn delete(&self, key: &str) -> Result<(), TimebucketError>;
}
