use std::time::SystemTime;

use crate::{MaxCount, SortedSetStore, StoreKey, TimebucketError, WindowSize, common::unix_seconds};

/// Configuration for a [`SharedRateLimiter`].
#[derive(Clone, Debug)]
pub struct SharedRateLimiterOptions {
    /// Most admissions allowed inside any trailing window.
    pub max_count: MaxCount,

    /// Length of the trailing window.
    pub window: WindowSize,

    /// Store key the admissions are recorded under.
    ///
    /// Limiters sharing a store and a name share their budget. If `None`, a
    /// random `shared_rate_limiter_<hex>` key is generated and the limiter is
    /// effectively private to this instance.
    pub name: Option<StoreKey>,
}

/// Sliding-window rate limiter whose state lives in a [`SortedSetStore`].
///
/// Every admission is recorded as a unique random token scored by its
/// wall-clock time. A check prunes tokens older than the window, counts the
/// rest, and records a new token only if the count is below `max_count`.
///
/// # Consistency Semantics
///
/// - **Approximate:** prune, count and insert are separate store calls, so
///   racing callers may both observe room for one more and both be admitted
/// - **Rejections have no side effects:** nothing is recorded for a rejected
///   call beyond pruning expired tokens
/// - **Wall-clock based:** instances on different hosts rely on their clocks
///   being in sync
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use timebucket::{
///     MaxCount, MemoryStore, SharedRateLimiter, SharedRateLimiterOptions, StoreKey, WindowSize,
/// };
///
/// # async fn run() -> Result<(), timebucket::TimebucketError> {
/// let limiter = SharedRateLimiter::new(
///     MemoryStore::new(),
///     SharedRateLimiterOptions {
///         max_count: MaxCount::try_from(3)?,
///         window: WindowSize::try_from(Duration::from_secs(1))?,
///         name: Some(StoreKey::try_from("crawler:example.com")?),
///     },
/// );
///
/// if limiter.try_admit().await? {
///     // proceed
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SharedRateLimiter<S> {
    store: S,
    key: StoreKey,
    max_count: MaxCount,
    window: WindowSize,
}

impl<S: SortedSetStore> SharedRateLimiter<S> {
    /// Create a limiter over `store`.
    pub fn new(store: S, options: SharedRateLimiterOptions) -> Self {
        let key = options
            .name
            .unwrap_or_else(|| StoreKey::random("shared_rate_limiter_"));

        Self {
            store,
            key,
            max_count: options.max_count,
            window: options.window,
        }
    }

    /// Store key the admissions are recorded under.
    pub fn key(&self) -> &StoreKey {
        &self.key
    }

    /// Admit the event if fewer than `max_count` events were admitted within
    /// the trailing window.
    pub async fn try_admit(&self) -> Result<bool, TimebucketError> {
        let now = unix_seconds(SystemTime::now());

        let recorded = self.prune_and_count(now).await?;
        if recorded >= *self.max_count {
            tracing::trace!(key = %self.key, recorded, "shared_rate_limiter.rejected");
            return Ok(false);
        }

        let token = format!("{now:.6}-{:016x}", rand::random::<u64>());
        self.store.add_if_absent(&self.key, &token, now).await?;

        Ok(true)
    } // end method try_admit

    /// Number of admissions currently inside the window.
    pub async fn count(&self) -> Result<u64, TimebucketError> {
        self.prune_and_count(unix_seconds(SystemTime::now())).await
    }

    /// Forget every recorded admission.
    pub async fn clear(&self) -> Result<(), TimebucketError> {
        self.store.delete(&self.key).await
    }

    async fn prune_and_count(&self, now: f64) -> Result<u64, TimebucketError> {
        let window_start = now - self.window.as_secs_f64();

        self.store.remove_below(&self.key, window_start).await?;
        self.store.cardinality(&self.key).await
    }
}
