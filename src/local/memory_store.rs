use std::{
    cmp::Ordering,
    collections::{BTreeSet, HashMap},
    pin::pin,
    sync::Arc,
    time::Duration,
};

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::{sync::Notify, time::Instant};

use crate::{ScoredMember, SortedSetStore, TimebucketError, store::check_score};

#[derive(Debug, Clone, Copy)]
struct Score(f64);

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// One sorted set: a member -> score index plus the (score, member) ordering.
#[derive(Debug, Default)]
pub(crate) struct SortedSet {
    scores: HashMap<String, f64>,
    ordered: BTreeSet<(Score, String)>,
}

impl SortedSet {
    /// Insert or update; returns `true` if the member is new.
    fn insert(&mut self, member: &str, score: f64) -> bool {
        match self.scores.insert(member.to_string(), score) {
            Some(previous) => {
                self.ordered.remove(&(Score(previous), member.to_string()));
                self.ordered.insert((Score(score), member.to_string()));
                false
            }
            None => {
                self.ordered.insert((Score(score), member.to_string()));
                true
            }
        }
    }

    fn contains(&self, member: &str) -> bool {
        self.scores.contains_key(member)
    }

    fn pop_first(&mut self) -> Option<ScoredMember> {
        let (score, member) = self.ordered.pop_first()?;
        self.scores.remove(&member);
        Some((member, score.0))
    }

    fn last(&self) -> Option<ScoredMember> {
        self.ordered
            .last()
            .map(|(score, member)| (member.clone(), score.0))
    }

    fn first_score(&self) -> Option<f64> {
        self.ordered.first().map(|(score, _)| score.0)
    }

    pub(crate) fn len(&self) -> usize {
        self.scores.len()
    }

    fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

struct MemoryStoreInner {
    sets: DashMap<String, SortedSet>,
    // Woken on every insert so blocked poppers re-check their key.
    inserted: Notify,
}

/// In-process [`SortedSetStore`].
///
/// Each set lives in a [`DashMap`] entry, so every operation runs under that
/// key's shard lock and is atomic with respect to other callers. Blocking pops
/// wait on a [`Notify`] that is signalled whenever members are added.
///
/// Cloning is cheap and clones share the same sets, which makes this a drop-in
/// stand-in for a shared Redis instance inside one process. The blocking pop
/// relies on the tokio timer, so it must be awaited from within a tokio runtime.
///
/// # Examples
///
/// ```no_run
/// use std::time::{Duration, SystemTime};
/// use timebucket::{MemoryStore, TaskQueue, TaskQueueOptions};
///
/// # async fn run() -> Result<(), timebucket::TimebucketError> {
/// let store = MemoryStore::new();
/// let queue = TaskQueue::new(store.clone(), TaskQueueOptions::default());
///
/// assert!(queue.create_task("report", SystemTime::now()).await?);
/// let tasks = queue.get_tasks(10, Duration::ZERO).await?;
/// assert_eq!(tasks[0].task_id, "report");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryStoreInner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("keys", &self.inner.sets.len())
            .finish()
    }
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryStoreInner {
                sets: DashMap::new(),
                inserted: Notify::new(),
            }),
        }
    }

    #[cfg(test)]
    pub(crate) fn sets(&self) -> &DashMap<String, SortedSet> {
        &self.inner.sets
    }

    fn drop_if_empty(&self, key: &str) {
        self.inner.sets.remove_if(key, |_, set| set.is_empty());
    }

    fn pop_min_now(&self, key: &str, count: usize) -> Vec<ScoredMember> {
        let popped = match self.inner.sets.get_mut(key) {
            Some(mut set) => {
                let mut popped = Vec::with_capacity(count.min(set.len()));
                while popped.len() < count {
                    match set.pop_first() {
                        Some(entry) => popped.push(entry),
                        None => break,
                    }
                }
                popped
            }
            None => return Vec::new(),
        };

        self.drop_if_empty(key);
        popped
    }
}

#[async_trait]
impl SortedSetStore for MemoryStore {
    async fn add_if_absent(
        &self,
        key: &str,
        member: &str,
        score: f64,
    ) -> Result<bool, TimebucketError> {
        check_score(member, score)?;

        let added = {
            let mut set = self.inner.sets.entry(key.to_string()).or_default();
            if set.contains(member) {
                false
            } else {
                set.insert(member, score)
            }
        };

        if added {
            self.inner.inserted.notify_waiters();
        } else {
            self.drop_if_empty(key);
        }

        Ok(added)
    }

    async fn add_many(&self, key: &str, entries: &[ScoredMember]) -> Result<u64, TimebucketError> {
        if entries.is_empty() {
            return Ok(0);
        }

        for (member, score) in entries {
            check_score(member, *score)?;
        }

        let added = {
            let mut set = self.inner.sets.entry(key.to_string()).or_default();
            let mut added = 0;
            for (member, score) in entries {
                if set.insert(member, *score) {
                    added += 1;
                }
            }
            added
        };

        self.inner.inserted.notify_waiters();
        Ok(added)
    }

    async fn pop_min(&self, key: &str, count: usize) -> Result<Vec<ScoredMember>, TimebucketError> {
        Ok(self.pop_min_now(key, count))
    }

    async fn blocking_pop_min(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<ScoredMember>, TimebucketError> {
        // None: too far out to represent, wait for an insert only.
        let deadline = Instant::now().checked_add(timeout);

        loop {
            // Register interest before checking so an insert between the check
            // and the wait is not missed.
            let mut inserted = pin!(self.inner.inserted.notified());
            inserted.as_mut().enable();

            if let Some(entry) = self.pop_min_now(key, 1).pop() {
                return Ok(Some(entry));
            }

            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, inserted).await.is_err() {
                        tracing::trace!(key, ?timeout, "memory_store.blocking_pop_min timed out");
                        return Ok(None);
                    }
                }
                None => inserted.await,
            }
        }
    }

    async fn cardinality(&self, key: &str) -> Result<u64, TimebucketError> {
        Ok(self
            .inner
            .sets
            .get(key)
            .map(|set| set.len() as u64)
            .unwrap_or(0))
    }

    async fn remove_lowest(&self, key: &str, count: u64) -> Result<u64, TimebucketError> {
        let count = usize::try_from(count).unwrap_or(usize::MAX);
        Ok(self.pop_min_now(key, count).len() as u64)
    }

    async fn remove_below(&self, key: &str, max_exclusive: f64) -> Result<u64, TimebucketError> {
        let removed = match self.inner.sets.get_mut(key) {
            Some(mut set) => {
                let mut removed = 0;
                while set.first_score().is_some_and(|score| score < max_exclusive) {
                    set.pop_first();
                    removed += 1;
                }
                removed
            }
            None => return Ok(0),
        };

        self.drop_if_empty(key);
        Ok(removed)
    }

    async fn peek_max(&self, key: &str) -> Result<Option<ScoredMember>, TimebucketError> {
        Ok(self.inner.sets.get(key).and_then(|set| set.last()))
    }

    async fn delete(&self, key: &str) -> Result<(), TimebucketError> {
        self.inner.sets.remove(key);
        Ok(())
    }
}
