//! Deduplicated, time-bucketed task queue.
//!
//! A task is identified by `(task_id, bucket)`, where `bucket` is the
//! [`Interval`] index of the timestamp it was scheduled for. The pair is stored
//! as the sorted-set member `"{task_id}_{bucket}"` scored by `bucket`, so
//! scheduling the same task twice within one bucket leaves a single entry and
//! consumers always see the earliest buckets first.

use std::time::{Duration, SystemTime};

use crate::{Interval, ScoredMember, SortedSetStore, StoreKey, TimeRange, TimebucketError};

/// Configuration for a [`TaskQueue`].
#[derive(Clone, Debug, Default)]
pub struct TaskQueueOptions {
    /// Bucket width. Defaults to one hour.
    pub interval: Interval,

    /// Prefix for the queue's store key.
    ///
    /// The key is `<prefix><interval seconds>`, e.g. `DURATION_TASK_3600`.
    /// If `None`, defaults to [`StoreKey::default_prefix`].
    pub key_prefix: Option<StoreKey>,
}

/// A task popped from a [`TaskQueue`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTask {
    /// Caller-supplied task id.
    pub task_id: String,
    /// Bucket index the task was scheduled in.
    pub bucket: i64,
    /// Time range covered by `bucket`.
    pub range: TimeRange,
}

/// Encode a task as its store member.
pub fn task_member(task_id: &str, bucket: i64) -> String {
    format!("{task_id}_{bucket}")
}

/// Split a store member into task id and bucket index.
///
/// The bucket is everything after the **last** `_`, so task ids may contain
/// underscores themselves.
pub fn split_task_member(member: &str) -> Result<(&str, i64), TimebucketError> {
    let Some((task_id, bucket)) = member.rsplit_once('_') else {
        return Err(TimebucketError::MalformedTask(member.to_string()));
    };

    let bucket = bucket
        .parse::<i64>()
        .map_err(|_| TimebucketError::MalformedTask(member.to_string()))?;

    Ok((task_id, bucket))
}

/// Queue holding at most one entry per task and bucket.
///
/// The queue is a stateless façade over one store key: any number of instances
/// (in any number of processes) pointed at the same store, prefix and interval
/// are interchangeable.
///
/// # Ordering
///
/// Pops return the lowest buckets first. Within a bucket, entries come out in
/// the store's member order (byte-wise for both Redis and
/// [`MemoryStore`](crate::MemoryStore)); callers should not rely on it.
///
/// # Examples
///
/// ```no_run
/// use std::time::{Duration, SystemTime};
/// use timebucket::{Interval, MemoryStore, TaskQueue, TaskQueueOptions};
///
/// # async fn run() -> Result<(), timebucket::TimebucketError> {
/// let queue = TaskQueue::new(
///     MemoryStore::new(),
///     TaskQueueOptions {
///         interval: Interval::from_secs(60)?,
///         key_prefix: None,
///     },
/// );
///
/// let now = SystemTime::now();
/// assert!(queue.create_task("sync_user_42", now).await?);
/// assert!(!queue.create_task("sync_user_42", now).await?);
///
/// // Only buckets that have fully elapsed.
/// let due = queue.get_pre_tasks(10).await?;
/// assert!(due.is_empty());
///
/// // Anything, waiting up to a second if the queue is empty.
/// let tasks = queue.get_tasks(10, Duration::from_secs(1)).await?;
/// assert_eq!(tasks[0].task_id, "sync_user_42");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct TaskQueue<S> {
    store: S,
    interval: Interval,
    key: String,
}

impl<S: SortedSetStore> TaskQueue<S> {
    /// Create a queue over `store`.
    pub fn new(store: S, options: TaskQueueOptions) -> Self {
        let prefix = options.key_prefix.unwrap_or_else(StoreKey::default_prefix);
        let key = format!("{}{}", *prefix, options.interval.as_secs());

        Self {
            store,
            interval: options.interval,
            key,
        }
    }

    /// Store key holding the queue.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Bucket width.
    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Schedule `task_id` in the bucket containing `timestamp`.
    ///
    /// Returns `false` when the task is already queued for that bucket; the
    /// existing entry is left as is.
    pub async fn create_task(
        &self,
        task_id: &str,
        timestamp: SystemTime,
    ) -> Result<bool, TimebucketError> {
        let bucket = self.interval.index(timestamp);
        let member = task_member(task_id, bucket);

        let created = self
            .store
            .add_if_absent(&self.key, &member, bucket as f64)
            .await?;

        if !created {
            tracing::trace!(key = %self.key, %member, "task_queue.create_task deduplicated");
        }

        Ok(created)
    } // end method create_task

    /// Schedule `task_id` in the current bucket.
    pub async fn create_task_now(&self, task_id: &str) -> Result<bool, TimebucketError> {
        self.create_task(task_id, SystemTime::now()).await
    }

    /// Pop up to `count` tasks, earliest buckets first.
    ///
    /// If the queue is empty and `timeout` is non-zero, waits until a task is
    /// queued or `timeout` elapses; a task arriving while waiting is returned
    /// on its own. A zero timeout never waits; [`Duration::MAX`] waits until a
    /// task arrives.
    ///
    /// With `RedisStore`, each wait opens a dedicated connection for the
    /// blocking pop.
    pub async fn get_tasks(
        &self,
        count: usize,
        timeout: Duration,
    ) -> Result<Vec<QueuedTask>, TimebucketError> {
        let popped = self.pop(count, timeout).await?;
        self.parse_popped(popped).await
    }

    /// Like [`get_tasks`](Self::get_tasks), returning the raw store members.
    pub async fn get_raw_tasks(
        &self,
        count: usize,
        timeout: Duration,
    ) -> Result<Vec<String>, TimebucketError> {
        let popped = self.pop(count, timeout).await?;
        Ok(popped.into_iter().map(|(member, _)| member).collect())
    }

    /// Pop up to `count` tasks whose bucket ended before now.
    pub async fn get_pre_tasks(&self, count: usize) -> Result<Vec<QueuedTask>, TimebucketError> {
        self.get_pre_tasks_at(count, SystemTime::now()).await
    }

    /// Pop up to `count` tasks from buckets that ended before the bucket of
    /// `reference_time`.
    ///
    /// The `count` earliest entries are popped; those in the current or a later
    /// bucket are put back unchanged and left out of the result. Nothing popped
    /// is dropped.
    pub async fn get_pre_tasks_at(
        &self,
        count: usize,
        reference_time: SystemTime,
    ) -> Result<Vec<QueuedTask>, TimebucketError> {
        let mature = self.pop_mature(count, reference_time).await?;
        self.parse_popped(mature).await
    }

    /// Like [`get_pre_tasks_at`](Self::get_pre_tasks_at), returning the raw
    /// store members.
    pub async fn get_raw_pre_tasks_at(
        &self,
        count: usize,
        reference_time: SystemTime,
    ) -> Result<Vec<String>, TimebucketError> {
        let mature = self.pop_mature(count, reference_time).await?;
        Ok(mature.into_iter().map(|(member, _)| member).collect())
    }

    /// Decode a store member produced by this queue.
    pub fn parse_task(&self, member: &str) -> Result<QueuedTask, TimebucketError> {
        let (task_id, bucket) = split_task_member(member)?;

        let Some(range) = self.interval.range_of_index(bucket) else {
            return Err(TimebucketError::MalformedTask(member.to_string()));
        };

        Ok(QueuedTask {
            task_id: task_id.to_string(),
            bucket,
            range,
        })
    }

    /// Number of queued tasks.
    pub async fn len(&self) -> Result<u64, TimebucketError> {
        self.store.cardinality(&self.key).await
    }

    /// Whether the queue holds no tasks.
    pub async fn is_empty(&self) -> Result<bool, TimebucketError> {
        Ok(self.len().await? == 0)
    }

    /// Delete every queued task.
    pub async fn clear(&self) -> Result<(), TimebucketError> {
        self.store.delete(&self.key).await
    }

    async fn pop(
        &self,
        count: usize,
        timeout: Duration,
    ) -> Result<Vec<ScoredMember>, TimebucketError> {
        let popped = self.store.pop_min(&self.key, count).await?;

        if !popped.is_empty() || count == 0 || timeout.is_zero() {
            return Ok(popped);
        }

        let popped = self.store.blocking_pop_min(&self.key, timeout).await?;
        Ok(popped.into_iter().collect())
    }

    async fn pop_mature(
        &self,
        count: usize,
        reference_time: SystemTime,
    ) -> Result<Vec<ScoredMember>, TimebucketError> {
        let popped = self.store.pop_min(&self.key, count).await?;
        let current_bucket = self.interval.index(reference_time) as f64;

        let (immature, mature): (Vec<_>, Vec<_>) = popped
            .into_iter()
            .partition(|(_, bucket)| *bucket >= current_bucket);

        if !immature.is_empty() {
            tracing::debug!(
                key = %self.key,
                current_bucket,
                reinserted = immature.len(),
                returned = mature.len(),
                "task_queue.get_pre_tasks putting back tasks not yet due"
            );

            if let Err(err) = self.store.add_many(&self.key, &immature).await {
                tracing::error!(
                    key = %self.key,
                    error = ?err,
                    lost = ?immature,
                    "task_queue.get_pre_tasks failed to put back tasks not yet due"
                );
                return Err(err);
            }
        }

        Ok(mature)
    } // end method pop_mature

    /// Parse popped members; on a malformed member the well-formed ones are
    /// put back before the error is returned.
    async fn parse_popped(
        &self,
        popped: Vec<ScoredMember>,
    ) -> Result<Vec<QueuedTask>, TimebucketError> {
        let mut tasks = Vec::with_capacity(popped.len());
        let mut well_formed = Vec::with_capacity(popped.len());
        let mut malformed = Vec::new();

        for (member, score) in popped {
            match self.parse_task(&member) {
                Ok(task) => {
                    tasks.push(task);
                    well_formed.push((member, score));
                }
                Err(_) => malformed.push(member),
            }
        }

        let Some(first_malformed) = malformed.first() else {
            return Ok(tasks);
        };

        tracing::error!(
            key = %self.key,
            ?malformed,
            restored = well_formed.len(),
            "task_queue.malformed members discarded"
        );

        if let Err(err) = self.store.add_many(&self.key, &well_formed).await {
            tracing::error!(
                key = %self.key,
                error = ?err,
                lost = ?well_formed,
                "task_queue.failed to put back well-formed tasks"
            );
            return Err(err);
        }

        Err(TimebucketError::MalformedTask(first_malformed.clone()))
    } // end method parse_popped
}
