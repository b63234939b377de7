use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use redis::{AsyncCommands, AsyncConnectionConfig, Client, aio::ConnectionManager};

use crate::{ScoredMember, SortedSetStore, TimebucketError, store::check_score};

/// Headroom on top of a blocking pop's own timeout before the client gives up
/// waiting for the server's reply.
const BLOCKING_RESPONSE_SLACK: Duration = Duration::from_secs(1);

/// Longest `BZPOPMIN` timeout sent as is. Longer waits are sent as `0`, which
/// Redis treats as "block until an entry arrives".
const MAX_BLOCKING_TIMEOUT: Duration = Duration::from_secs(365 * 24 * 3600);

/// Redis-backed [`SortedSetStore`].
///
/// Holds one or more [`redis::aio::ConnectionManager`]s, handed out round-robin,
/// plus the [`Client`] they came from. Blocking pops (`BZPOPMIN`) open their own
/// multiplexed connection so that a long wait never stalls the shared managers.
///
/// That connection is opened per call and dropped afterwards, so a consumer
/// polling an empty queue with a timeout pays one connection setup per poll.
/// Prefer longer timeouts over tight loops of short ones.
///
/// # Requirements
///
/// - **Redis version:** >= 6.2.0 (`ZRANGE ... REV`, fractional `BZPOPMIN` timeouts)
///
/// # Consistency Semantics
///
/// Each trait method maps to a single Redis command and is atomic on its own.
/// Operations composed from several calls (shrinking a bounded set, shared
/// limiter admission, re-inserting immature tasks) are not.
///
/// # Examples
///
/// ```ignore
/// use timebucket::RedisStore;
///
/// let client = redis::Client::open("redis://127.0.0.1:6379/")?;
/// let store = RedisStore::from_client(client).await?;
/// ```
pub struct RedisStore {
    client: Client,
    connection_managers: Arc<Vec<ConnectionManager>>,
    track_index: AtomicUsize,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("client", &self.client)
            .field("connection_count", &self.connection_managers.len())
            .field("track_index", &self.track_index)
            .finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Create a store backed by a single connection manager.
    pub async fn from_client(client: Client) -> Result<Self, TimebucketError> {
        Self::with_connection_count(client, 1).await
    }

    /// Create a store that spreads commands over `connection_count` managers.
    pub async fn with_connection_count(
        client: Client,
        connection_count: usize,
    ) -> Result<Self, TimebucketError> {
        if connection_count == 0 {
            return Err(TimebucketError::InvalidConnectionCount(
                "connection count must be > 0".to_string(),
            ));
        }

        let mut connection_managers = Vec::with_capacity(connection_count);

        for _ in 0..connection_count {
            connection_managers.push(client.get_connection_manager().await?);
        }

        tracing::debug!(connection_count, "redis_store.connected");

        Ok(Self {
            client,
            connection_managers: Arc::new(connection_managers),
            track_index: AtomicUsize::new(0),
        })
    }

    fn get(&self) -> ConnectionManager {
        let index = self.track_index.fetch_add(1, Ordering::Relaxed);
        self.connection_managers[index % self.connection_managers.len()].clone()
    } // end method get
}

impl Clone for RedisStore {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            connection_managers: self.connection_managers.clone(),
            track_index: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SortedSetStore for RedisStore {
    async fn add_if_absent(
        &self,
        key: &str,
        member: &str,
        score: f64,
    ) -> Result<bool, TimebucketError> {
        check_score(member, score)?;

        let mut conn = self.get();

        let added: u64 = redis::cmd("ZADD")
            .arg(key)
            .arg("NX")
            .arg(score)
            .arg(member)
            .query_async(&mut conn)
            .await?;

        Ok(added == 1)
    }

    async fn add_many(&self, key: &str, entries: &[ScoredMember]) -> Result<u64, TimebucketError> {
        if entries.is_empty() {
            return Ok(0);
        }

        for (member, score) in entries {
            check_score(member, *score)?;
        }

        let mut cmd = redis::cmd("ZADD");
        cmd.arg(key);
        for (member, score) in entries {
            cmd.arg(*score).arg(member);
        }

        let mut conn = self.get();
        let added: u64 = cmd.query_async(&mut conn).await?;

        Ok(added)
    }

    async fn pop_min(&self, key: &str, count: usize) -> Result<Vec<ScoredMember>, TimebucketError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut conn = self.get();

        let popped: Vec<ScoredMember> = redis::cmd("ZPOPMIN")
            .arg(key)
            .arg(count)
            .query_async(&mut conn)
            .await?;

        Ok(popped)
    }

    async fn blocking_pop_min(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<ScoredMember>, TimebucketError> {
        let config = AsyncConnectionConfig::new()
            .set_response_timeout(timeout.saturating_add(BLOCKING_RESPONSE_SLACK));
        let block_secs = if timeout > MAX_BLOCKING_TIMEOUT {
            0.0
        } else {
            timeout.as_secs_f64()
        };
        let mut conn = self
            .client
            .get_multiplexed_async_connection_with_config(&config)
            .await?;

        let popped: Option<(String, String, f64)> = redis::cmd("BZPOPMIN")
            .arg(key)
            .arg(block_secs)
            .query_async(&mut conn)
            .await?;

        Ok(popped.map(|(_key, member, score)| (member, score)))
    }

    async fn cardinality(&self, key: &str) -> Result<u64, TimebucketError> {
        let mut conn = self.get();
        let count: u64 = conn.zcard(key).await?;
        Ok(count)
    }

    async fn remove_lowest(&self, key: &str, count: u64) -> Result<u64, TimebucketError> {
        if count == 0 {
            return Ok(0);
        }

        let stop = i64::try_from(count - 1).unwrap_or(i64::MAX);
        let mut conn = self.get();

        let removed: u64 = redis::cmd("ZREMRANGEBYRANK")
            .arg(key)
            .arg(0)
            .arg(stop)
            .query_async(&mut conn)
            .await?;

        Ok(removed)
    }

    async fn remove_below(&self, key: &str, max_exclusive: f64) -> Result<u64, TimebucketError> {
        let mut conn = self.get();

        let removed: u64 = redis::cmd("ZREMRANGEBYSCORE")
            .arg(key)
            .arg("-inf")
            .arg(format!("({max_exclusive}"))
            .query_async(&mut conn)
            .await?;

        Ok(removed)
    }

    async fn peek_max(&self, key: &str) -> Result<Option<ScoredMember>, TimebucketError> {
        let mut conn = self.get();

        let top: Vec<ScoredMember> = redis::cmd("ZRANGE")
            .arg(key)
            .arg(0)
            .arg(0)
            .arg("REV")
            .arg("WITHSCORES")
            .query_async(&mut conn)
            .await?;

        Ok(top.into_iter().next())
    }

    async fn delete(&self, key: &str) -> Result<(), TimebucketError> {
        let mut conn = self.get();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}
