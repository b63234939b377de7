/// Error type for this crate.
#[derive(Debug, thiserror::Error)]
pub enum TimebucketError {
    /// Redis error, propagated unmodified from the store.
    #[cfg(feature = "redis-tokio")]
    #[error("redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    /// A Redis store was asked for zero connections.
    #[cfg(feature = "redis-tokio")]
    #[error("invalid redis connection count: {0}")]
    InvalidConnectionCount(String),

    /// Interval width is zero or not a whole number of seconds.
    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    /// A queue member could not be parsed back into a task.
    #[error("malformed task member: {0:?}")]
    MalformedTask(String),

    /// Store key failed validation.
    #[error("invalid store key: {0}")]
    InvalidStoreKey(String),

    /// Max count failed validation.
    #[error("invalid max count: {0}")]
    InvalidMaxCount(String),

    /// Window size failed validation.
    #[error("invalid window size: {0}")]
    InvalidWindowSize(String),

    /// A sorted-set score was NaN or infinite.
    #[error("invalid score for member {member:?}: {score}")]
    InvalidScore {
        /// Member the score was given for.
        member: String,
        /// The rejected score.
        score: f64,
    },
}
