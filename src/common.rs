use std::{
    ops::Deref,
    sync::Arc,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use crate::TimebucketError;

/// A validated newtype for store keys.
///
/// This is a string with the following constraints:
/// - Must not be empty
/// - Must not be longer than 255 bytes
#[derive(Debug, Clone, PartialEq, PartialOrd, Hash, Eq)]
pub struct StoreKey(Arc<str>);

impl StoreKey {
    /// The prefix task queues use when none is configured.
    pub fn default_prefix() -> Self {
        Self(Arc::from("DURATION_TASK_"))
    }

    /// A random key, used by limiters that were not given a shared name.
    pub fn random(prefix: &str) -> Self {
        let n: u64 = rand::random();
        Self(Arc::from(format!("{prefix}{n:016x}")))
    }
}

impl Deref for StoreKey {
    type Target = Arc<str>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::fmt::Display for StoreKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StoreKey {
    type Error = TimebucketError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Err(TimebucketError::InvalidStoreKey(
                "Store key must not be empty".to_string(),
            ))
        } else if value.len() > 255 {
            Err(TimebucketError::InvalidStoreKey(
                "Store key must not be longer than 255 bytes".to_string(),
            ))
        } else {
            Ok(Self(Arc::from(value)))
        }
    }
}

impl TryFrom<&str> for StoreKey {
    type Error = TimebucketError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::try_from(value.to_string())
    }
}

/// Upper bound on the number of entries a bounded set or shared limiter keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MaxCount(u64);

impl Deref for MaxCount {
    type Target = u64;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<u64> for MaxCount {
    type Error = TimebucketError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value == 0 {
            Err(TimebucketError::InvalidMaxCount(
                "Max count must be greater than 0".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

/// Length of the trailing window a [`SharedRateLimiter`](crate::SharedRateLimiter)
/// counts admissions over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct WindowSize(Duration);

impl Deref for WindowSize {
    type Target = Duration;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TryFrom<Duration> for WindowSize {
    type Error = TimebucketError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        if value.is_zero() {
            Err(TimebucketError::InvalidWindowSize(
                "Window size must be greater than 0".to_string(),
            ))
        } else {
            Ok(Self(value))
        }
    }
}

/// Seconds since the epoch as a float score; negative before the epoch.
pub fn unix_seconds(time: SystemTime) -> f64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}
