use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{Duration, Instant},
};

/// Single-slot, in-process rate limiter.
///
/// Admits at most one event per `timeout`, measured from the last admitted
/// event rather than from a calendar boundary.
///
/// # Algorithm
///
/// 1. Keep a `next_allowed` watermark on the monotonic clock
/// 2. **Admission check:** allow only if now is strictly past the watermark
/// 3. **On admission:** move the watermark to `now + timeout`
///
/// Rejections never move the watermark, so callers that keep retrying are not
/// pushed further back.
///
/// # Thread Safety
///
/// The watermark is a single atomic updated by compare-exchange, so concurrent
/// callers racing for the same slot see exactly one winner.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use timebucket::RateLimiter;
///
/// let limiter = RateLimiter::new(Duration::from_secs(60));
///
/// assert!(limiter.try_admit());
/// assert!(!limiter.try_admit());
/// ```
#[derive(Debug)]
pub struct RateLimiter {
    timeout: Duration,
    origin: Instant,
    // Nanoseconds after `origin`; 0 until the first admission.
    next_allowed_ns: AtomicU64,
}

impl RateLimiter {
    /// Create a limiter admitting one event per `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            origin: Instant::now(),
            next_allowed_ns: AtomicU64::new(0),
        }
    }

    /// Minimum time between two admissions.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn elapsed_ns(&self) -> u64 {
        u64::try_from(self.origin.elapsed().as_nanos()).unwrap_or(u64::MAX)
    }

    /// Admit the event if the previous admission is at least `timeout` old.
    pub fn try_admit(&self) -> bool {
        let now = self.elapsed_ns();
        let timeout_ns = u64::try_from(self.timeout.as_nanos()).unwrap_or(u64::MAX);
        let mut next_allowed = self.next_allowed_ns.load(Ordering::Acquire);

        loop {
            if next_allowed != 0 && now <= next_allowed {
                return false;
            }

            let watermark = now.saturating_add(timeout_ns).max(1);

            match self.next_allowed_ns.compare_exchange_weak(
                next_allowed,
                watermark,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => next_allowed = actual,
            }
        }
    } // end method try_admit
}
