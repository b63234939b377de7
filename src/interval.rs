//! Fixed-width time buckets.
//!
//! An [`Interval`] slices wall-clock time into consecutive, non-overlapping
//! buckets of `width` seconds aligned on the Unix epoch. Bucket `i` covers the
//! half-open range `[i * width, (i + 1) * width)`.
//!
//! All arithmetic is done on integer nanoseconds, so bucket boundaries are exact
//! and timestamps before the epoch floor towards negative infinity rather than
//! towards zero.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::TimebucketError;

const NANOS_PER_SEC: i128 = 1_000_000_000;

/// A half-open range of wall-clock time, `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimeRange {
    /// Inclusive lower bound.
    pub start: SystemTime,
    /// Exclusive upper bound.
    pub end: SystemTime,
}

impl TimeRange {
    /// Whether `time` falls inside the range.
    pub fn contains(&self, time: SystemTime) -> bool {
        self.start <= time && time < self.end
    }
}

/// Width of a time bucket, a whole number of seconds.
///
/// # Examples
///
/// ```
/// use std::time::{Duration, UNIX_EPOCH};
/// use timebucket::Interval;
///
/// let hour = Interval::from_secs(3600).unwrap();
/// let t = UNIX_EPOCH + Duration::from_secs(7300);
///
/// assert_eq!(hour.index(t), 2);
/// assert_eq!(hour.range_containing(t).start, UNIX_EPOCH + Duration::from_secs(7200));
///
/// assert!(Interval::try_from(Duration::from_millis(1500)).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Interval {
    secs: u64,
}

impl Default for Interval {
    /// Returns a one hour interval.
    fn default() -> Self {
        Self { secs: 3600 }
    }
}

impl Interval {
    /// Create an interval `secs` seconds wide.
    pub fn from_secs(secs: u64) -> Result<Self, TimebucketError> {
        if secs == 0 {
            return Err(TimebucketError::InvalidInterval(
                "Interval width must be greater than 0".to_string(),
            ));
        }

        if i64::try_from(secs).is_err() {
            return Err(TimebucketError::InvalidInterval(
                "Interval width is too large".to_string(),
            ));
        }

        Ok(Self { secs })
    }

    /// Width in whole seconds.
    pub fn as_secs(&self) -> u64 {
        self.secs
    }

    /// Width as a [`Duration`].
    pub fn width(&self) -> Duration {
        Duration::from_secs(self.secs)
    }

    fn width_nanos(&self) -> i128 {
        self.secs as i128 * NANOS_PER_SEC
    }

    /// Index of the bucket containing `time`.
    pub fn index(&self, time: SystemTime) -> i64 {
        // width >= 1s keeps the quotient well inside i64
        unix_nanos(time).div_euclid(self.width_nanos()) as i64
    }

    /// The bucket range containing `time`; `start <= time < end` always holds.
    pub fn range_containing(&self, time: SystemTime) -> TimeRange {
        let nanos = unix_nanos(time);
        let remain = nanos.rem_euclid(self.width_nanos());
        let start = nanos - remain;

        // `start` lies between the epoch and `time`, so both bounds are representable
        // whenever `time` is, except an `end` past the platform's last instant.
        let start = from_unix_nanos(start).unwrap_or(time);
        let end = start.checked_add(self.width()).unwrap_or(time);

        TimeRange { start, end }
    }

    /// The range covered by bucket `index`, or `None` if it cannot be
    /// represented as a [`SystemTime`].
    pub fn range_of_index(&self, index: i64) -> Option<TimeRange> {
        let start = (index as i128).checked_mul(self.width_nanos())?;
        let end = start.checked_add(self.width_nanos())?;

        Some(TimeRange {
            start: from_unix_nanos(start)?,
            end: from_unix_nanos(end)?,
        })
    }
}

impl TryFrom<Duration> for Interval {
    type Error = TimebucketError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        if value.subsec_nanos() != 0 {
            return Err(TimebucketError::InvalidInterval(format!(
                "Interval width must be a whole number of seconds, got {value:?}"
            )));
        }

        Self::from_secs(value.as_secs())
    }
}

fn unix_nanos(time: SystemTime) -> i128 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_nanos() as i128,
        Err(e) => -(e.duration().as_nanos() as i128),
    }
}

fn from_unix_nanos(nanos: i128) -> Option<SystemTime> {
    let abs = nanos.unsigned_abs();
    let secs = u64::try_from(abs / NANOS_PER_SEC as u128).ok()?;
    let duration = Duration::new(secs, (abs % NANOS_PER_SEC as u128) as u32);

    if nanos >= 0 {
        UNIX_EPOCH.checked_add(duration)
    } else {
        UNIX_EPOCH.checked_sub(duration)
    }
}
