//! In-process building blocks.
//!
//! # Key Characteristics
//!
//! - **Thread-safe:** Safe for concurrent use across threads and tasks
//! - **No external services:** No network or database required
//! - **Process-scoped:** State is not shared across processes
//!
//! # Contents
//!
//! - [`MemoryStore`]: a [`SortedSetStore`](crate::SortedSetStore) held in memory,
//!   with the same observable behavior as the Redis store
//! - [`RateLimiter`]: one admission per timeout, no store involved
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use timebucket::local::{MemoryStore, RateLimiter};
//!
//! let store = MemoryStore::new();
//! let limiter = RateLimiter::new(Duration::from_millis(100));
//!
//! assert!(limiter.try_admit());
//! # drop(store);
//! ```

mod memory_store;
pub use memory_store::*;

mod rate_limiter;
pub use rate_limiter::*;
