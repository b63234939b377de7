#![doc = include_str!("../README.md")]
#![deny(missing_docs)]
#![forbid(unsafe_code)]

pub mod local;
pub use local::*;

#[cfg(feature = "redis-tokio")]
mod redis;
#[cfg(feature = "redis-tokio")]
pub use redis::*;

mod error;
pub use error::*;

mod common;
pub use common::{MaxCount, StoreKey, WindowSize, unix_seconds};

mod interval;
pub use interval::*;

mod store;
pub use store::*;

mod task_queue;
pub use task_queue::*;

mod bounded_time_set;
pub use bounded_time_set::*;

mod shared_rate_limiter;
pub use shared_rate_limiter::*;

#[cfg(test)]
mod tests;
