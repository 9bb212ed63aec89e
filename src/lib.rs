//! A Tokio-based bounded task pool: register a batch of tasks, run them with at most
//! `capacity` executing at once, and get back how many completed and how many succeeded.
//!
//! Each task is handed a [`TaskResult`] and reports exactly one outcome through it.
//! Failures are tallied, never retried. The pool is reusable: every run clears the
//! batch and rebuilds its internal channels.

mod admission;
mod config;
mod error;
mod pool;
mod task;
mod timeout;

pub use config::{PoolConfig, DEFAULT_POOL_NAME};
pub use error::{PoolError, TaskError};
pub use pool::{ActivePool, RunSummary};
pub use task::{TaskFuture, TaskOutcome, TaskResult, TaskToExecute};
pub use timeout::with_timeout;
