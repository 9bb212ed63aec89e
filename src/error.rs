use std::time::Duration;

use thiserror::Error;

/// Errors that can occur within the `active_pool` pool itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
  #[error("Pool capacity must be at least 1, got {0}")]
  InvalidCapacity(usize),

  #[error("Pool's internal result queue was closed while tasks were still outstanding")]
  ResultChannelClosed,

  #[error("Pool's admission semaphore was closed unexpectedly")]
  AdmissionClosed,
}

/// The failure half of a task outcome.
///
/// The pool never inspects these beyond counting them; they exist so task bodies
/// and wrappers can say why they failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
  #[error("Task failed: {0}")]
  Failed(String),

  #[error("Task did not report an outcome within {0:?}")]
  TimedOut(Duration),

  #[error("Task body panicked")]
  Panicked,

  #[error("Task body finished without reporting an outcome")]
  Abandoned,
}
