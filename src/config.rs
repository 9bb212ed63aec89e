use std::time::Duration;

use tokio::runtime::Handle as TokioHandle;

/// Name used in log output when none is configured.
pub const DEFAULT_POOL_NAME: &str = "active_pool";

/// Construction-time settings for an [`ActivePool`](crate::ActivePool).
///
/// Only `capacity` is required. It is validated by [`ActivePool::with_config`](crate::ActivePool::with_config).
#[derive(Debug, Clone)]
pub struct PoolConfig {
  /// Maximum number of tasks allowed to run at the same time.
  pub capacity: usize,
  /// Label attached to every log event the pool emits.
  pub name: String,
  /// When set, every registered task is wrapped with [`with_timeout`](crate::with_timeout).
  pub task_timeout: Option<Duration>,
  /// Runtime the tasks are spawned on. `None` uses the runtime driving `run`.
  pub tokio_handle: Option<TokioHandle>,
}

impl PoolConfig {
  pub fn new(capacity: usize) -> Self {
    Self {
      capacity,
      name: DEFAULT_POOL_NAME.to_string(),
      task_timeout: None,
      tokio_handle: None,
    }
  }

  pub fn with_name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
    self.task_timeout = Some(timeout);
    self
  }

  pub fn with_tokio_handle(mut self, handle: TokioHandle) -> Self {
    self.tokio_handle = Some(handle);
    self
  }
}
