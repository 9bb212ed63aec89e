use crate::error::TaskError;

use std::future::Future;
use std::pin::Pin;

use futures::FutureExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{error, trace, warn};

/// The single outcome a task reports. `Ok(())` counts as a success, any `Err` as a failure.
pub type TaskOutcome = Result<(), TaskError>;

/// The future a task body runs as once it has been admitted.
pub type TaskFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A registered unit of work.
///
/// It is invoked exactly once, with the [`TaskResult`] it must report through,
/// and yields the future that performs the work.
pub type TaskToExecute = Box<dyn FnOnce(TaskResult) -> TaskFuture + Send + 'static>;

/// What travels over the result queue: the admission index of the task and its outcome.
pub(crate) type ResultMessage = (usize, TaskOutcome);

pub(crate) fn boxed_task<F, Fut>(task_fn: F) -> TaskToExecute
where
  F: FnOnce(TaskResult) -> Fut + Send + 'static,
  Fut: Future<Output = ()> + Send + 'static,
{
  Box::new(move |reporter| task_fn(reporter).boxed())
}

/// Write-only reporter handed to every admitted task.
///
/// Reporting consumes the reporter, so a task can report at most once. A task that
/// drops its reporter without reporting leaves the run waiting for it forever; wrap
/// such bodies with [`with_timeout`](crate::with_timeout) if that can happen.
#[derive(Debug)]
pub struct TaskResult {
  task_index: usize,
  tx: mpsc::Sender<ResultMessage>,
}

impl TaskResult {
  pub(crate) fn new(task_index: usize, tx: mpsc::Sender<ResultMessage>) -> Self {
    Self { task_index, tx }
  }

  /// Position of the task in the batch it was registered with.
  pub fn task_index(&self) -> usize {
    self.task_index
  }

  /// Reports the task's outcome. Never blocks.
  ///
  /// The result queue holds as many entries as the pool has admission slots, and a slot
  /// is only handed back once its result has been drained, so there is always room.
  pub fn report(self, outcome: TaskOutcome) {
    let task_index = self.task_index;
    match self.tx.try_send((task_index, outcome)) {
      Ok(()) => trace!(task_index, "Outcome queued."),
      Err(TrySendError::Closed((_, outcome))) => {
        warn!(
          task_index,
          ?outcome,
          "Result receiver was dropped before the task reported. Outcome discarded."
        );
      }
      Err(TrySendError::Full((_, outcome))) => {
        error!(
          task_index,
          ?outcome,
          "Result queue full; more tasks in flight than admission slots. Outcome discarded."
        );
      }
    }
  }

  /// Shorthand for `report(Ok(()))`.
  pub fn succeed(self) {
    self.report(Ok(()))
  }

  /// Shorthand for reporting [`TaskError::Failed`] with the given reason.
  pub fn fail(self, reason: impl Into<String>) {
    self.report(Err(TaskError::Failed(reason.into())))
  }
}
