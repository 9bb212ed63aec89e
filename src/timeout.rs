use crate::error::TaskError;
use crate::task::{TaskResult, TaskToExecute};

use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Wraps `task` so that it always reports exactly one outcome within `timeout`.
///
/// The body runs as its own Tokio task with a private reporter. The first outcome it
/// reports is forwarded to the pool straight away. Otherwise the wrapper reports:
///
/// * [`TaskError::TimedOut`] if the deadline passes first,
/// * [`TaskError::Panicked`] if the body panicked before reporting,
/// * [`TaskError::Abandoned`] if the body returned without reporting.
///
/// A body still running once the outcome is known is aborted, and the wrapper waits for
/// it to stop before reporting, so it cannot outlive the admission slot it was given.
pub fn with_timeout(timeout: Duration, task: TaskToExecute) -> TaskToExecute {
  Box::new(move |reporter: TaskResult| {
    async move {
      let task_index = reporter.task_index();
      let (inner_tx, mut inner_rx) = mpsc::channel(1);
      let mut body = tokio::spawn(task(TaskResult::new(task_index, inner_tx)));
      let deadline = tokio::time::sleep(timeout);
      tokio::pin!(deadline);
      let mut body_finished = false;

      let outcome = tokio::select! {
        biased;

        Some((_, outcome)) = inner_rx.recv() => outcome,

        joined = &mut body => {
          body_finished = true;
          match (inner_rx.try_recv(), joined) {
            (Ok((_, outcome)), _) => outcome,
            (Err(_), Ok(())) => {
              warn!(task_index, "Task body returned without reporting an outcome.");
              Err(TaskError::Abandoned)
            }
            (Err(_), Err(join_error)) if join_error.is_panic() => {
              warn!(task_index, "Task body panicked before reporting.");
              Err(TaskError::Panicked)
            }
            (Err(_), Err(join_error)) => {
              warn!(task_index, "Task body was cancelled by the runtime: {}", join_error);
              Err(TaskError::Abandoned)
            }
          }
        }

        _ = &mut deadline => {
          debug!(task_index, ?timeout, "Task body exceeded its deadline.");
          Err(TaskError::TimedOut(timeout))
        }
      };

      if !body_finished {
        body.abort();
        if let Err(join_error) = body.await {
          trace!(task_index, "Task body stopped: {}", join_error);
        }
      }

      reporter.report(outcome);
    }
    .boxed()
  })
}
