use crate::admission::{AdmissionGate, AdmissionToken};
use crate::config::PoolConfig;
use crate::error::PoolError;
use crate::task::{boxed_task, ResultMessage, TaskResult, TaskToExecute};
use crate::timeout::with_timeout;

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle as TokioHandle;
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, trace, warn, Instrument};

lazy_static::lazy_static! {
  static ref NEXT_RUN_ID_COUNTER: AtomicU64 = AtomicU64::new(0);
}

/// Counts returned by [`ActivePool::run`].
///
/// `succeeded <= completed`, and after a successful run `completed` equals the number
/// of tasks that were registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
  pub completed: usize,
  pub succeeded: usize,
}

impl RunSummary {
  pub fn failed(&self) -> usize {
    self.completed.saturating_sub(self.succeeded)
  }

  /// `(completed, succeeded)`
  pub fn as_tuple(&self) -> (usize, usize) {
    (self.completed, self.succeeded)
  }
}

/// The admission gate and result queue one run consumes. A fresh set is built for every run.
struct RunChannels {
  gate: AdmissionGate,
  result_tx: mpsc::Sender<ResultMessage>,
  result_rx: mpsc::Receiver<ResultMessage>,
}

impl RunChannels {
  fn new(capacity: usize) -> Self {
    let (result_tx, result_rx) = mpsc::channel(capacity);
    Self {
      gate: AdmissionGate::new(capacity),
      result_tx,
      result_rx,
    }
  }
}

/// Runs a batch of registered tasks with at most `capacity` of them executing at once.
///
/// Register tasks with [`add_work`](Self::add_work), then await [`run`](Self::run). The
/// pool resets itself after every run and can take a new batch straight away. Mutating
/// operations take `&mut self`, so only one coordinating context can drive a pool.
pub struct ActivePool {
  pool_name: Arc<String>,
  capacity: usize,
  task_timeout: Option<Duration>,
  tokio_handle: Option<TokioHandle>,
  task_list: Vec<TaskToExecute>,
  channels: RunChannels,
}

impl fmt::Debug for ActivePool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ActivePool")
      .field("pool_name", &self.pool_name)
      .field("capacity", &self.capacity)
      .field("task_timeout", &self.task_timeout)
      .field("pending_tasks", &self.task_list.len())
      .finish_non_exhaustive()
  }
}

impl ActivePool {
  /// Creates a pool that runs at most `capacity` tasks at a time.
  ///
  /// # Errors
  /// Returns `PoolError::InvalidCapacity` if `capacity` is zero.
  pub fn new(capacity: usize) -> Result<Self, PoolError> {
    Self::with_config(PoolConfig::new(capacity))
  }

  /// Creates a pool from a full [`PoolConfig`].
  ///
  /// # Errors
  /// Returns `PoolError::InvalidCapacity` if `config.capacity` is zero.
  pub fn with_config(config: PoolConfig) -> Result<Self, PoolError> {
    if config.capacity == 0 {
      warn!(pool_name = %config.name, "Rejected pool configuration with zero capacity.");
      return Err(PoolError::InvalidCapacity(config.capacity));
    }

    info!(
      pool_name = %config.name,
      capacity = config.capacity,
      task_timeout = ?config.task_timeout,
      "Pool created."
    );

    Ok(Self {
      pool_name: Arc::new(config.name),
      capacity: config.capacity,
      task_timeout: config.task_timeout,
      tokio_handle: config.tokio_handle,
      task_list: Vec::new(),
      channels: RunChannels::new(config.capacity),
    })
  }

  pub fn name(&self) -> &str {
    &self.pool_name
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Number of tasks registered for the next run.
  pub fn pending_task_count(&self) -> usize {
    self.task_list.len()
  }

  /// Registers a task for the next run.
  ///
  /// The closure is called once the task is admitted and must make its future report
  /// exactly one outcome through the [`TaskResult`] it is given. Nothing runs until
  /// [`run`](Self::run) is awaited.
  pub fn add_work<F, Fut>(&mut self, task_fn: F)
  where
    F: FnOnce(TaskResult) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
  {
    self.add_task(boxed_task(task_fn));
  }

  /// Registers an already boxed task. Applies the configured per-task timeout, if any.
  pub fn add_task(&mut self, task: TaskToExecute) {
    let task = match self.task_timeout {
      Some(timeout) => with_timeout(timeout, task),
      None => task,
    };
    self.task_list.push(task);
    trace!(pool_name = %self.pool_name, pending = self.task_list.len(), "Task registered.");
  }

  /// Runs every registered task to completion and returns the tally.
  ///
  /// Tasks are admitted in registration order, never more than `capacity` at a time,
  /// and may finish in any order. Failed tasks are counted, not retried, and do not stop
  /// the others. Once this returns the pending list is empty and the internal channels
  /// have been replaced, so the pool is ready for a new batch.
  ///
  /// A task that never reports leaves this future pending forever. Dropping the future
  /// mid-run discards the rest of the batch; tasks already started keep running.
  ///
  /// # Errors
  /// Returns `PoolError::ResultChannelClosed` or `PoolError::AdmissionClosed` if an
  /// internal channel closes mid-run. Neither happens while the pool is alive.
  pub async fn run(&mut self) -> Result<RunSummary, PoolError> {
    let run_id = NEXT_RUN_ID_COUNTER.fetch_add(1, AtomicOrdering::Relaxed);
    let tasks = std::mem::take(&mut self.task_list);
    let channels = std::mem::replace(&mut self.channels, RunChannels::new(self.capacity));
    let total = tasks.len();

    Self::drive(self.pool_name.clone(), self.tokio_handle.clone(), tasks, channels)
      .instrument(info_span!("active_pool_run", pool_name = %self.pool_name, run_id, total))
      .await
  }

  async fn drive(
    pool_name: Arc<String>,
    tokio_handle: Option<TokioHandle>,
    tasks: Vec<TaskToExecute>,
    channels: RunChannels,
  ) -> Result<RunSummary, PoolError> {
    let RunChannels {
      gate,
      result_tx,
      mut result_rx,
    } = channels;
    let total = tasks.len();
    let mut summary = RunSummary::default();

    if total == 0 {
      info!("No tasks registered. Nothing to run.");
      return Ok(summary);
    }
    info!(capacity = gate.capacity(), "Run started.");

    let mut pending = tasks.into_iter().enumerate();
    let mut started = 0usize;
    let mut held: Vec<AdmissionToken> = Vec::with_capacity(gate.capacity());

    loop {
      // Fill every free slot without waiting before racing results against admission.
      while started < total {
        let Some(token) = gate.try_admit()? else {
          break;
        };
        let Some((task_index, task)) = pending.next() else {
          break;
        };
        held.push(token);
        started += 1;
        Self::launch(&pool_name, &tokio_handle, &result_tx, task_index, task);
        trace!(task_index, in_flight = gate.in_flight(), "Task admitted without waiting.");
      }

      tokio::select! {
        received = result_rx.recv() => {
          let (task_index, outcome) = received.ok_or(PoolError::ResultChannelClosed)?;
          summary.completed += 1;
          match outcome {
            Ok(()) => {
              summary.succeeded += 1;
              debug!(task_index, completed = summary.completed, "Task succeeded.");
            }
            Err(task_error) => {
              warn!(task_index, completed = summary.completed, "Task failed: {}", task_error);
            }
          }

          if summary.completed == total {
            break;
          }

          drop(held.pop());
          trace!(in_flight = gate.in_flight(), "Admission token released.");
        }

        admitted = gate.admit(), if started < total => {
          let token = admitted?;
          if let Some((task_index, task)) = pending.next() {
            held.push(token);
            started += 1;
            Self::launch(&pool_name, &tokio_handle, &result_tx, task_index, task);
            debug!(task_index, in_flight = gate.in_flight(), "Task admitted.");
          }
        }
      }
    }

    info!(
      completed = summary.completed,
      succeeded = summary.succeeded,
      failed = summary.failed(),
      "Run finished."
    );
    Ok(summary)
  }

  fn launch(
    pool_name: &Arc<String>,
    tokio_handle: &Option<TokioHandle>,
    result_tx: &mpsc::Sender<ResultMessage>,
    task_index: usize,
    task: TaskToExecute,
  ) {
    let reporter = TaskResult::new(task_index, result_tx.clone());
    let task_future = task(reporter).instrument(info_span!("pooled_task", pool_name = %pool_name, task_index));
    match tokio_handle {
      Some(handle) => {
        handle.spawn(task_future);
      }
      None => {
        tokio::spawn(task_future);
      }
    }
  }

  /// Discards any registered tasks and rebuilds the internal channels.
  ///
  /// [`run`](Self::run) does this on its own; call it to drop a batch without running it.
  pub fn reset(&mut self) {
    let discarded = self.task_list.len();
    self.task_list.clear();
    self.channels = RunChannels::new(self.capacity);
    debug!(pool_name = %self.pool_name, discarded, "Pool reset.");
  }

  /// Tears the pool down for good and returns how many registered tasks never ran.
  pub fn shutdown(self) -> usize {
    let discarded = self.task_list.len();
    info!(pool_name = %self.pool_name, discarded, "Pool shut down.");
    discarded
  }
}
