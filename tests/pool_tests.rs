use active_pool::{ActivePool, PoolConfig, PoolError, RunSummary, TaskResult};
use rand::Rng;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::{sleep, timeout};

// Guards every run so a stuck pool fails the test instead of hanging it.
const RUN_DEADLINE: Duration = Duration::from_secs(10);

fn setup_tracing_for_test() {
  use std::sync::Once;
  use tracing_subscriber::{fmt, EnvFilter};
  static TRACING_INIT: Once = Once::new();

  TRACING_INIT.call_once(|| {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,active_pool=debug"));

    fmt::Subscriber::builder()
      .with_env_filter(filter)
      .with_test_writer()
      .try_init()
      .ok();
  });
}

/// Tracks how many instrumented tasks are inside their body and the highest value seen.
#[derive(Clone, Default)]
struct ConcurrencyProbe {
  current: Arc<AtomicUsize>,
  max_seen: Arc<AtomicUsize>,
}

impl ConcurrencyProbe {
  fn enter(&self) {
    let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
    self.max_seen.fetch_max(now, Ordering::SeqCst);
  }

  fn exit(&self) {
    self.current.fetch_sub(1, Ordering::SeqCst);
  }

  fn max_seen(&self) -> usize {
    self.max_seen.load(Ordering::SeqCst)
  }
}

async fn run_with_deadline(pool: &mut ActivePool) -> RunSummary {
  timeout(RUN_DEADLINE, pool.run())
    .await
    .expect("run did not finish in time")
    .expect("run returned a pool error")
}

fn add_delayed(pool: &mut ActivePool, probe: &ConcurrencyProbe, delay_ms: u64, succeed: bool) {
  let probe = probe.clone();
  pool.add_work(move |result: TaskResult| async move {
    probe.enter();
    sleep(Duration::from_millis(delay_ms)).await;
    probe.exit();
    if succeed {
      result.succeed();
    } else {
      result.fail("intentional failure");
    }
  });
}

#[tokio::test]
async fn test_empty_run_returns_zero_without_blocking() {
  setup_tracing_for_test();
  let mut pool = ActivePool::new(3).unwrap();

  let summary = timeout(Duration::from_millis(100), pool.run())
    .await
    .expect("empty run must not block")
    .unwrap();
  assert_eq!(summary.as_tuple(), (0, 0));
}

#[tokio::test]
async fn test_immediate_successes_are_all_counted() {
  setup_tracing_for_test();
  let mut pool = ActivePool::new(4).unwrap();
  for _ in 0..5 {
    pool.add_work(|result: TaskResult| async move { result.succeed() });
  }
  assert_eq!(pool.pending_task_count(), 5);

  let summary = run_with_deadline(&mut pool).await;
  assert_eq!(summary.as_tuple(), (5, 5));
  assert_eq!(pool.pending_task_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_random_delays_respect_capacity() {
  setup_tracing_for_test();
  let mut pool = ActivePool::new(2).unwrap();
  let probe = ConcurrencyProbe::default();

  for _ in 0..10 {
    let delay_ms = rand::rng().random_range(0..10u64);
    add_delayed(&mut pool, &probe, delay_ms, true);
  }

  let summary = run_with_deadline(&mut pool).await;
  assert_eq!(summary.as_tuple(), (10, 10));
  assert!(probe.max_seen() <= 2, "observed {} tasks in flight", probe.max_seen());
  assert!(probe.max_seen() >= 1);
}

#[tokio::test]
async fn test_all_failures_are_counted_as_completed() {
  setup_tracing_for_test();
  let mut pool = ActivePool::new(2).unwrap();
  for i in 0..10 {
    pool.add_work(move |result: TaskResult| async move { result.fail(format!("task {} failed", i)) });
  }

  let summary = run_with_deadline(&mut pool).await;
  assert_eq!(summary.as_tuple(), (10, 0));
  assert_eq!(summary.failed(), 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_failures_do_not_abort_other_tasks() {
  setup_tracing_for_test();
  let mut pool = ActivePool::new(3).unwrap();
  let probe = ConcurrencyProbe::default();
  let finished = Arc::new(AtomicUsize::new(0));

  for i in 0..12u64 {
    let finished = finished.clone();
    let probe = probe.clone();
    pool.add_work(move |result: TaskResult| async move {
      probe.enter();
      sleep(Duration::from_millis(i % 4)).await;
      probe.exit();
      finished.fetch_add(1, Ordering::SeqCst);
      if i % 3 == 0 {
        result.fail("every third task fails");
      } else {
        result.succeed();
      }
    });
  }

  let summary = run_with_deadline(&mut pool).await;
  assert_eq!(summary.as_tuple(), (12, 8));
  assert_eq!(finished.load(Ordering::SeqCst), 12);
  assert!(probe.max_seen() <= 3);
}

#[tokio::test]
async fn test_registration_order_does_not_change_counts() {
  setup_tracing_for_test();
  let outcomes = [true, false, true, true, false, true, false];

  let mut forward = ActivePool::new(2).unwrap();
  let mut backward = ActivePool::new(2).unwrap();
  let probe = ConcurrencyProbe::default();
  for (i, succeed) in outcomes.iter().enumerate() {
    add_delayed(&mut forward, &probe, i as u64, *succeed);
  }
  for (i, succeed) in outcomes.iter().rev().enumerate() {
    add_delayed(&mut backward, &probe, i as u64, *succeed);
  }

  let forward_summary = run_with_deadline(&mut forward).await;
  let backward_summary = run_with_deadline(&mut backward).await;
  assert_eq!(forward_summary, backward_summary);
  assert_eq!(forward_summary.as_tuple(), (7, 4));
}

#[tokio::test]
async fn test_tasks_are_admitted_in_registration_order() {
  setup_tracing_for_test();
  let mut pool = ActivePool::new(1).unwrap();
  let started = Arc::new(Mutex::new(Vec::new()));

  for i in 0..6usize {
    let started = started.clone();
    pool.add_work(move |result: TaskResult| async move {
      assert_eq!(result.task_index(), i);
      started.lock().unwrap().push(i);
      sleep(Duration::from_millis(1)).await;
      result.succeed();
    });
  }

  let summary = run_with_deadline(&mut pool).await;
  assert_eq!(summary.as_tuple(), (6, 6));
  assert_eq!(*started.lock().unwrap(), vec![0, 1, 2, 3, 4, 5]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_completed_matches_task_count_across_capacities() {
  setup_tracing_for_test();
  for capacity in 1..=4usize {
    for task_count in [0usize, 1, 3, 7, 16] {
      let mut pool = ActivePool::new(capacity).unwrap();
      let probe = ConcurrencyProbe::default();
      for i in 0..task_count {
        add_delayed(&mut pool, &probe, (i % 3) as u64, i % 2 == 0);
      }

      let summary = run_with_deadline(&mut pool).await;
      assert_eq!(summary.completed, task_count, "capacity {}", capacity);
      assert_eq!(summary.succeeded, task_count.div_ceil(2), "capacity {}", capacity);
      assert!(probe.max_seen() <= capacity, "capacity {} saw {}", capacity, probe.max_seen());
    }
  }
}

#[tokio::test]
async fn test_capacity_larger_than_batch() {
  setup_tracing_for_test();
  let mut pool = ActivePool::new(16).unwrap();
  let probe = ConcurrencyProbe::default();
  for _ in 0..3 {
    add_delayed(&mut pool, &probe, 5, true);
  }

  let summary = run_with_deadline(&mut pool).await;
  assert_eq!(summary.as_tuple(), (3, 3));
  assert!(probe.max_seen() <= 3);
}

#[tokio::test]
async fn test_pool_is_reusable_after_a_run() {
  setup_tracing_for_test();
  let mut pool = ActivePool::new(2).unwrap();
  let probe = ConcurrencyProbe::default();

  for i in 0..10 {
    add_delayed(&mut pool, &probe, 2, i < 4);
  }
  let first = run_with_deadline(&mut pool).await;
  assert_eq!(first.as_tuple(), (10, 4));
  assert_eq!(pool.pending_task_count(), 0);

  // Nothing carries over into an empty second run.
  let empty = run_with_deadline(&mut pool).await;
  assert_eq!(empty.as_tuple(), (0, 0));

  let mut fresh = ActivePool::new(2).unwrap();
  for i in 0..5 {
    add_delayed(&mut pool, &probe, 1, i != 2);
    add_delayed(&mut fresh, &probe, 1, i != 2);
  }
  let reused = run_with_deadline(&mut pool).await;
  let first_time = run_with_deadline(&mut fresh).await;
  assert_eq!(reused, first_time);
  assert_eq!(reused.as_tuple(), (5, 4));
  assert!(probe.max_seen() <= 2);
}

#[tokio::test]
async fn test_reset_discards_registered_tasks() {
  setup_tracing_for_test();
  let mut pool = ActivePool::new(2).unwrap();
  let ran = Arc::new(AtomicUsize::new(0));
  for _ in 0..4 {
    let ran = ran.clone();
    pool.add_work(move |result: TaskResult| async move {
      ran.fetch_add(1, Ordering::SeqCst);
      result.succeed();
    });
  }

  pool.reset();
  assert_eq!(pool.pending_task_count(), 0);

  let summary = run_with_deadline(&mut pool).await;
  assert_eq!(summary.as_tuple(), (0, 0));
  assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_shutdown_reports_discarded_tasks() {
  setup_tracing_for_test();
  let mut pool = ActivePool::with_config(PoolConfig::new(2).with_name("test_pool_shutdown")).unwrap();
  assert_eq!(pool.name(), "test_pool_shutdown");
  pool.add_work(|result: TaskResult| async move { result.succeed() });
  pool.add_work(|result: TaskResult| async move { result.succeed() });

  assert_eq!(pool.shutdown(), 2);
}

#[tokio::test]
async fn test_zero_capacity_config_is_rejected() {
  setup_tracing_for_test();
  let err = ActivePool::with_config(PoolConfig::new(0).with_name("test_pool_zero")).unwrap_err();
  assert_eq!(err, PoolError::InvalidCapacity(0));
}

#[test]
fn test_tasks_spawn_on_configured_runtime() {
  setup_tracing_for_test();
  let task_runtime = tokio::runtime::Builder::new_multi_thread()
    .worker_threads(2)
    .thread_name("pool-task-runtime")
    .enable_all()
    .build()
    .unwrap();
  let driver_runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();

  let config = PoolConfig::new(2)
    .with_name("test_pool_handle")
    .with_tokio_handle(task_runtime.handle().clone());
  let mut pool = ActivePool::with_config(config).unwrap();
  let on_task_runtime = Arc::new(AtomicUsize::new(0));

  for _ in 0..4 {
    let on_task_runtime = on_task_runtime.clone();
    pool.add_work(move |result: TaskResult| async move {
      if std::thread::current().name() == Some("pool-task-runtime") {
        on_task_runtime.fetch_add(1, Ordering::SeqCst);
      }
      result.succeed();
    });
  }

  let summary = driver_runtime.block_on(async { run_with_deadline(&mut pool).await });
  assert_eq!(summary.as_tuple(), (4, 4));
  assert_eq!(on_task_runtime.load(Ordering::SeqCst), 4);
}
