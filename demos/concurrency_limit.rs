use active_pool::{ActivePool, PoolConfig, TaskResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::INFO)
    .with_target(false)
    .init();

  let capacity = 2;
  let num_tasks = 6;
  info!("--- Concurrency Limit Example (Limit: {}) ---", capacity);
  info!(
    "Running {} tasks of 1 sec each. With capacity {}, this should take ~{} secs.",
    num_tasks,
    capacity,
    (num_tasks as f32 / capacity as f32).ceil()
  );

  let mut pool = ActivePool::with_config(PoolConfig::new(capacity).with_name("concurrency_pool")).expect("valid config");
  let in_flight = Arc::new(AtomicUsize::new(0));
  let max_seen = Arc::new(AtomicUsize::new(0));

  for i in 0..num_tasks {
    let in_flight = in_flight.clone();
    let max_seen = max_seen.clone();
    pool.add_work(move |result: TaskResult| async move {
      let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
      max_seen.fetch_max(now, Ordering::SeqCst);
      info!("Task {} started ({} in flight)", i, now);
      tokio::time::sleep(Duration::from_secs(1)).await;
      in_flight.fetch_sub(1, Ordering::SeqCst);
      result.succeed();
    });
  }

  let started = Instant::now();
  let summary = pool.run().await.expect("run failed");
  info!(
    "Finished {:?} in {:.1}s, max in flight {}.",
    summary.as_tuple(),
    started.elapsed().as_secs_f32(),
    max_seen.load(Ordering::SeqCst)
  );
  info!("--- Concurrency Limit Example End ---");
}
