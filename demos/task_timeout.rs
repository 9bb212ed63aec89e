use active_pool::{ActivePool, PoolConfig, TaskResult};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Task Timeout Example ---");

  let config = PoolConfig::new(2)
    .with_name("timeout_pool")
    .with_task_timeout(Duration::from_millis(200));
  let mut pool = ActivePool::with_config(config).expect("valid config");

  for i in 0..4u64 {
    pool.add_work(move |result: TaskResult| async move {
      // Odd tasks take far longer than the deadline and get cut off.
      let work = if i % 2 == 0 { Duration::from_millis(50) } else { Duration::from_secs(30) };
      tokio::time::sleep(work).await;
      result.succeed();
    });
  }

  let summary = pool.run().await.expect("run failed");
  info!("{} completed, {} succeeded, {} timed out.", summary.completed, summary.succeeded, summary.failed());
  info!("--- Task Timeout Example End ---");
}
