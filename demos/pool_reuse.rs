use active_pool::{ActivePool, TaskResult};
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::INFO)
    .with_target(false)
    .init();

  info!("--- Pool Reuse Example ---");

  let mut pool = ActivePool::new(4).expect("capacity is non-zero");

  for batch in 0..3usize {
    for i in 0..(batch + 1) * 5 {
      pool.add_work(move |result: TaskResult| async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        if (i + batch) % 5 == 0 {
          result.fail(format!("batch {} task {} failed", batch, i));
        } else {
          result.succeed();
        }
      });
    }
    let summary = pool.run().await.expect("run failed");
    info!("Batch {}: {:?}", batch, summary);
  }

  pool.add_work(|result: TaskResult| async move { result.succeed() });
  let discarded = pool.shutdown();
  info!("Shut down with {} task(s) never run.", discarded);
  info!("--- Pool Reuse Example End ---");
}
