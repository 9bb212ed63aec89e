use active_pool::{ActivePool, TaskResult};
use std::time::Duration;
use tracing::info;

async fn fetch(id: usize) -> Result<String, String> {
  tokio::time::sleep(Duration::from_millis(50 * (id as u64 % 3 + 1))).await;
  if id % 4 == 3 {
    Err(format!("resource {} unavailable", id))
  } else {
    Ok(format!("resource {} fetched", id))
  }
}

#[tokio::main]
async fn main() {
  tracing_subscriber::fmt()
    .with_max_level(tracing::Level::DEBUG)
    .with_target(false)
    .init();

  info!("--- Basic Usage Example ---");

  let mut pool = ActivePool::new(3).expect("capacity is non-zero");

  for id in 0..8 {
    pool.add_work(move |result: TaskResult| async move {
      match fetch(id).await {
        Ok(body) => {
          info!("{}", body);
          result.succeed();
        }
        Err(reason) => result.fail(reason),
      }
    });
  }

  match pool.run().await {
    Ok(summary) => info!(
      "Run complete: {} completed, {} succeeded, {} failed.",
      summary.completed,
      summary.succeeded,
      summary.failed()
    ),
    Err(e) => tracing::error!("Run failed: {:?}", e),
  }

  info!("--- Basic Usage Example End ---");
}
