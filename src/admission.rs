use crate::error::PoolError;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};

/// One unit of concurrency budget. Dropping it hands the slot back to the gate.
#[derive(Debug)]
pub(crate) struct AdmissionToken {
  _permit: OwnedSemaphorePermit,
}

/// Counting semaphore guarding task admission.
///
/// Holds exactly `capacity` tokens. Tokens are kept by the run loop, not by the tasks,
/// and are dropped one per drained result.
#[derive(Debug)]
pub(crate) struct AdmissionGate {
  semaphore: Arc<Semaphore>,
  capacity: usize,
}

impl AdmissionGate {
  pub(crate) fn new(capacity: usize) -> Self {
    Self {
      semaphore: Arc::new(Semaphore::new(capacity)),
      capacity,
    }
  }

  pub(crate) fn capacity(&self) -> usize {
    self.capacity
  }

  /// Number of tokens currently handed out.
  pub(crate) fn in_flight(&self) -> usize {
    self.capacity - self.semaphore.available_permits()
  }

  /// Takes a token without waiting. `Ok(None)` means every token is out.
  pub(crate) fn try_admit(&self) -> Result<Option<AdmissionToken>, PoolError> {
    match self.semaphore.clone().try_acquire_owned() {
      Ok(permit) => Ok(Some(AdmissionToken { _permit: permit })),
      Err(TryAcquireError::NoPermits) => Ok(None),
      Err(TryAcquireError::Closed) => Err(PoolError::AdmissionClosed),
    }
  }

  /// Resolves as soon as a token is free. The returned future does not borrow the gate.
  pub(crate) fn admit(&self) -> impl Future<Output = Result<AdmissionToken, PoolError>> + Send + 'static {
    let semaphore = self.semaphore.clone();
    async move {
      semaphore
        .acquire_owned()
        .await
        .map(|permit| AdmissionToken { _permit: permit })
        .map_err(|_| PoolError::AdmissionClosed)
    }
  }
}
