use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Bounds how many encodes run at once across all requests.
///
/// Callers hold the returned permit for the lifetime of the encode; dropping
/// it (including on cancellation) frees the slot.
#[derive(Debug, Clone)]
pub struct TranscodePool {
    semaphore: Arc<Semaphore>,
    capacity: usize,
}

impl TranscodePool {
    pub fn new(max_concurrent: usize) -> Self {
        let capacity = max_concurrent.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, AcquireError> {
        let permit = self.semaphore.clone().acquire_owned().await?;
        tracing::debug!(
            available = self.semaphore.available_permits(),
            capacity = self.capacity,
            "Transcode slot acquired"
        );
        Ok(permit)
    }

    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
