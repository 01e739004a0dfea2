//! Bounded execution context for remote calls
//!
//! A fixed number of permits limits how many remote calls are outstanding at
//! once. Acquiring a permit suspends the submitter while the pool is
//! saturated, which is the engine's only backpressure mechanism. A permit is
//! held for the whole call, including any retry sleep inside it.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::{Result, UploadError};

/// Semaphore-bounded pool of remote-call slots
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Creates a pool with `size` slots (at least one)
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Pool sized at twice the available parallelism
    pub fn with_default_size() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(cpus * 2)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Slots currently free
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Runs `work` on the calling task once a slot is free
    pub async fn run<F, T>(&self, work: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| UploadError::PoolClosed)?;
        work.await
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::with_default_size()
    }
}
