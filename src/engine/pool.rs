//! Bounded worker pool that runs one batch of per-record tasks to completion.

use std::future::Future;

use futures::stream::{self, StreamExt};

/// Runs at most `workers` tasks at a time and returns only after every task
/// in the batch has finished.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    /// Create a pool of `workers` slots (at least one)
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    /// Number of concurrent slots
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Spawn `task(item)` for every item, holding at most `workers` in flight.
    ///
    /// Each task runs on the runtime's thread pool. Completion order is
    /// unspecified. Returns the number of tasks that finished without panicking;
    /// panics are logged and do not abort the rest of the batch.
    pub async fn run_batch<T, F, Fut>(&self, items: Vec<T>, task: F) -> usize
    where
        T: Send + 'static,
        F: Fn(T) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let results: Vec<_> = stream::iter(items)
            .map(|item| tokio::spawn(task(item)))
            .buffer_unordered(self.workers)
            .collect()
            .await;

        results
            .into_iter()
            .filter(|result| match result {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(error = %e, "Worker task panicked");
                    false
                }
            })
            .count()
    }
}
