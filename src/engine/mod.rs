//! Download engine: sequential batches fanned out over a bounded worker pool.
//!
//! Split into focused submodules:
//! - [`context`] - Read-only run state shared by workers, plus the shared ledger
//! - [`batching`] - Partitioning the record set into batches
//! - [`pool`] - Bounded worker pool with a barrier at the end of each batch
//! - [`record_task`] - Per-record download, ledger update and progress

mod batching;
mod context;
mod pool;
mod record_task;


use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::progress::ProgressCounter;
use crate::types::Record;

pub use batching::{batch_count, partition_batches};
pub use context::EngineContext;
pub use pool::WorkerPool;

/// Counts from one engine run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineSummary {
    /// Batches processed
    pub batches: usize,
    /// Records whose task ran to completion
    pub processed: usize,
}

/// Runs every record through download and ledger update, batch by batch.
#[derive(Debug)]
pub struct DownloadEngine {
    ctx: Arc<EngineContext>,
    batch_size: usize,
    pool: WorkerPool,
    quiet: bool,
}

impl DownloadEngine {
    /// Create an engine processing `batch_size` records per batch over `worker_count` workers.
    pub fn new(ctx: EngineContext, batch_size: usize, worker_count: usize) -> Self {
        Self {
            ctx: Arc::new(ctx),
            batch_size: batch_size.max(1),
            pool: WorkerPool::new(worker_count),
            quiet: false,
        }
    }

    /// Suppress the console progress line (tracing events are still emitted).
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Shared context
    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// Process all `records` and write the final ledger snapshot to `ledger_path`.
    ///
    /// Batch N finishes completely before batch N+1 starts; the snapshot is
    /// written after the last batch has drained. Every record must already
    /// have a seeded ledger row.
    pub async fn run(&self, records: Vec<Record>, ledger_path: &Path) -> Result<EngineSummary> {
        let total = records.len();
        let progress = Arc::new(if self.quiet {
            ProgressCounter::quiet(total)
        } else {
            ProgressCounter::new(total)
        });

        let batches = partition_batches(&records, self.batch_size);
        let total_batches = batches.len();
        tracing::info!(
            total_batches,
            batch_size = self.batch_size,
            workers = self.pool.workers(),
            "Total batches to process"
        );

        let mut processed = 0;
        for (index, batch) in batches.into_iter().enumerate() {
            tracing::info!(
                batch = index + 1,
                total_batches,
                records = batch.len(),
                "Processing batch"
            );

            let ctx = Arc::clone(&self.ctx);
            let progress_for_batch = Arc::clone(&progress);
            processed += self
                .pool
                .run_batch(batch, move |record| {
                    let ctx = Arc::clone(&ctx);
                    let progress = Arc::clone(&progress_for_batch);
                    async move { record_task::process_record(&ctx, &progress, record).await }
                })
                .await;
        }
        progress.finish();

        self.ctx.ledger.write_snapshot(ledger_path).await?;
        tracing::info!(
            processed,
            total,
            ledger = %ledger_path.display(),
            "Download process completed"
        );

        Ok(EngineSummary {
            batches: total_batches,
            processed,
        })
    }
}
