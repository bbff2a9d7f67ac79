//! Console progress reporting

use std::io::Write;

use tokio::sync::Mutex;
use tracing::debug;

/// Counts completed records and prints a single rewriting progress line.
///
/// Its lock is independent of the ledger lock. The counter is informational
/// only; nothing downstream depends on its value.
#[derive(Debug)]
pub struct ProgressCounter {
    total: usize,
    completed: Mutex<usize>,
    quiet: bool,
}

impl ProgressCounter {
    /// Create a counter for `total` records that prints to stdout
    pub fn new(total: usize) -> Self {
        Self {
            total,
            completed: Mutex::new(0),
            quiet: false,
        }
    }

    /// Create a counter that only emits tracing events
    pub fn quiet(total: usize) -> Self {
        Self {
            quiet: true,
            ..Self::new(total)
        }
    }

    /// Number of records the run will process
    pub fn total(&self) -> usize {
        self.total
    }

    /// Records completed so far
    pub async fn completed(&self) -> usize {
        *self.completed.lock().await
    }

    /// Count one finished record (success or failure) and report progress.
    pub async fn record_completion(&self) -> usize {
        let mut completed = self.completed.lock().await;
        *completed += 1;
        let line = progress_line(*completed, self.total);

        if !self.quiet {
            let mut stdout = std::io::stdout().lock();
            // progress output is best effort
            let _ = write!(stdout, "\r{line}");
            let _ = stdout.flush();
        }
        debug!(completed = *completed, total = self.total, "{line}");
        *completed
    }

    /// Terminate the progress line once all batches are done.
    pub fn finish(&self) {
        if !self.quiet && self.total > 0 {
            println!();
        }
    }
}

/// `Progress: c/t files completed (p%)`
pub fn progress_line(completed: usize, total: usize) -> String {
    let fraction = if total == 0 {
        1.0
    } else {
        completed as f64 / total as f64
    };
    format!(
        "Progress: {completed}/{total} files completed ({:.1}%)",
        fraction * 100.0
    )
}
