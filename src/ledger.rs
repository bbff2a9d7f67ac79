//! Shared per-record ledger and its CSV snapshots
//!
//! Rows are seeded for every record before the engine starts and each row's
//! outcome cells are written exactly once by the worker that processed the
//! record. All access goes through one lock. The file on disk is rewritten
//! wholesale from the in-memory rows, never appended to.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::{DownloadStatus, RecordId};

/// Column headers appended after the metadata columns
pub const OUTCOME_COLUMNS: [&str; 4] = ["FilePath", "HyperlinkFilePath", "Status", "IllegalCharsStripped"];

const NOT_CREATED: &str = "Not Created";
const NOT_APPLICABLE: &str = "N/a";

/// One ledger row
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerRow {
    /// Selected metadata field values, in configured order
    pub metadata: Vec<String>,
    /// Destination path, or `Not Created`
    pub file_path: String,
    /// Spreadsheet hyperlink formula, or `N/a`
    pub hyperlink: String,
    /// Outcome of the download
    pub status: DownloadStatus,
    /// Path rendered from the sanitization masks, or `N/a`
    pub illegal_chars: String,
    updated: bool,
}

impl LedgerRow {
    fn pending(metadata: Vec<String>) -> Self {
        Self {
            metadata,
            file_path: NOT_CREATED.to_string(),
            hyperlink: NOT_APPLICABLE.to_string(),
            status: DownloadStatus::NotAttempted,
            illegal_chars: NOT_APPLICABLE.to_string(),
            updated: false,
        }
    }

    fn cells(&self) -> Vec<String> {
        let mut cells = self.metadata.clone();
        cells.push(self.file_path.clone());
        cells.push(self.hyperlink.clone());
        cells.push(self.status.to_string());
        cells.push(self.illegal_chars.clone());
        cells
    }
}

/// Final outcome of one record, as reported by its worker
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Where the content was (or would have been) written
    pub path: PathBuf,
    /// Diagnostic path rendered from the sanitization masks
    pub mask_path: String,
    /// Terminal status
    pub status: DownloadStatus,
}

/// `=HYPERLINK("<path>", "<file name>")`
pub fn hyperlink(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    format!("=HYPERLINK(\"{}\", \"{}\")", path.display(), file_name)
}

#[derive(Debug, Default)]
struct Rows {
    order: Vec<RecordId>,
    by_id: HashMap<RecordId, LedgerRow>,
}

/// Rows keyed by record identifier, kept in first-insertion order
#[derive(Debug)]
pub struct Ledger {
    header: Vec<String>,
    rows: Mutex<Rows>,
}

impl Ledger {
    /// Create an empty ledger whose metadata columns carry `metadata_columns` as headers.
    pub fn new(metadata_columns: Vec<String>) -> Self {
        let mut header = metadata_columns;
        header.extend(OUTCOME_COLUMNS.iter().map(|c| c.to_string()));
        Self {
            header,
            rows: Mutex::new(Rows::default()),
        }
    }

    /// Full header row
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Seed a not-yet-attempted row. Returns `false` if the id already has a row.
    pub async fn insert_pending(&self, id: RecordId, metadata: Vec<String>) -> bool {
        let mut rows = self.rows.lock().await;
        if rows.by_id.contains_key(&id) {
            return false;
        }
        rows.order.push(id.clone());
        rows.by_id.insert(id, LedgerRow::pending(metadata));
        true
    }

    /// Write a record's outcome cells into its pre-existing row.
    ///
    /// A missing row or a second update is a logic error in the caller.
    pub async fn record_outcome(&self, id: &RecordId, outcome: RecordOutcome) -> Result<()> {
        let mut rows = self.rows.lock().await;
        let row = rows
            .by_id
            .get_mut(id)
            .ok_or_else(|| Error::LedgerRowMissing(id.to_string()))?;
        if row.updated {
            return Err(Error::LedgerRowAlreadyUpdated(id.to_string()));
        }

        row.file_path = outcome.path.display().to_string();
        row.hyperlink = hyperlink(&outcome.path);
        row.status = outcome.status;
        row.illegal_chars = outcome.mask_path;
        row.updated = true;
        Ok(())
    }

    /// Number of rows
    pub async fn len(&self) -> usize {
        self.rows.lock().await.order.len()
    }

    /// Whether the ledger has no rows
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Copy of every row in insertion order
    pub async fn rows(&self) -> Vec<(RecordId, LedgerRow)> {
        let rows = self.rows.lock().await;
        rows.order
            .iter()
            .filter_map(|id| rows.by_id.get(id).map(|row| (id.clone(), row.clone())))
            .collect()
    }

    /// Count of `(succeeded, failed)` rows; never-attempted rows count as failed.
    pub async fn outcome_counts(&self) -> (usize, usize) {
        let rows = self.rows.lock().await;
        let succeeded = rows.by_id.values().filter(|row| row.status.is_success()).count();
        (succeeded, rows.by_id.len() - succeeded)
    }

    /// Serialize the header and every row to `path`.
    ///
    /// The rows are rendered under the lock, written to a sibling temp file and
    /// renamed over `path`, so readers never see a partial ledger.
    pub async fn write_snapshot(&self, path: &Path) -> Result<()> {
        let bytes = {
            let rows = self.rows.lock().await;
            let mut writer = csv::Writer::from_writer(Vec::new());
            writer.write_record(&self.header)?;
            for id in &rows.order {
                if let Some(row) = rows.by_id.get(id) {
                    writer.write_record(row.cells())?;
                }
            }
            writer
                .into_inner()
                .map_err(|e| Error::Io(e.into_error()))?
        };

        let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
        temp_name.push(".tmp");
        let temp_path = path.with_file_name(temp_name);

        tokio::fs::write(&temp_path, &bytes).await?;
        tokio::fs::rename(&temp_path, path).await?;

        debug!(path = %path.display(), bytes = bytes.len(), "ledger snapshot written");
        Ok(())
    }
}
