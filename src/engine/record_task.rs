//! Per-record task: build the path, download, update the ledger, count progress.

use std::path::Path;

use crate::ledger::RecordOutcome;
use crate::progress::ProgressCounter;
use crate::types::{DownloadStatus, Record};

use super::context::EngineContext;

/// Process one record to a terminal status and report it.
///
/// Never fails: every outcome, including local failures, ends up as the
/// record's ledger status. The ledger is updated before progress is counted.
pub(super) async fn process_record(ctx: &EngineContext, progress: &ProgressCounter, record: Record) {
    let Some(id) = record.id() else {
        // unreachable for seeded records; counted so the progress total still adds up
        tracing::warn!("Record without Id reached the engine, skipping");
        progress.record_completion().await;
        return;
    };

    let title = ctx.object_type.title(&record);
    let ext = ctx.object_type.extension(&record);
    let values = ctx.filename_values(&record);

    let (built, status) = match ctx.builder.build_path(&title, &ext, &values).await {
        Ok(built) => {
            let status = download(ctx, &record, &built.path).await;
            (built, status)
        }
        Err(e) => (
            ctx.builder.plan(&title, &ext, &values),
            DownloadStatus::Io(e.to_string()),
        ),
    };

    if status.is_success() {
        tracing::debug!(record_id = %id, path = %built.path.display(), "File written");
    } else {
        tracing::error!(record_id = %id, status = %status, "Download failed");
    }

    let outcome = RecordOutcome {
        path: built.path,
        mask_path: built.mask_path,
        status,
    };
    if let Err(e) = ctx.ledger.record_outcome(&id, outcome).await {
        tracing::error!(record_id = %id, error = %e, "Failed to update ledger row");
    }

    progress.record_completion().await;
}

/// Fetch the record's content and write it to `path`.
async fn download(ctx: &EngineContext, record: &Record, path: &Path) -> DownloadStatus {
    let Some(source) = ctx.object_type.source_url(record) else {
        return DownloadStatus::NoSourceUrl {
            field: ctx.object_type.source_label(),
        };
    };

    let url = match ctx.session.resolve(&source) {
        Ok(url) => url,
        Err(e) => return DownloadStatus::Transport(e.to_string()),
    };

    match ctx.transport.fetch(&url, ctx.session.access_token()).await {
        Ok(response) if response.is_success() => match write_file(path, &response.body).await {
            Ok(()) => DownloadStatus::Success,
            Err(e) => DownloadStatus::Io(e.to_string()),
        },
        Ok(response) => DownloadStatus::Http(response.status),
        Err(e) => DownloadStatus::Transport(e.to_string()),
    }
}

async fn write_file(path: &Path, body: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, body).await
}
