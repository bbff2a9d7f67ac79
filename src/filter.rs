//! Record filtering against an externally supplied identifier list

use std::collections::HashSet;
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};
use crate::types::{FilterMode, ObjectType, Record};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Load the identifier set from the first column of a headerless CSV file.
///
/// Blank rows are skipped and a leading UTF-8 byte-order mark is ignored.
pub async fn load_id_list(path: &Path) -> Result<HashSet<String>> {
    let filter_error = |reason: String| Error::FilterList {
        path: path.to_path_buf(),
        reason,
    };

    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| filter_error(e.to_string()))?;
    let content = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(content);

    let mut ids = HashSet::new();
    for row in reader.records() {
        let row = row.map_err(|e| filter_error(e.to_string()))?;
        if let Some(id) = row.get(0).map(str::trim).filter(|id| !id.is_empty()) {
            ids.insert(id.to_string());
        }
    }

    info!(path = %path.display(), count = ids.len(), "loaded filter list");
    Ok(ids)
}

/// Keep or drop records according to whether their identifier is in `ids`.
///
/// The identifier is resolved with the object type's priority list. A record
/// whose identifier does not resolve never matches, so `Include` drops it and
/// `Exclude` keeps it. Input order is preserved.
pub fn filter_records(
    records: Vec<Record>,
    ids: &HashSet<String>,
    mode: FilterMode,
    object_type: ObjectType,
) -> Vec<Record> {
    records
        .into_iter()
        .filter(|record| {
            let listed = object_type
                .filter_id(record)
                .is_some_and(|id| ids.contains(&id));
            match mode {
                FilterMode::Include => listed,
                FilterMode::Exclude => !listed,
            }
        })
        .collect()
}
