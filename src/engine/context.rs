//! Engine context: read-only state shared by every worker, plus the shared ledger.

use std::sync::Arc;

use crate::fields::{FieldPath, value_text};
use crate::filename::{FilenameBuilder, UNKNOWN_VALUE};
use crate::ledger::Ledger;
use crate::transport::{Session, Transport};
use crate::types::{ObjectType, Record};

/// Shared context for a run, reducing parameter passing between helpers.
///
/// Everything except the ledger is immutable for the run's duration. The
/// ledger guards itself.
pub struct EngineContext {
    /// Fetches file content
    pub transport: Arc<dyn Transport>,
    /// Instance URL and bearer credential
    pub session: Session,
    /// Object type named in the query
    pub object_type: ObjectType,
    /// Selected fields, in query order
    pub fields: Vec<FieldPath>,
    /// Destination path construction
    pub builder: FilenameBuilder,
    /// Shared per-record outcome table
    pub ledger: Arc<Ledger>,
}

impl EngineContext {
    /// Text of every selected field for filename placeholders.
    ///
    /// Absent and empty values render as `Unknown`.
    pub fn filename_values(&self, record: &Record) -> Vec<String> {
        self.fields
            .iter()
            .map(|path| {
                record
                    .resolve(path)
                    .map(value_text)
                    .filter(|text| !text.is_empty())
                    .unwrap_or_else(|| UNKNOWN_VALUE.to_string())
            })
            .collect()
    }
}

impl std::fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineContext")
            .field("session", &self.session)
            .field("object_type", &self.object_type)
            .field("fields", &self.fields)
            .field("builder", &self.builder)
            .finish_non_exhaustive()
    }
}
