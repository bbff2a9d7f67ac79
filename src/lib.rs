//! # crm-file-export
//!
//! Bulk export of file content referenced by CRM records, with a reconciled
//! metadata ledger.
//!
//! ## Design Philosophy
//!
//! crm-file-export is designed to be:
//! - **Lossless in its bookkeeping** - Exactly one ledger row per record, whatever happens to the download
//! - **Bounded** - Records move in fixed-size batches over a fixed number of workers
//! - **Deterministic** - Output paths follow from the template and record fields alone
//! - **Library-first** - The CLI is a thin wrapper over [`Exporter`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use crm_file_export::{Config, Exporter, HttpTransport, RestQueryClient, Session};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::default();
//!     config.session.instance = "acme.my.example.com".to_string();
//!     config.session.access_token = Some("00D...".to_string());
//!
//!     let session = Session::new(&config.session.instance, config.session.resolve_access_token()?)?;
//!     let transport = HttpTransport::new(config.export.request_timeout)?;
//!     let source = RestQueryClient::new(
//!         transport.client().clone(),
//!         session.clone(),
//!         config.session.api_version.clone(),
//!     );
//!
//!     let report = Exporter::new(config, Arc::new(source), Arc::new(transport), session)
//!         .run("SELECT Id, Title, FileExtension, VersionData FROM ContentVersion")
//!         .await?;
//!     println!("{} succeeded, {} failed", report.succeeded, report.failed);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Download engine (decomposed into focused submodules)
pub mod engine;
/// Error types
pub mod error;
/// Export run orchestration
pub mod export;
/// Query field-path extraction and record resolution
pub mod fields;
/// Filename template rendering and output paths
pub mod filename;
/// Identifier-list record filtering
pub mod filter;
/// Shared ledger and CSV snapshots
pub mod ledger;
/// Console progress reporting
pub mod progress;
/// Record query collaborator
pub mod query;
/// Illegal path character sanitization
pub mod sanitize;
/// File content transport
pub mod transport;
/// Core types
pub mod types;

// Re-export commonly used types
pub use config::{Config, ExportConfig, FilterConfig, SessionConfig};
pub use engine::{DownloadEngine, EngineContext, EngineSummary, WorkerPool};
pub use error::{Error, Result};
pub use export::{ExportReport, Exporter};
pub use fields::{FieldPath, extract_field_paths, extract_object_name};
pub use filename::{BuiltPath, FilenameBuilder, FilenameTemplate, collapse_double_extension};
pub use filter::{filter_records, load_id_list};
pub use ledger::{Ledger, LedgerRow, RecordOutcome};
pub use progress::ProgressCounter;
pub use query::{QueryResult, RecordSource, RestQueryClient};
pub use sanitize::{Sanitized, Sanitizer};
pub use transport::{FetchResponse, HttpTransport, Session, Transport, TransportError};
pub use types::{DownloadStatus, FilterMode, ObjectType, Record, RecordId};
