//! Error types for crm-file-export
//!
//! Errors in this module are the fatal class: anything returned as an [`Error`]
//! stops the run before (or instead of) downloading. Per-record failures are not
//! errors; they are captured as [`DownloadStatus`](crate::types::DownloadStatus)
//! values in the ledger and never abort a batch.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for crm-file-export operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for crm-file-export
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "batch_size")
        key: Option<String>,
    },

    /// The query has no `SELECT ... FROM` clause, or its field list is unusable
    #[error("malformed query: {0}")]
    MalformedQuery(String),

    /// The queried object is not one of the supported file-bearing object types
    #[error("unsupported object type: {0}")]
    UnsupportedObjectType(String),

    /// The query does not select the fields needed to name and download files
    #[error("query for {object} is missing required fields: {}", fields.join(", "))]
    MissingRequiredFields {
        /// The object type named in the query
        object: String,
        /// Required field names absent from the selected field list
        fields: Vec<String>,
    },

    /// The filename template cannot be rendered against the selected fields
    #[error("invalid filename template '{template}': {reason}")]
    InvalidTemplate {
        /// The template as configured
        template: String,
        /// Why it was rejected
        reason: String,
    },

    /// The identifier filter list could not be read
    #[error("failed to load filter list {}: {reason}", path.display())]
    FilterList {
        /// Path of the filter list file
        path: PathBuf,
        /// Underlying failure
        reason: String,
    },

    /// The remote query failed
    #[error("query failed: {0}")]
    Query(String),

    /// A record's source URL points away from the instance
    #[error("refusing to fetch {url}: not on instance {instance}")]
    ForeignOrigin {
        /// The resolved source URL
        url: String,
        /// Origin of the authenticated instance
        instance: String,
    },

    /// A worker tried to update a record that was never seeded into the ledger
    #[error("no ledger row for record {0}")]
    LedgerRowMissing(String),

    /// A worker tried to update a ledger row a second time
    #[error("ledger row for record {0} was already updated")]
    LedgerRowAlreadyUpdated(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Ledger or filter-list CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL could not be parsed or joined
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    /// Shorthand for a configuration error tied to a specific key.
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }
}
