//! Core types for crm-file-export

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{Error, Result};
use crate::fields::{FieldPath, resolve_value, value_text};

/// Stable identifier of a source record (the record's `Id` field)
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    /// Create a new RecordId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// One source item returned by the query.
///
/// Records are arbitrarily nested JSON objects and are never mutated after they
/// are fetched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record(pub Value);

impl Record {
    /// Wrap a JSON value as a record
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// Resolve a field path, returning `None` when any branch is missing.
    pub fn resolve(&self, path: &FieldPath) -> Option<&Value> {
        resolve_value(&self.0, path)
    }

    /// Resolve a dotted path given as text.
    pub fn resolve_dotted(&self, path: &str) -> Option<&Value> {
        resolve_value(&self.0, &FieldPath::parse(path))
    }

    /// Resolve a dotted path to non-empty text, treating empty strings as absent.
    pub fn text(&self, path: &str) -> Option<String> {
        self.resolve_dotted(path)
            .map(value_text)
            .filter(|text| !text.is_empty())
    }

    /// The ledger key of this record, if it carries a non-empty `Id`.
    pub fn id(&self) -> Option<RecordId> {
        self.text("Id").map(RecordId)
    }
}

/// File-bearing object types the exporter understands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectType {
    /// Legacy attachment; content lives behind the `Body` URL
    Attachment,
    /// Document container; content is on its latest published version
    ContentDocument,
    /// A single document version carrying `VersionData`
    ContentVersion,
    /// Link between a document and a parent record
    ContentDocumentLink,
}

/// Source-URL priority shared by every content-based object type.
const VERSION_DATA_FIELDS: &[&str] = &[
    "LatestPublishedVersion.VersionData",
    "ContentDocument.LatestPublishedVersion.VersionData",
    "VersionData",
];

impl ObjectType {
    /// Parse an object name as it appears after `FROM` (case-insensitive).
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "attachment" => Ok(ObjectType::Attachment),
            "contentdocument" => Ok(ObjectType::ContentDocument),
            "contentversion" => Ok(ObjectType::ContentVersion),
            "contentdocumentlink" => Ok(ObjectType::ContentDocumentLink),
            _ => Err(Error::UnsupportedObjectType(name.to_string())),
        }
    }

    /// Lower-case name used in logs and error messages
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::Attachment => "attachment",
            ObjectType::ContentDocument => "contentdocument",
            ObjectType::ContentVersion => "contentversion",
            ObjectType::ContentDocumentLink => "contentdocumentlink",
        }
    }

    /// Field paths that identify a record for filter-list matching, in priority order.
    pub fn id_fields(&self) -> &'static [&'static str] {
        match self {
            ObjectType::Attachment | ObjectType::ContentVersion => &["Id"],
            ObjectType::ContentDocument => &["LatestPublishedVersion.Id", "LatestPublishedVersionId"],
            ObjectType::ContentDocumentLink => &[
                "ContentDocument.LatestPublishedVersionId",
                "ContentDocument.LatestPublishedVersion.Id",
            ],
        }
    }

    /// Field paths holding the relative download URL, in priority order.
    pub fn source_fields(&self) -> &'static [&'static str] {
        match self {
            ObjectType::Attachment => &["Body"],
            _ => VERSION_DATA_FIELDS,
        }
    }

    /// Short label of the source field family, used in the no-source status text.
    pub fn source_label(&self) -> &'static str {
        match self {
            ObjectType::Attachment => "Body",
            _ => "VersionData",
        }
    }

    /// Field names that must be selected (as the last segment of some field path).
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            ObjectType::Attachment => &["Id", "Body", "BodyLength", "ContentType"],
            _ => &["Id", "VersionData"],
        }
    }

    /// First identifier in [`id_fields`](Self::id_fields) order that resolves to text.
    pub fn filter_id(&self, record: &Record) -> Option<String> {
        self.id_fields().iter().find_map(|path| record.text(path))
    }

    /// First download URL in [`source_fields`](Self::source_fields) order.
    pub fn source_url(&self, record: &Record) -> Option<String> {
        self.source_fields().iter().find_map(|path| record.text(path))
    }

    /// Title used for the `{title}` placeholder.
    pub fn title(&self, record: &Record) -> String {
        let field = match self {
            ObjectType::Attachment => "Name",
            _ => "Title",
        };
        record.text(field).unwrap_or_else(|| "NoTitle".to_string())
    }

    /// Extension used for the `{ext}` placeholder.
    ///
    /// Attachments carry only a MIME type, so the subtype stands in for the extension.
    pub fn extension(&self, record: &Record) -> String {
        match self {
            ObjectType::Attachment => {
                let content_type = record
                    .text("ContentType")
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                content_type
                    .rsplit('/')
                    .next()
                    .unwrap_or_default()
                    .to_string()
            }
            _ => record.text("FileExtension").unwrap_or_default(),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the filter list selects or removes the records it names
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Keep only the listed records
    #[default]
    Include,
    /// Keep everything except the listed records
    Exclude,
}

/// Terminal outcome of one record's download.
///
/// Serialized to text only when the ledger is written.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum DownloadStatus {
    /// Seeded but never processed
    #[default]
    NotAttempted,
    /// Content written to disk
    Success,
    /// None of the source-URL fields resolved
    NoSourceUrl {
        /// Field family label ("Body" or "VersionData")
        field: &'static str,
    },
    /// The server answered with a non-success status code
    Http(u16),
    /// The request failed below HTTP (timeout, connection, body read)
    Transport(String),
    /// The response arrived but could not be written locally
    Io(String),
}

impl DownloadStatus {
    /// Whether the record's file was written
    pub fn is_success(&self) -> bool {
        matches!(self, DownloadStatus::Success)
    }
}

impl fmt::Display for DownloadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadStatus::NotAttempted => f.write_str("Failed"),
            DownloadStatus::Success => f.write_str("Success"),
            DownloadStatus::NoSourceUrl { field } => write!(f, "Failed (No {field} URL)"),
            DownloadStatus::Http(code) => write!(f, "Failed (HTTP {code})"),
            DownloadStatus::Transport(reason) | DownloadStatus::Io(reason) => {
                write!(f, "Failed (Exception: {reason})")
            }
        }
    }
}
