//! Export run orchestration from startup validation through the final ledger.
//!
//! Phases:
//! 1. Prepare the output directory and validate the query, template and metadata columns
//! 2. Load the filter list (if configured) and run the query
//! 3. Filter records and seed one ledger row per record id
//! 4. Write the initial snapshot, run the engine, write the final snapshot

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::engine::{DownloadEngine, EngineContext};
use crate::error::{Error, Result};
use crate::fields::{FieldPath, extract_field_paths, extract_object_name, value_text};
use crate::filename::{FilenameBuilder, FilenameTemplate};
use crate::filter::{filter_records, load_id_list};
use crate::ledger::Ledger;
use crate::query::RecordSource;
use crate::sanitize::Sanitizer;
use crate::transport::{Session, Transport};
use crate::types::{ObjectType, Record};

/// Outcome of a completed export run
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportReport {
    /// Records returned by the query
    pub total_records: usize,
    /// Records left after filtering and id de-duplication
    pub filtered_records: usize,
    /// Batches the engine processed
    pub batches: usize,
    /// Rows with status `Success`
    pub succeeded: usize,
    /// Rows with any failure status
    pub failed: usize,
    /// Where the ledger was written
    pub ledger_path: PathBuf,
}

/// Everything derived from the query and configuration before any request is made
#[derive(Debug)]
struct Plan {
    output_dir: PathBuf,
    fields: Vec<FieldPath>,
    object_type: ObjectType,
    template: FilenameTemplate,
    metadata_columns: Vec<usize>,
    filter_ids: Option<HashSet<String>>,
}

/// Runs one export end to end
pub struct Exporter {
    config: Config,
    source: Arc<dyn RecordSource>,
    transport: Arc<dyn Transport>,
    session: Session,
    quiet: bool,
}

impl Exporter {
    /// Create an exporter over the given collaborators
    pub fn new(
        config: Config,
        source: Arc<dyn RecordSource>,
        transport: Arc<dyn Transport>,
        session: Session,
    ) -> Self {
        Self {
            config,
            source,
            transport,
            session,
            quiet: false,
        }
    }

    /// Suppress the console progress line
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    /// Run `query` to completion.
    ///
    /// Any error returned here is fatal. Per-record failures only show up in
    /// the ledger and in the report's `failed` count.
    pub async fn run(&self, query: &str) -> Result<ExportReport> {
        let plan = self.prepare(query).await?;
        let ledger_path = plan.output_dir.join(&self.config.export.ledger_file_name);

        info!("Executing query to retrieve files");
        let result = self.source.query_all(query).await?;
        let total_records = result.records.len();
        info!(records = total_records, total_size = result.total_size, "Retrieved records");

        let records = match &plan.filter_ids {
            Some(ids) => {
                let filtered =
                    filter_records(result.records, ids, self.config.filtering.mode, plan.object_type);
                info!(
                    before = total_records,
                    after = filtered.len(),
                    mode = ?self.config.filtering.mode,
                    "Applied filter list"
                );
                filtered
            }
            None => result.records,
        };

        let ledger = Arc::new(Ledger::new(
            plan.metadata_columns
                .iter()
                .map(|&n| plan.fields[n - 1].to_string())
                .collect(),
        ));
        let records = seed_ledger(&ledger, records, &plan).await;

        ledger.write_snapshot(&ledger_path).await?;
        info!(path = %ledger_path.display(), rows = records.len(), "Initial ledger written");

        let filtered_records = records.len();
        if records.is_empty() {
            info!("No records to download");
            return Ok(ExportReport {
                total_records,
                filtered_records,
                batches: 0,
                succeeded: 0,
                failed: 0,
                ledger_path,
            });
        }

        let ctx = EngineContext {
            transport: Arc::clone(&self.transport),
            session: self.session.clone(),
            object_type: plan.object_type,
            fields: plan.fields,
            builder: FilenameBuilder::new(
                plan.output_dir,
                plan.template,
                Sanitizer::new(self.config.export.replacement.clone()),
            ),
            ledger: Arc::clone(&ledger),
        };
        let engine = DownloadEngine::new(
            ctx,
            self.config.export.batch_size,
            self.config.export.worker_count,
        )
        .quiet(self.quiet);

        let summary = engine.run(records, &ledger_path).await?;
        let (succeeded, failed) = ledger.outcome_counts().await;
        info!(succeeded, failed, batches = summary.batches, "Export finished");

        Ok(ExportReport {
            total_records,
            filtered_records,
            batches: summary.batches,
            succeeded,
            failed,
            ledger_path,
        })
    }

    /// Validate everything that can be checked before the query runs.
    async fn prepare(&self, query: &str) -> Result<Plan> {
        let export = &self.config.export;

        tokio::fs::create_dir_all(&export.output_dir).await?;
        let output_dir = tokio::fs::canonicalize(&export.output_dir).await?;

        let fields = extract_field_paths(query)?;
        let object_name = extract_object_name(query)?;
        let object_type = ObjectType::parse(&object_name)?;

        let missing: Vec<String> = object_type
            .required_fields()
            .iter()
            .filter(|required| {
                !fields
                    .iter()
                    .any(|field| field.last_segment().eq_ignore_ascii_case(required))
            })
            .map(|required| required.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(Error::MissingRequiredFields {
                object: object_name,
                fields: missing,
            });
        }

        let template = FilenameTemplate::parse(&export.filename_pattern, fields.len())?;

        if let Some(bad) = export
            .metadata_fields
            .iter()
            .find(|&&n| n == 0 || n > fields.len())
        {
            return Err(Error::config(
                "export.metadata_fields",
                format!("metadata index {bad} is outside the {} selected fields", fields.len()),
            ));
        }

        let id_ordinal = fields
            .iter()
            .position(|field| field.to_string().eq_ignore_ascii_case("Id"))
            .map(|index| index + 1);
        if !id_ordinal.is_some_and(|ordinal| template.references_field(ordinal)) {
            warn!(
                template = template.as_str(),
                "Filename template does not include the Id field; records may overwrite each other"
            );
        }

        let filter_ids = match &self.config.filtering.id_list_path {
            Some(path) => Some(load_id_list(path).await?),
            None => None,
        };

        info!(
            object = %object_type,
            fields = fields.len(),
            output_dir = %output_dir.display(),
            "Export plan ready"
        );

        Ok(Plan {
            output_dir,
            fields,
            object_type,
            template,
            metadata_columns: export.metadata_fields.clone(),
            filter_ids,
        })
    }
}

/// Seed one pending row per record id, dropping records that cannot be keyed.
///
/// Returns the records that got a row, in their original order.
async fn seed_ledger(ledger: &Ledger, records: Vec<Record>, plan: &Plan) -> Vec<Record> {
    let mut seeded = Vec::with_capacity(records.len());
    for record in records {
        let Some(id) = record.id() else {
            warn!("Dropping record without an Id");
            continue;
        };

        let metadata = plan
            .metadata_columns
            .iter()
            .map(|&n| record.resolve(&plan.fields[n - 1]).map(value_text).unwrap_or_default())
            .collect();

        if ledger.insert_pending(id.clone(), metadata).await {
            seeded.push(record);
        } else {
            warn!(record_id = %id, "Dropping duplicate record id; first occurrence kept");
        }
    }
    seeded
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryResult;
    use crate::transport::{FetchResponse, TransportError};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use url::Url;

    struct StaticSource {
        records: Vec<Record>,
        calls: AtomicUsize,
    }

    impl StaticSource {
        fn new(records: Vec<Record>) -> Arc<Self> {
            Arc::new(Self {
                records,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait::async_trait]
    impl RecordSource for StaticSource {
        async fn query_all(&self, _query: &str) -> Result<QueryResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(QueryResult {
                records: self.records.clone(),
                total_size: self.records.len(),
            })
        }
    }

    struct EchoTransport;

    #[async_trait::async_trait]
    impl Transport for EchoTransport {
        async fn fetch(&self, url: &Url, _credential: &str) -> std::result::Result<FetchResponse, TransportError> {
            Ok(FetchResponse {
                status: 200,
                body: url.path().as_bytes().to_vec(),
            })
        }
    }

    fn config(output_dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.session.instance = "acme.example.com".into();
        config.export.output_dir = output_dir.to_path_buf();
        config.export.batch_size = 2;
        config.export.worker_count = 2;
        config
    }

    fn exporter(config: Config, source: Arc<StaticSource>) -> Exporter {
        Exporter::new(
            config,
            source,
            Arc::new(EchoTransport),
            Session::new("acme.example.com", "tok").unwrap(),
        )
        .quiet(true)
    }

    fn version(id: &str) -> Record {
        Record::new(json!({
            "Id": id,
            "Title": format!("doc-{id}"),
            "FileExtension": "txt",
            "VersionData": format!("/v/{id}")
        }))
    }

    const QUERY: &str = "SELECT Id, Title, FileExtension, VersionData FROM ContentVersion";

    #[tokio::test]
    async fn missing_required_fields_fail_before_querying() {
        let temp = TempDir::new().unwrap();
        let source = StaticSource::new(vec![]);
        let err = exporter(config(temp.path()), Arc::clone(&source))
            .run("SELECT Id, Name FROM Attachment")
            .await
            .unwrap_err();

        match err {
            Error::MissingRequiredFields { object, fields } => {
                assert_eq!(object, "Attachment");
                assert_eq!(fields, vec!["Body", "BodyLength", "ContentType"]);
            }
            other => panic!("expected MissingRequiredFields, got {other:?}"),
        }
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unsupported_object_and_bad_template_are_fatal() {
        let temp = TempDir::new().unwrap();

        let err = exporter(config(temp.path()), StaticSource::new(vec![]))
            .run("SELECT Id FROM Account")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedObjectType(name) if name == "Account"));

        let mut bad_template = config(temp.path());
        bad_template.export.filename_pattern = "{9}".into();
        let err = exporter(bad_template, StaticSource::new(vec![]))
            .run(QUERY)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidTemplate { .. }));

        let mut bad_metadata = config(temp.path());
        bad_metadata.export.metadata_fields = vec![1, 7];
        let err = exporter(bad_metadata, StaticSource::new(vec![]))
            .run(QUERY)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config { key: Some(key), .. } if key == "export.metadata_fields"));
    }

    #[tokio::test]
    async fn missing_filter_file_is_fatal() {
        let temp = TempDir::new().unwrap();
        let mut cfg = config(temp.path());
        cfg.filtering.id_list_path = Some(temp.path().join("absent.csv"));

        let source = StaticSource::new(vec![version("a")]);
        let err = exporter(cfg, Arc::clone(&source)).run(QUERY).await.unwrap_err();
        assert!(matches!(err, Error::FilterList { .. }));
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn zero_records_write_header_only_ledger() {
        let temp = TempDir::new().unwrap();
        let report = exporter(config(temp.path()), StaticSource::new(vec![]))
            .run(QUERY)
            .await
            .unwrap();

        assert_eq!(report.filtered_records, 0);
        assert_eq!(report.batches, 0);
        let text = std::fs::read_to_string(&report.ledger_path).unwrap();
        assert_eq!(
            text.trim_end(),
            "Id,Title,FileExtension,FilePath,HyperlinkFilePath,Status,IllegalCharsStripped"
        );
    }

    #[tokio::test]
    async fn duplicate_and_missing_ids_are_dropped() {
        let temp = TempDir::new().unwrap();
        let no_id = Record::new(json!({ "Title": "orphan", "VersionData": "/v/orphan" }));
        let source = StaticSource::new(vec![version("a"), version("a"), no_id, version("b")]);

        let report = exporter(config(temp.path()), source).run(QUERY).await.unwrap();

        assert_eq!(report.total_records, 4);
        assert_eq!(report.filtered_records, 2);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 0);

        let text = std::fs::read_to_string(&report.ledger_path).unwrap();
        assert_eq!(text.lines().count(), 3);
    }

    #[tokio::test]
    async fn include_filter_limits_the_run() {
        let temp = TempDir::new().unwrap();
        let list = temp.path().join("ids.csv");
        std::fs::write(&list, "b\n").unwrap();

        let mut cfg = config(&temp.path().join("out"));
        cfg.filtering.id_list_path = Some(list);

        let source = StaticSource::new(vec![version("a"), version("b"), version("c")]);
        let report = exporter(cfg, source).run(QUERY).await.unwrap();

        assert_eq!(report.total_records, 3);
        assert_eq!(report.filtered_records, 1);
        assert_eq!(report.succeeded, 1);
        assert!(report.ledger_path.is_absolute());
    }
}
