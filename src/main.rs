use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crm_file_export::config::parse_index_list;
use crm_file_export::{Config, Exporter, HttpTransport, RestQueryClient, Result, Session};

const DEFAULT_CONFIG: &str = "export.toml";

/// Export CRM file content and a metadata ledger
#[derive(Debug, Parser)]
#[command(name = "crm-file-export", version, about)]
struct Cli {
    /// TOML configuration file (default: export.toml, optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Query selecting the records to export. Query from Attachment,
    /// ContentDocument, ContentDocumentLink or ContentVersion and select Id plus
    /// Body (attachments) or VersionData (content objects).
    #[arg(short, long)]
    query: String,

    /// Filename template over the selected fields, e.g. "{1}/{2}.{3}". Leave out
    /// the Id field and records may overwrite each other.
    #[arg(short = 'f', long)]
    filename_pattern: Option<String>,

    /// Comma-separated 1-based field indices copied into the ledger, e.g. "1,2,3"
    #[arg(short, long)]
    metadata: Option<String>,

    /// Concurrent downloads per batch
    #[arg(short, long)]
    threads: Option<usize>,

    /// Records per batch
    #[arg(short, long)]
    batch_size: Option<usize>,
}

impl Cli {
    /// Load the config file and apply command-line overrides.
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG);
                if default.exists() {
                    Config::from_file(&default)?
                } else {
                    Config::default()
                }
            }
        };

        if let Some(pattern) = &self.filename_pattern {
            config.export.filename_pattern = pattern.clone();
        }
        if let Some(metadata) = &self.metadata {
            config.export.metadata_fields = parse_index_list(metadata)?;
        }
        if let Some(threads) = self.threads {
            config.export.worker_count = threads;
        }
        if let Some(batch_size) = self.batch_size {
            config.export.batch_size = batch_size;
        }

        config.validate()?;
        Ok(config)
    }
}

fn init_tracing(log_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let session = Session::new(
        &config.session.instance,
        config.session.resolve_access_token()?,
    )?;
    let transport = HttpTransport::new(config.export.request_timeout)?;
    let source = RestQueryClient::new(
        transport.client().clone(),
        session.clone(),
        config.session.api_version.clone(),
    );

    let report = Exporter::new(config, Arc::new(source), Arc::new(transport), session)
        .run(&cli.query)
        .await?;

    println!(
        "Exported {} of {} records ({} failed) in {} batches; ledger: {}",
        report.succeeded,
        report.filtered_records,
        report.failed,
        report.batches,
        report.ledger_path.display()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.log_level);

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Export aborted");
            ExitCode::FAILURE
        }
    }
}
