//! Configuration types for crm-file-export

use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

use crate::error::{Error, Result};
use crate::sanitize::is_illegal;
use crate::types::FilterMode;

/// Environment variable consulted when no access token is configured
pub const ACCESS_TOKEN_ENV: &str = "CRM_ACCESS_TOKEN";

/// Remote session settings
///
/// The authentication handshake happens elsewhere; this only carries the
/// resulting instance host and bearer token.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Instance host or base URL (e.g. "acme.my.example.com")
    #[serde(default)]
    pub instance: String,

    /// Bearer token (falls back to the `CRM_ACCESS_TOKEN` environment variable)
    #[serde(default)]
    pub access_token: Option<String>,

    /// REST API version used for queries (default: "59.0")
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            instance: String::new(),
            access_token: None,
            api_version: default_api_version(),
        }
    }
}

impl SessionConfig {
    /// Configured token, or the environment fallback.
    pub fn resolve_access_token(&self) -> Result<String> {
        self.access_token
            .clone()
            .filter(|token| !token.trim().is_empty())
            .or_else(|| std::env::var(ACCESS_TOKEN_ENV).ok())
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| {
                Error::config(
                    "session.access_token",
                    format!("no access token configured and {ACCESS_TOKEN_ENV} is not set"),
                )
            })
    }
}

/// Export behavior (output location, batching, naming)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Output directory (default: "./export")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Records per batch (default: 100)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Concurrent downloads within a batch (default: 10)
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Filename template (default: "{1}/{2}.{3}")
    ///
    /// `{n}` is the n-th selected field, `{title}` and `{ext}` are the
    /// object's title and extension. Leaving out the `Id` field lets records
    /// overwrite each other.
    #[serde(default = "default_filename_pattern")]
    pub filename_pattern: String,

    /// 1-based selected-field indices copied into the ledger (default: [1, 2, 3])
    #[serde(default = "default_metadata_fields")]
    pub metadata_fields: Vec<usize>,

    /// Text substituted for each illegal path character (default: " ", "" deletes)
    #[serde(default = "default_replacement")]
    pub replacement: String,

    /// Per-request timeout in seconds (default: 600)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Ledger file name inside the output directory (default: "files_metadata.csv")
    #[serde(default = "default_ledger_file_name")]
    pub ledger_file_name: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            batch_size: default_batch_size(),
            worker_count: default_worker_count(),
            filename_pattern: default_filename_pattern(),
            metadata_fields: default_metadata_fields(),
            replacement: default_replacement(),
            request_timeout: default_request_timeout(),
            ledger_file_name: default_ledger_file_name(),
        }
    }
}

/// Identifier-list filtering
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    /// CSV file whose first column lists record identifiers (None = no filtering)
    #[serde(default)]
    pub id_list_path: Option<PathBuf>,

    /// Keep (`include`) or drop (`exclude`) the listed records
    #[serde(default)]
    pub mode: FilterMode,
}

/// Main configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Default tracing filter when `RUST_LOG` is unset (default: "info")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Remote session
    #[serde(default)]
    pub session: SessionConfig,

    /// Export behavior
    #[serde(default)]
    pub export: ExportConfig,

    /// Identifier-list filtering
    #[serde(default)]
    pub filtering: FilterConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            session: SessionConfig::default(),
            export: ExportConfig::default(),
            filtering: FilterConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            Error::Config { message, key } => Error::Config {
                message: format!("{}: {}", path.display(), message),
                key,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config {
            message: e.to_string(),
            key: None,
        })
    }

    /// Check settings that would otherwise fail mid-run.
    pub fn validate(&self) -> Result<()> {
        if self.export.batch_size == 0 {
            return Err(Error::config("export.batch_size", "batch_size must be at least 1"));
        }
        if self.export.worker_count == 0 {
            return Err(Error::config("export.worker_count", "worker_count must be at least 1"));
        }
        if self.session.instance.trim().is_empty() {
            return Err(Error::config("session.instance", "instance must not be empty"));
        }
        if let Some(c) = self.export.replacement.chars().find(|c| is_illegal(*c)) {
            return Err(Error::config(
                "export.replacement",
                format!("replacement contains illegal path character {c:?}"),
            ));
        }
        if self.export.metadata_fields.contains(&0) {
            return Err(Error::config(
                "export.metadata_fields",
                "metadata field indices are 1-based",
            ));
        }
        if self.export.ledger_file_name.trim().is_empty() {
            return Err(Error::config(
                "export.ledger_file_name",
                "ledger_file_name must not be empty",
            ));
        }
        Ok(())
    }
}

/// Parse a comma-separated index list such as `"1,2,3"`.
pub fn parse_index_list(list: &str) -> Result<Vec<usize>> {
    list.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<usize>().map_err(|_| {
                Error::config("export.metadata_fields", format!("'{part}' is not a field index"))
            })
        })
        .collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_version() -> String {
    "59.0".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./export")
}

fn default_batch_size() -> usize {
    100
}

fn default_worker_count() -> usize {
    10
}

fn default_filename_pattern() -> String {
    "{1}/{2}.{3}".to_string()
}

fn default_metadata_fields() -> Vec<usize> {
    vec![1, 2, 3]
}

fn default_replacement() -> String {
    " ".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(600)
}

fn default_ledger_file_name() -> String {
    "files_metadata.csv".to_string()
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn valid() -> Config {
        Config {
            session: SessionConfig {
                instance: "acme.my.example.com".into(),
                access_token: Some("tok".into()),
                ..SessionConfig::default()
            },
            ..Config::default()
        }
    }

    #[test]
    fn empty_toml_yields_documented_defaults() {
        let config = Config::from_toml("").unwrap();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.session.api_version, "59.0");
        assert_eq!(config.export.output_dir, PathBuf::from("./export"));
        assert_eq!(config.export.batch_size, 100);
        assert_eq!(config.export.worker_count, 10);
        assert_eq!(config.export.filename_pattern, "{1}/{2}.{3}");
        assert_eq!(config.export.metadata_fields, vec![1, 2, 3]);
        assert_eq!(config.export.replacement, " ");
        assert_eq!(config.export.request_timeout, Duration::from_secs(600));
        assert_eq!(config.export.ledger_file_name, "files_metadata.csv");
        assert_eq!(config.filtering.mode, FilterMode::Include);
        assert!(config.filtering.id_list_path.is_none());
    }

    #[test]
    fn toml_overrides_nested_sections() {
        let config = Config::from_toml(
            r#"
            log_level = "debug"

            [session]
            instance = "acme.my.example.com"

            [export]
            batch_size = 25
            request_timeout = 30
            filename_pattern = "{1}/{title}.{ext}"

            [filtering]
            id_list_path = "ids.csv"
            mode = "exclude"
            "#,
        )
        .unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.session.instance, "acme.my.example.com");
        assert_eq!(config.export.batch_size, 25);
        assert_eq!(config.export.worker_count, 10, "unset keys keep defaults");
        assert_eq!(config.export.request_timeout, Duration::from_secs(30));
        assert_eq!(config.filtering.mode, FilterMode::Exclude);
        assert_eq!(config.filtering.id_list_path, Some(PathBuf::from("ids.csv")));
    }

    #[test]
    fn from_file_reports_path_on_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[export]\nbatch_size = \"many\"").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains(&file.path().display().to_string()), "got: {err}");
    }

    #[test]
    fn from_file_missing_is_config_error() {
        let err = Config::from_file(Path::new("/no/such/export.toml")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn validate_rejects_zero_sizes_blank_instance_and_bad_replacement() {
        assert!(valid().validate().is_ok());

        let cases: Vec<(&str, Box<dyn Fn(&mut Config)>)> = vec![
            ("export.batch_size", Box::new(|c: &mut Config| c.export.batch_size = 0)),
            ("export.worker_count", Box::new(|c: &mut Config| c.export.worker_count = 0)),
            ("session.instance", Box::new(|c: &mut Config| c.session.instance = "  ".into())),
            ("export.replacement", Box::new(|c: &mut Config| c.export.replacement = "/".into())),
            ("export.metadata_fields", Box::new(|c: &mut Config| c.export.metadata_fields = vec![0, 1])),
        ];

        for (expected_key, mutate) in cases {
            let mut config = valid();
            mutate(&mut config);
            match config.validate() {
                Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some(expected_key)),
                other => panic!("{expected_key}: expected Config error, got {other:?}"),
            }
        }
    }

    #[test]
    fn empty_replacement_is_allowed() {
        let mut config = valid();
        config.export.replacement = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn configured_token_wins_over_environment() {
        let session = SessionConfig {
            access_token: Some("from-config".into()),
            ..SessionConfig::default()
        };
        assert_eq!(session.resolve_access_token().unwrap(), "from-config");
    }

    #[test]
    fn index_list_parses_and_rejects_garbage() {
        assert_eq!(parse_index_list("1, 2,3").unwrap(), vec![1, 2, 3]);
        assert!(parse_index_list("1,x").is_err());
    }

    #[test]
    fn request_timeout_serializes_as_seconds() {
        let json = serde_json::to_value(ExportConfig::default()).unwrap();
        assert_eq!(json["request_timeout"], 600);
    }
}
