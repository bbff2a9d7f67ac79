//! Test configuration helpers for building exporters against a mock server

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crm_file_export::{Config, Exporter, HttpTransport, RestQueryClient, Session};
use wiremock::MockServer;

/// Access token the mock server expects
pub const TEST_TOKEN: &str = "00Dtest!token";

/// Config writing into `output_dir` with small batches and two workers
pub fn test_config(server: &MockServer, output_dir: &Path) -> Config {
    let mut config = Config::default();
    config.session.instance = server.uri();
    config.session.access_token = Some(TEST_TOKEN.to_string());
    config.export.output_dir = output_dir.to_path_buf();
    config.export.batch_size = 2;
    config.export.worker_count = 2;
    config.export.request_timeout = Duration::from_secs(5);
    config
}

/// Wire the real REST query client and HTTP transport to `config`
pub fn build_exporter(config: Config) -> Exporter {
    let session = Session::new(
        &config.session.instance,
        config
            .session
            .resolve_access_token()
            .expect("token configured"),
    )
    .expect("valid instance url");
    let transport =
        HttpTransport::new(config.export.request_timeout).expect("http client builds");
    let source = RestQueryClient::new(
        transport.client().clone(),
        session.clone(),
        config.session.api_version.clone(),
    );
    Exporter::new(config, Arc::new(source), Arc::new(transport), session).quiet(true)
}
