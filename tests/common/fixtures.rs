//! Record fixtures, mock endpoints and ledger readers

use std::path::Path;

use serde_json::{Value, json};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::config::TEST_TOKEN;

/// Query selecting id, title, extension and content for content versions
pub const VERSION_QUERY: &str =
    "SELECT Id, Title, FileExtension, VersionData FROM ContentVersion";

/// Path the mock server serves the content of `id` from
pub fn version_data_path(id: &str) -> String {
    format!("/services/data/v59.0/sobjects/ContentVersion/{id}/VersionData")
}

/// A content version record as the query endpoint returns it
pub fn content_version(id: &str, title: &str, extension: &str) -> Value {
    json!({
        "attributes": { "type": "ContentVersion" },
        "Id": id,
        "Title": title,
        "FileExtension": extension,
        "VersionData": version_data_path(id),
    })
}

/// Serve `records` as a single, complete query page
pub async fn mount_query(server: &MockServer, records: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path("/services/data/v59.0/queryAll"))
        .and(header("authorization", format!("Bearer {TEST_TOKEN}").as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalSize": records.len(),
            "done": true,
            "records": records,
        })))
        .mount(server)
        .await;
}

/// Serve `body` for the content of `id`
pub async fn mount_content(server: &MockServer, id: &str, body: &[u8]) {
    Mock::given(method("GET"))
        .and(path(version_data_path(id)))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
}

/// Answer requests for the content of `id` with `status`
pub async fn mount_content_status(server: &MockServer, id: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(version_data_path(id)))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

/// One parsed ledger file: header plus rows
#[derive(Debug)]
pub struct LedgerFile {
    /// Column names
    pub header: Vec<String>,
    /// Data rows in file order
    pub rows: Vec<Vec<String>>,
}

impl LedgerFile {
    /// Read and parse the ledger CSV at `path`
    pub fn read(path: &Path) -> Self {
        let mut reader = csv::Reader::from_path(path).expect("ledger readable");
        let header = reader
            .headers()
            .expect("ledger header")
            .iter()
            .map(str::to_string)
            .collect();
        let rows = reader
            .records()
            .map(|row| row.expect("ledger row").iter().map(str::to_string).collect())
            .collect();
        Self { header, rows }
    }

    /// Index of `column` in the header
    pub fn column(&self, column: &str) -> usize {
        self.header
            .iter()
            .position(|name| name == column)
            .unwrap_or_else(|| panic!("missing ledger column {column}"))
    }

    /// Row whose first column equals `id`
    pub fn row(&self, id: &str) -> &[String] {
        self.rows
            .iter()
            .find(|row| row.first().map(String::as_str) == Some(id))
            .unwrap_or_else(|| panic!("no ledger row for {id}"))
    }

    /// Cell `column` of the row keyed by `id`
    pub fn cell(&self, id: &str, column: &str) -> &str {
        &self.row(id)[self.column(column)]
    }
}
