//! Record query collaborator and its REST implementation

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::transport::Session;
use crate::types::Record;

/// All records returned by a query
#[derive(Clone, Debug, PartialEq)]
pub struct QueryResult {
    /// Records in server order
    pub records: Vec<Record>,
    /// Total count reported by the server
    pub total_size: usize,
}

/// Executes a query and returns every matching record.
///
/// Failures are fatal to the run.
#[async_trait::async_trait]
pub trait RecordSource: Send + Sync {
    /// Run `query` to completion, following pagination.
    async fn query_all(&self, query: &str) -> Result<QueryResult>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryPage {
    #[serde(default)]
    total_size: usize,
    #[serde(default = "default_done")]
    done: bool,
    #[serde(default)]
    records: Vec<Record>,
    next_records_url: Option<String>,
}

fn default_done() -> bool {
    true
}

/// Queries the REST `queryAll` endpoint (includes archived and deleted rows).
#[derive(Clone, Debug)]
pub struct RestQueryClient {
    client: reqwest::Client,
    session: Session,
    api_version: String,
}

impl RestQueryClient {
    /// Create a client for `session` using REST API version `api_version` (e.g. `59.0`).
    pub fn new(client: reqwest::Client, session: Session, api_version: impl Into<String>) -> Self {
        Self {
            client,
            session,
            api_version: api_version.into(),
        }
    }

    async fn fetch_page(&self, url: url::Url) -> Result<QueryPage> {
        debug!(url = %url, "fetching query page");
        let response = self
            .client
            .get(url)
            .bearer_auth(self.session.access_token())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(Error::Query(format!("HTTP {}: {}", status.as_u16(), body.trim())));
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait::async_trait]
impl RecordSource for RestQueryClient {
    async fn query_all(&self, query: &str) -> Result<QueryResult> {
        let mut url = self
            .session
            .resolve(&format!("/services/data/v{}/queryAll", self.api_version))?;
        url.query_pairs_mut().append_pair("q", query);

        let mut page = self.fetch_page(url).await?;
        let total_size = page.total_size;
        let mut records = std::mem::take(&mut page.records);

        while !page.done {
            let Some(next) = page.next_records_url.take() else {
                warn!(
                    fetched = records.len(),
                    total_size, "query page not done but no next page URL, stopping"
                );
                break;
            };
            page = self.fetch_page(self.session.resolve(&next)?).await?;
            records.append(&mut page.records);
        }

        info!(records = records.len(), total_size, "query complete");
        Ok(QueryResult { records, total_size })
    }
}
