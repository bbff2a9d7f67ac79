//! File content transport: session, transport trait, and the reqwest implementation.

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

/// Failure below the HTTP status level (timeout, connection, body read)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

/// Status code and body of a completed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body; only meaningful for success codes
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// Whether the status is in the 2xx range
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Authenticated remote session: instance host plus bearer credential.
///
/// Read-only once built; shared by every worker without locking.
#[derive(Clone)]
pub struct Session {
    instance_url: Url,
    access_token: String,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("instance_url", &self.instance_url.as_str())
            .field("access_token", &"<redacted>")
            .finish()
    }
}

impl Session {
    /// Create a session. A bare host (`acme.my.example.com`) is treated as https.
    pub fn new(instance: &str, access_token: impl Into<String>) -> Result<Self> {
        let instance = instance.trim().trim_end_matches('/');
        let instance_url = if instance.contains("://") {
            Url::parse(instance)?
        } else {
            Url::parse(&format!("https://{instance}"))?
        };

        Ok(Self {
            instance_url,
            access_token: access_token.into(),
        })
    }

    /// Instance base URL
    pub fn instance_url(&self) -> &Url {
        &self.instance_url
    }

    /// Bearer credential sent with every request
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Resolve a record's relative source path (`/services/data/...`) against the instance.
    ///
    /// The credential is only ever sent to the instance, so a path that
    /// resolves to another origin (absolute or `//host` URLs) is rejected.
    pub fn resolve(&self, relative: &str) -> Result<Url> {
        let url = self.instance_url.join(relative)?;
        if url.origin() != self.instance_url.origin() {
            return Err(Error::ForeignOrigin {
                url: url.to_string(),
                instance: self.instance_url.origin().ascii_serialization(),
            });
        }
        Ok(url)
    }
}

/// Abstraction over authenticated GET requests, enabling testability.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// Issue one GET for `url` with `credential` as bearer token.
    ///
    /// Any HTTP status is a successful fetch; only failures to obtain a
    /// response at all are errors.
    async fn fetch(&self, url: &Url, credential: &str) -> std::result::Result<FetchResponse, TransportError>;
}

/// Production [`Transport`] backed by one shared `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpTransport {
    /// Build the client with a fixed per-request timeout.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("crm-file-export/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, timeout })
    }

    /// The underlying client, shared with the query collaborator
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    fn describe(&self, url: &Url, e: &reqwest::Error) -> TransportError {
        let message = if e.is_timeout() {
            format!(
                "timed out fetching '{}' (exceeded {} seconds)",
                url,
                self.timeout.as_secs()
            )
        } else if e.is_connect() {
            format!("connection failed for '{}': {}", url, e)
        } else {
            format!("request to '{}' failed: {}", url, e)
        };
        TransportError(message)
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &Url, credential: &str) -> std::result::Result<FetchResponse, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(credential)
            .send()
            .await
            .map_err(|e| self.describe(url, &e))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.describe(url, &e))?;

        Ok(FetchResponse {
            status,
            body: body.to_vec(),
        })
    }
}
