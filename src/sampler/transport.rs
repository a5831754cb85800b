//! Metadata service transport
//!
//! The sampler talks to the metadata service through [`MetadataTransport`]
//! so the HTTP client can be swapped out under test.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use thiserror::Error;

/// Well-known spot termination notice URL
pub const TERMINATION_TIME_URL: &str =
    "http://169.254.169.254/latest/meta-data/spot/termination-time";

/// Default bound on the whole request, connect through body
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Failures talking to the metadata service
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("failed to read body: {0}")]
    Body(String),
    #[error("failed to build client: {0}")]
    Client(String),
}

impl TransportError {
    fn from_reqwest(err: reqwest::Error, reading_body: bool) -> Self {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_connect() {
            TransportError::Connect(err.to_string())
        } else if reading_body {
            TransportError::Body(err.to_string())
        } else {
            TransportError::Request(err.to_string())
        }
    }
}

/// Response body, released when dropped
#[async_trait]
pub trait ResponseBody: Send {
    /// Read the remaining body as text
    async fn read_text(&mut self) -> Result<String, TransportError>;
}

/// Status and (unread) body of a metadata response
pub struct MetadataResponse {
    pub status: StatusCode,
    pub body: Box<dyn ResponseBody>,
}

impl std::fmt::Debug for MetadataResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataResponse")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

/// One GET against the termination-time endpoint
#[async_trait]
pub trait MetadataTransport: Send + Sync {
    async fn fetch(&self) -> Result<MetadataResponse, TransportError>;
}

/// reqwest-backed transport with a fixed URL and timeout
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, TransportError> {
        // Link-local metadata must never be routed through an HTTP proxy
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl MetadataTransport for HttpTransport {
    async fn fetch(&self) -> Result<MetadataResponse, TransportError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(e, false))?;

        Ok(MetadataResponse {
            status: response.status(),
            body: Box::new(HttpBody { response }),
        })
    }
}

struct HttpBody {
    response: reqwest::Response,
}

#[async_trait]
impl ResponseBody for HttpBody {
    async fn read_text(&mut self) -> Result<String, TransportError> {
        let mut buf = Vec::new();
        while let Some(chunk) = self
            .response
            .chunk()
            .await
            .map_err(|e| TransportError::from_reqwest(e, true))?
        {
            buf.extend_from_slice(&chunk);
        }
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}
