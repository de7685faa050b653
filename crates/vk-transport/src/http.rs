//! reqwest-backed form-post transport

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::TransportError;
use crate::Result;

/// POST form-encoded fields to a URL and return the response body.
///
/// TLS is mandatory: implementations must reject plaintext URLs rather
/// than fall back to them. One invocation is one request; retries are the
/// caller's business.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn post_form(&self, url: &str, fields: &BTreeMap<String, String>) -> Result<String>;
}

/// HTTPS transport backed by a shared [`reqwest::Client`].
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Create a transport with no request timeout. The upstream service
    /// specifies none; callers needing bounded latency use
    /// [`HttpTransport::with_timeout`].
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self { client })
    }

    /// Create a transport with a per-request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post_form(&self, url: &str, fields: &BTreeMap<String, String>) -> Result<String> {
        if !url.starts_with("https://") {
            return Err(TransportError::Insecure(url.to_string()));
        }

        tracing::debug!(url = %url, field_count = fields.len(), "posting form");

        let response = self.client.post(url).form(fields).send().await?;

        // The server reports failures in the JSON body, sometimes under a
        // non-2xx status; hand the body back regardless of status so the
        // error payload is not lost.
        tracing::debug!(status = response.status().as_u16(), "response received");

        Ok(response.text().await?)
    }
}
