//! HTTP fallback transport.
//!
//! `HttpTransport` port implementation over reqwest. One POST per call, no
//! retries.

use std::time::Duration;

use async_trait::async_trait;
use pagepulse_core::error::CoreError;
use pagepulse_core::ports::transport::HttpTransport;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

/// reqwest-backed `HttpTransport`
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, CoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CoreError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Shares an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn post_json(&self, url: &str, body: String) -> Result<u16, CoreError> {
        debug!("POST {url} ({} bytes)", body.len());

        let resp = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| CoreError::Network(format!("POST {url} failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_else(|e| {
                warn!("failed to read response body: {e}");
                String::new()
            });
            warn!("POST {url} answered {status}: {text}");
        }
        Ok(status.as_u16())
    }
}
