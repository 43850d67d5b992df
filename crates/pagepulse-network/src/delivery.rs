//! Report delivery.
//!
//! Every report goes out as `{"data": <payload>}`. The beacon channel is tried
//! first; if it is missing or refuses the payload, the same body is POSTed to
//! the same endpoint. Failures are logged and reported as an outcome, never
//! retried and never returned as an error.

use std::sync::Arc;

use async_trait::async_trait;
use pagepulse_core::ports::transport::{
    BeaconChannel, DeliveryOutcome, HttpTransport, ReportTransport,
};
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

/// Wraps a payload in the collector's envelope
pub fn envelope(payload: Value) -> Value {
    json!({ "data": payload })
}

/// Beacon-then-HTTP `ReportTransport`
#[derive(Default)]
pub struct Deliverer {
    beacon: Option<Arc<dyn BeaconChannel>>,
    http: Option<Arc<dyn HttpTransport>>,
    /// Relative endpoints resolve against this
    base_url: Option<Url>,
}

impl Deliverer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_beacon(mut self, beacon: Arc<dyn BeaconChannel>) -> Self {
        self.beacon = Some(beacon);
        self
    }

    pub fn with_http(mut self, http: Arc<dyn HttpTransport>) -> Self {
        self.http = Some(http);
        self
    }

    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Absolute URL for `endpoint`, or the endpoint unchanged if it cannot be
    /// resolved.
    pub fn resolve(&self, endpoint: &str) -> String {
        match Url::parse(endpoint) {
            Ok(url) => url.to_string(),
            Err(url::ParseError::RelativeUrlWithoutBase) => match &self.base_url {
                Some(base) => match base.join(endpoint) {
                    Ok(url) => url.to_string(),
                    Err(e) => {
                        debug!("cannot resolve {endpoint} against {base}: {e}");
                        endpoint.to_string()
                    }
                },
                None => endpoint.to_string(),
            },
            Err(e) => {
                debug!("endpoint {endpoint} is not a URL: {e}");
                endpoint.to_string()
            }
        }
    }
}

#[async_trait]
impl ReportTransport for Deliverer {
    async fn deliver(&self, endpoint: &str, payload: Value) -> DeliveryOutcome {
        let body = match serde_json::to_string(&envelope(payload)) {
            Ok(body) => body,
            Err(e) => {
                warn!("failed to serialize report for {endpoint}: {e}");
                return DeliveryOutcome::Failed;
            }
        };
        let url = self.resolve(endpoint);

        if let Some(beacon) = &self.beacon {
            if beacon.send_beacon(&url, &body) {
                debug!("beacon queued for {url}");
                return DeliveryOutcome::Beaconed;
            }
            debug!("beacon refused for {url}, falling back to HTTP");
        }

        let Some(http) = &self.http else {
            warn!("no HTTP transport, report for {url} dropped");
            return DeliveryOutcome::Failed;
        };

        match http.post_json(&url, body).await {
            Ok(status) => {
                debug!("report POSTed to {url}: {status}");
                DeliveryOutcome::Posted { status }
            }
            Err(e) => {
                warn!("report delivery to {url} failed: {e}");
                DeliveryOutcome::Failed
            }
        }
    }
}
