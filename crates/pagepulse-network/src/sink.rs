//! Analytics-sink transport.
//!
//! Routes reports through an integrator-supplied `track(event, payload)`
//! instead of HTTP. The endpoint travels inside the payload so one sink can
//! serve both the base record and resource batches.

use std::sync::Arc;

use async_trait::async_trait;
use pagepulse_core::ports::transport::{AnalyticsSink, DeliveryOutcome, ReportTransport};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Default event name for tracked reports
pub const DEFAULT_EVENT_NAME: &str = "pagepulse_report";

/// `ReportTransport` over an [`AnalyticsSink`]
pub struct SinkTransport {
    sink: Arc<dyn AnalyticsSink>,
    event_name: String,
}

impl SinkTransport {
    pub fn new(sink: Arc<dyn AnalyticsSink>) -> Self {
        Self {
            sink,
            event_name: DEFAULT_EVENT_NAME.to_string(),
        }
    }

    pub fn with_event_name(mut self, event_name: impl Into<String>) -> Self {
        self.event_name = event_name.into();
        self
    }
}

#[async_trait]
impl ReportTransport for SinkTransport {
    async fn deliver(&self, endpoint: &str, payload: Value) -> DeliveryOutcome {
        let tracked = json!({ "endpoint": endpoint, "data": payload });
        match self.sink.track(&self.event_name, tracked).await {
            Ok(()) => {
                debug!("{} tracked for {endpoint}", self.event_name);
                DeliveryOutcome::Tracked
            }
            Err(e) => {
                warn!("analytics sink rejected {}: {e}", self.event_name);
                DeliveryOutcome::Failed
            }
        }
    }
}
