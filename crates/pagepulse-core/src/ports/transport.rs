//! Outbound transport ports.
//!
//! Implementation: `pagepulse-network` crate (`Deliverer`, `ReqwestTransport`,
//! `SinkTransport`)

use async_trait::async_trait;

use crate::error::CoreError;

/// Non-blocking beacon channel.
///
/// Returns `true` when the host accepted the payload into its outbound
/// queue. Acceptance says nothing about server acknowledgment.
pub trait BeaconChannel: Send + Sync {
    fn send_beacon(&self, url: &str, body: &str) -> bool;
}

/// Plain HTTP POST with a JSON body (CORS mode on browser hosts)
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Sends `body` with `Content-Type: application/json`, returns the status code
    async fn post_json(&self, url: &str, body: String) -> Result<u16, CoreError>;
}

/// Integrator-provided analytics dispatcher (`track(eventName, payload)`)
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn track(&self, event_name: &str, payload: serde_json::Value) -> Result<(), CoreError>;
}

/// How a payload left the agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Accepted by the beacon channel
    Beaconed,
    /// Sent by the HTTP fallback; carries the response status
    Posted { status: u16 },
    /// Handed to an analytics sink
    Tracked,
    /// Every channel failed or none was available
    Failed,
}

impl DeliveryOutcome {
    pub fn is_sent(&self) -> bool {
        !matches!(self, DeliveryOutcome::Failed)
    }
}

/// The delivery layer as seen by the pipeline.
///
/// `payload` is the `data` member of the outbound envelope. Implementations
/// never return errors: failures are logged and reported as
/// [`DeliveryOutcome::Failed`].
#[async_trait]
pub trait ReportTransport: Send + Sync {
    async fn deliver(&self, endpoint: &str, payload: serde_json::Value) -> DeliveryOutcome;
}
