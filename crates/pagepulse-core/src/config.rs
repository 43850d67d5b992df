//! Agent and pipeline configuration.
//!
//! [`AgentConfig`] holds the five options an integrator passes at init. It is
//! parsed field by field: a value of the wrong type is ignored and the default
//! kept, unknown fields are ignored too. [`AppConfig`] adds the pipeline
//! options used by the transport and the join.

use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

/// Default HTTP fallback timeout
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Integrator options
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Promote metric dumps to `info` level
    pub log: bool,
    /// Keep watching for slow resources after the base record
    pub observe: bool,
    /// Resources at or below this many ms are not reported
    pub slower_time: f64,
    /// Base record endpoint
    pub port: String,
    /// Slow-resource endpoint
    pub slower_port: String,
}

impl AgentConfig {
    /// Lenient parse of an init object.
    pub fn from_value(value: &Value) -> Self {
        let mut config = Self::default();
        let Some(fields) = value.as_object() else {
            debug!("agent config is not an object, using defaults");
            return config;
        };

        for (name, field) in fields {
            let accepted = match name.as_str() {
                "log" => field.as_bool().map(|v| config.log = v).is_some(),
                "observe" => field.as_bool().map(|v| config.observe = v).is_some(),
                "slowerTime" => field
                    .as_f64()
                    .filter(|v| v.is_finite() && *v >= 0.0)
                    .map(|v| config.slower_time = v)
                    .is_some(),
                "port" => field.as_str().map(|v| config.port = v.to_string()).is_some(),
                "slowerPort" => field
                    .as_str()
                    .map(|v| config.slower_port = v.to_string())
                    .is_some(),
                _ => {
                    debug!("unknown agent option ignored: {name}");
                    continue;
                }
            };
            if !accepted {
                debug!("agent option {name} has an invalid value, ignored");
            }
        }

        config
    }

    /// Continuous slow-resource observation is on
    pub fn continuous_enabled(&self) -> bool {
        self.observe && !self.slower_port.is_empty()
    }

    /// Slow-resource reporting is on at all
    pub fn resources_enabled(&self) -> bool {
        !self.slower_port.is_empty()
    }
}

impl<'de> Deserialize<'de> for AgentConfig {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

/// Outbound transport settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// HTTP fallback request timeout (ms)
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// IP/geolocation lookup URL; no lookup when absent
    #[serde(default)]
    pub geo_endpoint: Option<String>,
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            geo_endpoint: None,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    /// Give up on the base-record join after this many ms. Unbounded when absent.
    #[serde(default)]
    pub join_timeout_ms: Option<u64>,
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.transport.request_timeout_ms)
    }

    pub fn join_timeout(&self) -> Option<Duration> {
        self.join_timeout_ms.map(Duration::from_millis)
    }
}
