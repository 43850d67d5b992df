//! # pagepulse-core
//!
//! Domain models, port traits and error types shared by every pagepulse crate.
//!
//! ## Layout
//!
//! - [`models`]: timing snapshots, performance entries, buckets and records (serde)
//! - [`ports`]: host capability and transport interfaces (async_trait)
//! - [`error`]: core error type (thiserror)
//! - [`config`]: agent and pipeline configuration
//! - [`config_manager`]: config file loading, defaults written on first run
//! - [`gate`]: the base-record gate for resource batches

pub mod config;
pub mod config_manager;
pub mod error;
pub mod gate;
pub mod models;
pub mod ports;

#[cfg(test)]
mod tests {
    use crate::models::timing::{MetricKey, TimingBucket, TimingSource};

    #[test]
    fn bucket_serde_shape() {
        let mut bucket = TimingBucket::new(TimingSource::Navigation);
        bucket.record(MetricKey::DnsTime, "0.030".to_string());

        let json = serde_json::to_value(&bucket).unwrap();
        assert_eq!(json["source"], "navigation");
        assert_eq!(json["entries"]["dns-time"]["time"], "0.030");
        assert!(json["entries"]["tls-time"]["time"].is_null());
    }

    #[test]
    fn config_defaults() {
        let config = crate::config::AppConfig::default();
        assert!(!config.agent.log);
        assert!(!config.agent.observe);
        assert_eq!(config.agent.slower_time, 0.0);
        assert!(config.agent.port.is_empty());
        assert_eq!(config.transport.request_timeout_ms, 10_000);
        assert!(config.join_timeout_ms.is_none());
    }
}
