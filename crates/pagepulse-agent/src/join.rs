//! Base-record join.
//!
//! Waits for the legacy and navigation recorders to finish their load pass
//! and for the optional geo lookup, then builds the base record, dispatches
//! it, opens the gate and runs the one-shot slow-resource pass.

use std::sync::Arc;
use std::time::Duration;

use pagepulse_core::config::AgentConfig;
use pagepulse_core::gate::BaseFlagGate;
use pagepulse_core::models::record::{BaseTelemetryRecord, GeoInfo, TimingValues};
use pagepulse_core::models::timing::{MetricKey, TimingBucket};
use pagepulse_core::ports::geo::GeoLookup;
use pagepulse_core::ports::host::HostCapabilities;
use pagepulse_core::ports::transport::ReportTransport;
use pagepulse_monitor::environment;
use pagepulse_monitor::resource::ResourceWatcher;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Normalized zero, see `extractor::handle_fixed`
const ZERO: &str = "0";

fn is_set(value: &&str) -> bool {
    *value != ZERO
}

/// Per key: the navigation value, unless it is missing or zero and the legacy
/// value is set. With no navigation value the legacy one passes through as is.
pub fn merge_timings(navigation: &TimingBucket, legacy: &TimingBucket) -> TimingValues {
    MetricKey::ALL
        .iter()
        .map(|&key| {
            let nav = navigation.time(key);
            let value = match nav.filter(is_set) {
                Some(v) => Some(v),
                None => legacy.time(key).filter(is_set).or(nav).or(legacy.time(key)),
            };
            (key, value.map(str::to_string))
        })
        .collect()
}

/// Builds the record from both buckets, the geo result and the host's
/// network and device info.
pub fn build_record(
    navigation: &TimingBucket,
    legacy: &TimingBucket,
    geo: &GeoInfo,
    host: &HostCapabilities,
) -> BaseTelemetryRecord {
    let address = navigation.address().or(legacy.address()).map(str::to_string);
    let first_paint = navigation
        .first_paint()
        .or(legacy.first_paint())
        .map(str::to_string);

    BaseTelemetryRecord::new(
        merge_timings(navigation, legacy),
        address,
        first_paint,
        environment::network_info(host, geo),
        environment::device_info(host),
    )
}

/// How the join ended
#[derive(Debug)]
pub enum JoinOutcome {
    Ready {
        legacy: TimingBucket,
        navigation: TimingBucket,
        geo: GeoInfo,
    },
    /// A recorder detached before the page finished loading
    Detached,
    TimedOut,
}

async fn lookup(geo: Option<Arc<dyn GeoLookup>>) -> GeoInfo {
    let Some(geo) = geo else {
        return GeoInfo::default();
    };
    geo.lookup().await.unwrap_or_else(|e| {
        warn!("geo lookup failed, record goes out without ip/city: {e}");
        GeoInfo::default()
    })
}

/// Waits for every producer. Unbounded unless `timeout` is set.
pub async fn join_sources(
    legacy: oneshot::Receiver<TimingBucket>,
    navigation: oneshot::Receiver<TimingBucket>,
    geo: Option<Arc<dyn GeoLookup>>,
    timeout: Option<Duration>,
) -> JoinOutcome {
    let all = async {
        let (legacy, navigation, geo) = tokio::join!(legacy, navigation, lookup(geo));
        match (legacy, navigation) {
            (Ok(legacy), Ok(navigation)) => JoinOutcome::Ready {
                legacy,
                navigation,
                geo,
            },
            _ => JoinOutcome::Detached,
        }
    };

    match timeout {
        Some(limit) => tokio::time::timeout(limit, all).await.unwrap_or_else(|_| {
            warn!("join did not complete within {limit:?}, abandoned");
            JoinOutcome::TimedOut
        }),
        None => all.await,
    }
}

/// Everything the join needs after the producers settle.
pub struct JoinCoordinator {
    pub config: AgentConfig,
    pub host: HostCapabilities,
    pub gate: Arc<BaseFlagGate>,
    pub transport: Arc<dyn ReportTransport>,
    pub watcher: Arc<ResourceWatcher>,
    pub geo: Option<Arc<dyn GeoLookup>>,
    pub timeout: Option<Duration>,
}

impl JoinCoordinator {
    /// Joins, reports, and returns the record that was dispatched.
    pub async fn run(
        self,
        legacy: oneshot::Receiver<TimingBucket>,
        navigation: oneshot::Receiver<TimingBucket>,
    ) -> Option<BaseTelemetryRecord> {
        let (legacy, navigation, geo) =
            match join_sources(legacy, navigation, self.geo.clone(), self.timeout).await {
                JoinOutcome::Ready {
                    legacy,
                    navigation,
                    geo,
                } => (legacy, navigation, geo),
                other => {
                    info!("no base record for this page view: {other:?}");
                    return None;
                }
            };

        let record = build_record(&navigation, &legacy, &geo, &self.host);
        self.log_record(&record);

        let payload = match serde_json::to_value(&record) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("failed to serialize base record: {e}");
                return None;
            }
        };

        if self.config.port.is_empty() {
            warn!("no base endpoint configured, base record not sent");
        } else {
            let outcome = self.transport.deliver(&self.config.port, payload).await;
            debug!("base record: {outcome:?}");
        }
        // resource batches stay held until the base delivery has returned
        self.gate.open();

        if self.config.resources_enabled() {
            match self.watcher.report_once().await {
                Some(outcome) => debug!("slow resources after load: {outcome:?}"),
                None => debug!("no slow resources after load"),
            }
        }

        Some(record)
    }

    fn log_record(&self, record: &BaseTelemetryRecord) {
        let populated = record.timings().values().filter(|v| v.is_some()).count();
        if self.config.log {
            info!("base timings ({populated} set): {:?}", record.timings());
            info!("network: {:?}", record.network());
            info!("device: {:?}", record.device());
        } else {
            debug!("base timings ({populated} set): {:?}", record.timings());
            debug!("network: {:?}", record.network());
            debug!("device: {:?}", record.device());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pagepulse_core::error::CoreError;
    use pagepulse_core::models::timing::TimingSource;

    fn bucket(source: TimingSource, values: &[(MetricKey, &str)]) -> TimingBucket {
        let mut bucket = TimingBucket::new(source);
        for (key, value) in values {
            bucket.record(*key, value.to_string());
        }
        bucket
    }

    #[test]
    fn navigation_wins_when_both_present() {
        let nav = bucket(TimingSource::Navigation, &[(MetricKey::DnsTime, "0.030")]);
        let legacy = bucket(TimingSource::Legacy, &[(MetricKey::DnsTime, "0.031")]);

        let merged = merge_timings(&nav, &legacy);
        assert_eq!(merged[&MetricKey::DnsTime].as_deref(), Some("0.030"));
    }

    #[test]
    fn legacy_fills_missing_and_zero_values() {
        let nav = bucket(
            TimingSource::Navigation,
            &[(MetricKey::TcpTime, "0"), (MetricKey::HttpTime, "0")],
        );
        let legacy = bucket(
            TimingSource::Legacy,
            &[
                (MetricKey::TcpTime, "0.020"),
                (MetricKey::FullLoadTime, "0.310"),
                (MetricKey::HttpTime, "0"),
            ],
        );

        let merged = merge_timings(&nav, &legacy);
        assert_eq!(merged[&MetricKey::TcpTime].as_deref(), Some("0.020"));
        assert_eq!(merged[&MetricKey::FullLoadTime].as_deref(), Some("0.310"));
        assert_eq!(merged[&MetricKey::HttpTime].as_deref(), Some("0"));
        assert_eq!(merged[&MetricKey::RedirectTime], None);
        assert_eq!(merged.len(), MetricKey::COUNT);
    }

    #[test]
    fn legacy_zero_passes_through_without_navigation() {
        let nav = TimingBucket::new(TimingSource::Navigation);
        let legacy = bucket(
            TimingSource::Legacy,
            &[(MetricKey::TcpTime, "0"), (MetricKey::DnsTime, "0.030")],
        );

        let merged = merge_timings(&nav, &legacy);
        assert_eq!(merged[&MetricKey::TcpTime].as_deref(), Some("0"));
        assert_eq!(merged[&MetricKey::DnsTime].as_deref(), Some("0.030"));
        assert_eq!(merged[&MetricKey::TlsTime], None);
    }

    struct StaticGeo;

    #[async_trait]
    impl GeoLookup for StaticGeo {
        async fn lookup(&self) -> Result<GeoInfo, CoreError> {
            Ok(GeoInfo {
                ip: Some("1.2.3.4".to_string()),
                city: None,
            })
        }
    }

    struct FailingGeo;

    #[async_trait]
    impl GeoLookup for FailingGeo {
        async fn lookup(&self) -> Result<GeoInfo, CoreError> {
            Err(CoreError::Network("offline".to_string()))
        }
    }

    #[tokio::test]
    async fn join_waits_for_every_producer() {
        let (legacy_tx, legacy_rx) = oneshot::channel();
        let (nav_tx, nav_rx) = oneshot::channel();

        let join = tokio::spawn(join_sources(legacy_rx, nav_rx, Some(Arc::new(StaticGeo)), None));
        legacy_tx.send(TimingBucket::new(TimingSource::Legacy)).unwrap();
        tokio::task::yield_now().await;
        assert!(!join.is_finished());

        nav_tx.send(TimingBucket::new(TimingSource::Navigation)).unwrap();
        match join.await.unwrap() {
            JoinOutcome::Ready { geo, .. } => assert_eq!(geo.ip.as_deref(), Some("1.2.3.4")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_lookup_still_settles() {
        let (legacy_tx, legacy_rx) = oneshot::channel();
        let (nav_tx, nav_rx) = oneshot::channel();
        legacy_tx.send(TimingBucket::new(TimingSource::Legacy)).unwrap();
        nav_tx.send(TimingBucket::new(TimingSource::Navigation)).unwrap();

        let outcome = join_sources(legacy_rx, nav_rx, Some(Arc::new(FailingGeo)), None).await;
        assert!(matches!(outcome, JoinOutcome::Ready { geo, .. } if geo == GeoInfo::default()));
    }

    #[tokio::test]
    async fn dropped_producer_means_detached() {
        let (legacy_tx, legacy_rx) = oneshot::channel::<TimingBucket>();
        let (nav_tx, nav_rx) = oneshot::channel();
        drop(legacy_tx);
        nav_tx.send(TimingBucket::new(TimingSource::Navigation)).unwrap();

        let outcome = join_sources(legacy_rx, nav_rx, None, None).await;
        assert!(matches!(outcome, JoinOutcome::Detached));
    }

    #[tokio::test(start_paused = true)]
    async fn optional_timeout_abandons_a_stalled_join() {
        let (_legacy_tx, legacy_rx) = oneshot::channel::<TimingBucket>();
        let (_nav_tx, nav_rx) = oneshot::channel::<TimingBucket>();

        let outcome =
            join_sources(legacy_rx, nav_rx, None, Some(Duration::from_millis(3_000))).await;
        assert!(matches!(outcome, JoinOutcome::TimedOut));
    }
}
