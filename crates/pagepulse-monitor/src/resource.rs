//! Slow-resource watching.
//!
//! Turns resource-timing entries into [`ResourceSample`]s for every resource
//! slower than the configured threshold and reports them, either once over
//! the whole resource list or continuously from an entry observer.

use std::sync::Arc;

use pagepulse_core::config::AgentConfig;
use pagepulse_core::gate::BaseFlagGate;
use pagepulse_core::models::entry::{positive, EntryType, PerformanceEntry};
use pagepulse_core::models::resource::ResourceSample;
use pagepulse_core::ports::host::HostCapabilities;
use pagepulse_core::ports::transport::{DeliveryOutcome, ReportTransport};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::extractor::handle_fixed;

/// Entry types the continuous observer subscribes to
pub const OBSERVED_ENTRY_TYPES: [EntryType; 4] = [
    EntryType::Navigation,
    EntryType::Resource,
    EntryType::Mark,
    EntryType::Paint,
];

/// Below this duration (ms) an entry without size info counts as cached
const CACHE_DURATION_THRESHOLD_MS: f64 = 30.0;

/// `responseEnd - fetchStart`, if both are present
fn load_time(entry: &PerformanceEntry) -> Option<f64> {
    Some(positive(entry.timing.response_end)? - positive(entry.timing.fetch_start)?)
}

/// True if the entry took longer than `slower_time` ms
pub fn is_slow(entry: &PerformanceEntry, slower_time: f64) -> bool {
    load_time(entry).is_some_and(|t| t > slower_time)
}

/// Cache-hit heuristic.
///
/// Bytes on the wire mean a network fetch. Otherwise a decoded body means a
/// same-origin (or timing-allowed) cache hit. Cross-origin entries expose
/// neither, so a very short duration is taken as a hit; this can misclassify.
pub fn is_cache_hit(entry: &PerformanceEntry) -> bool {
    if entry.transfer_size.is_some_and(|s| s > 0.0) {
        return false;
    }
    if entry.decoded_body_size.is_some_and(|s| s > 0.0) {
        return true;
    }
    entry.duration < CACHE_DURATION_THRESHOLD_MS
}

/// Time (ms) the request sat queued before it could go out.
pub fn blocking_time(entry: &PerformanceEntry) -> f64 {
    let t = &entry.timing;
    if let Some(connect_end) = positive(t.connect_end) {
        if t.fetch_start == Some(connect_end) {
            return t.request_start.map_or(0.0, |rs| rs - connect_end);
        }
    }
    if let Some(lookup_start) = positive(t.domain_lookup_start) {
        return t.fetch_start.map_or(0.0, |fs| lookup_start - fs);
    }
    0.0
}

fn sample(entry: &PerformanceEntry, load_time: f64) -> ResourceSample {
    ResourceSample {
        name: entry.name.clone(),
        initiator_type: entry.initiator_type.clone().unwrap_or_default(),
        duration: handle_fixed(load_time),
        cache_hit: is_cache_hit(entry),
        blocking_time: blocking_time(entry),
    }
}

/// Samples for every entry slower than `slower_time`
pub fn collect_slow(entries: &[PerformanceEntry], slower_time: f64) -> Vec<ResourceSample> {
    entries
        .iter()
        .filter(|entry| is_slow(entry, slower_time))
        .filter_map(|entry| load_time(entry).map(|t| sample(entry, t)))
        .collect()
}

/// Reports slow resources to the slow-resource endpoint.
pub struct ResourceWatcher {
    host: HostCapabilities,
    gate: Arc<BaseFlagGate>,
    transport: Arc<dyn ReportTransport>,
    slower_time: f64,
    slower_port: String,
    verbose: bool,
}

impl ResourceWatcher {
    pub fn new(
        config: &AgentConfig,
        host: HostCapabilities,
        gate: Arc<BaseFlagGate>,
        transport: Arc<dyn ReportTransport>,
    ) -> Self {
        Self {
            host,
            gate,
            transport,
            slower_time: config.slower_time,
            slower_port: config.slower_port.clone(),
            verbose: config.log,
        }
    }

    pub fn slower_time(&self) -> f64 {
        self.slower_time
    }

    /// Drops entries for the agent's own reporting requests
    pub fn exclude_own_requests(&self, entries: Vec<PerformanceEntry>) -> Vec<PerformanceEntry> {
        if self.slower_port.is_empty() {
            return entries;
        }
        entries
            .into_iter()
            .filter(|entry| !entry.name.contains(self.slower_port.as_str()))
            .collect()
    }

    /// Filters `entries` and delivers the slow ones as one batch.
    ///
    /// Returns `None` when nothing was sent: gate closed, no endpoint, or no
    /// slow entries.
    pub async fn report(&self, entries: &[PerformanceEntry]) -> Option<DeliveryOutcome> {
        if self.slower_port.is_empty() {
            return None;
        }
        if !self.gate.is_open() {
            debug!("base record not sent yet, {} entries held back", entries.len());
            return None;
        }

        let samples = collect_slow(entries, self.slower_time);
        if samples.is_empty() {
            return None;
        }

        if self.verbose {
            info!("slow resources: {}", samples.len());
        } else {
            debug!("slow resources: {}", samples.len());
        }

        let payload = match serde_json::to_value(&samples) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("failed to serialize resource samples: {e}");
                return None;
            }
        };
        Some(self.transport.deliver(&self.slower_port, payload).await)
    }

    /// One pass over every resource entry recorded since navigation start
    pub async fn report_once(&self) -> Option<DeliveryOutcome> {
        let entries = self.host.entries_by_type(EntryType::Resource);
        debug!("one-shot resource scan over {} entries", entries.len());
        self.report(&entries).await
    }

    /// Starts continuous observation.
    ///
    /// Returns `None` when the host cannot observe entries.
    pub fn watch(self: Arc<Self>) -> Option<JoinHandle<()>> {
        let Some(observer) = self.host.observer.clone() else {
            info!("host has no entry observer, continuous resource watch off");
            return None;
        };

        let mut batches = match observer.observe(&OBSERVED_ENTRY_TYPES) {
            Ok(rx) => rx,
            Err(e) => {
                warn!("entry observer failed to start: {e}");
                return None;
            }
        };

        Some(tokio::spawn(async move {
            while let Some(batch) = batches.recv().await {
                let batch = self.exclude_own_requests(batch);
                if batch.is_empty() {
                    continue;
                }
                self.report(&batch).await;
            }
            debug!("entry observer closed");
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pagepulse_core::error::CoreError;
    use pagepulse_core::models::entry::TimingSnapshot;
    use pagepulse_core::ports::host::{EntryObserver, EntryProvider};
    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    fn entry(name: &str, fetch_start: Option<f64>, response_end: Option<f64>) -> PerformanceEntry {
        PerformanceEntry {
            name: name.to_string(),
            entry_type: EntryType::Resource,
            initiator_type: Some("script".to_string()),
            duration: 100.0,
            timing: TimingSnapshot {
                fetch_start,
                response_end,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(String, serde_json::Value)>>,
    }

    #[async_trait]
    impl ReportTransport for RecordingTransport {
        async fn deliver(&self, endpoint: &str, payload: serde_json::Value) -> DeliveryOutcome {
            self.sent.lock().push((endpoint.to_string(), payload));
            DeliveryOutcome::Beaconed
        }
    }

    struct FakeEntries {
        resources: Vec<PerformanceEntry>,
        observer_tx: Mutex<Option<mpsc::UnboundedSender<Vec<PerformanceEntry>>>>,
    }

    impl EntryProvider for FakeEntries {
        fn entries_by_type(&self, entry_type: EntryType) -> Vec<PerformanceEntry> {
            if entry_type == EntryType::Resource {
                self.resources.clone()
            } else {
                Vec::new()
            }
        }

        fn supports_navigation_timing(&self) -> bool {
            false
        }

        fn mark(&self, _name: &str) {}

        fn clear_resource_timings(&self) {}
    }

    impl EntryObserver for FakeEntries {
        fn observe(
            &self,
            entry_types: &[EntryType],
        ) -> Result<mpsc::UnboundedReceiver<Vec<PerformanceEntry>>, CoreError> {
            assert_eq!(entry_types, &OBSERVED_ENTRY_TYPES);
            let (tx, rx) = mpsc::unbounded_channel();
            *self.observer_tx.lock() = Some(tx);
            Ok(rx)
        }
    }

    fn watcher(
        resources: Vec<PerformanceEntry>,
        slower_time: f64,
    ) -> (Arc<ResourceWatcher>, Arc<FakeEntries>, Arc<BaseFlagGate>, Arc<RecordingTransport>) {
        let fake = Arc::new(FakeEntries {
            resources,
            observer_tx: Mutex::new(None),
        });
        let host = HostCapabilities {
            entries: Some(fake.clone()),
            observer: Some(fake.clone()),
            ..Default::default()
        };
        let config = AgentConfig {
            slower_time,
            slower_port: "https://collect.example.com/slow".to_string(),
            ..Default::default()
        };
        let gate = Arc::new(BaseFlagGate::new());
        let transport = Arc::new(RecordingTransport::default());
        let watcher = Arc::new(ResourceWatcher::new(&config, host, gate.clone(), transport.clone()));
        (watcher, fake, gate, transport)
    }

    #[test]
    fn slow_filter_uses_threshold() {
        let fast = entry("a", Some(10.0), Some(100.0));
        let slow = entry("b", Some(10.0), Some(160.0));
        let unfinished = entry("c", Some(10.0), None);

        assert!(is_slow(&slow, 100.0));
        assert!(!is_slow(&fast, 100.0));
        assert!(!is_slow(&unfinished, 100.0));

        let samples = collect_slow(&[fast, slow, unfinished], 100.0);
        assert_eq!(samples.len(), 1);
        assert_eq!(samples[0].name, "b");
        assert_eq!(samples[0].duration, "0.150");
        assert_eq!(samples[0].initiator_type, "script");
    }

    #[test]
    fn zero_threshold_reports_everything_finished() {
        let samples = collect_slow(
            &[entry("a", Some(1.0), Some(2.0)), entry("b", Some(5.0), Some(9.0))],
            0.0,
        );
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn cache_hit_priority() {
        let mut e = entry("x", Some(1.0), Some(2.0));

        e.transfer_size = Some(500.0);
        e.decoded_body_size = Some(200.0);
        e.duration = 1.0;
        assert!(!is_cache_hit(&e));

        e.transfer_size = Some(0.0);
        e.decoded_body_size = Some(200.0);
        e.duration = 500.0;
        assert!(is_cache_hit(&e));

        e.decoded_body_size = Some(0.0);
        e.duration = 10.0;
        assert!(is_cache_hit(&e));
        e.duration = 50.0;
        assert!(!is_cache_hit(&e));
    }

    #[test]
    fn blocking_time_rules() {
        let mut e = entry("x", Some(20.0), Some(90.0));
        e.timing.connect_end = Some(20.0);
        e.timing.request_start = Some(27.0);
        assert_eq!(blocking_time(&e), 7.0);

        e.timing.connect_end = Some(45.0);
        e.timing.domain_lookup_start = Some(26.0);
        assert_eq!(blocking_time(&e), 6.0);

        e.timing.domain_lookup_start = None;
        assert_eq!(blocking_time(&e), 0.0);
    }

    #[tokio::test]
    async fn closed_gate_blocks_reports() {
        let (watcher, _, gate, transport) =
            watcher(vec![entry("https://cdn.example.com/a.js", Some(1.0), Some(500.0))], 100.0);

        assert!(watcher.report_once().await.is_none());
        assert!(transport.sent.lock().is_empty());

        gate.open();
        let outcome = watcher.report_once().await;
        assert_eq!(outcome, Some(DeliveryOutcome::Beaconed));

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "https://collect.example.com/slow");
        assert_eq!(sent[0].1[0]["name"], "https://cdn.example.com/a.js");
    }

    #[tokio::test]
    async fn nothing_slow_sends_nothing() {
        let (watcher, _, gate, transport) = watcher(vec![entry("a", Some(1.0), Some(20.0))], 100.0);
        gate.open();
        assert!(watcher.report_once().await.is_none());
        assert!(transport.sent.lock().is_empty());
    }

    #[tokio::test]
    async fn continuous_watch_skips_own_requests() {
        let (watcher, fake, gate, transport) = watcher(Vec::new(), 10.0);
        gate.open();

        let handle = watcher.clone().watch().unwrap();
        let tx = fake.observer_tx.lock().take().unwrap();

        tx.send(vec![
            entry("https://collect.example.com/slow", Some(1.0), Some(400.0)),
            entry("https://cdn.example.com/late.png", Some(1.0), Some(400.0)),
        ])
        .unwrap();
        tx.send(vec![entry("https://collect.example.com/slow", Some(1.0), Some(400.0))])
            .unwrap();
        drop(tx);
        handle.await.unwrap();

        let sent = transport.sent.lock();
        assert_eq!(sent.len(), 1);
        let batch = sent[0].1.as_array().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0]["name"], "https://cdn.example.com/late.png");
    }

    #[tokio::test]
    async fn watch_without_observer_is_off() {
        let config = AgentConfig {
            observe: true,
            slower_port: "/slow".to_string(),
            ..Default::default()
        };
        let watcher = Arc::new(ResourceWatcher::new(
            &config,
            HostCapabilities::default(),
            Arc::new(BaseFlagGate::new()),
            Arc::new(RecordingTransport::default()),
        ));
        assert!(watcher.watch().is_none());
    }
}
