//! Scriptable in-process host.
//!
//! Implements every host port over plain state so a page load can be replayed
//! from a recorded fixture, outside a browser. Tests drive it directly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use pagepulse_core::error::CoreError;
use pagepulse_core::models::entry::{
    ConnectionInfo, EntryType, NavigatorInfo, PerformanceEntry, TimingSnapshot,
};
use pagepulse_core::ports::host::{
    BufferFullCallback, BufferHook, EntryObserver, EntryProvider, HostCapabilities,
    LifecycleSource, NavigatorProvider, NetworkInfoProvider, PageEvent, TimingProvider,
};
use pagepulse_core::ports::transport::BeaconChannel;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

/// Resource entries the host keeps before signalling a full buffer
pub const DEFAULT_RESOURCE_BUFFER_SIZE: usize = 250;

/// A recorded page load.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageLoadFixture {
    /// Epoch ms the page's timeline is relative to
    pub time_origin: Option<f64>,
    /// Legacy timing object, as epoch-relative or origin-relative ms
    pub timing: TimingSnapshot,
    pub navigation: Option<PerformanceEntry>,
    pub paint: Vec<PerformanceEntry>,
    /// Resources loaded before the load event
    pub resources: Vec<PerformanceEntry>,
    /// Resources loaded after the load event
    pub late_resources: Vec<PerformanceEntry>,
    pub marks: Vec<PerformanceEntry>,
    pub connection: Option<ConnectionInfo>,
    pub navigator: NavigatorInfo,
    pub network_changes: u32,
}

#[derive(Default)]
struct Timeline {
    time_origin: Option<f64>,
    timing: TimingSnapshot,
    navigation: Option<PerformanceEntry>,
    paint: Vec<PerformanceEntry>,
    resources: Vec<PerformanceEntry>,
    marks: Vec<PerformanceEntry>,
}

type ObserverSender = mpsc::UnboundedSender<Vec<PerformanceEntry>>;

/// In-process host implementing every capability port.
pub struct SimulatedHost {
    timeline: Mutex<Timeline>,
    connection: Mutex<Option<ConnectionInfo>>,
    navigator: Mutex<NavigatorInfo>,
    network_changes: Mutex<u32>,
    events: broadcast::Sender<PageEvent>,
    buffer_full: Mutex<Option<BufferFullCallback>>,
    resource_buffer_size: usize,
    observers: Mutex<Vec<(Vec<EntryType>, ObserverSender)>>,
    navigation_timing: AtomicBool,
    accept_beacons: AtomicBool,
    beacons: Mutex<Vec<(String, String)>>,
    started: Instant,
}

impl SimulatedHost {
    pub fn new() -> Arc<Self> {
        Self::with_buffer_size(DEFAULT_RESOURCE_BUFFER_SIZE)
    }

    pub fn with_buffer_size(resource_buffer_size: usize) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            timeline: Mutex::new(Timeline::default()),
            connection: Mutex::new(None),
            navigator: Mutex::new(NavigatorInfo::default()),
            network_changes: Mutex::new(0),
            events,
            buffer_full: Mutex::new(None),
            resource_buffer_size,
            observers: Mutex::new(Vec::new()),
            navigation_timing: AtomicBool::new(true),
            accept_beacons: AtomicBool::new(false),
            beacons: Mutex::new(Vec::new()),
            started: Instant::now(),
        })
    }

    /// Host state as of just before the load milestones fire
    pub fn from_fixture(fixture: &PageLoadFixture) -> Arc<Self> {
        let host = Self::new();
        {
            let mut timeline = host.timeline.lock();
            timeline.time_origin = fixture.time_origin;
            timeline.timing = fixture.timing;
            timeline.navigation = fixture.navigation.clone();
            timeline.paint = fixture.paint.clone();
            timeline.resources = fixture.resources.clone();
            timeline.marks = fixture.marks.clone();
        }
        *host.connection.lock() = fixture.connection.clone();
        *host.navigator.lock() = fixture.navigator.clone();
        *host.network_changes.lock() = fixture.network_changes;
        host
    }

    /// Every capability backed by this host
    pub fn capabilities(self: &Arc<Self>) -> HostCapabilities {
        HostCapabilities {
            timing: Some(self.clone()),
            entries: Some(self.clone()),
            buffer: Some(self.clone()),
            lifecycle: Some(self.clone()),
            network: Some(self.clone()),
            navigator: Some(self.clone()),
            observer: Some(self.clone()),
        }
    }

    pub fn set_timing(&self, timing: TimingSnapshot) {
        self.timeline.lock().timing = timing;
    }

    pub fn set_navigation(&self, entry: PerformanceEntry) {
        self.timeline.lock().navigation = Some(entry.clone());
        self.notify(EntryType::Navigation, vec![entry]);
    }

    pub fn set_navigation_timing_support(&self, supported: bool) {
        self.navigation_timing.store(supported, Ordering::Relaxed);
    }

    pub fn set_navigator(&self, navigator: NavigatorInfo) {
        *self.navigator.lock() = navigator;
    }

    pub fn set_connection(&self, connection: Option<ConnectionInfo>) {
        *self.connection.lock() = connection;
    }

    /// A connection change the network provider counts
    pub fn change_connection(&self, connection: ConnectionInfo) {
        *self.connection.lock() = Some(connection);
        *self.network_changes.lock() += 1;
    }

    pub fn set_accept_beacons(&self, accept: bool) {
        self.accept_beacons.store(accept, Ordering::Relaxed);
    }

    /// Beacons the host accepted or refused, as (url, body)
    pub fn beacons(&self) -> Vec<(String, String)> {
        self.beacons.lock().clone()
    }

    /// Fires a lifecycle milestone; returns how many listeners got it
    pub fn fire(&self, event: PageEvent) -> usize {
        let listeners = self.events.send(event).unwrap_or(0);
        debug!("simulated host fired {event:?} to {listeners} listeners");
        listeners
    }

    pub fn add_paint(&self, entry: PerformanceEntry) {
        self.timeline.lock().paint.push(entry.clone());
        self.notify(EntryType::Paint, vec![entry]);
    }

    /// Records a finished resource; signals a full buffer at capacity
    pub fn add_resource(&self, entry: PerformanceEntry) {
        let full = {
            let mut timeline = self.timeline.lock();
            timeline.resources.push(entry.clone());
            timeline.resources.len() >= self.resource_buffer_size
        };
        self.notify(EntryType::Resource, vec![entry]);

        if full {
            if let Some(callback) = self.buffer_full.lock().as_ref() {
                callback();
            }
        }
    }

    pub fn resource_count(&self) -> usize {
        self.timeline.lock().resources.len()
    }

    /// Ends every observer stream
    pub fn disconnect_observers(&self) {
        self.observers.lock().clear();
    }

    /// Replays the fixture's lifecycle: content parsed, then loaded.
    pub async fn play_page_load(&self) {
        self.fire(PageEvent::ContentParsed);
        tokio::task::yield_now().await;
        self.fire(PageEvent::Loaded);
    }

    /// Feeds resources that finished after the load event
    pub fn play_late_resources(&self, resources: &[PerformanceEntry]) {
        for entry in resources {
            self.add_resource(entry.clone());
        }
    }

    fn notify(&self, entry_type: EntryType, batch: Vec<PerformanceEntry>) {
        self.observers.lock().retain(|(types, tx)| {
            if !types.contains(&entry_type) {
                return true;
            }
            tx.send(batch.clone()).is_ok()
        });
    }

    fn now(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}

impl TimingProvider for SimulatedHost {
    fn timing_snapshot(&self) -> TimingSnapshot {
        self.timeline.lock().timing
    }

    fn time_origin(&self) -> Option<f64> {
        self.timeline.lock().time_origin
    }
}

impl EntryProvider for SimulatedHost {
    fn entries_by_type(&self, entry_type: EntryType) -> Vec<PerformanceEntry> {
        let timeline = self.timeline.lock();
        match entry_type {
            EntryType::Navigation => timeline.navigation.clone().into_iter().collect(),
            EntryType::Resource => timeline.resources.clone(),
            EntryType::Mark => timeline.marks.clone(),
            EntryType::Paint => timeline.paint.clone(),
            EntryType::Measure => Vec::new(),
        }
    }

    fn supports_navigation_timing(&self) -> bool {
        self.navigation_timing.load(Ordering::Relaxed)
    }

    fn mark(&self, name: &str) {
        let entry = PerformanceEntry {
            name: name.to_string(),
            entry_type: EntryType::Mark,
            start_time: self.now(),
            ..Default::default()
        };
        self.timeline.lock().marks.push(entry.clone());
        self.notify(EntryType::Mark, vec![entry]);
    }

    fn clear_resource_timings(&self) {
        let mut timeline = self.timeline.lock();
        debug!("simulated host cleared {} resources", timeline.resources.len());
        timeline.resources.clear();
    }
}

impl BufferHook for SimulatedHost {
    fn on_buffer_full(&self, callback: BufferFullCallback) {
        *self.buffer_full.lock() = Some(callback);
    }
}

impl LifecycleSource for SimulatedHost {
    fn subscribe(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }
}

impl NetworkInfoProvider for SimulatedHost {
    fn connection(&self) -> Option<ConnectionInfo> {
        self.connection.lock().clone()
    }

    fn change_count(&self) -> u32 {
        *self.network_changes.lock()
    }
}

impl NavigatorProvider for SimulatedHost {
    fn navigator(&self) -> NavigatorInfo {
        self.navigator.lock().clone()
    }
}

impl EntryObserver for SimulatedHost {
    fn observe(
        &self,
        entry_types: &[EntryType],
    ) -> Result<mpsc::UnboundedReceiver<Vec<PerformanceEntry>>, CoreError> {
        if entry_types.is_empty() {
            return Err(CoreError::Validation {
                field: "entryTypes".to_string(),
                message: "at least one entry type is required".to_string(),
            });
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.lock().push((entry_types.to_vec(), tx));
        Ok(rx)
    }
}

impl BeaconChannel for SimulatedHost {
    fn send_beacon(&self, url: &str, body: &str) -> bool {
        self.beacons.lock().push((url.to_string(), body.to_string()));
        self.accept_beacons.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(name: &str) -> PerformanceEntry {
        PerformanceEntry {
            name: name.to_string(),
            entry_type: EntryType::Resource,
            ..Default::default()
        }
    }

    #[test]
    fn fixture_parses_from_recorded_json() {
        let fixture: PageLoadFixture = serde_json::from_str(
            r#"{
                "timeOrigin": 1700000000000,
                "timing": { "navigationStart": 0, "domainLookupStart": 10, "domainLookupEnd": 40 },
                "resources": [{ "name": "a.js", "entryType": "resource", "fetchStart": 5, "responseEnd": 205 }],
                "navigator": { "userAgent": "Mozilla/5.0", "language": "en-US" }
            }"#,
        )
        .unwrap();

        let host = SimulatedHost::from_fixture(&fixture);
        assert_eq!(host.time_origin(), Some(1_700_000_000_000.0));
        assert_eq!(host.timing_snapshot().domain_lookup_end, Some(40.0));
        assert_eq!(host.resource_count(), 1);
        assert_eq!(host.navigator().language.as_deref(), Some("en-US"));
    }

    #[tokio::test]
    async fn observers_get_matching_types_only() {
        let host = SimulatedHost::new();
        let mut rx = host.observe(&[EntryType::Resource]).unwrap();

        host.add_paint(PerformanceEntry::default());
        host.add_resource(resource("a.js"));
        host.disconnect_observers();

        let batch = rx.recv().await.unwrap();
        assert_eq!(batch[0].name, "a.js");
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn full_buffer_invokes_the_callback() {
        let host = SimulatedHost::with_buffer_size(2);
        let weak = Arc::downgrade(&host);
        host.on_buffer_full(Box::new(move || {
            if let Some(host) = weak.upgrade() {
                host.clear_resource_timings();
            }
        }));

        host.add_resource(resource("a"));
        assert_eq!(host.resource_count(), 1);
        host.add_resource(resource("b"));
        assert_eq!(host.resource_count(), 0);
    }

    #[test]
    fn marks_are_recorded_and_beacons_logged() {
        let host = SimulatedHost::new();
        host.mark("hero-rendered");
        assert_eq!(host.entries_by_type(EntryType::Mark)[0].name, "hero-rendered");

        assert!(!host.send_beacon("/base", "{}"));
        host.set_accept_beacons(true);
        assert!(host.send_beacon("/base", "{}"));
        assert_eq!(host.beacons().len(), 2);
    }
}
