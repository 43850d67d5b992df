//! Timing buckets.
//!
//! A bucket holds one slot per [`MetricKey`]. The key set is fixed at
//! construction and a slot's time can only be written once; later writes to
//! a populated slot are refused.

use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};

/// Derived page-load metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetricKey {
    RedirectTime,
    DnsTime,
    TlsTime,
    TcpTime,
    HttpTime,
    ServiceWorkerTime,
    FirstPaintWhiteScreen,
    DomParseWhiteScreen,
    DomStructureTime,
    DomContentLoadedTime,
    DocumentCompleteTime,
    FullLoadTime,
}

impl MetricKey {
    /// Number of keys
    pub const COUNT: usize = 12;

    /// Every key, in report order
    pub const ALL: [MetricKey; MetricKey::COUNT] = [
        MetricKey::RedirectTime,
        MetricKey::DnsTime,
        MetricKey::TlsTime,
        MetricKey::TcpTime,
        MetricKey::HttpTime,
        MetricKey::ServiceWorkerTime,
        MetricKey::FirstPaintWhiteScreen,
        MetricKey::DomParseWhiteScreen,
        MetricKey::DomStructureTime,
        MetricKey::DomContentLoadedTime,
        MetricKey::DocumentCompleteTime,
        MetricKey::FullLoadTime,
    ];

    fn index(self) -> usize {
        self as usize
    }

    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKey::RedirectTime => "redirect-time",
            MetricKey::DnsTime => "dns-time",
            MetricKey::TlsTime => "tls-time",
            MetricKey::TcpTime => "tcp-time",
            MetricKey::HttpTime => "http-time",
            MetricKey::ServiceWorkerTime => "service-worker-time",
            MetricKey::FirstPaintWhiteScreen => "first-paint-white-screen",
            MetricKey::DomParseWhiteScreen => "dom-parse-white-screen",
            MetricKey::DomStructureTime => "dom-structure-time",
            MetricKey::DomContentLoadedTime => "dom-content-loaded-time",
            MetricKey::DocumentCompleteTime => "document-complete-time",
            MetricKey::FullLoadTime => "full-load-time",
        }
    }

    /// Human-readable label used in log dumps
    pub fn label(&self) -> &'static str {
        match self {
            MetricKey::RedirectTime => "redirect time",
            MetricKey::DnsTime => "DNS lookup time",
            MetricKey::TlsTime => "TLS handshake time",
            MetricKey::TcpTime => "TCP connect time",
            MetricKey::HttpTime => "HTTP request time",
            MetricKey::ServiceWorkerTime => "service worker time",
            MetricKey::FirstPaintWhiteScreen => "white screen (first response)",
            MetricKey::DomParseWhiteScreen => "white screen (DOM parsed)",
            MetricKey::DomStructureTime => "DOM structure time",
            MetricKey::DomContentLoadedTime => "DOMContentLoaded time",
            MetricKey::DocumentCompleteTime => "document complete time",
            MetricKey::FullLoadTime => "full load time",
        }
    }
}

impl std::fmt::Display for MetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which host interface a bucket was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimingSource {
    /// Legacy single-snapshot timing object
    Legacy,
    /// Standardized navigation-timing entry
    Navigation,
}

/// One metric slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimingEntry {
    /// Normalized duration, `None` until its inputs were available
    pub time: Option<String>,
    pub label: &'static str,
}

/// Write-once metric slots for one page view and one timing source.
#[derive(Debug, Clone, PartialEq)]
pub struct TimingBucket {
    source: TimingSource,
    entries: [TimingEntry; MetricKey::COUNT],
    address: Option<String>,
    first_paint: Option<String>,
}

impl TimingBucket {
    /// Empty bucket with every slot unset
    pub fn new(source: TimingSource) -> Self {
        Self {
            source,
            entries: MetricKey::ALL.map(|key| TimingEntry {
                time: None,
                label: key.label(),
            }),
            address: None,
            first_paint: None,
        }
    }

    pub fn source(&self) -> TimingSource {
        self.source
    }

    /// Sets a slot if it is still unset. Returns whether the value was taken.
    pub fn record(&mut self, key: MetricKey, value: String) -> bool {
        let slot = &mut self.entries[key.index()];
        if slot.time.is_some() {
            return false;
        }
        slot.time = Some(value);
        true
    }

    pub fn time(&self, key: MetricKey) -> Option<&str> {
        self.entries[key.index()].time.as_deref()
    }

    pub fn entry(&self, key: MetricKey) -> &TimingEntry {
        &self.entries[key.index()]
    }

    /// Slots in report order
    pub fn iter(&self) -> impl Iterator<Item = (MetricKey, &TimingEntry)> {
        MetricKey::ALL.into_iter().zip(self.entries.iter())
    }

    /// Number of populated slots
    pub fn populated(&self) -> usize {
        self.entries.iter().filter(|e| e.time.is_some()).count()
    }

    /// Navigated URL, write-once like the metric slots
    pub fn set_address(&mut self, address: String) -> bool {
        if self.address.is_some() {
            return false;
        }
        self.address = Some(address);
        true
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Host-reported first paint, write-once
    pub fn set_first_paint(&mut self, value: String) -> bool {
        if self.first_paint.is_some() {
            return false;
        }
        self.first_paint = Some(value);
        true
    }

    pub fn first_paint(&self) -> Option<&str> {
        self.first_paint.as_deref()
    }
}

struct EntriesView<'a>(&'a TimingBucket);

impl Serialize for EntriesView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(MetricKey::COUNT))?;
        for (key, entry) in self.0.iter() {
            map.serialize_entry(key.as_str(), entry)?;
        }
        map.end()
    }
}

impl Serialize for TimingBucket {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TimingBucket", 4)?;
        state.serialize_field("source", &self.source)?;
        state.serialize_field("entries", &EntriesView(self))?;
        state.serialize_field("address", &self.address)?;
        state.serialize_field("first-paint-time", &self.first_paint)?;
        state.end()
    }
}
