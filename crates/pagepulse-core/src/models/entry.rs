//! Raw data read from the host's performance instrumentation.

use serde::{Deserialize, Serialize};

/// Phase timestamps of a page or sub-resource load, in milliseconds.
///
/// Used both for the legacy single-snapshot timing object and for the fields
/// of navigation/resource entries. A field the host does not expose is `None`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimingSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub navigation_start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_end: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetch_start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_lookup_start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain_lookup_end: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure_connection_start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connect_end: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_start: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_end: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_loading: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_interactive: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_content_loaded_event_end: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dom_complete: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_event_end: Option<f64>,
}

/// Returns the value only if it is present and strictly positive.
///
/// A zero timestamp means the phase never happened (no redirect, reused
/// connection); NaN is treated as absent.
pub fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v > 0.0)
}

/// Performance entry type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Navigation,
    #[default]
    Resource,
    Mark,
    Measure,
    Paint,
}

impl EntryType {
    /// Host-facing name of the entry type
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Navigation => "navigation",
            EntryType::Resource => "resource",
            EntryType::Mark => "mark",
            EntryType::Measure => "measure",
            EntryType::Paint => "paint",
        }
    }
}

/// One entry from the host's performance timeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceEntry {
    /// URL for navigation/resource entries, label for marks and paints
    pub name: String,
    pub entry_type: EntryType,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub duration: f64,
    /// Resource initiator ("script", "img", "fetch", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initiator_type: Option<String>,
    #[serde(flatten)]
    pub timing: TimingSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transfer_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoded_body_size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decoded_body_size: Option<f64>,
}

impl PerformanceEntry {
    /// Timing view of a navigation entry.
    ///
    /// Navigation entries are relative to the time origin and carry no
    /// `navigationStart`, so the entry's start time stands in for it.
    pub fn navigation_snapshot(&self) -> TimingSnapshot {
        TimingSnapshot {
            navigation_start: Some(self.start_time),
            ..self.timing
        }
    }
}

/// Connection details from the host's network-information API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionInfo {
    /// Downlink bandwidth estimate (Mb/s)
    pub downlink: Option<f64>,
    /// Connection type ("wifi", "cellular", ...)
    #[serde(rename = "type")]
    pub connection_type: Option<String>,
    /// Effective type ("2g" .. "4g")
    pub effective_type: Option<String>,
    /// Round-trip estimate (ms)
    pub rtt: Option<f64>,
    /// Data-saver preference
    pub save_data: Option<bool>,
}

/// Browser identification strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NavigatorInfo {
    pub user_agent: String,
    pub app_version: Option<String>,
    pub language: Option<String>,
}
