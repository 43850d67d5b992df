//! The per-page-view base record and its network/device parts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};

use super::timing::MetricKey;

/// Desktop or mobile, inferred from user-agent tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortType {
    Desktop = 0,
    Mobile = 1,
}

/// Device family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    Unknown = 0,
    Ios = 1,
    Android = 2,
    Ipad = 3,
}

/// Browser family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserType {
    Unknown = 0,
    Opera = 1,
    InternetExplorer = 2,
    Edge = 3,
    Firefox = 4,
    Safari = 5,
    Chrome = 6,
}

// The collector expects the numeric codes.
macro_rules! serialize_as_code {
    ($($ty:ty),*) => {
        $(
            impl Serialize for $ty {
                fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                    serializer.serialize_u8(*self as u8)
                }
            }
        )*
    };
}

serialize_as_code!(PortType, DeviceType, BrowserType);

/// Result of the external IP/geolocation lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoInfo {
    pub ip: Option<String>,
    pub city: Option<String>,
}

/// Network part of the base record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInfo {
    /// Mb/s
    pub downlink: Option<f64>,
    pub connection_type: Option<String>,
    pub effective_type: String,
    /// ms
    pub rtt: Option<f64>,
    pub save_data: Option<bool>,
    pub network_changes: u32,
    pub ip: Option<String>,
    pub city: Option<String>,
}

/// Device part of the base record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInfo {
    pub port_type: PortType,
    pub device_type: DeviceType,
    pub browser_type: BrowserType,
    pub app_version: Option<String>,
    pub language: Option<String>,
}

/// Merged metric values of one page view.
pub type TimingValues = BTreeMap<MetricKey, Option<String>>;

/// The one record sent per page view once every source has settled.
///
/// Serializes flat: metric keys, `address`, `first-paint-time`, then the
/// network and device fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BaseTelemetryRecord {
    #[serde(flatten)]
    timings: TimingValues,
    address: Option<String>,
    #[serde(rename = "first-paint-time")]
    first_paint: Option<String>,
    #[serde(flatten)]
    network: NetworkInfo,
    #[serde(flatten)]
    device: DeviceInfo,
}

impl BaseTelemetryRecord {
    pub fn new(
        timings: TimingValues,
        address: Option<String>,
        first_paint: Option<String>,
        network: NetworkInfo,
        device: DeviceInfo,
    ) -> Self {
        Self {
            timings,
            address,
            first_paint,
            network,
            device,
        }
    }

    pub fn time(&self, key: MetricKey) -> Option<&str> {
        self.timings.get(&key).and_then(|v| v.as_deref())
    }

    pub fn timings(&self) -> &TimingValues {
        &self.timings
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    pub fn first_paint(&self) -> Option<&str> {
        self.first_paint.as_deref()
    }

    pub fn network(&self) -> &NetworkInfo {
        &self.network
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }
}
