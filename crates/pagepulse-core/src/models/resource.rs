//! Slow-resource samples.

use serde::{Deserialize, Serialize};

/// One slow sub-resource, derived from a resource-timing entry.
///
/// Built and dropped within a single reporting cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSample {
    pub name: String,
    pub initiator_type: String,
    /// Normalized `responseEnd - fetchStart`
    pub duration: String,
    pub cache_hit: bool,
    /// ms spent queued before the request could go out
    pub blocking_time: f64,
}
