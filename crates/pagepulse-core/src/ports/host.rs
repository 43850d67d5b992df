//! Host capability ports.
//!
//! Each trait stands for one piece of browser instrumentation. A host may
//! lack any of them; [`HostCapabilities`] holds them as options and its
//! accessors degrade to empty results instead of failing.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::error::CoreError;
use crate::models::entry::{ConnectionInfo, EntryType, NavigatorInfo, PerformanceEntry, TimingSnapshot};

/// Page lifecycle milestones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    /// Document parsed (DOMContentLoaded)
    ContentParsed,
    /// Document and sub-resources loaded (load)
    Loaded,
    /// Page hidden or suspended (pagehide)
    Hidden,
    /// Page torn down (unload)
    Unloaded,
}

/// Legacy single-snapshot timing object
pub trait TimingProvider: Send + Sync {
    /// Current state of the timing object; fields not yet filled are `None`
    fn timing_snapshot(&self) -> TimingSnapshot;

    /// Epoch milliseconds all timeline values are relative to
    fn time_origin(&self) -> Option<f64>;
}

/// Performance timeline
pub trait EntryProvider: Send + Sync {
    fn entries_by_type(&self, entry_type: EntryType) -> Vec<PerformanceEntry>;

    /// Whether standardized navigation-timing entries exist on this host
    fn supports_navigation_timing(&self) -> bool;

    /// Adds a named mark to the timeline
    fn mark(&self, name: &str);

    /// Drops every resource entry from the host buffer
    fn clear_resource_timings(&self);
}

/// Callback run when the host's resource-entry buffer fills up
pub type BufferFullCallback = Box<dyn Fn() + Send + Sync>;

/// Buffer-full notification hook
pub trait BufferHook: Send + Sync {
    fn on_buffer_full(&self, callback: BufferFullCallback);
}

/// Lifecycle event source.
///
/// Dropping the returned receiver detaches the listener.
pub trait LifecycleSource: Send + Sync {
    fn subscribe(&self) -> broadcast::Receiver<PageEvent>;
}

/// Network-information API
pub trait NetworkInfoProvider: Send + Sync {
    fn connection(&self) -> Option<ConnectionInfo>;

    /// Number of connection changes seen so far
    fn change_count(&self) -> u32;
}

/// Browser identification
pub trait NavigatorProvider: Send + Sync {
    fn navigator(&self) -> NavigatorInfo;
}

/// Continuous entry observer.
///
/// Each message on the returned channel is one notification batch.
pub trait EntryObserver: Send + Sync {
    fn observe(
        &self,
        entry_types: &[EntryType],
    ) -> Result<mpsc::UnboundedReceiver<Vec<PerformanceEntry>>, CoreError>;
}

/// Every capability the agent can use, each optional.
#[derive(Clone, Default)]
pub struct HostCapabilities {
    pub timing: Option<Arc<dyn TimingProvider>>,
    pub entries: Option<Arc<dyn EntryProvider>>,
    pub buffer: Option<Arc<dyn BufferHook>>,
    pub lifecycle: Option<Arc<dyn LifecycleSource>>,
    pub network: Option<Arc<dyn NetworkInfoProvider>>,
    pub navigator: Option<Arc<dyn NavigatorProvider>>,
    pub observer: Option<Arc<dyn EntryObserver>>,
}

impl HostCapabilities {
    /// True if the host exposes any performance instrumentation at all
    pub fn has_performance(&self) -> bool {
        self.timing.is_some() || self.entries.is_some()
    }

    pub fn timing_snapshot(&self) -> TimingSnapshot {
        self.timing
            .as_ref()
            .map(|t| t.timing_snapshot())
            .unwrap_or_default()
    }

    pub fn time_origin(&self) -> Option<f64> {
        self.timing.as_ref().and_then(|t| t.time_origin())
    }

    pub fn entries_by_type(&self, entry_type: EntryType) -> Vec<PerformanceEntry> {
        match &self.entries {
            Some(entries) => entries.entries_by_type(entry_type),
            None => {
                debug!("no entry provider, {} entries empty", entry_type.as_str());
                Vec::new()
            }
        }
    }

    /// First navigation entry, if the host supports navigation timing
    pub fn navigation_entry(&self) -> Option<PerformanceEntry> {
        let entries = self.entries.as_ref()?;
        if !entries.supports_navigation_timing() {
            return None;
        }
        entries
            .entries_by_type(EntryType::Navigation)
            .into_iter()
            .next()
    }

    pub fn mark(&self, name: &str) {
        if let Some(entries) = &self.entries {
            entries.mark(name);
        }
    }

    pub fn clear_resource_timings(&self) {
        if let Some(entries) = &self.entries {
            entries.clear_resource_timings();
        }
    }

    pub fn connection(&self) -> Option<ConnectionInfo> {
        self.network.as_ref().and_then(|n| n.connection())
    }

    pub fn network_changes(&self) -> u32 {
        self.network.as_ref().map(|n| n.change_count()).unwrap_or(0)
    }

    pub fn navigator(&self) -> NavigatorInfo {
        self.navigator
            .as_ref()
            .map(|n| n.navigator())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for HostCapabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostCapabilities")
            .field("timing", &self.timing.is_some())
            .field("entries", &self.entries.is_some())
            .field("buffer", &self.buffer.is_some())
            .field("lifecycle", &self.lifecycle.is_some())
            .field("network", &self.network.is_some())
            .field("navigator", &self.navigator.is_some())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_host_degrades_to_defaults() {
        let host = HostCapabilities::default();
        assert!(!host.has_performance());
        assert_eq!(host.timing_snapshot(), TimingSnapshot::default());
        assert!(host.entries_by_type(EntryType::Resource).is_empty());
        assert!(host.navigation_entry().is_none());
        assert!(host.connection().is_none());
        assert_eq!(host.network_changes(), 0);
        assert!(host.navigator().user_agent.is_empty());
        host.mark("noop");
        host.clear_resource_timings();
    }
}
