//! Resource-timing buffer guard.
//!
//! When the host signals that its resource-timing buffer is full, the whole
//! buffer is cleared.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use pagepulse_core::ports::host::HostCapabilities;
use tracing::{debug, info};

/// Clears the host's resource buffer on overflow.
#[derive(Debug, Clone)]
pub struct BufferGuardian {
    evictions: Arc<AtomicU64>,
}

impl BufferGuardian {
    /// Registers the overflow callback.
    ///
    /// Returns `None` when the host has no buffer-full hook or no entry
    /// provider to clear.
    pub fn arm(host: &HostCapabilities) -> Option<Self> {
        let (Some(hook), Some(entries)) = (host.buffer.clone(), host.entries.clone()) else {
            info!("host cannot signal a full entry buffer, buffer guard off");
            return None;
        };

        // the hook usually lives on the same host as the entries
        let entries = Arc::downgrade(&entries);
        let evictions = Arc::new(AtomicU64::new(0));
        let counter = evictions.clone();
        hook.on_buffer_full(Box::new(move || {
            let Some(entries) = entries.upgrade() else {
                debug!("entry provider gone, buffer-full signal ignored");
                return;
            };
            entries.clear_resource_timings();
            let total = counter.fetch_add(1, Ordering::Relaxed) + 1;
            debug!("resource timing buffer full, cleared (#{total})");
        }));

        Some(Self { evictions })
    }

    /// Times the buffer has been cleared
    pub fn evictions(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}
