//! Base-record gate.
//!
//! Resource batches may only go out after the page view's base record has
//! been dispatched, so the collector can attribute them.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

/// Opens once, never closes.
#[derive(Debug, Default)]
pub struct BaseFlagGate {
    open: AtomicBool,
}

impl BaseFlagGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the base record as dispatched
    pub fn open(&self) {
        if !self.open.swap(true, Ordering::AcqRel) {
            debug!("base gate opened, resource batches allowed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_starts_closed_and_stays_open() {
        let gate = BaseFlagGate::new();
        assert!(!gate.is_open());
        gate.open();
        assert!(gate.is_open());
        gate.open();
        assert!(gate.is_open());
    }
}
