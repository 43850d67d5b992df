//! Lifecycle recording.
//!
//! One recorder per timing source and page view. It runs the network pass as
//! soon as it is attached, the document pass after content is parsed and the
//! load pass after the full load, then hands its bucket to the join. Each
//! milestone is handled one scheduler tick after it fires, because the host
//! fills some timing fields only once its own event dispatch has finished.
//!
//! Hidden and unloaded both detach the recorder: some hosts fire only one of
//! the two.

use pagepulse_core::models::entry::{EntryType, TimingSnapshot};
use pagepulse_core::models::timing::{TimingBucket, TimingSource};
use pagepulse_core::ports::host::{HostCapabilities, PageEvent};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, oneshot};
use tracing::{debug, warn};

use crate::extractor;

/// Why a recorder stopped listening
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetachReason {
    Hidden,
    Unloaded,
    /// The host's lifecycle source went away
    SourceClosed,
}

/// Recorder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    Created,
    ContentParsed,
    Loaded,
    Detached(DetachReason),
}

/// Accumulates one timing bucket across the page lifecycle.
pub struct LifecycleRecorder {
    host: HostCapabilities,
    bucket: TimingBucket,
    phase: LifecyclePhase,
    events: broadcast::Receiver<PageEvent>,
    verbose: bool,
}

impl LifecycleRecorder {
    /// Subscribes to lifecycle events and runs the network pass.
    ///
    /// Without a lifecycle source the recorder detaches on its first poll.
    pub fn attach(source: TimingSource, host: HostCapabilities, verbose: bool) -> Self {
        let events = match &host.lifecycle {
            Some(lifecycle) => lifecycle.subscribe(),
            None => {
                warn!("host has no lifecycle source, {source:?} timings cannot complete");
                let (_closed, rx) = broadcast::channel(1);
                rx
            }
        };

        let mut recorder = Self {
            host,
            bucket: TimingBucket::new(source),
            phase: LifecyclePhase::Created,
            events,
            verbose,
        };
        let snapshot = recorder.snapshot();
        let written = extractor::network_pass(&mut recorder.bucket, &snapshot);
        debug!("{source:?} network pass on attach: {written} metrics");
        recorder
    }

    pub fn source(&self) -> TimingSource {
        self.bucket.source()
    }

    pub fn phase(&self) -> LifecyclePhase {
        self.phase
    }

    pub fn bucket(&self) -> &TimingBucket {
        &self.bucket
    }

    fn snapshot(&self) -> TimingSnapshot {
        match self.bucket.source() {
            TimingSource::Legacy => self.host.timing_snapshot(),
            TimingSource::Navigation => self
                .host
                .navigation_entry()
                .map(|entry| entry.navigation_snapshot())
                .unwrap_or_default(),
        }
    }

    /// Navigated URL and host-reported first paint, outside the metric set.
    fn record_navigation_extras(&mut self) {
        if let Some(entry) = self.host.navigation_entry() {
            if !entry.name.is_empty() {
                self.bucket.set_address(entry.name);
            }
        }

        if let Some(paint) = self.host.entries_by_type(EntryType::Paint).first() {
            self.bucket
                .set_first_paint(extractor::handle_fixed(paint.start_time));
        }
    }

    /// Drives the recorder until it detaches.
    ///
    /// `completion` receives a copy of the bucket once the load pass is done.
    /// If the page goes away before that, `completion` is dropped unsent.
    pub async fn run(mut self, completion: oneshot::Sender<TimingBucket>) -> LifecyclePhase {
        let source = self.source();
        let mut completion = Some(completion);

        if source == TimingSource::Navigation {
            tokio::task::yield_now().await;
            self.record_navigation_extras();
        }

        loop {
            let event = match self.events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("{source:?} recorder missed {skipped} lifecycle events");
                    continue;
                }
                Err(RecvError::Closed) => {
                    self.phase = LifecyclePhase::Detached(DetachReason::SourceClosed);
                    break;
                }
            };

            match event {
                PageEvent::ContentParsed => {
                    tokio::task::yield_now().await;
                    let snapshot = self.snapshot();
                    let written = extractor::document_pass(&mut self.bucket, &snapshot);
                    debug!("{source:?} document pass: {written} metrics");
                    self.phase = LifecyclePhase::ContentParsed;
                }
                PageEvent::Loaded => {
                    tokio::task::yield_now().await;
                    let snapshot = self.snapshot();
                    let written = extractor::load_pass(&mut self.bucket, &snapshot);
                    debug!("{source:?} load pass: {written} metrics");
                    self.phase = LifecyclePhase::Loaded;
                    extractor::dump_bucket(&self.bucket, self.verbose);

                    if let Some(tx) = completion.take() {
                        if tx.send(self.bucket.clone()).is_err() {
                            debug!("{source:?} join is gone, bucket dropped");
                        }
                    }
                }
                PageEvent::Hidden => {
                    self.phase = LifecyclePhase::Detached(DetachReason::Hidden);
                    break;
                }
                PageEvent::Unloaded => {
                    self.phase = LifecyclePhase::Detached(DetachReason::Unloaded);
                    break;
                }
            }
        }

        if completion.is_some() {
            debug!("{source:?} recorder detached before load, no bucket");
        }
        debug!("{source:?} recorder finished: {:?}", self.phase);
        self.phase
    }
}
