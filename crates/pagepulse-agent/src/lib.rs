//! # pagepulse-agent
//!
//! Agent entry point: wires the recorders, the join, the resource watcher
//! and the delivery layer around a set of host capabilities.
//!
//! ```rust,ignore
//! let agent = Agent::init(config, host.capabilities());
//! let tasks = agent.start();
//! ```

pub mod join;
pub mod simulated;

use std::sync::Arc;

use pagepulse_core::config::AppConfig;
use pagepulse_core::gate::BaseFlagGate;
use pagepulse_core::models::entry::EntryType;
use pagepulse_core::models::record::BaseTelemetryRecord;
use pagepulse_core::models::timing::TimingSource;
use pagepulse_core::ports::geo::GeoLookup;
use pagepulse_core::ports::host::HostCapabilities;
use pagepulse_core::ports::transport::{BeaconChannel, DeliveryOutcome, ReportTransport};
use pagepulse_monitor::buffer::BufferGuardian;
use pagepulse_monitor::lifecycle::{LifecyclePhase, LifecycleRecorder};
use pagepulse_monitor::resource::ResourceWatcher;
use pagepulse_network::delivery::Deliverer;
use pagepulse_network::geo_client::CityJsonGeoClient;
use pagepulse_network::http_client::ReqwestTransport;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use crate::join::JoinCoordinator;

/// Builds an [`Agent`]; unset transports fall back to beacon-then-HTTP.
pub struct AgentBuilder {
    config: AppConfig,
    host: HostCapabilities,
    beacon: Option<Arc<dyn BeaconChannel>>,
    base_url: Option<Url>,
    transport: Option<Arc<dyn ReportTransport>>,
    resource_transport: Option<Arc<dyn ReportTransport>>,
    geo: Option<Arc<dyn GeoLookup>>,
}

impl AgentBuilder {
    /// Host beacon channel for the default transport
    pub fn beacon(mut self, beacon: Arc<dyn BeaconChannel>) -> Self {
        self.beacon = Some(beacon);
        self
    }

    /// Page URL relative endpoints resolve against
    pub fn base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Transport for the base record and marks (and resources, unless
    /// [`resource_transport`](Self::resource_transport) is set)
    pub fn transport(mut self, transport: Arc<dyn ReportTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Separate transport for slow-resource batches, e.g. an analytics sink
    pub fn resource_transport(mut self, transport: Arc<dyn ReportTransport>) -> Self {
        self.resource_transport = Some(transport);
        self
    }

    pub fn geo(mut self, geo: Arc<dyn GeoLookup>) -> Self {
        self.geo = Some(geo);
        self
    }

    fn default_transport(&self) -> Arc<dyn ReportTransport> {
        let mut deliverer = Deliverer::new();
        if let Some(beacon) = &self.beacon {
            deliverer = deliverer.with_beacon(beacon.clone());
        }
        if let Some(base_url) = &self.base_url {
            deliverer = deliverer.with_base_url(base_url.clone());
        }
        match ReqwestTransport::new(self.config.request_timeout()) {
            Ok(http) => deliverer = deliverer.with_http(Arc::new(http)),
            Err(e) => warn!("HTTP fallback unavailable: {e}"),
        }
        Arc::new(deliverer)
    }

    fn default_geo(&self) -> Option<Arc<dyn GeoLookup>> {
        let endpoint = self.config.transport.geo_endpoint.as_deref()?;
        match CityJsonGeoClient::new(endpoint, self.config.request_timeout()) {
            Ok(client) => Some(Arc::new(client)),
            Err(e) => {
                warn!("geo lookup disabled: {e}");
                None
            }
        }
    }

    pub fn build(self) -> Agent {
        let transport = self
            .transport
            .clone()
            .unwrap_or_else(|| self.default_transport());
        let resource_transport = self
            .resource_transport
            .clone()
            .unwrap_or_else(|| transport.clone());
        let geo = self.geo.clone().or_else(|| self.default_geo());
        let gate = Arc::new(BaseFlagGate::new());
        let watcher = Arc::new(ResourceWatcher::new(
            &self.config.agent,
            self.host.clone(),
            gate.clone(),
            resource_transport,
        ));

        Agent {
            inner: Arc::new(AgentInner {
                config: self.config,
                host: self.host,
                gate,
                transport,
                watcher,
                geo,
            }),
        }
    }
}

struct AgentInner {
    config: AppConfig,
    host: HostCapabilities,
    gate: Arc<BaseFlagGate>,
    transport: Arc<dyn ReportTransport>,
    watcher: Arc<ResourceWatcher>,
    geo: Option<Arc<dyn GeoLookup>>,
}

/// Handles to everything [`Agent::start`] spawned.
pub struct AgentTasks {
    /// Resolves to the dispatched base record, or `None` if the page view
    /// ended without one
    pub pipeline: JoinHandle<Option<BaseTelemetryRecord>>,
    pub legacy: JoinHandle<LifecyclePhase>,
    pub navigation: JoinHandle<LifecyclePhase>,
    /// Continuous slow-resource observation
    pub observer: Option<JoinHandle<()>>,
    pub buffer: Option<BufferGuardian>,
}

/// One agent per page view.
#[derive(Clone)]
pub struct Agent {
    inner: Arc<AgentInner>,
}

impl Agent {
    pub fn builder(config: AppConfig, host: HostCapabilities) -> AgentBuilder {
        AgentBuilder {
            config,
            host,
            beacon: None,
            base_url: None,
            transport: None,
            resource_transport: None,
            geo: None,
        }
    }

    /// Agent with default transports
    pub fn init(config: AppConfig, host: HostCapabilities) -> Self {
        Self::builder(config, host).build()
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// True once the base record has been dispatched
    pub fn base_sent(&self) -> bool {
        self.inner.gate.is_open()
    }

    /// Attaches both recorders and spawns the join.
    ///
    /// Must run inside a tokio runtime. Returns `None` when the host has no
    /// performance instrumentation.
    pub fn start(&self) -> Option<AgentTasks> {
        let inner = &self.inner;
        if !inner.host.has_performance() {
            warn!("host has no performance instrumentation, agent not started");
            return None;
        }
        self.log_time_origin();

        let agent = &inner.config.agent;
        let (observer, buffer) = if agent.continuous_enabled() {
            (inner.watcher.clone().watch(), BufferGuardian::arm(&inner.host))
        } else {
            (None, None)
        };

        let legacy = LifecycleRecorder::attach(TimingSource::Legacy, inner.host.clone(), agent.log);
        let navigation =
            LifecycleRecorder::attach(TimingSource::Navigation, inner.host.clone(), agent.log);
        let (legacy_tx, legacy_rx) = oneshot::channel();
        let (navigation_tx, navigation_rx) = oneshot::channel();

        let coordinator = JoinCoordinator {
            config: agent.clone(),
            host: inner.host.clone(),
            gate: inner.gate.clone(),
            transport: inner.transport.clone(),
            watcher: inner.watcher.clone(),
            geo: inner.geo.clone(),
            timeout: inner.config.join_timeout(),
        };

        info!(
            "agent started (observe={}, slow threshold {} ms)",
            agent.continuous_enabled(),
            agent.slower_time
        );

        Some(AgentTasks {
            pipeline: tokio::spawn(coordinator.run(legacy_rx, navigation_rx)),
            legacy: tokio::spawn(legacy.run(legacy_tx)),
            navigation: tokio::spawn(navigation.run(navigation_tx)),
            observer,
            buffer,
        })
    }

    /// Records a custom mark on the host
    pub fn mark(&self, name: &str) {
        if name.is_empty() {
            debug!("empty mark name ignored");
            return;
        }
        self.inner.host.mark(name);
    }

    /// Sends every mark entry to `endpoint`.
    ///
    /// Returns `None` when nothing was sent: blank endpoint or no marks.
    pub async fn report_marks(&self, endpoint: &str) -> Option<DeliveryOutcome> {
        if endpoint.trim().is_empty() {
            info!("report_marks needs an endpoint, nothing sent");
            return None;
        }

        let marks = self.inner.host.entries_by_type(EntryType::Mark);
        if marks.is_empty() {
            info!("no marks recorded, nothing sent");
            return None;
        }

        let payload = match serde_json::to_value(&marks) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("failed to serialize marks: {e}");
                return None;
            }
        };
        Some(self.inner.transport.deliver(endpoint, payload).await)
    }

    fn log_time_origin(&self) {
        let Some(origin) = self.inner.host.time_origin() else {
            debug!("host exposes no time origin");
            return;
        };
        match chrono::DateTime::from_timestamp_millis(origin as i64) {
            Some(utc) => {
                let local = utc.with_timezone(&chrono::Local);
                info!(
                    "timing baseline {} ({origin})",
                    local.format("%Y-%m-%d %H:%M:%S%.3f")
                );
            }
            None => debug!("time origin {origin} out of range"),
        }
    }
}
