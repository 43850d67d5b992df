//! # pagepulse-network
//!
//! Outbound adapters.
//! Delivers reports over the host's beacon channel with an HTTP fallback,
//! routes reports through an injected analytics sink, and looks up the
//! client's public IP and city.
//!
//! ```rust,ignore
//! use pagepulse_network::delivery::Deliverer;
//! use pagepulse_network::http_client::ReqwestTransport;
//!
//! let http = ReqwestTransport::new(Duration::from_secs(10))?;
//! let deliverer = Deliverer::new().with_http(Arc::new(http));
//! ```

pub mod delivery;
pub mod geo_client;
pub mod http_client;
pub mod sink;
