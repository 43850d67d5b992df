//! Port interfaces (traits).
//!
//! The host environment and the outbound transports are reached only through
//! these traits. Adapter crates implement them and `pagepulse-agent` wires
//! them together as `Arc<dyn T>`.
//!
//! Async traits use the `async_trait` macro so they stay object safe.

pub mod geo;
pub mod host;
pub mod transport;
