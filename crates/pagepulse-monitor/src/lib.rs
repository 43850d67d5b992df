//! # pagepulse-monitor
//!
//! Page-load timing collection.
//! Turns raw timing snapshots into normalized metrics at each lifecycle
//! milestone, watches resource entries for slow loads, keeps the host's entry
//! buffer from overflowing, and classifies the client environment.

pub mod buffer;
pub mod environment;
pub mod extractor;
pub mod lifecycle;
pub mod resource;
