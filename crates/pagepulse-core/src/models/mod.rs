//! Domain models.
//!
//! Raw host data (timing snapshots, performance entries) and the records the
//! agent derives from it. Everything that goes on the wire implements
//! `serde::Serialize`.

pub mod entry;
pub mod record;
pub mod resource;
pub mod timing;
