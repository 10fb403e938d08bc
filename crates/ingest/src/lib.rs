//! Ingest reconciliation: external content changes are applied one at a
//! time, in arrival order, and active rundowns are rebuilt in batches.

pub mod change;
pub mod config;
pub mod queue;

pub use change::{IngestChange, IngestRundown};
pub use config::IngestConfig;
pub use queue::{IngestQueue, IngestStats};
