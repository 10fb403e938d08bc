//! Playout event vocabulary, the in-process bus observers subscribe to,
//! and optional durable persistence of what was published.

pub mod bus;
pub mod persistence;

pub use bus::{EventBus, RundownEvent, RundownEventKind};
pub use persistence::EventPersistence;
