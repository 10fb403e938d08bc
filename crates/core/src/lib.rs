//! Playout domain for live rundowns: entities, timing and infinite-piece
//! resolution, ingest merging, and the collaborator seams (timeline, blueprint).
//!
//! Nothing in this crate does I/O.

pub mod blueprint;
pub mod error;
pub mod infinites;
pub mod merge;
pub mod model;
pub mod timeline;
pub mod timing;
pub mod types;
