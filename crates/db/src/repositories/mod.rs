//! Repository contracts consumed by the playout state machine and the
//! ingest queue.
//!
//! Every lookup distinguishes "not found" ([`CoreError::NotFound`]) from
//! other failures, which the ingest queue relies on to recognise benign races.

use async_trait::async_trait;
use rundown_core::error::CoreError;
use rundown_core::model::{Part, Piece, Rundown, RundownSummary, Segment};
use rundown_core::timeline::Timeline;

pub mod aggregate;

pub use aggregate::AggregateRepository;

#[async_trait]
pub trait RundownRepository: Send + Sync {
    async fn get(&self, id: &str) -> Result<Rundown, CoreError>;

    /// The Rundown owning `segment_id`. Backends without a reverse index
    /// may leave this unsupported.
    async fn get_by_segment_id(&self, segment_id: &str) -> Result<Rundown, CoreError> {
        let _ = segment_id;
        Err(CoreError::UnsupportedOperation(
            "lookup by segment id".into(),
        ))
    }

    /// The Rundown owning `part_id`.
    async fn get_by_part_id(&self, part_id: &str) -> Result<Rundown, CoreError> {
        let _ = part_id;
        Err(CoreError::UnsupportedOperation("lookup by part id".into()))
    }

    /// Id, name, active flag and modification time of every Rundown.
    async fn list_basic(&self) -> Result<Vec<RundownSummary>, CoreError>;

    /// Store a new Rundown. Fails with `AlreadyExists` on a duplicate id.
    async fn create(&self, rundown: &Rundown) -> Result<(), CoreError>;

    /// Insert or overwrite.
    async fn save(&self, rundown: &Rundown) -> Result<(), CoreError>;

    async fn delete(&self, id: &str) -> Result<(), CoreError>;
}

#[async_trait]
pub trait SegmentRepository: Send + Sync {
    async fn get_segment(&self, segment_id: &str) -> Result<Segment, CoreError>;
    /// Insert or overwrite within the Rundown named by `segment.rundown_id`.
    async fn save_segment(&self, segment: &Segment) -> Result<(), CoreError>;
    async fn delete_segment(&self, segment_id: &str) -> Result<(), CoreError>;
    /// Remove every unsynced Segment of a Rundown, returning how many went.
    async fn delete_unsynced_segments(&self, rundown_id: &str) -> Result<usize, CoreError>;
}

#[async_trait]
pub trait PartRepository: Send + Sync {
    async fn get_part(&self, part_id: &str) -> Result<Part, CoreError>;
    /// Insert or overwrite within the Segment named by `part.segment_id`.
    async fn save_part(&self, part: &Part) -> Result<(), CoreError>;
    async fn delete_part(&self, part_id: &str) -> Result<(), CoreError>;
    async fn delete_unsynced_parts(&self, rundown_id: &str) -> Result<usize, CoreError>;
}

#[async_trait]
pub trait PieceRepository: Send + Sync {
    async fn get_piece(&self, part_id: &str, piece_id: &str) -> Result<Piece, CoreError>;
    /// Insert or overwrite within the Part named by `piece.part_id`.
    async fn save_piece(&self, piece: &Piece) -> Result<(), CoreError>;
    async fn delete_piece(&self, part_id: &str, piece_id: &str) -> Result<(), CoreError>;
    async fn delete_unsynced_pieces(&self, rundown_id: &str) -> Result<usize, CoreError>;
}

#[async_trait]
pub trait TimelineRepository: Send + Sync {
    async fn save_timeline(&self, timeline: &Timeline) -> Result<(), CoreError>;
    async fn get_timeline(&self, rundown_id: &str) -> Result<Timeline, CoreError>;
}
