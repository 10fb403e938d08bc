//! Segment, Part and Piece repositories expressed over the Rundown document.

use std::sync::Arc;

use async_trait::async_trait;
use rundown_core::error::CoreError;
use rundown_core::model::{Part, Piece, Segment};

use super::{PartRepository, PieceRepository, RundownRepository, SegmentRepository};

/// Loads the owning Rundown, edits the child in place and saves it back.
///
/// Not atomic on its own; callers hold the rundown's lock.
#[derive(Clone)]
pub struct AggregateRepository {
    rundowns: Arc<dyn RundownRepository>,
}

impl AggregateRepository {
    pub fn new(rundowns: Arc<dyn RundownRepository>) -> Self {
        Self { rundowns }
    }
}

#[async_trait]
impl SegmentRepository for AggregateRepository {
    async fn get_segment(&self, segment_id: &str) -> Result<Segment, CoreError> {
        let rundown = self.rundowns.get_by_segment_id(segment_id).await?;
        rundown
            .segment(segment_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Segment", segment_id))
    }

    async fn save_segment(&self, segment: &Segment) -> Result<(), CoreError> {
        let mut rundown = self.rundowns.get(&segment.rundown_id).await?;
        rundown.remove_segment(&segment.id);
        rundown.insert_segment(segment.clone())?;
        self.rundowns.save(&rundown).await
    }

    async fn delete_segment(&self, segment_id: &str) -> Result<(), CoreError> {
        let mut rundown = self.rundowns.get_by_segment_id(segment_id).await?;
        rundown
            .remove_segment(segment_id)
            .ok_or_else(|| CoreError::not_found("Segment", segment_id))?;
        self.rundowns.save(&rundown).await
    }

    async fn delete_unsynced_segments(&self, rundown_id: &str) -> Result<usize, CoreError> {
        let mut rundown = self.rundowns.get(rundown_id).await?;
        let before = rundown.segments.len();
        rundown.segments.retain(|s| !s.unsynced);
        let removed = before - rundown.segments.len();
        if removed > 0 {
            self.rundowns.save(&rundown).await?;
        }
        Ok(removed)
    }
}

#[async_trait]
impl PartRepository for AggregateRepository {
    async fn get_part(&self, part_id: &str) -> Result<Part, CoreError> {
        let rundown = self.rundowns.get_by_part_id(part_id).await?;
        rundown
            .part(part_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Part", part_id))
    }

    async fn save_part(&self, part: &Part) -> Result<(), CoreError> {
        let mut rundown = self.rundowns.get_by_segment_id(&part.segment_id).await?;
        for segment in &mut rundown.segments {
            segment.remove_part(&part.id);
        }
        rundown
            .segment_mut(&part.segment_id)
            .ok_or_else(|| CoreError::not_found("Segment", part.segment_id.clone()))?
            .insert_part(part.clone())?;
        self.rundowns.save(&rundown).await
    }

    async fn delete_part(&self, part_id: &str) -> Result<(), CoreError> {
        let mut rundown = self.rundowns.get_by_part_id(part_id).await?;
        let removed = rundown
            .segments
            .iter_mut()
            .find_map(|s| s.remove_part(part_id));
        if removed.is_none() {
            return Err(CoreError::not_found("Part", part_id));
        }
        self.rundowns.save(&rundown).await
    }

    async fn delete_unsynced_parts(&self, rundown_id: &str) -> Result<usize, CoreError> {
        let mut rundown = self.rundowns.get(rundown_id).await?;
        let mut removed = 0;
        for segment in &mut rundown.segments {
            let before = segment.parts.len();
            segment.parts.retain(|p| !p.unsynced);
            removed += before - segment.parts.len();
        }
        if removed > 0 {
            self.rundowns.save(&rundown).await?;
        }
        Ok(removed)
    }
}

#[async_trait]
impl PieceRepository for AggregateRepository {
    async fn get_piece(&self, part_id: &str, piece_id: &str) -> Result<Piece, CoreError> {
        let part = self.get_part(part_id).await?;
        part.piece(piece_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Piece", piece_id))
    }

    async fn save_piece(&self, piece: &Piece) -> Result<(), CoreError> {
        let mut rundown = self.rundowns.get_by_part_id(&piece.part_id).await?;
        let part = rundown
            .part_mut(&piece.part_id)
            .ok_or_else(|| CoreError::not_found("Part", piece.part_id.clone()))?;
        part.remove_piece(&piece.id);
        part.insert_piece(piece.clone())?;
        self.rundowns.save(&rundown).await
    }

    async fn delete_piece(&self, part_id: &str, piece_id: &str) -> Result<(), CoreError> {
        let mut rundown = self.rundowns.get_by_part_id(part_id).await?;
        rundown
            .part_mut(part_id)
            .and_then(|p| p.remove_piece(piece_id))
            .ok_or_else(|| CoreError::not_found("Piece", piece_id))?;
        self.rundowns.save(&rundown).await
    }

    async fn delete_unsynced_pieces(&self, rundown_id: &str) -> Result<usize, CoreError> {
        let mut rundown = self.rundowns.get(rundown_id).await?;
        let mut removed = 0;
        for segment in &mut rundown.segments {
            for part in &mut segment.parts {
                let before = part.pieces.len();
                part.pieces.retain(|p| !p.unsynced);
                removed += before - part.pieces.len();
            }
        }
        if removed > 0 {
            self.rundowns.save(&rundown).await?;
        }
        Ok(removed)
    }
}
