//! Device-facing schedule derived from a Rundown's playout state.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::model::{Piece, Rundown};
use crate::types::{LayerId, Millis, PartId, PieceId, RundownId, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineObject {
    pub id: String,
    pub layer: LayerId,
    pub part_id: PartId,
    pub piece_id: PieceId,
    /// Absolute start. `None` for lookahead objects, which devices preload.
    pub start: Option<Timestamp>,
    pub duration: Option<Millis>,
    #[serde(default)]
    pub lookahead: bool,
    #[serde(default)]
    pub infinite: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub rundown_id: RundownId,
    pub generated_at: Timestamp,
    pub objects: Vec<TimelineObject>,
    /// When the on-air Part should hand over to the next one on its own.
    pub auto_next_at: Option<Timestamp>,
}

impl Timeline {
    /// The baseline persisted while nothing is on air.
    pub fn empty(rundown_id: impl Into<RundownId>, generated_at: Timestamp) -> Self {
        Self {
            rundown_id: rundown_id.into(),
            generated_at,
            objects: Vec::new(),
            auto_next_at: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

pub trait TimelineBuilder: Send + Sync {
    fn build(&self, rundown: &Rundown, now: Timestamp) -> Timeline;
}

/// Emits the on-air Part's pieces, the live infinites inherited from
/// elsewhere and a lookahead copy of the next Part.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTimelineBuilder;

impl TimelineBuilder for DefaultTimelineBuilder {
    fn build(&self, rundown: &Rundown, now: Timestamp) -> Timeline {
        let mut timeline = Timeline::empty(rundown.id.clone(), now);
        let Some(playout) = rundown.playout() else {
            return timeline;
        };

        if let Some(current) = rundown.current_part() {
            let started = current.executed_at.unwrap_or(now);
            let delay = current
                .timings
                .map_or(0, |t| t.delay_start_of_pieces_duration);
            let pieces_start = started + Duration::milliseconds(delay);

            for piece in &current.pieces {
                timeline.objects.push(TimelineObject {
                    start: Some(pieces_start + Duration::milliseconds(piece.start_offset)),
                    ..object(piece, false)
                });
            }
            for piece in playout.infinites.values() {
                if piece.part_id == current.id {
                    continue;
                }
                timeline.objects.push(TimelineObject {
                    start: Some(piece.executed_at.unwrap_or(pieces_start)),
                    infinite: true,
                    ..object(piece, false)
                });
            }

            timeline.auto_next_at = match (current.auto_next, current.expected_duration) {
                (Some(auto_next), Some(expected)) => {
                    let overlap = auto_next.overlap.unwrap_or(0);
                    Some(started + Duration::milliseconds(expected - overlap))
                }
                _ => None,
            };
        }

        if let Some(next) = rundown.next_part() {
            timeline
                .objects
                .extend(next.pieces.iter().map(|piece| object(piece, true)));
        }
        timeline
    }
}

fn object(piece: &Piece, lookahead: bool) -> TimelineObject {
    let prefix = if lookahead { "lookahead" } else { "piece" };
    TimelineObject {
        id: format!("{prefix}_{}_{}", piece.part_id, piece.id),
        layer: piece.layer.clone(),
        part_id: piece.part_id.clone(),
        piece_id: piece.id.clone(),
        start: None,
        duration: piece.duration,
        lookahead,
        infinite: piece.lifespan.is_infinite(),
    }
}
