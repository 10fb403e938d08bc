//! Piece: a single playable element on a layer within a Part.

use serde::{Deserialize, Serialize};

use crate::types::{unsynced_id, LayerId, Millis, PartId, PieceId, Timestamp};

/// How far past its originating Part a Piece stays live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceLifespan {
    WithinPart,
    StickyUntilSegmentChange,
    StickyUntilRundownChange,
    SpanningUntilSegmentEnd,
    SpanningUntilRundownEnd,
    SpanningSegmentThenStickyRundown,
}

impl PieceLifespan {
    /// Anything outside `WithinPart` outlives its Part.
    pub fn is_infinite(self) -> bool {
        !matches!(self, Self::WithinPart)
    }

    /// Lifespans carried forward across Parts of the same Segment.
    pub fn spans_segment(self) -> bool {
        matches!(
            self,
            Self::SpanningUntilSegmentEnd
                | Self::SpanningUntilRundownEnd
                | Self::SpanningSegmentThenStickyRundown
        )
    }

    /// Lifespans carried forward across Segment boundaries.
    pub fn spans_rundown(self) -> bool {
        matches!(self, Self::SpanningUntilRundownEnd)
    }
}

/// Role the piece plays around a part switch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PieceTransition {
    #[default]
    None,
    In,
    Out,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Piece {
    pub id: PieceId,
    pub part_id: PartId,
    #[serde(default)]
    pub name: String,
    pub layer: LayerId,
    pub lifespan: PieceLifespan,
    #[serde(default)]
    pub start_offset: Millis,
    /// A fixed duration also fixes the visible end, so post-roll is ignored.
    #[serde(default)]
    pub duration: Option<Millis>,
    #[serde(default)]
    pub pre_roll: Option<Millis>,
    #[serde(default)]
    pub post_roll: Option<Millis>,
    #[serde(default)]
    pub transition: PieceTransition,
    #[serde(default = "planned_default")]
    pub planned: bool,
    #[serde(default)]
    pub unsynced: bool,
    /// Only tracked for infinite lifespans.
    #[serde(default)]
    pub executed_at: Option<Timestamp>,
}

fn planned_default() -> bool {
    true
}

impl Piece {
    pub fn new(
        id: impl Into<PieceId>,
        part_id: impl Into<PartId>,
        layer: impl Into<LayerId>,
        lifespan: PieceLifespan,
    ) -> Self {
        Self {
            id: id.into(),
            part_id: part_id.into(),
            name: String::new(),
            layer: layer.into(),
            lifespan,
            start_offset: 0,
            duration: None,
            pre_roll: None,
            post_roll: None,
            transition: PieceTransition::None,
            planned: true,
            unsynced: false,
            executed_at: None,
        }
    }

    pub fn with_pre_roll(mut self, pre_roll: Millis) -> Self {
        self.pre_roll = Some(pre_roll);
        self
    }

    pub fn with_post_roll(mut self, post_roll: Millis) -> Self {
        self.post_roll = Some(post_roll);
        self
    }

    pub fn with_duration(mut self, duration: Millis) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_start_offset(mut self, start_offset: Millis) -> Self {
        self.start_offset = start_offset;
        self
    }

    pub fn unplanned(mut self) -> Self {
        self.planned = false;
        self
    }

    /// Copy owned by another Part. Everything else is preserved.
    pub fn reparented(&self, part_id: &str) -> Self {
        Self {
            part_id: part_id.to_string(),
            ..self.clone()
        }
    }

    /// Copy that no longer tracks ingest: suffixed id, unsynced flag set.
    pub fn unsynced_copy(&self, part_id: &str) -> Self {
        Self {
            id: unsynced_id(&self.id),
            part_id: part_id.to_string(),
            unsynced: true,
            ..self.clone()
        }
    }

    /// Record the moment an infinite piece started playing. Pieces that end
    /// with their Part never carry an execution marker.
    pub fn mark_executed(&mut self, at: Timestamp) {
        if self.lifespan.is_infinite() && self.executed_at.is_none() {
            self.executed_at = Some(at);
        }
    }

    pub fn reset_playout(&mut self) {
        self.executed_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifespan_classification() {
        assert!(!PieceLifespan::WithinPart.is_infinite());
        assert!(PieceLifespan::StickyUntilSegmentChange.is_infinite());
        assert!(!PieceLifespan::StickyUntilRundownChange.spans_segment());
        assert!(PieceLifespan::SpanningSegmentThenStickyRundown.spans_segment());
        assert!(!PieceLifespan::SpanningSegmentThenStickyRundown.spans_rundown());
        assert!(PieceLifespan::SpanningUntilRundownEnd.spans_rundown());
    }

    #[test]
    fn within_part_piece_never_records_execution() {
        let mut piece = Piece::new("a", "p", "cam", PieceLifespan::WithinPart);
        piece.mark_executed(chrono::Utc::now());
        assert!(piece.executed_at.is_none());

        let mut bed = Piece::new("b", "p", "audio", PieceLifespan::SpanningUntilSegmentEnd);
        let at = chrono::Utc::now();
        bed.mark_executed(at);
        bed.mark_executed(at + chrono::Duration::seconds(5));
        assert_eq!(bed.executed_at, Some(at));
    }

    #[test]
    fn unsynced_copy_changes_only_identity_fields() {
        let piece = Piece::new("gfx", "p1", "l3", PieceLifespan::WithinPart).with_pre_roll(40);
        let copy = piece.unsynced_copy("p1_unsynced");
        assert_eq!(copy.id, "gfx_unsynced");
        assert_eq!(copy.part_id, "p1_unsynced");
        assert!(copy.unsynced);
        assert_eq!(copy.pre_roll, Some(40));
        assert!(!piece.unsynced);
    }

    #[test]
    fn deserializes_with_defaults() {
        let piece: Piece = serde_json::from_value(serde_json::json!({
            "id": "x",
            "part_id": "p",
            "layer": "cam",
            "lifespan": "spanning_until_rundown_end"
        }))
        .unwrap();
        assert!(piece.planned);
        assert_eq!(piece.transition, PieceTransition::None);
        assert_eq!(piece.lifespan, PieceLifespan::SpanningUntilRundownEnd);
    }
}
