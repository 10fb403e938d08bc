//! Part: an ordered collection of Pieces with its own timing state.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::piece::Piece;
use crate::types::{unsynced_id, LayerId, Millis, PartId, SegmentId, Timestamp};

/// How this Part enters when taken after another Part.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InTransition {
    /// How long the previous Part keeps playing once this one starts.
    pub keep_previous_alive: Millis,
    /// How long this Part's own pieces are held back.
    pub delay_pieces: Millis,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutTransition {
    pub keep_alive: Millis,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoNext {
    pub overlap: Option<Millis>,
}

/// Derived transition timings, computed against the preceding Part.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartTimings {
    pub in_transition_start: Option<Millis>,
    pub delay_start_of_pieces_duration: Millis,
    pub post_roll_duration: Millis,
    pub previous_part_continue_into_part_duration: Millis,
}

/// Blueprint-supplied state of a Part at the moment it went off-air.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EndState(pub serde_json::Value);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub id: PartId,
    pub segment_id: SegmentId,
    #[serde(default)]
    pub title: String,
    pub rank: f64,
    #[serde(default)]
    pub pieces: Vec<Piece>,
    #[serde(default)]
    pub on_air: bool,
    #[serde(default)]
    pub next: bool,
    #[serde(default = "planned_default")]
    pub planned: bool,
    #[serde(default)]
    pub untimed: bool,
    #[serde(default)]
    pub unsynced: bool,
    #[serde(default)]
    pub in_transition: Option<InTransition>,
    #[serde(default)]
    pub out_transition: Option<OutTransition>,
    #[serde(default)]
    pub auto_next: Option<AutoNext>,
    #[serde(default)]
    pub disable_next_in_transition: bool,
    #[serde(default)]
    pub expected_duration: Option<Millis>,
    #[serde(default)]
    pub timings: Option<PartTimings>,
    #[serde(default)]
    pub end_state: Option<EndState>,
    #[serde(default)]
    pub executed_at: Option<Timestamp>,
    #[serde(default)]
    pub played_duration: Option<Millis>,
}

fn planned_default() -> bool {
    true
}

impl Part {
    pub fn new(id: impl Into<PartId>, segment_id: impl Into<SegmentId>, rank: f64) -> Self {
        Self {
            id: id.into(),
            segment_id: segment_id.into(),
            title: String::new(),
            rank,
            pieces: Vec::new(),
            on_air: false,
            next: false,
            planned: true,
            untimed: false,
            unsynced: false,
            in_transition: None,
            out_transition: None,
            auto_next: None,
            disable_next_in_transition: false,
            expected_duration: None,
            timings: None,
            end_state: None,
            executed_at: None,
            played_duration: None,
        }
    }

    /// Builder: attach a piece, re-parenting it onto this Part.
    pub fn with_piece(mut self, piece: Piece) -> Self {
        self.pieces.push(piece.reparented(&self.id));
        self
    }

    pub fn with_in_transition(mut self, keep_previous_alive: Millis, delay_pieces: Millis) -> Self {
        self.in_transition = Some(InTransition {
            keep_previous_alive,
            delay_pieces,
        });
        self
    }

    pub fn with_out_transition(mut self, keep_alive: Millis) -> Self {
        self.out_transition = Some(OutTransition { keep_alive });
        self
    }

    pub fn with_auto_next(mut self, overlap: Option<Millis>) -> Self {
        self.auto_next = Some(AutoNext { overlap });
        self
    }

    pub fn with_expected_duration(mut self, duration: Millis) -> Self {
        self.expected_duration = Some(duration);
        self
    }

    pub fn unplanned(mut self) -> Self {
        self.planned = false;
        self
    }

    /// Unsynced parts are neither activated nor set as next.
    pub fn is_playable(&self) -> bool {
        !self.unsynced
    }

    pub fn piece(&self, piece_id: &str) -> Option<&Piece> {
        self.pieces.iter().find(|p| p.id == piece_id)
    }

    /// Layers this Part places pieces on.
    pub fn layers(&self) -> BTreeSet<LayerId> {
        self.pieces.iter().map(|p| p.layer.clone()).collect()
    }

    /// Point every piece's `part_id` at this Part.
    pub fn adopt_pieces(&mut self) {
        for piece in &mut self.pieces {
            piece.part_id.clone_from(&self.id);
        }
    }

    /// Insert a piece owned by this Part. Fails on a duplicate piece id.
    pub fn insert_piece(&mut self, piece: Piece) -> Result<(), CoreError> {
        if self.piece(&piece.id).is_some() {
            return Err(CoreError::already_exists("Piece", piece.id));
        }
        self.pieces.push(piece.reparented(&self.id));
        Ok(())
    }

    pub fn remove_piece(&mut self, piece_id: &str) -> Option<Piece> {
        let idx = self.pieces.iter().position(|p| p.id == piece_id)?;
        Some(self.pieces.remove(idx))
    }

    /// Copy that no longer tracks ingest. Pieces follow the new id.
    pub fn unsynced_copy(&self) -> Self {
        let id = unsynced_id(&self.id);
        let pieces = self.pieces.iter().map(|p| p.unsynced_copy(&id)).collect();
        Self {
            id,
            unsynced: true,
            pieces,
            ..self.clone()
        }
    }

    /// Take over execution state from an older copy of the same Part.
    pub fn inherit_live_state(&mut self, old: &Part) {
        self.on_air = old.on_air;
        self.next = old.next;
        self.timings = old.timings;
        self.end_state = old.end_state.clone();
        self.executed_at = old.executed_at;
        self.played_duration = old.played_duration;

        for piece in &mut self.pieces {
            if let Some(previous) = old.piece(&piece.id) {
                piece.executed_at = previous.executed_at;
            }
        }
        let adlibs: Vec<Piece> = old
            .pieces
            .iter()
            .filter(|p| !p.planned && self.piece(&p.id).is_none())
            .map(|p| p.reparented(&self.id))
            .collect();
        self.pieces.extend(adlibs);
    }

    /// Drop everything learnt during playout and any ad-libbed pieces.
    pub fn reset_playout(&mut self) {
        self.timings = None;
        self.end_state = None;
        self.executed_at = None;
        self.played_duration = None;
        self.pieces.retain(|p| p.planned);
        for piece in &mut self.pieces {
            piece.reset_playout();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::piece::PieceLifespan;

    #[test]
    fn with_piece_reparents() {
        let part = Part::new("p1", "s1", 1.0)
            .with_piece(Piece::new("a", "elsewhere", "cam", PieceLifespan::WithinPart));
        assert_eq!(part.pieces[0].part_id, "p1");
    }

    #[test]
    fn insert_piece_rejects_duplicates() {
        let mut part = Part::new("p1", "s1", 1.0);
        part.insert_piece(Piece::new("a", "p1", "cam", PieceLifespan::WithinPart))
            .unwrap();
        let err = part
            .insert_piece(Piece::new("a", "p1", "cam", PieceLifespan::WithinPart))
            .unwrap_err();
        assert_eq!(err, CoreError::already_exists("Piece", "a"));
    }

    #[test]
    fn reset_drops_adlibs_and_playout_markers() {
        let mut part = Part::new("p1", "s1", 1.0)
            .with_piece(Piece::new("a", "p1", "cam", PieceLifespan::WithinPart))
            .with_piece(Piece::new("b", "p1", "gfx", PieceLifespan::WithinPart).unplanned());
        part.executed_at = Some(chrono::Utc::now());
        part.played_duration = Some(1000);
        part.timings = Some(PartTimings::default());
        part.end_state = Some(EndState(serde_json::json!({"x": 1})));

        part.reset_playout();

        assert_eq!(part.pieces.len(), 1);
        assert!(part.executed_at.is_none());
        assert!(part.played_duration.is_none());
        assert!(part.timings.is_none());
        assert!(part.end_state.is_none());
    }

    #[test]
    fn inherit_live_state_keeps_adlibs_and_execution() {
        let started = chrono::Utc::now();
        let mut old = Part::new("p1", "s1", 1.0)
            .with_piece(Piece::new("a", "p1", "cam", PieceLifespan::WithinPart))
            .with_piece(Piece::new("adlib", "p1", "gfx", PieceLifespan::WithinPart).unplanned());
        old.on_air = true;
        old.executed_at = Some(started);

        let mut incoming = Part::new("p1", "s1", 1.0)
            .with_piece(Piece::new("a", "p1", "cam", PieceLifespan::WithinPart))
            .with_piece(Piece::new("c", "p1", "vo", PieceLifespan::WithinPart));
        incoming.inherit_live_state(&old);

        assert!(incoming.on_air);
        assert_eq!(incoming.executed_at, Some(started));
        let ids: Vec<_> = incoming.pieces.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "adlib"]);
    }

    #[test]
    fn unsynced_copy_moves_pieces_along() {
        let part = Part::new("p1", "s1", 1.0)
            .with_piece(Piece::new("a", "p1", "cam", PieceLifespan::WithinPart));
        let copy = part.unsynced_copy();
        assert_eq!(copy.id, "p1_unsynced");
        assert!(copy.unsynced);
        assert!(!copy.is_playable());
        assert_eq!(copy.pieces[0].part_id, "p1_unsynced");
    }
}
