//! Rundown: the aggregate root and unit of activation.
//!
//! Cursors are the source of truth for what is on-air and next. The
//! on-air/next flags on Parts and Segments are derived from them by
//! [`Rundown::refresh_flags`] after every cursor change.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::part::Part;
use crate::model::piece::Piece;
use crate::model::segment::Segment;
use crate::types::{LayerId, Millis, PartId, RundownId, SegmentId, Timestamp};

/// Who placed a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CursorOwner {
    /// Computed by the engine (activation, auto-advance after a take).
    System,
    /// Directed by an operator.
    External,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub segment_id: SegmentId,
    pub part_id: PartId,
    pub owner: CursorOwner,
}

/// A Part that has been on-air.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayedPart {
    pub part_id: PartId,
    pub segment_id: SegmentId,
    pub started_at: Timestamp,
    pub duration: Millis,
}

/// Playout state carried while a Rundown is active.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivePlayout {
    pub current: Option<Cursor>,
    pub next: Option<Cursor>,
    /// Layer -> infinite piece currently live on it.
    #[serde(default)]
    pub infinites: BTreeMap<LayerId, Piece>,
    #[serde(default)]
    pub history: Vec<PlayedPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActivationState {
    Inactive {
        /// Next cursor at deactivation, offered again on reactivation.
        #[serde(default)]
        resume: Option<Cursor>,
    },
    Active(ActivePlayout),
}

impl Default for ActivationState {
    fn default() -> Self {
        Self::Inactive { resume: None }
    }
}

/// Catalogue view of a Rundown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RundownSummary {
    pub id: RundownId,
    pub name: String,
    pub active: bool,
    pub modified_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rundown {
    pub id: RundownId,
    pub name: String,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default)]
    pub state: ActivationState,
    pub modified_at: Timestamp,
}

impl Rundown {
    pub fn new(id: impl Into<RundownId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            segments: Vec::new(),
            state: ActivationState::default(),
            modified_at: chrono::Utc::now(),
        }
    }

    /// Builder: attach a segment, re-parenting it onto this Rundown.
    pub fn with_segment(mut self, mut segment: Segment) -> Self {
        segment.rundown_id = self.id.clone();
        self.segments.push(segment);
        self.sort_segments();
        self
    }

    pub fn summary(&self) -> RundownSummary {
        RundownSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            active: self.is_active(),
            modified_at: self.modified_at,
        }
    }

    pub fn touch(&mut self, now: Timestamp) {
        self.modified_at = now;
    }

    // -----------------------------------------------------------------------
    // Activation state
    // -----------------------------------------------------------------------

    pub fn is_active(&self) -> bool {
        matches!(self.state, ActivationState::Active(_))
    }

    pub fn playout(&self) -> Option<&ActivePlayout> {
        match &self.state {
            ActivationState::Active(playout) => Some(playout),
            ActivationState::Inactive { .. } => None,
        }
    }

    pub fn playout_mut(&mut self) -> Option<&mut ActivePlayout> {
        match &mut self.state {
            ActivationState::Active(playout) => Some(playout),
            ActivationState::Inactive { .. } => None,
        }
    }

    /// Active playout state, or `InvalidState` when the Rundown is inactive.
    pub fn require_active(&mut self) -> Result<&mut ActivePlayout, CoreError> {
        let id = self.id.clone();
        self.playout_mut()
            .ok_or_else(|| CoreError::InvalidState(format!("rundown {id} is not active")))
    }

    pub fn current_part(&self) -> Option<&Part> {
        let cursor = self.playout()?.current.as_ref()?;
        self.part(&cursor.part_id)
    }

    pub fn next_part(&self) -> Option<&Part> {
        let cursor = self.playout()?.next.as_ref()?;
        self.part(&cursor.part_id)
    }

    // -----------------------------------------------------------------------
    // Segments
    // -----------------------------------------------------------------------

    pub fn segment(&self, segment_id: &str) -> Option<&Segment> {
        self.segments.iter().find(|s| s.id == segment_id)
    }

    pub fn segment_mut(&mut self, segment_id: &str) -> Option<&mut Segment> {
        self.segments.iter_mut().find(|s| s.id == segment_id)
    }

    /// Insert a segment keeping rank order. Ids and ranks must stay unique.
    pub fn insert_segment(&mut self, mut segment: Segment) -> Result<(), CoreError> {
        if self.segment(&segment.id).is_some() {
            return Err(CoreError::already_exists("Segment", segment.id));
        }
        if self.segments.iter().any(|s| s.rank == segment.rank) {
            return Err(CoreError::Validation(format!(
                "rank {} is already taken in rundown {}",
                segment.rank, self.id
            )));
        }
        if let Some(dup) = segment.parts.iter().find(|p| self.part(&p.id).is_some()) {
            return Err(CoreError::already_exists("Part", dup.id.clone()));
        }
        segment.rundown_id = self.id.clone();
        for part in &mut segment.parts {
            part.segment_id.clone_from(&segment.id);
            part.adopt_pieces();
        }
        segment.sort_parts();
        let idx = self.segments.partition_point(|s| s.rank < segment.rank);
        self.segments.insert(idx, segment);
        Ok(())
    }

    pub fn remove_segment(&mut self, segment_id: &str) -> Option<Segment> {
        let idx = self.segments.iter().position(|s| s.id == segment_id)?;
        Some(self.segments.remove(idx))
    }

    pub(crate) fn sort_segments(&mut self) {
        self.segments.sort_by(|a, b| a.rank.total_cmp(&b.rank));
    }

    // -----------------------------------------------------------------------
    // Parts
    // -----------------------------------------------------------------------

    pub fn part(&self, part_id: &str) -> Option<&Part> {
        self.parts_in_order().find(|p| p.id == part_id)
    }

    pub fn part_mut(&mut self, part_id: &str) -> Option<&mut Part> {
        self.segments
            .iter_mut()
            .flat_map(|s| s.parts.iter_mut())
            .find(|p| p.id == part_id)
    }

    pub fn segment_of_part(&self, part_id: &str) -> Option<&Segment> {
        self.segments
            .iter()
            .find(|s| s.parts.iter().any(|p| p.id == part_id))
    }

    /// Every Part, Segment rank first, then Part rank.
    pub fn parts_in_order(&self) -> impl Iterator<Item = &Part> {
        self.segments.iter().flat_map(|s| s.parts.iter())
    }

    pub fn first_playable_part(&self) -> Option<&Part> {
        self.parts_in_order().find(|p| p.is_playable())
    }

    /// First playable Part after `part_id` in rundown order.
    pub fn playable_part_after(&self, part_id: &str) -> Option<&Part> {
        self.parts_in_order()
            .skip_while(|p| p.id != part_id)
            .skip(1)
            .find(|p| p.is_playable())
    }

    /// Parts of every Segment ranked before `segment_id`.
    pub fn parts_before_segment(&self, segment_id: &str) -> Vec<&Part> {
        self.segments
            .iter()
            .take_while(|s| s.id != segment_id)
            .flat_map(|s| s.parts.iter())
            .collect()
    }

    pub fn cursor_to(&self, part_id: &str, owner: CursorOwner) -> Option<Cursor> {
        let segment = self.segment_of_part(part_id)?;
        Some(Cursor {
            segment_id: segment.id.clone(),
            part_id: part_id.to_string(),
            owner,
        })
    }

    // -----------------------------------------------------------------------
    // Derived state
    // -----------------------------------------------------------------------

    /// Re-derive on-air/next flags from the cursors, and re-point cursor
    /// segment ids at wherever their Part now lives.
    pub fn refresh_flags(&mut self) {
        let (mut current, mut next) = match self.playout() {
            Some(playout) => (playout.current.clone(), playout.next.clone()),
            None => (None, None),
        };
        for cursor in [&mut current, &mut next].into_iter().flatten() {
            if let Some(segment) = self.segment_of_part(&cursor.part_id) {
                cursor.segment_id = segment.id.clone();
            }
        }

        let current_part = current.as_ref().map(|c| c.part_id.as_str());
        let next_part = next.as_ref().map(|c| c.part_id.as_str());
        for segment in &mut self.segments {
            for part in &mut segment.parts {
                part.on_air = Some(part.id.as_str()) == current_part;
                part.next = Some(part.id.as_str()) == next_part;
            }
            segment.on_air = segment.parts.iter().any(|p| p.on_air);
            segment.next = segment.parts.iter().any(|p| p.next);
        }

        if let Some(playout) = self.playout_mut() {
            playout.current = current;
            playout.next = next;
        }
    }

    /// Point the next cursor at a playable Part again if it no longer
    /// resolves to one. Returns whether the cursor changed.
    pub fn repair_next_cursor(&mut self) -> bool {
        let Some(playout) = self.playout() else {
            return false;
        };
        let still_valid = playout
            .next
            .as_ref()
            .and_then(|c| self.part(&c.part_id))
            .is_some_and(|p| p.is_playable() && !p.on_air);
        if still_valid {
            return false;
        }

        let replacement = match playout.current.as_ref() {
            Some(current) => self.playable_part_after(&current.part_id),
            None => self.first_playable_part(),
        }
        .and_then(|p| self.cursor_to(&p.id, CursorOwner::System));

        let changed = playout.next != replacement;
        if let Some(playout) = self.playout_mut() {
            playout.next = replacement;
        }
        self.refresh_flags();
        changed
    }

    /// Remove unsynced Parts and Segments that are neither on-air nor next.
    /// Returns the number of entities removed.
    pub fn prune_unsynced(&mut self) -> usize {
        let mut removed = 0;
        for segment in &mut self.segments {
            let before = segment.parts.len();
            segment
                .parts
                .retain(|p| !p.unsynced || p.on_air || p.next);
            removed += before - segment.parts.len();
        }
        let before = self.segments.len();
        self.segments
            .retain(|s| !s.unsynced || s.parts.iter().any(|p| p.on_air || p.next));
        removed += before - self.segments.len();
        removed
    }

    /// Revert every Part to its ingested baseline.
    pub fn reset_playout(&mut self) {
        for segment in &mut self.segments {
            segment.parts.retain(|p| p.planned);
            for part in &mut segment.parts {
                part.reset_playout();
            }
        }
    }
}
