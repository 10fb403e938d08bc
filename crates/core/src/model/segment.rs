//! Segment: an ordered group of Parts within a Rundown.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::part::Part;
use crate::types::{unsynced_id, RundownId, SegmentId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    pub rundown_id: RundownId,
    #[serde(default)]
    pub name: String,
    pub rank: f64,
    #[serde(default)]
    pub parts: Vec<Part>,
    #[serde(default)]
    pub on_air: bool,
    #[serde(default)]
    pub next: bool,
    #[serde(default)]
    pub unsynced: bool,
}

impl Segment {
    pub fn new(id: impl Into<SegmentId>, rundown_id: impl Into<RundownId>, rank: f64) -> Self {
        Self {
            id: id.into(),
            rundown_id: rundown_id.into(),
            name: String::new(),
            rank,
            parts: Vec::new(),
            on_air: false,
            next: false,
            unsynced: false,
        }
    }

    /// Builder: attach a part, re-parenting it onto this Segment. Unlike
    /// [`insert_part`](Self::insert_part) this does not check uniqueness.
    pub fn with_part(mut self, mut part: Part) -> Self {
        part.segment_id = self.id.clone();
        part.adopt_pieces();
        self.parts.push(part);
        self.sort_parts();
        self
    }

    pub fn part(&self, part_id: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.id == part_id)
    }

    pub fn part_mut(&mut self, part_id: &str) -> Option<&mut Part> {
        self.parts.iter_mut().find(|p| p.id == part_id)
    }

    /// Insert a part keeping rank order. Ranks must stay unique.
    pub fn insert_part(&mut self, mut part: Part) -> Result<(), CoreError> {
        if self.part(&part.id).is_some() {
            return Err(CoreError::already_exists("Part", part.id));
        }
        if self.parts.iter().any(|p| p.rank == part.rank) {
            return Err(CoreError::Validation(format!(
                "rank {} is already taken in segment {}",
                part.rank, self.id
            )));
        }
        part.segment_id = self.id.clone();
        part.adopt_pieces();
        let idx = self.parts.partition_point(|p| p.rank < part.rank);
        self.parts.insert(idx, part);
        Ok(())
    }

    pub fn remove_part(&mut self, part_id: &str) -> Option<Part> {
        let idx = self.parts.iter().position(|p| p.id == part_id)?;
        Some(self.parts.remove(idx))
    }

    /// Replace a part in place, re-sorting if its rank moved.
    pub fn replace_part(&mut self, part: Part) -> Result<(), CoreError> {
        let old = self
            .remove_part(&part.id)
            .ok_or_else(|| CoreError::not_found("Part", part.id.clone()))?;
        if let Err(e) = self.insert_part(part) {
            self.insert_part(old)?;
            return Err(e);
        }
        Ok(())
    }

    /// A rank strictly between `part_id` and the part that follows it.
    pub fn rank_after(&self, part_id: &str) -> Option<f64> {
        let idx = self.parts.iter().position(|p| p.id == part_id)?;
        let rank = self.parts[idx].rank;
        Some(match self.parts.get(idx + 1) {
            Some(following) => (rank + following.rank) / 2.0,
            None => rank + 1.0,
        })
    }

    /// A rank strictly before the first part.
    pub fn rank_before_first(&self) -> f64 {
        self.parts.first().map_or(0.0, |p| p.rank - 1.0)
    }

    /// Copy that no longer tracks ingest. Keeps only the parts given.
    pub fn unsynced_copy(&self, keep: &[Part]) -> Self {
        let id = unsynced_id(&self.id);
        let parts = keep
            .iter()
            .map(|p| Part {
                segment_id: id.clone(),
                ..p.clone()
            })
            .collect();
        Self {
            id,
            unsynced: true,
            parts,
            ..self.clone()
        }
    }

    pub(crate) fn sort_parts(&mut self) {
        self.parts.sort_by(|a, b| a.rank.total_cmp(&b.rank));
    }
}
