//! Applying ingest content to a live Rundown.
//!
//! Ingest replaces content wholesale, but playout state must survive it:
//! Parts that keep their id inherit on-air/next flags, timings, end-state
//! and execution markers; ad-libbed Parts and Pieces are carried over; and
//! an on-air Part that ingest no longer knows about is kept as an unsynced
//! copy (and its Segment too, if that vanished) so the show is not cut.
//!
//! Every operation funnels into [`rebuild`], which takes the complete new
//! segment list and reconciles it against what is currently in the Rundown.

use std::collections::{HashMap, HashSet};

use crate::error::CoreError;
use crate::model::{Part, Rundown, Segment};
use crate::types::PartId;

/// Replace name and segment content of `rundown` with ingested content.
pub fn replace_rundown_content(
    rundown: &mut Rundown,
    name: String,
    segments: Vec<Segment>,
) -> Result<(), CoreError> {
    rebuild(rundown, segments)?;
    rundown.name = name;
    Ok(())
}

/// Replace one existing Segment with its ingested counterpart.
pub fn replace_segment(rundown: &mut Rundown, segment: Segment) -> Result<(), CoreError> {
    if rundown.segment(&segment.id).is_none() {
        return Err(CoreError::not_found("Segment", segment.id));
    }
    let incoming_parts: HashSet<&str> = segment.parts.iter().map(|p| p.id.as_str()).collect();
    let mut segments: Vec<Segment> = rundown
        .segments
        .iter()
        .filter(|s| s.id != segment.id)
        .cloned()
        .map(|mut s| {
            s.parts.retain(|p| !incoming_parts.contains(p.id.as_str()));
            s
        })
        .collect();
    segments.push(segment);
    rebuild(rundown, segments)
}

/// Remove a Segment that ingest deleted.
pub fn remove_segment(rundown: &mut Rundown, segment_id: &str) -> Result<(), CoreError> {
    if rundown.segment(segment_id).is_none() {
        return Err(CoreError::not_found("Segment", segment_id));
    }
    let segments = rundown
        .segments
        .iter()
        .filter(|s| s.id != segment_id)
        .cloned()
        .collect();
    rebuild(rundown, segments)
}

/// Replace one existing Part, possibly moving it to another Segment.
pub fn replace_part(rundown: &mut Rundown, part: Part) -> Result<(), CoreError> {
    if rundown.part(&part.id).is_none() {
        return Err(CoreError::not_found("Part", part.id));
    }
    if rundown.segment(&part.segment_id).is_none() {
        return Err(CoreError::not_found("Segment", part.segment_id));
    }
    let mut segments = rundown.segments.clone();
    for segment in &mut segments {
        segment.remove_part(&part.id);
    }
    let target = segments
        .iter_mut()
        .find(|s| s.id == part.segment_id)
        .ok_or_else(|| CoreError::not_found("Segment", part.segment_id.clone()))?;
    target.insert_part(part)?;
    rebuild(rundown, segments)
}

/// Remove a Part that ingest deleted.
pub fn remove_part(rundown: &mut Rundown, part_id: &str) -> Result<(), CoreError> {
    if rundown.part(part_id).is_none() {
        return Err(CoreError::not_found("Part", part_id));
    }
    let mut segments = rundown.segments.clone();
    for segment in &mut segments {
        segment.remove_part(part_id);
    }
    rebuild(rundown, segments)
}

/// Reconcile `rundown` against a complete incoming segment list.
fn rebuild(rundown: &mut Rundown, mut segments: Vec<Segment>) -> Result<(), CoreError> {
    validate(&segments)?;

    let old_segments = rundown.segments.clone();
    let old_parts: HashMap<&str, &Part> = old_segments
        .iter()
        .flat_map(|s| s.parts.iter())
        .map(|p| (p.id.as_str(), p))
        .collect();

    let mut incoming_ids: HashSet<PartId> = HashSet::new();
    for segment in &mut segments {
        segment.rundown_id = rundown.id.clone();
        for part in &mut segment.parts {
            part.segment_id = segment.id.clone();
            part.adopt_pieces();
            if let Some(old) = old_parts.get(part.id.as_str()) {
                part.inherit_live_state(old);
            }
            incoming_ids.insert(part.id.clone());
        }
        segment.sort_parts();
    }

    let mut renamed: Vec<(PartId, PartId)> = Vec::new();
    for old_segment in &old_segments {
        let leftovers: Vec<&Part> = old_segment
            .parts
            .iter()
            .filter(|p| !incoming_ids.contains(&p.id))
            .collect();

        match segments.iter_mut().find(|s| s.id == old_segment.id) {
            Some(segment) => {
                for part in leftovers {
                    if let Some(kept) = carry_over(part, &mut renamed) {
                        let rank = free_rank(segment.parts.iter().map(|p| p.rank), kept.rank);
                        segment.insert_part(Part { rank, ..kept })?;
                    }
                }
            }
            None => {
                let live: Vec<Part> = leftovers
                    .into_iter()
                    .filter(|p| p.on_air)
                    .filter_map(|p| carry_over(p, &mut renamed))
                    .collect();
                if !live.is_empty() {
                    let mut copy = old_segment.unsynced_copy(&live);
                    copy.rank = free_rank(segments.iter().map(|s| s.rank), copy.rank);
                    segments.push(copy);
                }
            }
        }
    }

    rundown.segments = segments;
    rundown.sort_segments();

    if let Some(playout) = rundown.playout_mut() {
        for (old_id, new_id) in &renamed {
            if let Some(current) = playout.current.as_mut().filter(|c| &c.part_id == old_id) {
                current.part_id = new_id.clone();
            }
        }
    }
    rundown.refresh_flags();
    rundown.repair_next_cursor();
    Ok(())
}

/// What survives of a Part ingest dropped: ad-libs as they are, the
/// on-air Part as an unsynced copy, nothing else.
fn carry_over(part: &Part, renamed: &mut Vec<(PartId, PartId)>) -> Option<Part> {
    if !part.planned {
        Some(part.clone())
    } else if part.on_air {
        let copy = part.unsynced_copy();
        renamed.push((part.id.clone(), copy.id.clone()));
        Some(copy)
    } else {
        None
    }
}

/// `wanted` if no sibling uses it, otherwise a rank just after it.
fn free_rank(taken: impl Iterator<Item = f64>, wanted: f64) -> f64 {
    let taken: Vec<f64> = taken.collect();
    if !taken.contains(&wanted) {
        return wanted;
    }
    let following = taken
        .iter()
        .copied()
        .filter(|r| *r > wanted)
        .fold(f64::INFINITY, f64::min);
    if following.is_finite() {
        (wanted + following) / 2.0
    } else {
        wanted + 1.0
    }
}

fn validate(segments: &[Segment]) -> Result<(), CoreError> {
    let mut segment_ids = HashSet::new();
    let mut part_ids = HashSet::new();
    for segment in segments {
        if !segment_ids.insert(segment.id.as_str()) {
            return Err(CoreError::Validation(format!(
                "segment {} appears more than once",
                segment.id
            )));
        }
        let mut ranks: Vec<f64> = Vec::with_capacity(segment.parts.len());
        for part in &segment.parts {
            if !part_ids.insert(part.id.as_str()) {
                return Err(CoreError::Validation(format!(
                    "part {} appears more than once",
                    part.id
                )));
            }
            if ranks.contains(&part.rank) {
                return Err(CoreError::Validation(format!(
                    "rank {} is used twice in segment {}",
                    part.rank, segment.id
                )));
            }
            ranks.push(part.rank);
        }
    }
    Ok(())
}
