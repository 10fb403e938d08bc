//! The rundown playout state machine.
//!
//! Every public operation follows the same shape: take the rundown's lock,
//! load the aggregate, mutate it, then [`commit`](RundownStateMachine::commit)
//! (save, rebuild and save the timeline) and publish events. Transitions
//! that end the on-air Part stop the rundown's auto-next timer before
//! queueing on the lock.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use futures::future::BoxFuture;
use rundown_core::blueprint::{Blueprint, DefaultBlueprint};
use rundown_core::error::CoreError;
use rundown_core::infinites::resolve_live_infinites;
use rundown_core::model::{
    ActivationState, ActivePlayout, CursorOwner, Part, Piece, PlayedPart, Rundown, RundownSummary,
    Segment,
};
use rundown_core::timeline::{DefaultTimelineBuilder, Timeline, TimelineBuilder};
use rundown_core::timing::calculate_part_timings;
use rundown_core::types::{millis_between, LayerId, PartId, PieceId, RundownId, Timestamp};
use rundown_db::repositories::{
    AggregateRepository, PartRepository, PieceRepository, RundownRepository, SegmentRepository,
    TimelineRepository,
};
use rundown_events::{EventBus, RundownEvent, RundownEventKind};
use tokio::sync::Mutex;

use crate::locks::RundownLocks;
use crate::scheduler::SchedulerRegistry;

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

/// Everything the state machine delegates to.
pub struct Collaborators {
    pub rundowns: Arc<dyn RundownRepository>,
    pub segments: Arc<dyn SegmentRepository>,
    pub parts: Arc<dyn PartRepository>,
    pub pieces: Arc<dyn PieceRepository>,
    pub timelines: Arc<dyn TimelineRepository>,
    pub timeline_builder: Arc<dyn TimelineBuilder>,
    pub blueprint: Arc<dyn Blueprint>,
    pub events: Arc<EventBus>,
    pub schedulers: SchedulerRegistry,
}

impl Collaborators {
    /// Default wiring over one store: aggregate child repositories, the
    /// default timeline builder and blueprint, tokio timers.
    pub fn with_store<S>(store: Arc<S>, events: Arc<EventBus>) -> Self
    where
        S: RundownRepository + TimelineRepository + 'static,
    {
        let rundowns: Arc<dyn RundownRepository> = store.clone();
        let children = Arc::new(AggregateRepository::new(rundowns.clone()));
        Self {
            rundowns,
            segments: children.clone(),
            parts: children.clone(),
            pieces: children,
            timelines: store,
            timeline_builder: Arc::new(DefaultTimelineBuilder),
            blueprint: Arc::new(DefaultBlueprint),
            events,
            schedulers: SchedulerRegistry::tokio(),
        }
    }
}

/// Where an ad-libbed Part or Piece goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertMode {
    OnAir,
    Next,
}

impl InsertMode {
    fn label(self) -> &'static str {
        match self {
            Self::OnAir => "on-air",
            Self::Next => "next",
        }
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

pub struct RundownStateMachine {
    rundowns: Arc<dyn RundownRepository>,
    segments: Arc<dyn SegmentRepository>,
    parts: Arc<dyn PartRepository>,
    pieces: Arc<dyn PieceRepository>,
    timelines: Arc<dyn TimelineRepository>,
    timeline_builder: Arc<dyn TimelineBuilder>,
    blueprint: Arc<dyn Blueprint>,
    events: Arc<EventBus>,
    schedulers: SchedulerRegistry,
    locks: Arc<RundownLocks>,
    /// Serialises activations so the "only one active" check cannot race.
    activation: Mutex<()>,
    this: Weak<Self>,
}

impl RundownStateMachine {
    pub fn new(collaborators: Collaborators, locks: Arc<RundownLocks>) -> Arc<Self> {
        let Collaborators {
            rundowns,
            segments,
            parts,
            pieces,
            timelines,
            timeline_builder,
            blueprint,
            events,
            schedulers,
        } = collaborators;
        Arc::new_cyclic(|this| Self {
            rundowns,
            segments,
            parts,
            pieces,
            timelines,
            timeline_builder,
            blueprint,
            events,
            schedulers,
            locks,
            activation: Mutex::new(()),
            this: this.clone(),
        })
    }

    pub fn locks(&self) -> &Arc<RundownLocks> {
        &self.locks
    }

    pub fn rundowns(&self) -> &Arc<dyn RundownRepository> {
        &self.rundowns
    }

    pub async fn list(&self) -> Result<Vec<RundownSummary>, CoreError> {
        self.rundowns.list_basic().await
    }

    pub async fn get(&self, rundown_id: &str) -> Result<Rundown, CoreError> {
        self.rundowns.get(rundown_id).await
    }

    pub async fn timeline(&self, rundown_id: &str) -> Result<Timeline, CoreError> {
        self.timelines.get_timeline(rundown_id).await
    }

    /// Whether an auto-next callback is waiting for this rundown.
    pub fn auto_next_pending(&self, rundown_id: &str) -> bool {
        self.schedulers.for_rundown(rundown_id).is_pending()
    }

    // -----------------------------------------------------------------------
    // Activation
    // -----------------------------------------------------------------------

    /// Put a Rundown on air. Fails with `AlreadyActive` if it, or any other
    /// Rundown, is already active.
    pub async fn activate(&self, rundown_id: &str) -> Result<Rundown, CoreError> {
        let _activation = self.activation.lock().await;
        let _guard = self.locks.lock(rundown_id).await;

        if let Some(active) = self
            .rundowns
            .list_basic()
            .await?
            .into_iter()
            .find(|s| s.active)
        {
            return Err(CoreError::AlreadyActive {
                rundown_id: active.id,
            });
        }

        let mut rundown = self.rundowns.get(rundown_id).await?;
        let resume = match &rundown.state {
            ActivationState::Active(_) => {
                return Err(CoreError::AlreadyActive {
                    rundown_id: rundown.id,
                })
            }
            ActivationState::Inactive { resume } => resume.clone(),
        };

        let now = chrono::Utc::now();
        rundown.state = ActivationState::Active(ActivePlayout {
            next: resume,
            ..Default::default()
        });
        rundown.refresh_flags();
        rundown.repair_next_cursor();

        let added = match rundown.next_part().map(|p| p.id.clone()) {
            Some(next) => {
                let resolved = resolve_live_infinites(&rundown, &next);
                replace_infinites(rundown.require_active()?, resolved)
            }
            None => Vec::new(),
        };

        self.commit(&mut rundown, now).await?;

        tracing::info!(rundown_id, next = ?next_part_id(&rundown), "Rundown activated");
        self.publish(&rundown.id, RundownEventKind::Activated, now);
        self.publish_infinites(&rundown.id, added, now);
        self.publish_next(&rundown, CursorOwner::System, now);
        Ok(rundown)
    }

    /// Take a Rundown off air. The next cursor is remembered for a later
    /// activation, and unsynced content is cleaned up.
    pub async fn deactivate(&self, rundown_id: &str) -> Result<Rundown, CoreError> {
        self.schedulers.for_rundown(rundown_id).stop();
        let _guard = self.locks.lock(rundown_id).await;

        let mut rundown = self.rundowns.get(rundown_id).await?;
        let playout = rundown.require_active()?;
        let resume = playout.next.clone().or_else(|| playout.current.clone());

        let now = chrono::Utc::now();
        if let Some(current) = rundown.current_part().map(|p| p.id.clone()) {
            self.close_part(&mut rundown, &current, now)?;
        }
        rundown.state = ActivationState::Inactive { resume };
        rundown.refresh_flags();
        rundown.touch(now);
        self.rundowns.save(&rundown).await?;
        self.timelines
            .save_timeline(&Timeline::empty(rundown.id.clone(), now))
            .await?;

        let segments = self.segments.delete_unsynced_segments(rundown_id).await?;
        let parts = self.parts.delete_unsynced_parts(rundown_id).await?;
        let pieces = self.pieces.delete_unsynced_pieces(rundown_id).await?;
        if segments + parts + pieces > 0 {
            tracing::debug!(
                rundown_id,
                segments,
                parts,
                pieces,
                "Removed unsynced content"
            );
            rundown = self.rundowns.get(rundown_id).await?;
        }

        tracing::info!(rundown_id, "Rundown deactivated");
        self.publish(&rundown.id, RundownEventKind::Deactivated, now);
        Ok(rundown)
    }

    // -----------------------------------------------------------------------
    // Cursors
    // -----------------------------------------------------------------------

    /// Put the next Part on air.
    pub async fn take_next(&self, rundown_id: &str) -> Result<Rundown, CoreError> {
        // Stopped before queueing on the lock so a deadline passing while we
        // wait cannot produce a second take.
        self.schedulers.for_rundown(rundown_id).stop();
        let _guard = self.locks.lock(rundown_id).await;

        let rundown = self.rundowns.get(rundown_id).await?;
        self.take(rundown).await
    }

    /// Auto-next for the Part that was on air when the timer was armed.
    /// Does nothing if that Part has since left the air.
    async fn auto_take_next(&self, rundown_id: &str, armed_for: &str) -> Result<(), CoreError> {
        let _guard = self.locks.lock(rundown_id).await;

        let rundown = self.rundowns.get(rundown_id).await?;
        let current = rundown.current_part().map(|p| p.id.as_str());
        if current != Some(armed_for) {
            tracing::debug!(rundown_id, armed_for, ?current, "Stale auto-next skipped");
            return Ok(());
        }
        self.schedulers.for_rundown(rundown_id).stop();
        self.take(rundown).await.map(|_| ())
    }

    async fn take(&self, mut rundown: Rundown) -> Result<Rundown, CoreError> {
        let now = chrono::Utc::now();
        let taken = self.advance(&mut rundown, now)?;
        let timeline = self.commit(&mut rundown, now).await?;
        self.schedule_auto_next(&rundown, &timeline);

        tracing::info!(
            rundown_id = %rundown.id,
            part_id = %taken.part_id,
            previous_part_id = ?taken.previous_part_id,
            "Part taken"
        );
        self.publish_take(&rundown, taken, now);
        Ok(rundown)
    }

    /// Point the next cursor at `part_id`, which must live in `segment_id`.
    pub async fn set_next(
        &self,
        rundown_id: &str,
        segment_id: &str,
        part_id: &str,
        owner: CursorOwner,
    ) -> Result<Rundown, CoreError> {
        let _guard = self.locks.lock(rundown_id).await;

        let mut rundown = self.rundowns.get(rundown_id).await?;
        rundown.require_active()?;
        let segment = rundown
            .segment(segment_id)
            .ok_or_else(|| CoreError::not_found("Segment", segment_id))?;
        let part = segment
            .part(part_id)
            .ok_or_else(|| CoreError::not_found("Part", part_id))?;
        if part.unsynced {
            return Err(CoreError::InvalidState(format!(
                "part {part_id} is unsynced and cannot be set as next"
            )));
        }
        if part.on_air {
            return Err(CoreError::InvalidState(format!(
                "part {part_id} is on air and cannot be set as next"
            )));
        }

        let cursor = rundown.cursor_to(part_id, owner);
        rundown.require_active()?.next = cursor;
        rundown.refresh_flags();

        let now = chrono::Utc::now();
        self.commit(&mut rundown, now).await?;

        tracing::info!(rundown_id, part_id, ?owner, "Next part set");
        self.publish_next(&rundown, owner, now);
        Ok(rundown)
    }

    /// Revert every Part and Piece to what ingest supplied. An active
    /// Rundown starts over from its first playable Part.
    pub async fn reset(&self, rundown_id: &str) -> Result<Rundown, CoreError> {
        self.schedulers.for_rundown(rundown_id).stop();
        let _guard = self.locks.lock(rundown_id).await;

        let mut rundown = self.rundowns.get(rundown_id).await?;
        rundown.reset_playout();
        match &mut rundown.state {
            ActivationState::Active(playout) => *playout = ActivePlayout::default(),
            ActivationState::Inactive { resume } => *resume = None,
        }
        rundown.refresh_flags();
        rundown.repair_next_cursor();
        rundown.prune_unsynced();

        let now = chrono::Utc::now();
        self.commit(&mut rundown, now).await?;

        tracing::info!(rundown_id, "Rundown reset");
        self.publish(&rundown.id, RundownEventKind::Reset, now);
        Ok(rundown)
    }

    // -----------------------------------------------------------------------
    // Ad-libs
    // -----------------------------------------------------------------------

    pub async fn insert_part_as_on_air(
        &self,
        rundown_id: &str,
        part: Part,
    ) -> Result<Rundown, CoreError> {
        self.insert_part(rundown_id, part, InsertMode::OnAir).await
    }

    pub async fn insert_part_as_next(
        &self,
        rundown_id: &str,
        part: Part,
    ) -> Result<Rundown, CoreError> {
        self.insert_part(rundown_id, part, InsertMode::Next).await
    }

    /// Insert an unplanned Part right after the on-air Part (or before the
    /// next Part when nothing is on air) and make it next. With
    /// [`InsertMode::OnAir`] it is taken immediately.
    pub async fn insert_part(
        &self,
        rundown_id: &str,
        mut part: Part,
        mode: InsertMode,
    ) -> Result<Rundown, CoreError> {
        if mode == InsertMode::OnAir {
            self.schedulers.for_rundown(rundown_id).stop();
        }
        let _guard = self.locks.lock(rundown_id).await;

        let mut rundown = self.rundowns.get(rundown_id).await?;
        let playout = rundown.require_active()?;
        let (current, next) = (playout.current.clone(), playout.next.clone());
        if rundown.part(&part.id).is_some() {
            return Err(CoreError::already_exists("Part", part.id));
        }

        let (segment_id, rank) = match (current, next) {
            (Some(current), _) => {
                let rank = rundown
                    .segment(&current.segment_id)
                    .and_then(|s| s.rank_after(&current.part_id))
                    .ok_or_else(|| CoreError::not_found("Part", current.part_id.clone()))?;
                (current.segment_id, rank)
            }
            (None, Some(next)) => {
                let rank = rundown
                    .segment(&next.segment_id)
                    .map(|s| rank_before(s, &next.part_id))
                    .ok_or_else(|| CoreError::not_found("Segment", next.segment_id.clone()))?;
                (next.segment_id, rank)
            }
            (None, None) => {
                return Err(CoreError::InvalidState(format!(
                    "rundown {rundown_id} has nothing on air or next to insert beside"
                )))
            }
        };

        part.planned = false;
        part.rank = rank;
        let part_id = part.id.clone();
        rundown
            .segment_mut(&segment_id)
            .ok_or_else(|| CoreError::not_found("Segment", segment_id.clone()))?
            .insert_part(part)?;

        let cursor = rundown.cursor_to(&part_id, CursorOwner::External);
        rundown.require_active()?.next = cursor;
        rundown.refresh_flags();

        let now = chrono::Utc::now();
        let taken = match mode {
            InsertMode::OnAir => Some(self.advance(&mut rundown, now)?),
            InsertMode::Next => None,
        };
        let timeline = self.commit(&mut rundown, now).await?;

        tracing::info!(rundown_id, part_id = %part_id, ?mode, "Ad-lib part inserted");
        self.publish(
            &rundown.id,
            RundownEventKind::PartInserted {
                part_id,
                on_air: taken.is_some(),
            },
            now,
        );
        match taken {
            Some(taken) => {
                self.schedule_auto_next(&rundown, &timeline);
                self.publish_take(&rundown, taken, now);
            }
            None => self.publish_next(&rundown, CursorOwner::External, now),
        }
        Ok(rundown)
    }

    pub async fn insert_piece_as_on_air(
        &self,
        rundown_id: &str,
        piece: Piece,
    ) -> Result<Rundown, CoreError> {
        self.insert_piece(rundown_id, piece, InsertMode::OnAir).await
    }

    pub async fn insert_piece_as_next(
        &self,
        rundown_id: &str,
        piece: Piece,
    ) -> Result<Rundown, CoreError> {
        self.insert_piece(rundown_id, piece, InsertMode::Next).await
    }

    /// Insert an unplanned Piece into the on-air or the next Part.
    pub async fn insert_piece(
        &self,
        rundown_id: &str,
        mut piece: Piece,
        mode: InsertMode,
    ) -> Result<Rundown, CoreError> {
        let _guard = self.locks.lock(rundown_id).await;

        let mut rundown = self.rundowns.get(rundown_id).await?;
        let playout = rundown.require_active()?;
        let cursor = match mode {
            InsertMode::OnAir => playout.current.clone(),
            InsertMode::Next => playout.next.clone(),
        }
        .ok_or_else(|| {
            CoreError::InvalidState(format!(
                "rundown {rundown_id} has no {} part",
                mode.label()
            ))
        })?;

        let now = chrono::Utc::now();
        let part = rundown
            .part_mut(&cursor.part_id)
            .ok_or_else(|| CoreError::not_found("Part", cursor.part_id.clone()))?;
        piece.planned = false;
        piece.part_id = part.id.clone();
        if mode == InsertMode::OnAir {
            // Starts now, not at the top of the part.
            if let Some(started) = part.executed_at {
                let delay = part.timings.map_or(0, |t| t.delay_start_of_pieces_duration);
                piece.start_offset = (millis_between(started, now) - delay).max(0);
            }
            piece.mark_executed(now);
        }
        let piece_id = piece.id.clone();
        part.insert_piece(piece)?;

        let added = if mode == InsertMode::OnAir {
            let resolved = resolve_live_infinites(&rundown, &cursor.part_id);
            replace_infinites(rundown.require_active()?, resolved)
        } else {
            Vec::new()
        };
        self.commit(&mut rundown, now).await?;

        tracing::info!(rundown_id, piece_id = %piece_id, part_id = %cursor.part_id, ?mode, "Ad-lib piece inserted");
        self.publish(
            &rundown.id,
            RundownEventKind::PieceInserted {
                piece_id,
                part_id: cursor.part_id,
            },
            now,
        );
        self.publish_infinites(&rundown.id, added, now);
        Ok(rundown)
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Remove a Rundown. Active Rundowns must be deactivated first.
    pub async fn delete_rundown(&self, rundown_id: &str) -> Result<(), CoreError> {
        let guard = self.locks.lock(rundown_id).await;

        let rundown = self.rundowns.get(rundown_id).await?;
        if rundown.is_active() {
            return Err(CoreError::ActiveRundown {
                rundown_id: rundown.id,
            });
        }
        self.rundowns.delete(rundown_id).await?;
        self.schedulers.remove(rundown_id);
        drop(guard);
        self.locks.forget(rundown_id);

        tracing::info!(rundown_id, "Rundown deleted");
        self.publish(rundown_id, RundownEventKind::Deleted, chrono::Utc::now());
        Ok(())
    }

    /// Re-derive cursors, infinites and the timeline after the content of
    /// an active Rundown changed underneath it. Inactive Rundowns are left
    /// alone.
    pub async fn refresh(&self, rundown_id: &str) -> Result<(), CoreError> {
        let _guard = self.locks.lock(rundown_id).await;

        let mut rundown = self.rundowns.get(rundown_id).await?;
        if !rundown.is_active() {
            return Ok(());
        }
        rundown.refresh_flags();
        let repaired = rundown.repair_next_cursor();

        let added = match rundown.current_part().map(|p| p.id.clone()) {
            Some(current) => {
                let resolved = resolve_live_infinites(&rundown, &current);
                replace_infinites(rundown.require_active()?, resolved)
            }
            None => Vec::new(),
        };

        let now = chrono::Utc::now();
        let timeline = self.commit(&mut rundown, now).await?;
        if rundown.current_part().is_some() {
            self.schedule_auto_next(&rundown, &timeline);
        }

        tracing::debug!(rundown_id, repaired, "Rundown refreshed");
        self.publish_infinites(&rundown.id, added, now);
        let owner = rundown
            .playout()
            .and_then(|p| p.next.as_ref())
            .map_or(CursorOwner::System, |c| c.owner);
        self.publish_next(&rundown, owner, now);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    /// Move the next Part on air, in memory only.
    fn advance(&self, rundown: &mut Rundown, now: Timestamp) -> Result<Taken, CoreError> {
        let rundown_id = rundown.id.clone();
        let playout = rundown.require_active()?;
        let next = playout.next.clone().ok_or_else(|| {
            CoreError::InvalidState(format!("rundown {rundown_id} has no next part"))
        })?;
        let previous = playout.current.clone();

        let incoming = rundown
            .part(&next.part_id)
            .ok_or_else(|| CoreError::not_found("Part", next.part_id.clone()))?;
        if !incoming.is_playable() {
            return Err(CoreError::InvalidState(format!(
                "part {} is unsynced and cannot be taken",
                next.part_id
            )));
        }
        let outgoing = previous.as_ref().and_then(|c| rundown.part(&c.part_id));
        let timings = calculate_part_timings(incoming, outgoing);

        if let Some(previous) = &previous {
            self.close_part(rundown, &previous.part_id, now)?;
        }

        let part = rundown
            .part_mut(&next.part_id)
            .ok_or_else(|| CoreError::not_found("Part", next.part_id.clone()))?;
        part.timings = Some(timings);
        part.executed_at = Some(now);
        part.played_duration = None;
        for piece in &mut part.pieces {
            piece.mark_executed(now);
        }

        let following = rundown
            .playable_part_after(&next.part_id)
            .and_then(|p| rundown.cursor_to(&p.id, CursorOwner::System));
        let playout = rundown.require_active()?;
        playout.current = Some(next.clone());
        playout.next = following;
        rundown.refresh_flags();

        let resolved = resolve_live_infinites(rundown, &next.part_id);
        let infinites = replace_infinites(rundown.require_active()?, resolved);
        let pruned = rundown.prune_unsynced();
        if pruned > 0 {
            tracing::debug!(rundown_id = %rundown_id, pruned, "Pruned unsynced content");
        }

        Ok(Taken {
            part_id: next.part_id,
            previous_part_id: previous.map(|c| c.part_id),
            infinites,
        })
    }

    /// Record how long `part_id` was on air, its end-state and a history
    /// entry.
    fn close_part(
        &self,
        rundown: &mut Rundown,
        part_id: &str,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        let part = rundown
            .part(part_id)
            .ok_or_else(|| CoreError::not_found("Part", part_id))?;
        // What actually aired before it, which after a set-next jump is not
        // the Part before it in running order.
        let previous = rundown
            .playout()
            .and_then(|p| p.history.last())
            .and_then(|played| rundown.part(&played.part_id));
        let end_state = self.blueprint.end_state_for_part(part, previous, now,
            &serde_json::Value::Null,
        );
        let started_at = part.executed_at.unwrap_or(now);
        let duration = millis_between(started_at, now);
        let segment_id = part.segment_id.clone();

        if let Some(part) = rundown.part_mut(part_id) {
            part.played_duration = Some(duration);
            part.end_state = Some(end_state);
        }
        rundown.require_active()?.history.push(PlayedPart {
            part_id: part_id.to_string(),
            segment_id,
            started_at,
            duration,
        });
        Ok(())
    }

    /// Persist the aggregate and its freshly built timeline.
    async fn commit(&self, rundown: &mut Rundown, now: Timestamp) -> Result<Timeline, CoreError> {
        rundown.touch(now);
        self.rundowns.save(rundown).await?;
        let timeline = self.timeline_builder.build(rundown, now);
        self.timelines.save_timeline(&timeline).await?;
        Ok(timeline)
    }

    fn schedule_auto_next(&self, rundown: &Rundown, timeline: &Timeline) {
        let scheduler = self.schedulers.for_rundown(&rundown.id);
        match (timeline.auto_next_at, rundown.current_part()) {
            (Some(at), Some(current)) => {
                tracing::debug!(rundown_id = %rundown.id, part_id = %current.id, %at, "Auto-next scheduled");
                scheduler.start(
                    at,
                    Box::new({
                        let machine = self.this.clone();
                        let rundown_id = rundown.id.clone();
                        let armed_for = current.id.clone();
                        move || auto_take(machine, rundown_id, armed_for)
                    }),
                );
            }
            _ => scheduler.stop(),
        }
    }

    fn publish(&self, rundown_id: &str, kind: RundownEventKind, now: Timestamp) {
        self.events.publish(RundownEvent::new(rundown_id, kind, now));
    }

    fn publish_next(&self, rundown: &Rundown, owner: CursorOwner, now: Timestamp) {
        self.publish(
            &rundown.id,
            RundownEventKind::SetNext {
                part_id: next_part_id(rundown),
                owner,
            },
            now,
        );
    }

    fn publish_infinites(&self, rundown_id: &str, added: Vec<(PieceId, LayerId)>, now: Timestamp) {
        for (piece_id, layer) in added {
            self.publish(
                rundown_id,
                RundownEventKind::InfinitePieceAdded { piece_id, layer },
                now,
            );
        }
    }

    fn publish_take(&self, rundown: &Rundown, taken: Taken, now: Timestamp) {
        self.publish(
            &rundown.id,
            RundownEventKind::Taken {
                part_id: taken.part_id,
                previous_part_id: taken.previous_part_id,
            },
            now,
        );
        self.publish_infinites(&rundown.id, taken.infinites, now);
        self.publish_next(rundown, CursorOwner::System, now);
    }
}

struct Taken {
    part_id: String,
    previous_part_id: Option<String>,
    infinites: Vec<(PieceId, LayerId)>,
}

/// A rank between `part_id` and whatever precedes it in `segment`.
fn rank_before(segment: &Segment, part_id: &str) -> f64 {
    let Some(target) = segment.part(part_id) else {
        return segment.rank_before_first();
    };
    match segment.parts.iter().rev().find(|p| p.rank < target.rank) {
        Some(before) => (before.rank + target.rank) / 2.0,
        None => target.rank - 1.0,
    }
}

fn next_part_id(rundown: &Rundown) -> Option<String> {
    rundown
        .playout()
        .and_then(|p| p.next.as_ref())
        .map(|c| c.part_id.clone())
}

/// Swap in a freshly resolved infinites map, returning the pieces that
/// were not live on their layer before.
fn replace_infinites(
    playout: &mut ActivePlayout,
    resolved: BTreeMap<LayerId, Piece>,
) -> Vec<(PieceId, LayerId)> {
    let added = resolved
        .iter()
        .filter(|(layer, piece)| {
            playout
                .infinites
                .get(*layer)
                .map_or(true, |old| old.id != piece.id)
        })
        .map(|(layer, piece)| (piece.id.clone(), layer.clone()))
        .collect();
    playout.infinites = resolved;
    added
}

fn auto_take(
    machine: Weak<RundownStateMachine>,
    rundown_id: RundownId,
    armed_for: PartId,
) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        let Some(machine) = machine.upgrade() else {
            return;
        };
        if let Err(e) = machine.auto_take_next(&rundown_id, &armed_for).await {
            tracing::error!(rundown_id = %rundown_id, error = %e, "Auto-next take failed");
        }
    })
}
