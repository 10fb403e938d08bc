//! Single-worker ingest queue.
//!
//! Changes are applied strictly in arrival order by one long-lived Tokio
//! task, each under the lock of the Rundown it touches. Rundowns whose
//! content changed are collected in a pending set and refreshed by a
//! rebuild pass, at most once per bulk window while changes keep coming.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use rundown_core::error::CoreError;
use rundown_core::merge;
use rundown_core::model::{Part, Rundown, Segment};
use rundown_core::types::RundownId;
use rundown_playout::RundownStateMachine;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::change::{IngestChange, IngestRundown};
use crate::config::IngestConfig;

/// Counters kept by the worker, readable from any thread.
#[derive(Debug, Default)]
struct Counters {
    applied: AtomicU64,
    ignored: AtomicU64,
    failed: AtomicU64,
    rebuild_passes: AtomicU64,
}

/// Point-in-time copy of the queue counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub applied: u64,
    /// Changes dropped because an equivalent change already took effect.
    pub ignored: u64,
    pub failed: u64,
    pub rebuild_passes: u64,
    pub queued: usize,
}

enum WorkItem {
    Change(IngestChange),
    Flush(oneshot::Sender<()>),
}

/// Handle for submitting changes. Cheap to clone.
#[derive(Clone)]
pub struct IngestQueue {
    sender: mpsc::UnboundedSender<WorkItem>,
    queued: Arc<AtomicUsize>,
    counters: Arc<Counters>,
}

impl IngestQueue {
    /// Start the worker task. It runs until `cancel` fires or every handle
    /// is dropped.
    pub fn spawn(
        machine: Arc<RundownStateMachine>,
        config: IngestConfig,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let queued = Arc::new(AtomicUsize::new(0));
        let counters = Arc::new(Counters::default());

        let worker = IngestWorker {
            machine,
            config,
            queued: queued.clone(),
            counters: counters.clone(),
            pending: BTreeSet::new(),
            last_pass: Instant::now(),
        };
        let handle = tokio::spawn(worker.run(receiver, cancel));

        (
            Self {
                sender,
                queued,
                counters,
            },
            handle,
        )
    }

    /// Queue a change for the worker. Fails only once the worker has stopped.
    pub fn enqueue(&self, change: IngestChange) -> Result<(), CoreError> {
        self.queued.fetch_add(1, Ordering::SeqCst);
        self.sender.send(WorkItem::Change(change)).map_err(|_| {
            self.queued.fetch_sub(1, Ordering::SeqCst);
            CoreError::Internal("ingest worker has stopped".into())
        })
    }

    /// Wait until every change queued before this call has been applied and
    /// the resulting rebuild pass has run.
    pub async fn flush(&self) -> Result<(), CoreError> {
        let stopped = || CoreError::Internal("ingest worker has stopped".into());
        let (reply, done) = oneshot::channel();
        self.sender
            .send(WorkItem::Flush(reply))
            .map_err(|_| stopped())?;
        done.await.map_err(|_| stopped())
    }

    pub fn stats(&self) -> IngestStats {
        IngestStats {
            applied: self.counters.applied.load(Ordering::Relaxed),
            ignored: self.counters.ignored.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
            rebuild_passes: self.counters.rebuild_passes.load(Ordering::Relaxed),
            queued: self.queued.load(Ordering::SeqCst),
        }
    }
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

struct IngestWorker {
    machine: Arc<RundownStateMachine>,
    config: IngestConfig,
    queued: Arc<AtomicUsize>,
    counters: Arc<Counters>,
    pending: BTreeSet<RundownId>,
    last_pass: Instant,
}

impl IngestWorker {
    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<WorkItem>, cancel: CancellationToken) {
        let check_interval = self.config.tick_interval();
        if check_interval != self.config.check_interval {
            tracing::warn!(
                configured_ms = self.config.check_interval.as_millis() as u64,
                "Ingest check interval too small, raised to the minimum",
            );
        }
        let mut ticker = tokio::time::interval(check_interval);
        tracing::info!(
            bulk_window_ms = self.config.bulk_window.as_millis() as u64,
            check_interval_ms = check_interval.as_millis() as u64,
            "Ingest worker started",
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Ingest worker shutting down");
                    break;
                }
                item = receiver.recv() => match item {
                    Some(WorkItem::Change(change)) => {
                        self.process(change).await;
                        self.queued.fetch_sub(1, Ordering::SeqCst);
                    }
                    Some(WorkItem::Flush(reply)) => {
                        self.rebuild_pass().await;
                        let _ = reply.send(());
                    }
                    None => {
                        tracing::info!("Ingest queue closed");
                        break;
                    }
                },
                _ = ticker.tick() => self.maybe_rebuild().await,
            }
        }
    }

    /// Apply one change, counting it as applied, ignored or failed. Errors
    /// never stop the worker.
    async fn process(&mut self, change: IngestChange) {
        let label = change.label();
        let benign = change.benign_error();

        match self.apply(change).await {
            Ok(touched) => {
                self.counters.applied.fetch_add(1, Ordering::Relaxed);
                if let Some(rundown_id) = touched {
                    tracing::debug!(change = label, %rundown_id, "Ingest change applied");
                    self.pending.insert(rundown_id);
                }
            }
            Err(e) if e.kind() == benign => {
                self.counters.ignored.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(change = label, error = %e, "Ingest change already in effect");
            }
            Err(e) => {
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!(change = label, error = %e, "Ingest change failed");
            }
        }
    }

    /// Returns the id of the Rundown whose content changed, if it still exists.
    async fn apply(&self, change: IngestChange) -> Result<Option<RundownId>, CoreError> {
        match change {
            IngestChange::RundownCreated { rundown } => self.create_rundown(rundown).await.map(Some),
            IngestChange::RundownUpdated { rundown } => {
                let IngestRundown { id, name, segments } = rundown;
                self.edit(&id, |r| merge::replace_rundown_content(r, name, segments))
                    .await
                    .map(Some)
            }
            IngestChange::RundownDeleted { rundown_id } => {
                self.machine.delete_rundown(&rundown_id).await?;
                Ok(None)
            }
            IngestChange::SegmentCreated { segment } => {
                let rundown_id = segment.rundown_id.clone();
                self.edit(&rundown_id, |r| r.insert_segment(segment))
                    .await
                    .map(Some)
            }
            IngestChange::SegmentUpdated { segment } => {
                let rundown_id = segment.rundown_id.clone();
                self.edit(&rundown_id, |r| merge::replace_segment(r, segment))
                    .await
                    .map(Some)
            }
            IngestChange::SegmentDeleted { segment_id } => {
                let rundown_id = self.machine.rundowns().get_by_segment_id(&segment_id).await?.id;
                self.edit(&rundown_id, |r| merge::remove_segment(r, &segment_id))
                    .await
                    .map(Some)
            }
            IngestChange::PartCreated { part } => {
                let rundown_id = self.machine.rundowns().get_by_segment_id(&part.segment_id).await?.id;
                self.edit(&rundown_id, |r| insert_part(r, part)).await.map(Some)
            }
            IngestChange::PartUpdated { part } => {
                let rundown_id = self.machine.rundowns().get_by_part_id(&part.id).await?.id;
                self.edit(&rundown_id, |r| merge::replace_part(r, part))
                    .await
                    .map(Some)
            }
            IngestChange::PartDeleted { part_id } => {
                let rundown_id = self.machine.rundowns().get_by_part_id(&part_id).await?.id;
                self.edit(&rundown_id, |r| merge::remove_part(r, &part_id))
                    .await
                    .map(Some)
            }
        }
    }

    async fn create_rundown(&self, ingested: IngestRundown) -> Result<RundownId, CoreError> {
        let _guard = self.machine.locks().lock(&ingested.id).await;

        let mut rundown = Rundown::new(ingested.id, ingested.name);
        for segment in ingested.segments {
            rundown.insert_segment(segment)?;
        }
        self.machine.rundowns().create(&rundown).await?;
        Ok(rundown.id)
    }

    /// Load, mutate and save a Rundown under its lock.
    async fn edit<F>(&self, rundown_id: &str, mutate: F) -> Result<RundownId, CoreError>
    where
        F: FnOnce(&mut Rundown) -> Result<(), CoreError>,
    {
        let _guard = self.machine.locks().lock(rundown_id).await;

        let mut rundown = self.machine.rundowns().get(rundown_id).await?;
        mutate(&mut rundown)?;
        rundown.touch(chrono::Utc::now());
        self.machine.rundowns().save(&rundown).await?;
        Ok(rundown.id)
    }

    /// Run a rebuild pass unless changes are still streaming in and the
    /// last pass started less than a bulk window ago.
    async fn maybe_rebuild(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let streaming = self.queued.load(Ordering::SeqCst) > 0;
        if streaming && self.last_pass.elapsed() < self.config.bulk_window {
            tracing::debug!(pending = self.pending.len(), "Rebuild deferred");
            return;
        }
        self.rebuild_pass().await;
    }

    /// Refresh every pending Rundown once. Failures are logged per Rundown.
    async fn rebuild_pass(&mut self) {
        self.last_pass = Instant::now();
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return;
        }
        self.counters.rebuild_passes.fetch_add(1, Ordering::Relaxed);

        for rundown_id in &pending {
            match self.machine.refresh(rundown_id).await {
                Ok(()) => {}
                Err(CoreError::NotFound { .. }) => {
                    tracing::debug!(%rundown_id, "Rundown gone before rebuild");
                }
                Err(e) => {
                    tracing::error!(%rundown_id, error = %e, "Rundown rebuild failed");
                }
            }
        }
        tracing::debug!(rundowns = pending.len(), "Rebuild pass finished");
    }
}

/// A new Part must be unique across the whole Rundown, not just its Segment.
fn insert_part(rundown: &mut Rundown, part: Part) -> Result<(), CoreError> {
    if rundown.part(&part.id).is_some() {
        return Err(CoreError::already_exists("Part", part.id));
    }
    let segment_id = part.segment_id.clone();
    let segment: &mut Segment = rundown
        .segment_mut(&segment_id)
        .ok_or_else(|| CoreError::not_found("Segment", segment_id.clone()))?;
    segment.insert_part(part)
}
