use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use rundown_core::error::CoreError;
use rundown_core::model::{Part, Rundown, RundownSummary, Segment};
use rundown_core::timeline::Timeline;
use rundown_db::memory::InMemoryStore;
use rundown_db::repositories::{RundownRepository, TimelineRepository};
use rundown_events::{EventBus, RundownEvent, RundownEventKind};
use rundown_ingest::{IngestChange, IngestConfig, IngestQueue, IngestRundown};
use rundown_playout::{Collaborators, RundownLocks, RundownStateMachine};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

struct Fixture {
    store: Arc<InMemoryStore>,
    machine: Arc<RundownStateMachine>,
    queue: IngestQueue,
    events: broadcast::Receiver<RundownEvent>,
    cancel: CancellationToken,
}

impl Fixture {
    fn new() -> Self {
        Self::with_config(IngestConfig::default())
    }

    fn with_config(config: IngestConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        Self::build(config, store.clone(), store)
    }

    /// The machine runs over `backend`; `store` is what the test inspects.
    fn build<S>(config: IngestConfig, backend: Arc<S>, store: Arc<InMemoryStore>) -> Self
    where
        S: RundownRepository + TimelineRepository + 'static,
    {
        let bus = Arc::new(EventBus::default());
        let events = bus.subscribe();
        let machine = RundownStateMachine::new(
            Collaborators::with_store(backend, bus),
            Arc::new(RundownLocks::new()),
        );
        let cancel = CancellationToken::new();
        let (queue, _handle) = IngestQueue::spawn(machine.clone(), config, cancel.clone());
        Self {
            store,
            machine,
            queue,
            events,
            cancel,
        }
    }

    fn drain(&mut self) -> Vec<RundownEventKind> {
        let mut kinds = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            kinds.push(event.kind);
        }
        kinds
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Delegates to the in-memory store, but reads of one Rundown can be made
/// to fail.
struct FlakyStore {
    inner: Arc<InMemoryStore>,
    broken: Mutex<Option<String>>,
}

impl FlakyStore {
    fn new(inner: Arc<InMemoryStore>) -> Self {
        Self {
            inner,
            broken: Mutex::new(None),
        }
    }

    fn break_reads_of(&self, rundown_id: &str) {
        *self.broken.lock().unwrap() = Some(rundown_id.to_string());
    }
}

#[async_trait]
impl RundownRepository for FlakyStore {
    async fn get(&self, id: &str) -> Result<Rundown, CoreError> {
        let broken = self.broken.lock().unwrap().as_deref() == Some(id);
        if broken {
            return Err(CoreError::Internal("storage unavailable".into()));
        }
        self.inner.get(id).await
    }

    async fn get_by_segment_id(&self, segment_id: &str) -> Result<Rundown, CoreError> {
        self.inner.get_by_segment_id(segment_id).await
    }

    async fn get_by_part_id(&self, part_id: &str) -> Result<Rundown, CoreError> {
        self.inner.get_by_part_id(part_id).await
    }

    async fn list_basic(&self) -> Result<Vec<RundownSummary>, CoreError> {
        self.inner.list_basic().await
    }

    async fn create(&self, rundown: &Rundown) -> Result<(), CoreError> {
        self.inner.create(rundown).await
    }

    async fn save(&self, rundown: &Rundown) -> Result<(), CoreError> {
        self.inner.save(rundown).await
    }

    async fn delete(&self, id: &str) -> Result<(), CoreError> {
        self.inner.delete(id).await
    }
}

#[async_trait]
impl TimelineRepository for FlakyStore {
    async fn save_timeline(&self, timeline: &Timeline) -> Result<(), CoreError> {
        self.inner.save_timeline(timeline).await
    }

    async fn get_timeline(&self, rundown_id: &str) -> Result<Timeline, CoreError> {
        self.inner.get_timeline(rundown_id).await
    }
}

fn show() -> IngestRundown {
    IngestRundown {
        id: "show".into(),
        name: "Morning Show".into(),
        segments: vec![
            Segment::new("s1", "show", 1.0)
                .with_part(Part::new("p1", "", 1.0))
                .with_part(Part::new("p2", "", 2.0)),
            Segment::new("s2", "show", 2.0).with_part(Part::new("p3", "", 1.0)),
        ],
    }
}

async fn created(fixture: &Fixture) {
    fixture
        .queue
        .enqueue(IngestChange::RundownCreated { rundown: show() })
        .unwrap();
    fixture.queue.flush().await.unwrap();
}

#[tokio::test]
async fn rundown_created_is_stored() {
    let fixture = Fixture::new();
    created(&fixture).await;

    let rundown = fixture.store.get("show").await.unwrap();
    assert_eq!(rundown.name, "Morning Show");
    let ids: Vec<_> = rundown.parts_in_order().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, ["p1", "p2", "p3"]);
    assert_eq!(fixture.queue.stats().applied, 1);
}

#[tokio::test]
async fn concurrent_duplicate_segment_creates_store_one_segment() {
    let fixture = Fixture::new();
    created(&fixture).await;

    let segment = Segment::new("s3", "show", 3.0).with_part(Part::new("p4", "", 1.0));
    let mut tasks = Vec::new();
    for _ in 0..8 {
        let queue = fixture.queue.clone();
        let segment = segment.clone();
        tasks.push(tokio::spawn(async move {
            queue.enqueue(IngestChange::SegmentCreated { segment })
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    fixture.queue.flush().await.unwrap();

    let rundown = fixture.store.get("show").await.unwrap();
    assert_eq!(rundown.segments.iter().filter(|s| s.id == "s3").count(), 1);
    let stats = fixture.queue.stats();
    assert_eq!(stats.applied, 2);
    assert_eq!(stats.ignored, 7);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.queued, 0);
}

#[tokio::test]
async fn duplicate_rundown_create_is_ignored() {
    let fixture = Fixture::new();
    created(&fixture).await;
    created(&fixture).await;

    let stats = fixture.queue.stats();
    assert_eq!(stats.applied, 1);
    assert_eq!(stats.ignored, 1);
}

#[tokio::test]
async fn updates_and_deletes_of_missing_entities_are_ignored() {
    let fixture = Fixture::new();
    created(&fixture).await;

    for change in [
        IngestChange::PartUpdated {
            part: Part::new("ghost", "s1", 9.0),
        },
        IngestChange::PartDeleted {
            part_id: "ghost".into(),
        },
        IngestChange::SegmentDeleted {
            segment_id: "ghost".into(),
        },
        IngestChange::RundownDeleted {
            rundown_id: "ghost".into(),
        },
    ] {
        fixture.queue.enqueue(change).unwrap();
    }
    fixture.queue.flush().await.unwrap();

    let stats = fixture.queue.stats();
    assert_eq!(stats.ignored, 4);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn invalid_change_is_counted_as_failed_and_the_worker_continues() {
    let fixture = Fixture::new();
    created(&fixture).await;

    // Rank 1.0 is already taken by s1.
    fixture
        .queue
        .enqueue(IngestChange::SegmentCreated {
            segment: Segment::new("s9", "show", 1.0),
        })
        .unwrap();
    fixture
        .queue
        .enqueue(IngestChange::PartCreated {
            part: Part::new("p9", "s2", 5.0),
        })
        .unwrap();
    fixture.queue.flush().await.unwrap();

    let stats = fixture.queue.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.applied, 2);
    let rundown = fixture.store.get("show").await.unwrap();
    assert!(rundown.segment("s9").is_none());
    assert!(rundown.part("p9").is_some());
}

#[tokio::test]
async fn part_move_between_segments() {
    let fixture = Fixture::new();
    created(&fixture).await;

    fixture
        .queue
        .enqueue(IngestChange::PartUpdated {
            part: Part::new("p2", "s2", 2.0),
        })
        .unwrap();
    fixture.queue.flush().await.unwrap();

    let rundown = fixture.store.get("show").await.unwrap();
    assert_eq!(rundown.segment_of_part("p2").unwrap().id, "s2");
    assert!(rundown.segment("s1").unwrap().part("p2").is_none());
}

#[tokio::test]
async fn deleting_the_next_part_of_an_active_rundown_moves_next_on() {
    let mut fixture = Fixture::new();
    created(&fixture).await;
    fixture.machine.activate("show").await.unwrap();
    fixture.machine.take_next("show").await.unwrap();
    fixture.drain();

    fixture
        .queue
        .enqueue(IngestChange::PartDeleted {
            part_id: "p2".into(),
        })
        .unwrap();
    fixture.queue.flush().await.unwrap();

    let rundown = fixture.store.get("show").await.unwrap();
    assert_eq!(rundown.current_part().unwrap().id, "p1");
    assert_eq!(rundown.next_part().unwrap().id, "p3");
    assert_eq!(fixture.queue.stats().rebuild_passes, 2);

    let events = fixture.drain();
    assert_eq!(events.len(), 1);
    assert_matches!(
        &events[0],
        RundownEventKind::SetNext { part_id: Some(id), .. } if id == "p3"
    );
}

#[tokio::test]
async fn deleting_an_active_rundown_fails() {
    let fixture = Fixture::new();
    created(&fixture).await;
    fixture.machine.activate("show").await.unwrap();

    fixture
        .queue
        .enqueue(IngestChange::RundownDeleted {
            rundown_id: "show".into(),
        })
        .unwrap();
    fixture.queue.flush().await.unwrap();

    assert_eq!(fixture.queue.stats().failed, 1);
    assert!(fixture.store.get("show").await.unwrap().is_active());
}

#[tokio::test]
async fn inactive_rundown_content_changes_without_playout_events() {
    let mut fixture = Fixture::new();
    created(&fixture).await;
    fixture.drain();

    let mut updated = show();
    updated.name = "Late Show".into();
    updated.segments.pop();
    fixture
        .queue
        .enqueue(IngestChange::RundownUpdated { rundown: updated })
        .unwrap();
    fixture.queue.flush().await.unwrap();

    let rundown: Rundown = fixture.store.get("show").await.unwrap();
    assert_eq!(rundown.name, "Late Show");
    assert!(rundown.segment("s2").is_none());
    assert!(fixture.drain().is_empty());
}

#[tokio::test(start_paused = true)]
async fn rebuild_runs_on_a_tick_once_the_queue_is_idle() {
    let fixture = Fixture::with_config(IngestConfig {
        bulk_window: Duration::from_millis(500),
        check_interval: Duration::from_millis(100),
    });
    fixture
        .queue
        .enqueue(IngestChange::RundownCreated { rundown: show() })
        .unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(fixture.queue.stats().rebuild_passes, 1);

    // Nothing pending: later ticks do not count as passes.
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(fixture.queue.stats().rebuild_passes, 1);
}

#[tokio::test]
async fn a_failed_refresh_does_not_hold_up_other_rundowns() {
    let store = Arc::new(InMemoryStore::new());
    let flaky = Arc::new(FlakyStore::new(store.clone()));
    let mut fixture = Fixture::build(
        IngestConfig {
            bulk_window: Duration::ZERO,
            check_interval: Duration::from_secs(3600),
        },
        flaky.clone(),
        store,
    );
    fixture
        .queue
        .enqueue(IngestChange::RundownCreated {
            rundown: IngestRundown {
                id: "archive".into(),
                name: "Archive".into(),
                segments: vec![
                    Segment::new("a-s1", "archive", 1.0).with_part(Part::new("a-p1", "", 1.0))
                ],
            },
        })
        .unwrap();
    created(&fixture).await;
    fixture.machine.activate("show").await.unwrap();
    fixture.machine.take_next("show").await.unwrap();
    fixture.drain();

    fixture
        .queue
        .enqueue(IngestChange::PartUpdated {
            part: Part::new("a-p1", "a-s1", 2.0),
        })
        .unwrap();
    fixture
        .queue
        .enqueue(IngestChange::PartDeleted {
            part_id: "p2".into(),
        })
        .unwrap();
    while fixture.queue.stats().applied < 4 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // "archive" sorts first in the pass and can no longer be read.
    flaky.break_reads_of("archive");
    fixture.queue.flush().await.unwrap();

    let events = fixture.drain();
    assert!(events.iter().any(|e| matches!(
        e,
        RundownEventKind::SetNext { part_id: Some(id), .. } if id == "p3"
    )));
    let stats = fixture.queue.stats();
    assert_eq!(stats.rebuild_passes, 2);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn zero_check_interval_keeps_the_worker_alive() {
    let fixture = Fixture::with_config(IngestConfig {
        bulk_window: Duration::from_millis(500),
        check_interval: Duration::ZERO,
    });
    created(&fixture).await;
    created(&fixture).await;

    assert_eq!(fixture.store.get("show").await.unwrap().name, "Morning Show");
    let stats = fixture.queue.stats();
    assert_eq!(stats.applied, 1);
    assert_eq!(stats.ignored, 1);
}

#[tokio::test]
async fn enqueue_after_shutdown_fails() {
    let fixture = Fixture::new();
    fixture.cancel.cancel();
    tokio::time::sleep(Duration::from_millis(20)).await;

    let err = fixture
        .queue
        .enqueue(IngestChange::RundownDeleted {
            rundown_id: "show".into(),
        })
        .unwrap_err();
    assert_matches!(err, CoreError::Internal(_));
}
