#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use rundown_core::model::{Part, Piece, PieceLifespan, Rundown, Segment};
use rundown_core::types::Timestamp;
use rundown_db::memory::InMemoryStore;
use rundown_db::repositories::RundownRepository;
use rundown_events::{EventBus, RundownEvent, RundownEventKind};
use rundown_playout::scheduler::{Callback, CallbackScheduler, SchedulerRegistry};
use rundown_playout::{Collaborators, RundownLocks, RundownStateMachine};
use tokio::sync::broadcast;

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub machine: Arc<RundownStateMachine>,
    pub events: broadcast::Receiver<RundownEvent>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_schedulers(SchedulerRegistry::tokio())
    }

    pub fn with_schedulers(schedulers: SchedulerRegistry) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let bus = Arc::new(EventBus::default());
        let events = bus.subscribe();
        let collaborators = Collaborators {
            schedulers,
            ..Collaborators::with_store(store.clone(), bus)
        };
        let machine = RundownStateMachine::new(collaborators, Arc::new(RundownLocks::new()));
        Self {
            store,
            machine,
            events,
        }
    }

    pub async fn seed(&self, rundown: Rundown) {
        self.store.create(&rundown).await.unwrap();
    }

    /// Every event published so far, oldest first.
    pub fn drain(&mut self) -> Vec<RundownEventKind> {
        let mut kinds = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            kinds.push(event.kind);
        }
        kinds
    }
}

/// Two segments of two parts each. `p1` carries a rundown-spanning logo.
pub fn news(id: &str) -> Rundown {
    Rundown::new(id, "Evening News")
        .with_segment(
            Segment::new(format!("{id}-s1"), id, 1.0)
                .with_part(
                    Part::new(format!("{id}-p1"), "", 1.0)
                        .with_piece(Piece::new("cam1", "", "camera", PieceLifespan::WithinPart))
                        .with_piece(Piece::new(
                            "logo",
                            "",
                            "bug",
                            PieceLifespan::SpanningUntilRundownEnd,
                        )),
                )
                .with_part(
                    Part::new(format!("{id}-p2"), "", 2.0)
                        .with_piece(Piece::new("vt", "", "video", PieceLifespan::WithinPart)),
                ),
        )
        .with_segment(
            Segment::new(format!("{id}-s2"), id, 2.0)
                .with_part(
                    Part::new(format!("{id}-p3"), "", 1.0)
                        .with_piece(Piece::new("cam2", "", "camera", PieceLifespan::WithinPart)),
                )
                .with_part(Part::new(format!("{id}-p4"), "", 2.0)),
        )
}

// ---------------------------------------------------------------------------
// Recording scheduler
// ---------------------------------------------------------------------------

/// Records start/stop calls instead of sleeping. The armed callback is
/// kept so a test can fire it whenever it likes.
#[derive(Default)]
pub struct RecordingScheduler {
    calls: Mutex<Vec<&'static str>>,
    pending: Mutex<Option<Timestamp>>,
    callback: Mutex<Option<Callback>>,
}

impl RecordingScheduler {
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn pending_at(&self) -> Option<Timestamp> {
        *self.pending.lock().unwrap()
    }

    /// Detach the armed callback, as a timer does when it fires.
    pub fn take_callback(&self) -> Option<Callback> {
        *self.pending.lock().unwrap() = None;
        self.callback.lock().unwrap().take()
    }
}

impl CallbackScheduler for RecordingScheduler {
    fn start(&self, at: Timestamp, callback: Callback) {
        self.calls.lock().unwrap().push("start");
        *self.pending.lock().unwrap() = Some(at);
        *self.callback.lock().unwrap() = Some(callback);
    }

    fn stop(&self) {
        self.calls.lock().unwrap().push("stop");
        *self.pending.lock().unwrap() = None;
        self.callback.lock().unwrap().take();
    }

    fn is_pending(&self) -> bool {
        self.pending.lock().unwrap().is_some()
    }
}

/// A registry that hands the same recording scheduler to every rundown.
pub fn recording() -> (Arc<RecordingScheduler>, SchedulerRegistry) {
    let scheduler = Arc::new(RecordingScheduler::default());
    let shared = scheduler.clone();
    let registry =
        SchedulerRegistry::new(Arc::new(move || shared.clone() as Arc<dyn CallbackScheduler>));
    (scheduler, registry)
}
