//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`RundownEvent`]s emitted by
//! the playout state machine. It is shared via `Arc<EventBus>`.

use rundown_core::model::CursorOwner;
use rundown_core::types::{LayerId, PartId, PieceId, RundownId, Timestamp};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// RundownEvent
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RundownEventKind {
    Activated,
    Deactivated,
    Reset,
    Taken {
        part_id: PartId,
        previous_part_id: Option<PartId>,
    },
    SetNext {
        part_id: Option<PartId>,
        owner: CursorOwner,
    },
    PartInserted {
        part_id: PartId,
        on_air: bool,
    },
    PieceInserted {
        piece_id: PieceId,
        part_id: PartId,
    },
    InfinitePieceAdded {
        piece_id: PieceId,
        layer: LayerId,
    },
    Deleted,
}

impl RundownEventKind {
    /// Stable name used when persisting, e.g. `"infinite_piece_added"`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Activated => "activated",
            Self::Deactivated => "deactivated",
            Self::Reset => "reset",
            Self::Taken { .. } => "taken",
            Self::SetNext { .. } => "set_next",
            Self::PartInserted { .. } => "part_inserted",
            Self::PieceInserted { .. } => "piece_inserted",
            Self::InfinitePieceAdded { .. } => "infinite_piece_added",
            Self::Deleted => "deleted",
        }
    }
}

/// Something that happened to one Rundown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RundownEvent {
    pub rundown_id: RundownId,
    #[serde(flatten)]
    pub kind: RundownEventKind,
    pub timestamp: Timestamp,
}

impl RundownEvent {
    pub fn new(rundown_id: impl Into<RundownId>, kind: RundownEventKind, timestamp: Timestamp) -> Self {
        Self {
            rundown_id: rundown_id.into(),
            kind,
            timestamp,
        }
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Wraps a [`broadcast::Sender`] so that any number of subscribers can
/// independently receive every published [`RundownEvent`].
pub struct EventBus {
    sender: broadcast::Sender<RundownEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: RundownEvent) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RundownEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
