//! The notifications an ingest source can deliver.

use rundown_core::error::ErrorKind;
use rundown_core::model::{Part, Segment};
use rundown_core::types::{PartId, RundownId, SegmentId};
use serde::{Deserialize, Serialize};

/// Rundown content as ingest knows it, without playout state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestRundown {
    pub id: RundownId,
    pub name: String,
    #[serde(default)]
    pub segments: Vec<Segment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IngestChange {
    RundownCreated { rundown: IngestRundown },
    RundownUpdated { rundown: IngestRundown },
    RundownDeleted { rundown_id: RundownId },
    SegmentCreated { segment: Segment },
    SegmentUpdated { segment: Segment },
    SegmentDeleted { segment_id: SegmentId },
    PartCreated { part: Part },
    PartUpdated { part: Part },
    PartDeleted { part_id: PartId },
}

impl IngestChange {
    pub fn label(&self) -> &'static str {
        match self {
            Self::RundownCreated { .. } => "rundown_created",
            Self::RundownUpdated { .. } => "rundown_updated",
            Self::RundownDeleted { .. } => "rundown_deleted",
            Self::SegmentCreated { .. } => "segment_created",
            Self::SegmentUpdated { .. } => "segment_updated",
            Self::SegmentDeleted { .. } => "segment_deleted",
            Self::PartCreated { .. } => "part_created",
            Self::PartUpdated { .. } => "part_updated",
            Self::PartDeleted { .. } => "part_deleted",
        }
    }

    /// The error kind that means this change raced with an equivalent one
    /// and can be dropped: a create finding the entity already there, or
    /// an update/delete finding it already gone.
    pub fn benign_error(&self) -> ErrorKind {
        match self {
            Self::RundownCreated { .. } | Self::SegmentCreated { .. } | Self::PartCreated { .. } => {
                ErrorKind::AlreadyExists
            }
            _ => ErrorKind::NotFound,
        }
    }
}
