//! Per-production business rules the playout core defers to.

use serde_json::json;

use crate::error::CoreError;
use crate::model::{EndState, Part};
use crate::types::Timestamp;

pub trait Blueprint: Send + Sync {
    /// End-state of `part` as it goes off air, handed to whatever follows.
    /// `extra` carries caller-specific context and is opaque here.
    fn end_state_for_part(
        &self,
        part: &Part,
        previous: Option<&Part>,
        now: Timestamp,
        extra: &serde_json::Value,
    ) -> EndState;

    fn validate_config(&self, config: &serde_json::Value) -> Result<(), CoreError>;
}

/// Records which Part ended, what preceded it and when.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBlueprint;

impl Blueprint for DefaultBlueprint {
    fn end_state_for_part(
        &self,
        part: &Part,
        previous: Option<&Part>,
        now: Timestamp,
        extra: &serde_json::Value,
    ) -> EndState {
        EndState(json!({
            "part_id": part.id,
            "previous_part_id": previous.map(|p| p.id.as_str()),
            "ended_at": now,
            "extra": extra,
        }))
    }

    fn validate_config(&self, config: &serde_json::Value) -> Result<(), CoreError> {
        if config.is_object() {
            Ok(())
        } else {
            Err(CoreError::Validation(
                "blueprint config must be a JSON object".into(),
            ))
        }
    }
}
