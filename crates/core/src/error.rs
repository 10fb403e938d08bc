//! Error taxonomy shared by every layer of the playout engine.
//!
//! Pure calculators never fail. Everything else reports one of the kinds
//! below so that callers (the ingest queue, the HTTP transport) can decide
//! how to react by matching on [`CoreError::kind`].

use crate::types::RundownId;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Entity already exists: {entity} with id {id}")]
    AlreadyExists { entity: &'static str, id: String },

    #[error("Rundown {rundown_id} is already active")]
    AlreadyActive { rundown_id: RundownId },

    #[error("Rundown {rundown_id} is active and cannot be deleted")]
    ActiveRundown { rundown_id: RundownId },

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Payload-free discriminant of [`CoreError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    AlreadyExists,
    AlreadyActive,
    ActiveRundown,
    UnsupportedOperation,
    InvalidState,
    Validation,
    Internal,
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn already_exists(entity: &'static str, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity,
            id: id.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::AlreadyActive { .. } => ErrorKind::AlreadyActive,
            Self::ActiveRundown { .. } => ErrorKind::ActiveRundown,
            Self::UnsupportedOperation(_) => ErrorKind::UnsupportedOperation,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("Serialization error: {err}"))
    }
}
