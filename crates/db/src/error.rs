//! Mapping storage failures onto the domain error taxonomy.

use rundown_core::error::CoreError;

/// PostgreSQL SQLSTATE for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

/// Translate a sqlx error raised while operating on `entity`/`id`.
///
/// - `RowNotFound` becomes [`CoreError::NotFound`].
/// - A unique violation becomes [`CoreError::AlreadyExists`].
/// - Everything else is [`CoreError::Internal`].
pub fn map_sqlx_error(entity: &'static str, id: &str, err: sqlx::Error) -> CoreError {
    match &err {
        sqlx::Error::RowNotFound => CoreError::not_found(entity, id),
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            CoreError::already_exists(entity, id)
        }
        _ => {
            tracing::error!(error = %err, entity, id, "Database error");
            CoreError::Internal(format!("database error: {err}"))
        }
    }
}
