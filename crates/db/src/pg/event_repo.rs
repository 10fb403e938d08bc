//! Repository for the `rundown_events` table.

use sqlx::PgPool;

pub struct EventRepo;

impl EventRepo {
    /// Insert a new event row, returning the generated ID.
    pub async fn insert(
        pool: &PgPool,
        rundown_id: &str,
        kind: &str,
        payload: &serde_json::Value,
        occurred_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO rundown_events (rundown_id, kind, payload, occurred_at) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(rundown_id)
        .bind(kind)
        .bind(payload)
        .bind(occurred_at)
        .fetch_one(pool)
        .await
    }

    /// Most recent events for one rundown, newest first.
    pub async fn list_for_rundown(
        pool: &PgPool,
        rundown_id: &str,
        limit: i64,
    ) -> Result<Vec<(String, serde_json::Value)>, sqlx::Error> {
        sqlx::query_as(
            "SELECT kind, payload FROM rundown_events \
             WHERE rundown_id = $1 ORDER BY occurred_at DESC, id DESC LIMIT $2",
        )
        .bind(rundown_id)
        .bind(limit)
        .fetch_all(pool)
        .await
    }
}
