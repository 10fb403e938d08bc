//! Queries over the `rundowns` table.
//!
//! The aggregate is stored whole in the `document` JSONB column; `name`,
//! `active` and `modified_at` are denormalised beside it for listing.

use rundown_core::model::{Rundown, RundownSummary};
use sqlx::types::Json;
use sqlx::PgPool;

/// Row shape for `list_basic`.
#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    id: String,
    name: String,
    active: bool,
    modified_at: chrono::DateTime<chrono::Utc>,
}

impl From<SummaryRow> for RundownSummary {
    fn from(row: SummaryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            active: row.active,
            modified_at: row.modified_at,
        }
    }
}

pub struct RundownRepo;

impl RundownRepo {
    pub async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<Rundown>, sqlx::Error> {
        let row: Option<Json<Rundown>> =
            sqlx::query_scalar("SELECT document FROM rundowns WHERE id = $1")
                .bind(id)
                .fetch_optional(pool)
                .await?;
        Ok(row.map(|Json(rundown)| rundown))
    }

    /// Find the Rundown whose document contains a Segment with this id.
    pub async fn find_by_segment_id(
        pool: &PgPool,
        segment_id: &str,
    ) -> Result<Option<Rundown>, sqlx::Error> {
        let row: Option<Json<Rundown>> = sqlx::query_scalar(
            "SELECT document FROM rundowns \
             WHERE jsonb_path_exists(document, '$.segments[*] ? (@.id == $id)', \
                                     jsonb_build_object('id', $1::text)) \
             LIMIT 1",
        )
        .bind(segment_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|Json(rundown)| rundown))
    }

    /// Find the Rundown whose document contains a Part with this id.
    pub async fn find_by_part_id(
        pool: &PgPool,
        part_id: &str,
    ) -> Result<Option<Rundown>, sqlx::Error> {
        let row: Option<Json<Rundown>> = sqlx::query_scalar(
            "SELECT document FROM rundowns \
             WHERE jsonb_path_exists(document, '$.segments[*].parts[*] ? (@.id == $id)', \
                                     jsonb_build_object('id', $1::text)) \
             LIMIT 1",
        )
        .bind(part_id)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|Json(rundown)| rundown))
    }

    pub async fn list_basic(pool: &PgPool) -> Result<Vec<RundownSummary>, sqlx::Error> {
        let rows = sqlx::query_as::<_, SummaryRow>(
            "SELECT id, name, active, modified_at FROM rundowns ORDER BY id",
        )
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(RundownSummary::from).collect())
    }

    /// Plain insert; a duplicate id surfaces as a unique violation.
    pub async fn insert(pool: &PgPool, rundown: &Rundown) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO rundowns (id, name, active, modified_at, document) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&rundown.id)
        .bind(&rundown.name)
        .bind(rundown.is_active())
        .bind(rundown.modified_at)
        .bind(Json(rundown))
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn upsert(pool: &PgPool, rundown: &Rundown) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO rundowns (id, name, active, modified_at, document) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (id) DO UPDATE SET \
                name = EXCLUDED.name, \
                active = EXCLUDED.active, \
                modified_at = EXCLUDED.modified_at, \
                document = EXCLUDED.document",
        )
        .bind(&rundown.id)
        .bind(&rundown.name)
        .bind(rundown.is_active())
        .bind(rundown.modified_at)
        .bind(Json(rundown))
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Returns `true` if a row was deleted.
    pub async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM rundowns WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
