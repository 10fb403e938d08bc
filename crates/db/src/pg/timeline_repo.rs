//! Queries over the `timelines` table, one row per rundown.

use rundown_core::timeline::Timeline;
use sqlx::types::Json;
use sqlx::PgPool;

pub struct TimelineRepo;

impl TimelineRepo {
    pub async fn upsert(pool: &PgPool, timeline: &Timeline) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO timelines (rundown_id, generated_at, document) \
             VALUES ($1, $2, $3) \
             ON CONFLICT (rundown_id) DO UPDATE SET \
                generated_at = EXCLUDED.generated_at, \
                document = EXCLUDED.document",
        )
        .bind(&timeline.rundown_id)
        .bind(timeline.generated_at)
        .bind(Json(timeline))
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_rundown(
        pool: &PgPool,
        rundown_id: &str,
    ) -> Result<Option<Timeline>, sqlx::Error> {
        let row: Option<Json<Timeline>> =
            sqlx::query_scalar("SELECT document FROM timelines WHERE rundown_id = $1")
                .bind(rundown_id)
                .fetch_optional(pool)
                .await?;
        Ok(row.map(|Json(timeline)| timeline))
    }
}
