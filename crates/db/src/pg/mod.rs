//! PostgreSQL document store.
//!
//! The zero-sized `*Repo` structs hold the SQL and take `&PgPool`;
//! [`PgStore`] adapts them to the repository traits and maps errors.

use async_trait::async_trait;
use rundown_core::error::CoreError;
use rundown_core::model::{Rundown, RundownSummary};
use rundown_core::timeline::Timeline;

use crate::error::map_sqlx_error;
use crate::repositories::{RundownRepository, TimelineRepository};
use crate::DbPool;

pub mod event_repo;
pub mod rundown_repo;
pub mod timeline_repo;

pub use event_repo::EventRepo;
pub use rundown_repo::RundownRepo;
pub use timeline_repo::TimelineRepo;

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

#[async_trait]
impl RundownRepository for PgStore {
    async fn get(&self, id: &str) -> Result<Rundown, CoreError> {
        RundownRepo::find_by_id(&self.pool, id)
            .await
            .map_err(|e| map_sqlx_error("Rundown", id, e))?
            .ok_or_else(|| CoreError::not_found("Rundown", id))
    }

    async fn get_by_segment_id(&self, segment_id: &str) -> Result<Rundown, CoreError> {
        RundownRepo::find_by_segment_id(&self.pool, segment_id)
            .await
            .map_err(|e| map_sqlx_error("Segment", segment_id, e))?
            .ok_or_else(|| CoreError::not_found("Segment", segment_id))
    }

    async fn get_by_part_id(&self, part_id: &str) -> Result<Rundown, CoreError> {
        RundownRepo::find_by_part_id(&self.pool, part_id)
            .await
            .map_err(|e| map_sqlx_error("Part", part_id, e))?
            .ok_or_else(|| CoreError::not_found("Part", part_id))
    }

    async fn list_basic(&self) -> Result<Vec<RundownSummary>, CoreError> {
        RundownRepo::list_basic(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("Rundown", "*", e))
    }

    async fn create(&self, rundown: &Rundown) -> Result<(), CoreError> {
        RundownRepo::insert(&self.pool, rundown)
            .await
            .map_err(|e| map_sqlx_error("Rundown", &rundown.id, e))
    }

    async fn save(&self, rundown: &Rundown) -> Result<(), CoreError> {
        RundownRepo::upsert(&self.pool, rundown)
            .await
            .map_err(|e| map_sqlx_error("Rundown", &rundown.id, e))
    }

    async fn delete(&self, id: &str) -> Result<(), CoreError> {
        let deleted = RundownRepo::delete(&self.pool, id)
            .await
            .map_err(|e| map_sqlx_error("Rundown", id, e))?;
        if deleted {
            Ok(())
        } else {
            Err(CoreError::not_found("Rundown", id))
        }
    }
}

#[async_trait]
impl TimelineRepository for PgStore {
    async fn save_timeline(&self, timeline: &Timeline) -> Result<(), CoreError> {
        TimelineRepo::upsert(&self.pool, timeline)
            .await
            .map_err(|e| map_sqlx_error("Timeline", &timeline.rundown_id, e))
    }

    async fn get_timeline(&self, rundown_id: &str) -> Result<Timeline, CoreError> {
        TimelineRepo::find_by_rundown(&self.pool, rundown_id)
            .await
            .map_err(|e| map_sqlx_error("Timeline", rundown_id, e))?
            .ok_or_else(|| CoreError::not_found("Timeline", rundown_id))
    }
}
