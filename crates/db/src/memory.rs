//! Process-local store, used when no `DATABASE_URL` is configured and by tests.

use std::collections::HashMap;

use async_trait::async_trait;
use rundown_core::error::CoreError;
use rundown_core::model::{Rundown, RundownSummary};
use rundown_core::timeline::Timeline;
use rundown_core::types::RundownId;
use tokio::sync::RwLock;

use crate::repositories::{RundownRepository, TimelineRepository};

#[derive(Default)]
pub struct InMemoryStore {
    rundowns: RwLock<HashMap<RundownId, Rundown>>,
    timelines: RwLock<HashMap<RundownId, Timeline>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RundownRepository for InMemoryStore {
    async fn get(&self, id: &str) -> Result<Rundown, CoreError> {
        self.rundowns
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Rundown", id))
    }

    async fn get_by_segment_id(&self, segment_id: &str) -> Result<Rundown, CoreError> {
        self.rundowns
            .read()
            .await
            .values()
            .find(|r| r.segment(segment_id).is_some())
            .cloned()
            .ok_or_else(|| CoreError::not_found("Segment", segment_id))
    }

    async fn get_by_part_id(&self, part_id: &str) -> Result<Rundown, CoreError> {
        self.rundowns
            .read()
            .await
            .values()
            .find(|r| r.part(part_id).is_some())
            .cloned()
            .ok_or_else(|| CoreError::not_found("Part", part_id))
    }

    async fn list_basic(&self) -> Result<Vec<RundownSummary>, CoreError> {
        let mut summaries: Vec<RundownSummary> = self
            .rundowns
            .read()
            .await
            .values()
            .map(Rundown::summary)
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(summaries)
    }

    async fn create(&self, rundown: &Rundown) -> Result<(), CoreError> {
        let mut rundowns = self.rundowns.write().await;
        if rundowns.contains_key(&rundown.id) {
            return Err(CoreError::already_exists("Rundown", rundown.id.clone()));
        }
        rundowns.insert(rundown.id.clone(), rundown.clone());
        Ok(())
    }

    async fn save(&self, rundown: &Rundown) -> Result<(), CoreError> {
        self.rundowns
            .write()
            .await
            .insert(rundown.id.clone(), rundown.clone());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), CoreError> {
        self.timelines.write().await.remove(id);
        self.rundowns
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found("Rundown", id))
    }
}

#[async_trait]
impl TimelineRepository for InMemoryStore {
    async fn save_timeline(&self, timeline: &Timeline) -> Result<(), CoreError> {
        self.timelines
            .write()
            .await
            .insert(timeline.rundown_id.clone(), timeline.clone());
        Ok(())
    }

    async fn get_timeline(&self, rundown_id: &str) -> Result<Timeline, CoreError> {
        self.timelines
            .read()
            .await
            .get(rundown_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("Timeline", rundown_id))
    }
}
