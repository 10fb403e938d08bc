//! Durable event persistence service.
//!
//! [`EventPersistence`] subscribes to the [`EventBus`](crate::bus::EventBus)
//! and writes every received [`RundownEvent`] to the `rundown_events` table.
//! It runs as a long-lived background task and stops when the bus is dropped.

use rundown_db::pg::EventRepo;
use rundown_db::DbPool;
use tokio::sync::broadcast;

use crate::bus::RundownEvent;

pub struct EventPersistence;

impl EventPersistence {
    /// Run the persistence loop until the channel closes.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<RundownEvent>) {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if let Err(e) = Self::persist(&pool, &event).await {
                        tracing::error!(
                            error = %e,
                            rundown_id = %event.rundown_id,
                            kind = event.kind.name(),
                            "Failed to persist event"
                        );
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(
                        skipped = n,
                        "Event persistence lagged, some events were not persisted"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bus closed, persistence shutting down");
                    break;
                }
            }
        }
    }

    async fn persist(pool: &DbPool, event: &RundownEvent) -> Result<i64, sqlx::Error> {
        let payload = serde_json::to_value(&event.kind)
            .map_err(|e| sqlx::Error::Encode(Box::new(e)))?;
        EventRepo::insert(
            pool,
            &event.rundown_id,
            event.kind.name(),
            &payload,
            event.timestamp,
        )
        .await
    }
}
