//! One async mutex per rundown id.
//!
//! The Rundown aggregate is not safe for concurrent mutation; every
//! state-machine operation and every ingest unit that touches a rundown
//! holds its guard for the whole load-mutate-save cycle.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use rundown_core::types::RundownId;
use tokio::sync::OwnedMutexGuard;

#[derive(Default)]
pub struct RundownLocks {
    locks: Mutex<HashMap<RundownId, Arc<tokio::sync::Mutex<()>>>>,
}

impl RundownLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `rundown_id`.
    pub async fn lock(&self, rundown_id: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            locks.entry(rundown_id.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Drop the entry for a rundown that no longer exists. A holder of the
    /// old guard keeps it until it is released.
    pub fn forget(&self, rundown_id: &str) {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(rundown_id);
    }
}
