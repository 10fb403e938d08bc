//! Auto-next timers: at most one pending callback per rundown.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use rundown_core::types::{RundownId, Timestamp};
use tokio_util::sync::CancellationToken;

pub type Callback = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

pub trait CallbackScheduler: Send + Sync {
    /// Run `callback` at `at`. Replaces whatever was pending.
    fn start(&self, at: Timestamp, callback: Callback);

    /// Cancel the pending callback, if any.
    fn stop(&self);

    fn is_pending(&self) -> bool;
}

// ---------------------------------------------------------------------------
// Tokio implementation
// ---------------------------------------------------------------------------

struct Pending {
    generation: u64,
    cancel: CancellationToken,
}

/// Sleeps on the tokio timer. A fired callback runs as its own task, so it
/// may call back into code that stops or restarts this scheduler.
#[derive(Default)]
pub struct TokioScheduler {
    pending: Arc<Mutex<Option<Pending>>>,
    generation: AtomicU64,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CallbackScheduler for TokioScheduler {
    fn start(&self, at: Timestamp, callback: Callback) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancellationToken::new();
        let previous = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(Pending {
                generation,
                cancel: cancel.clone(),
            });
        if let Some(previous) = previous {
            previous.cancel.cancel();
        }

        let delay = (at - chrono::Utc::now())
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        let pending = Arc::clone(&self.pending);
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            {
                let mut slot = pending.lock().unwrap_or_else(PoisonError::into_inner);
                if slot.as_ref().map(|p| p.generation) != Some(generation) {
                    return;
                }
                *slot = None;
            }
            tokio::spawn(callback());
        });
    }

    fn stop(&self) {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(pending) = pending {
            pending.cancel.cancel();
        }
    }

    fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub type SchedulerFactory = Arc<dyn Fn() -> Arc<dyn CallbackScheduler> + Send + Sync>;

/// Lazily creates one scheduler per rundown.
pub struct SchedulerRegistry {
    factory: SchedulerFactory,
    schedulers: Mutex<HashMap<RundownId, Arc<dyn CallbackScheduler>>>,
}

impl SchedulerRegistry {
    pub fn new(factory: SchedulerFactory) -> Self {
        Self {
            factory,
            schedulers: Mutex::new(HashMap::new()),
        }
    }

    /// Registry backed by [`TokioScheduler`].
    pub fn tokio() -> Self {
        Self::new(Arc::new(|| Arc::new(TokioScheduler::new()) as Arc<dyn CallbackScheduler>))
    }

    pub fn for_rundown(&self, rundown_id: &str) -> Arc<dyn CallbackScheduler> {
        let mut schedulers = self
            .schedulers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        schedulers
            .entry(rundown_id.to_string())
            .or_insert_with(|| (self.factory)())
            .clone()
    }

    /// Stop and discard the scheduler of a rundown.
    pub fn remove(&self, rundown_id: &str) {
        let removed = self
            .schedulers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(rundown_id);
        if let Some(scheduler) = removed {
            scheduler.stop();
        }
    }
}

impl Default for SchedulerRegistry {
    fn default() -> Self {
        Self::tokio()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use chrono::Utc;
    use futures::FutureExt;

    use super::*;

    fn counting(counter: &Arc<AtomicUsize>) -> Callback {
        let counter = Arc::clone(counter);
        Box::new(move || {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        })
    }

    fn in_ms(ms: i64) -> Timestamp {
        Utc::now() + chrono::Duration::milliseconds(ms)
    }

    #[tokio::test]
    async fn fires_once_after_the_deadline() {
        let scheduler = TokioScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.start(in_ms(20), counting(&fired));
        assert!(scheduler.is_pending());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_pending());
    }

    #[tokio::test]
    async fn stop_cancels() {
        let scheduler = TokioScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.start(in_ms(20), counting(&fired));
        scheduler.stop();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!scheduler.is_pending());
    }

    #[tokio::test]
    async fn restart_replaces_the_pending_callback() {
        let scheduler = TokioScheduler::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        scheduler.start(in_ms(20), counting(&first));
        scheduler.start(in_ms(40), counting(&second));

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn past_deadlines_fire_immediately() {
        let scheduler = TokioScheduler::new();
        let fired = Arc::new(AtomicUsize::new(0));

        scheduler.start(in_ms(-1_000), counting(&fired));
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn registry_hands_out_one_scheduler_per_rundown() {
        let registry = SchedulerRegistry::tokio();
        let a = registry.for_rundown("news");
        let b = registry.for_rundown("news");
        let c = registry.for_rundown("sport");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }
}
