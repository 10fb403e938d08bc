//! Rundown playout: the state machine driving activation, takes, next
//! cursors and ad-libs, plus the per-rundown locks and auto-next timers it
//! relies on.

pub mod locks;
pub mod scheduler;
pub mod state_machine;

pub use locks::RundownLocks;
pub use scheduler::{CallbackScheduler, SchedulerRegistry, TokioScheduler};
pub use state_machine::{Collaborators, InsertMode, RundownStateMachine};
