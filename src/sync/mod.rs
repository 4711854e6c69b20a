//! Sandbox synchronization
//!
//! Applies generation events to the session snapshot and reconciles the
//! snapshot into a running sandbox with as few reloads as possible.

pub mod applier;
pub mod delta;
pub mod engine;
pub mod reload;

pub use applier::{ActionApplier, AppliedChanges};
pub use delta::{compute_delta, plan_sync, SyncPlan};
pub use engine::{SyncError, SyncHandle, SyncNotice, SyncReport, SyncRequest, SyncScheduler};
pub use reload::ReloadPolicy;
