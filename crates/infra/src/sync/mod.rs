//! Push path: propagate local mutations to the remote system.
//!
//! - [`tracker`]: per-key debounce gate and per-subject counters
//! - [`syncer`]: the [`EntitySyncer`] seam and its remote-backed
//!   implementation
//! - [`manager`]: [`SyncManager`], which routes entities to syncers through
//!   debounce and retry
//! - [`retry`]: retry executor construction from configuration
//! - [`errors`]: [`SyncError`] and its retry classification

pub mod errors;
pub mod manager;
pub mod retry;
pub mod syncer;
pub mod tracker;

pub use errors::{SyncError, SyncErrorCategory};
pub use manager::SyncManager;
pub use retry::{build_retry_executor, SyncRetryExecutor};
pub use syncer::{register_remote_syncers, EntitySyncer, RemoteEntitySyncer};
pub use tracker::{DebounceEntry, SubjectSyncStats, SyncTracker};
