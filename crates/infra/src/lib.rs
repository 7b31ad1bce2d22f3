//! # SgSync Infrastructure
//!
//! Runtime implementation of the synchronization engine on top of the ports
//! defined in `sgsync-core`.
//!
//! This crate contains:
//! - The push path: debounce tracker, entity syncers and the sync manager
//! - The pull path: change detector, reverse sync manager and host
//!   reconciliation
//! - Configuration loading and tracing setup
//! - [`engine::SyncEngine`], which wires everything together
//!
//! ## Architecture
//! - Implements and consumes traits defined in `sgsync-core`
//! - Owns every background task through explicit start/stop lifecycles
//! - No global state: every manager is an independently constructed value

pub mod config;
pub mod engine;
pub mod lifecycle;
pub mod observability;
pub mod reconcile;
pub mod sync;

// Re-export commonly used items
pub use engine::SyncEngine;
pub use reconcile::{
    ChangeDetector, ChangeHandler, DetectorHealth, DetectorState, EntityProcessor, HealthReport,
    HostProcessor, HostSynchronizer, ProcessorStats, ReverseSyncManager, ReverseSyncStats,
    SubscriptionId,
};
pub use sync::{
    EntitySyncer, RemoteEntitySyncer, SubjectSyncStats, SyncError, SyncErrorCategory, SyncManager,
    SyncTracker,
};
