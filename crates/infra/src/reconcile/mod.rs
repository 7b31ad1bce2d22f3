//! Pull path: detect remote changes and reconcile derived local state.
//!
//! [`ChangeDetector`] turns the remote status stream into change events,
//! [`ReverseSyncManager`] fans each event out to the registered
//! [`EntityProcessor`]s, and [`hosts`] holds the host IP set reconciliation.

pub mod detector;
pub mod hosts;
pub mod manager;

pub use detector::{ChangeDetector, ChangeHandler, DetectorHealth, DetectorState, SubscriptionId};
pub use hosts::{create_batches, HostProcessor, HostSynchronizer};
pub use manager::{
    EntityProcessor, HealthReport, ProcessorStats, ReverseSyncManager, ReverseSyncStats,
};
