//! Host reconciliation: the [`HostSynchronizer`] batch algorithm and the
//! [`HostProcessor`] that runs it on change events.

pub mod processor;
pub mod synchronizer;

pub use processor::HostProcessor;
pub use synchronizer::{create_batches, HostSynchronizer};
