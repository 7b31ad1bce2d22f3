//! Domain types and models
//!
//! - [`identity`]: composed resource identity
//! - [`resources`]: local control-plane resources
//! - [`sync`]: sync operations, subjects, the [`SyncableEntity`] capability and
//!   change events
//! - [`remote`]: remote wire records and request envelopes
//! - [`host_sync`]: host reconciliation results

pub mod host_sync;
pub mod identity;
pub mod remote;
pub mod resources;
pub mod sync;

pub use host_sync::{HostIpSetUpdate, HostSyncResult};
pub use identity::ResourceIdentifier;
pub use remote::{
    RemoteGroup, RemoteHost, RemoteNetwork, RemoteRecord, RemoteRule, RemoteService, SyncPayload,
    SyncRequest,
};
pub use resources::{
    AddressGroup, Host, Network, Rule, RuleAction, Service, ServicePort, TrafficDirection,
    TransportProtocol,
};
pub use sync::{ChangeEvent, SyncOperation, SyncSubjectType, SyncableEntity};
