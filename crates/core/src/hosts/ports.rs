//! Port interfaces for local host storage

use async_trait::async_trait;
use sgsync_domain::{Host, HostIpSetUpdate, ResourceIdentifier, Result};

/// Storage of local host resources as seen by the reconciliation path.
#[async_trait]
pub trait HostRepository: Send + Sync {
    /// Hosts with an empty IP set, optionally scoped to one namespace
    async fn get_hosts_without_ip_set(&self, namespace: Option<&str>) -> Result<Vec<Host>>;

    /// Find a host by its remote uuid
    async fn get_host_by_uuid(&self, uuid: &str) -> Result<Option<Host>>;

    /// Fetch hosts by identity; unknown identifiers are skipped
    async fn list_hosts(&self, identifiers: &[ResourceIdentifier]) -> Result<Vec<Host>>;

    /// Replace the IP set of one host
    async fn update_host_ip_set(&self, identifier: &ResourceIdentifier, ip_set: &[String])
        -> Result<()>;

    /// Replace IP sets of several hosts in one write
    async fn update_hosts_ip_set(&self, updates: &[HostIpSetUpdate]) -> Result<()>;
}
