//! Port interfaces for the remote enforcement system

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use sgsync_domain::{RemoteHost, Result, SyncRequest};

/// Stream of remote status timestamps. Each item signals that the remote
/// state changed at (or before) that instant.
pub type StatusStream = BoxStream<'static, Result<DateTime<Utc>>>;

/// Client-side contract of the remote system.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Apply a batched mutation
    async fn sync(&self, request: &SyncRequest) -> Result<()>;

    /// Cheap liveness probe
    async fn health(&self) -> Result<()>;

    /// Open the status stream used for change detection
    async fn get_statuses(&self) -> Result<StatusStream>;

    /// Look up hosts by uuid; unknown uuids are simply absent from the result
    async fn get_hosts_by_uuids(&self, uuids: &[String]) -> Result<Vec<RemoteHost>>;

    /// Every host the remote system knows
    async fn list_all_hosts(&self) -> Result<Vec<RemoteHost>>;

    /// Hosts bound to one security group
    async fn get_hosts_in_security_group(&self, group: &str) -> Result<Vec<RemoteHost>>;

    /// Release the connection
    async fn close(&self) -> Result<()>;
}
