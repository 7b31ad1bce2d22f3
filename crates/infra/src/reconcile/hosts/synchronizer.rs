//! Host IP set reconciliation
//!
//! Local hosts are created without addresses; the remote system learns them
//! from its agents. A pass finds local hosts with an empty IP set, looks them
//! up remotely in batches and writes the (optionally validated) address list
//! back. Every id is accounted for in the returned [`HostSyncResult`]; only a
//! failure to enumerate the targets fails the pass itself.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Arc;

use sgsync_core::{filter_valid_ips, HostRepository, RemoteGateway};
use sgsync_domain::{
    Host, HostIpSetUpdate, HostSyncResult, HostSyncSettings, RemoteHost, ResourceIdentifier,
};
use tracing::{debug, info, instrument, warn};

use crate::sync::errors::SyncError;

const ERR_NOT_FOUND_LOCALLY: &str = "host not found locally";
const ERR_NOT_FOUND_REMOTELY: &str = "host not found in remote system";
const ERR_NO_VALID_IPS: &str = "no valid IP addresses";

/// Split `items` into consecutive batches of `size`; 0 uses the default host
/// batch size.
pub fn create_batches<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    let size = if size == 0 { sgsync_domain::constants::DEFAULT_HOST_BATCH_SIZE } else { size };
    items.chunks(size).map(<[T]>::to_vec).collect()
}

/// Fills empty host IP sets from the remote system.
pub struct HostSynchronizer {
    repository: Arc<dyn HostRepository>,
    gateway: Arc<dyn RemoteGateway>,
    settings: HostSyncSettings,
}

impl HostSynchronizer {
    pub fn new(
        repository: Arc<dyn HostRepository>,
        gateway: Arc<dyn RemoteGateway>,
        settings: HostSyncSettings,
    ) -> Self {
        Self { repository, gateway, settings }
    }

    pub fn settings(&self) -> &HostSyncSettings {
        &self.settings
    }

    /// Reconcile hosts without an IP set in one namespace.
    ///
    /// # Errors
    /// Fails only when the local hosts cannot be listed.
    #[instrument(skip(self))]
    pub async fn sync_hosts(&self, namespace: &str) -> Result<HostSyncResult, SyncError> {
        let hosts = self.repository.get_hosts_without_ip_set(Some(namespace)).await?;
        let mut result = self.reconcile_hosts(hosts).await;
        result.set_detail("scope", format!("namespace:{namespace}"));
        Ok(result)
    }

    /// Reconcile hosts without an IP set across all namespaces.
    ///
    /// # Errors
    /// Fails only when the local hosts cannot be listed.
    #[instrument(skip(self))]
    pub async fn sync_all_hosts(&self) -> Result<HostSyncResult, SyncError> {
        let hosts = self.repository.get_hosts_without_ip_set(None).await?;
        let mut result = self.reconcile_hosts(hosts).await;
        result.set_detail("scope", "all");
        Ok(result)
    }

    /// Reconcile an explicit list of host uuids.
    ///
    /// Unknown uuids are reported as failures. Hosts that already carry an IP
    /// set are skipped and counted in the `skipped` detail.
    ///
    /// # Errors
    /// Never fails as a whole; per-host errors land in the result.
    #[instrument(skip(self, uuids), fields(count = uuids.len()))]
    pub async fn sync_hosts_by_uuids(&self, uuids: &[String]) -> Result<HostSyncResult, SyncError> {
        let mut result = HostSyncResult::new();
        let mut seen = HashSet::new();
        let mut targets = Vec::new();
        let mut skipped = 0usize;

        for uuid in uuids {
            let uuid = uuid.trim();
            if uuid.is_empty() || !seen.insert(uuid.to_string()) {
                continue;
            }

            match self.repository.get_host_by_uuid(uuid).await {
                Ok(Some(host)) if host.has_ip_set() => skipped += 1,
                Ok(Some(host)) => targets.push(host),
                Ok(None) => {
                    result.add_requested(1);
                    result.record_failed(uuid, ERR_NOT_FOUND_LOCALLY);
                }
                Err(e) => {
                    result.add_requested(1);
                    result.record_failed(uuid, format!("local lookup failed: {e}"));
                }
            }
        }

        result.merge(self.reconcile_hosts(targets).await);
        result.set_detail("scope", "uuids");
        result.set_detail("skipped", skipped);
        Ok(result)
    }

    /// Reconcile hosts addressed by identity.
    ///
    /// Identifiers without a local host fail under their `namespace/name`
    /// key. Hosts that already carry an IP set are skipped and counted in the
    /// `skipped` detail.
    ///
    /// # Errors
    /// Fails only when the local hosts cannot be listed.
    #[instrument(skip(self, identifiers), fields(count = identifiers.len()))]
    pub async fn sync_hosts_by_identifiers(
        &self,
        identifiers: &[ResourceIdentifier],
    ) -> Result<HostSyncResult, SyncError> {
        let hosts = self.repository.list_hosts(identifiers).await?;
        let mut result = HostSyncResult::new();

        let known: HashSet<&ResourceIdentifier> = hosts.iter().map(|host| &host.identity).collect();
        let mut reported = HashSet::new();
        for identifier in identifiers {
            if !known.contains(identifier) && reported.insert(identifier) {
                result.add_requested(1);
                result.record_failed(identifier.key(), ERR_NOT_FOUND_LOCALLY);
            }
        }

        let (configured, targets): (Vec<Host>, Vec<Host>) =
            hosts.into_iter().partition(Host::has_ip_set);
        result.merge(self.reconcile_hosts(targets).await);
        result.set_detail("scope", "identifiers");
        result.set_detail("skipped", configured.len());
        Ok(result)
    }

    /// Reconcile the local hosts the remote system lists in `group`.
    ///
    /// # Errors
    /// Returns the remote error, or `SyncError::Timeout` when the group
    /// listing exceeds the sync timeout.
    #[instrument(skip(self))]
    pub async fn sync_security_group_hosts(&self, group: &str) -> Result<HostSyncResult, SyncError> {
        let remote_hosts = self.remote_listing(self.gateway.get_hosts_in_security_group(group)).await?;
        let mut result = self.sync_remote_listed(remote_hosts).await?;
        result.set_detail("scope", format!("security_group:{group}"));
        Ok(result)
    }

    /// Reconcile the local counterpart of every host the remote system
    /// knows. Remote hosts with no local record fail as not found locally.
    ///
    /// # Errors
    /// Returns the remote error, or `SyncError::Timeout` when the listing
    /// exceeds the sync timeout.
    #[instrument(skip(self))]
    pub async fn sync_remote_hosts(&self) -> Result<HostSyncResult, SyncError> {
        let remote_hosts = self.remote_listing(self.gateway.list_all_hosts()).await?;
        let mut result = self.sync_remote_listed(remote_hosts).await?;
        result.set_detail("scope", "remote");
        Ok(result)
    }

    async fn remote_listing<F>(&self, listing: F) -> Result<Vec<RemoteHost>, SyncError>
    where
        F: Future<Output = sgsync_domain::Result<Vec<RemoteHost>>>,
    {
        let timeout = self.settings.sync_timeout();
        let hosts =
            tokio::time::timeout(timeout, listing).await.map_err(|_| SyncError::Timeout(timeout))??;
        Ok(hosts)
    }

    async fn sync_remote_listed(
        &self,
        remote_hosts: Vec<RemoteHost>,
    ) -> Result<HostSyncResult, SyncError> {
        let uuids: Vec<String> = remote_hosts.into_iter().map(|host| host.uuid).collect();
        self.sync_hosts_by_uuids(&uuids).await
    }

    async fn reconcile_hosts(&self, hosts: Vec<Host>) -> HostSyncResult {
        let mut result = HostSyncResult::new();
        if hosts.is_empty() {
            result.set_detail("batches", 0);
            return result;
        }

        let uuids: Vec<String> = hosts.iter().map(|host| host.uuid.clone()).collect();
        let local: HashMap<String, Host> =
            hosts.into_iter().map(|host| (host.uuid.clone(), host)).collect();

        let batches = create_batches(&uuids, self.settings.effective_batch_size());
        let batch_count = batches.len();
        for (index, batch) in batches.iter().enumerate() {
            let batch_result = self.process_batch(batch, &local).await;
            debug!(
                batch = index + 1,
                of = batch_count,
                synced = batch_result.total_synced,
                failed = batch_result.total_failed,
                "host batch processed"
            );
            result.merge(batch_result);
        }

        result.set_detail("batches", batch_count);
        info!(
            requested = result.total_requested,
            synced = result.total_synced,
            failed = result.total_failed,
            "host reconciliation pass finished"
        );
        result
    }

    async fn process_batch(&self, batch: &[String], local: &HashMap<String, Host>) -> HostSyncResult {
        let mut result = HostSyncResult::new();
        result.add_requested(batch.len());

        let timeout = self.settings.sync_timeout();
        let remote = match tokio::time::timeout(timeout, self.gateway.get_hosts_by_uuids(batch)).await
        {
            Ok(Ok(hosts)) => hosts,
            Ok(Err(e)) => {
                warn!(count = batch.len(), error = %e, "remote host lookup failed");
                for uuid in batch {
                    result.record_failed(uuid, format!("remote lookup failed: {e}"));
                }
                return result;
            }
            Err(_) => {
                warn!(count = batch.len(), ?timeout, "remote host lookup timed out");
                for uuid in batch {
                    result.record_failed(uuid, format!("remote lookup timed out after {timeout:?}"));
                }
                return result;
            }
        };
        let remote: HashMap<&str, &RemoteHost> =
            remote.iter().map(|host| (host.uuid.as_str(), host)).collect();

        let mut updates = Vec::new();
        for uuid in batch {
            let Some(host) = local.get(uuid) else {
                result.record_failed(uuid, ERR_NOT_FOUND_LOCALLY);
                continue;
            };
            let Some(remote_host) = remote.get(uuid.as_str()) else {
                result.record_failed(uuid, ERR_NOT_FOUND_REMOTELY);
                continue;
            };

            let ip_set = if self.settings.enable_ip_set_validation {
                filter_valid_ips(&remote_host.ip_list)
            } else {
                remote_host.ip_list.clone()
            };
            if ip_set.is_empty() {
                result.record_failed(uuid, ERR_NO_VALID_IPS);
                continue;
            }

            updates.push(HostIpSetUpdate {
                identifier: host.identity.clone(),
                uuid: uuid.clone(),
                ip_set,
            });
        }

        if updates.is_empty() {
            return result;
        }

        let written = match updates.as_slice() {
            [single] => self.repository.update_host_ip_set(&single.identifier, &single.ip_set).await,
            many => self.repository.update_hosts_ip_set(many).await,
        };

        match written {
            Ok(()) => {
                for update in updates {
                    result.record_synced(update.uuid);
                }
            }
            Err(e) => {
                warn!(count = updates.len(), error = %e, "host IP set write failed");
                for update in updates {
                    result.record_failed(update.uuid, format!("failed to update IP set: {e}"));
                }
            }
        }
        result
    }
}
