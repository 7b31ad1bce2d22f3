//! In-memory doubles for the remote gateway and the host repository.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use sgsync_core::{HostRepository, RemoteGateway, StatusStream};
use sgsync_domain::{
    Host, HostIpSetUpdate, RemoteHost, ResourceIdentifier, Result, SgSyncError, SyncRequest,
};
use tokio::sync::{mpsc, Mutex as TokioMutex};

pub type StatusSender = mpsc::UnboundedSender<Result<DateTime<Utc>>>;

/// Remote system double.
///
/// `sync` records every request and fails with queued errors first. The
/// status stream is fed through the sender returned by [`new`](Self::new);
/// it can be opened once, later opens fail.
pub struct InMemoryGateway {
    requests: TokioMutex<Vec<SyncRequest>>,
    sync_failures: TokioMutex<VecDeque<SgSyncError>>,
    sync_calls: AtomicUsize,
    hosts: TokioMutex<Vec<RemoteHost>>,
    host_lookups: AtomicUsize,
    fail_host_lookup: AtomicBool,
    healthy: AtomicBool,
    status_rx: TokioMutex<Option<mpsc::UnboundedReceiver<Result<DateTime<Utc>>>>>,
    status_opens: AtomicUsize,
    closed: AtomicBool,
}

impl InMemoryGateway {
    pub fn new() -> (Arc<Self>, StatusSender) {
        let (tx, rx) = mpsc::unbounded_channel();
        let gateway = Self {
            requests: TokioMutex::new(Vec::new()),
            sync_failures: TokioMutex::new(VecDeque::new()),
            sync_calls: AtomicUsize::new(0),
            hosts: TokioMutex::new(Vec::new()),
            host_lookups: AtomicUsize::new(0),
            fail_host_lookup: AtomicBool::new(false),
            healthy: AtomicBool::new(true),
            status_rx: TokioMutex::new(Some(rx)),
            status_opens: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
        };
        (Arc::new(gateway), tx)
    }

    pub async fn fail_next_syncs(&self, errors: impl IntoIterator<Item = SgSyncError>) {
        self.sync_failures.lock().await.extend(errors);
    }

    pub async fn set_hosts(&self, hosts: Vec<RemoteHost>) {
        *self.hosts.lock().await = hosts;
    }

    pub fn set_fail_host_lookup(&self, fail: bool) {
        self.fail_host_lookup.store(fail, Ordering::SeqCst);
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    pub async fn requests(&self) -> Vec<SyncRequest> {
        self.requests.lock().await.clone()
    }

    pub fn sync_calls(&self) -> usize {
        self.sync_calls.load(Ordering::SeqCst)
    }

    pub fn host_lookups(&self) -> usize {
        self.host_lookups.load(Ordering::SeqCst)
    }

    pub fn status_opens(&self) -> usize {
        self.status_opens.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteGateway for InMemoryGateway {
    async fn sync(&self, request: &SyncRequest) -> Result<()> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.sync_failures.lock().await.pop_front() {
            return Err(err);
        }
        self.requests.lock().await.push(request.clone());
        Ok(())
    }

    async fn health(&self) -> Result<()> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SgSyncError::Network("remote unreachable".to_string()))
        }
    }

    async fn get_statuses(&self) -> Result<StatusStream> {
        self.status_opens.fetch_add(1, Ordering::SeqCst);
        let Some(rx) = self.status_rx.lock().await.take() else {
            return Err(SgSyncError::Network("status stream unavailable".to_string()));
        };
        Ok(stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) })
            .boxed())
    }

    async fn get_hosts_by_uuids(&self, uuids: &[String]) -> Result<Vec<RemoteHost>> {
        self.host_lookups.fetch_add(1, Ordering::SeqCst);
        if self.fail_host_lookup.load(Ordering::SeqCst) {
            return Err(SgSyncError::Remote("lookup unavailable".to_string()));
        }
        let hosts = self.hosts.lock().await;
        Ok(hosts.iter().filter(|host| uuids.contains(&host.uuid)).cloned().collect())
    }

    async fn list_all_hosts(&self) -> Result<Vec<RemoteHost>> {
        Ok(self.hosts.lock().await.clone())
    }

    async fn get_hosts_in_security_group(&self, group: &str) -> Result<Vec<RemoteHost>> {
        let hosts = self.hosts.lock().await;
        Ok(hosts
            .iter()
            .filter(|host| host.security_group.as_deref() == Some(group))
            .cloned()
            .collect())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Local host storage double.
#[derive(Default)]
pub struct InMemoryHostRepository {
    hosts: TokioMutex<Vec<Host>>,
    fail_writes: AtomicBool,
    single_writes: AtomicUsize,
    bulk_writes: AtomicUsize,
}

impl InMemoryHostRepository {
    pub fn with_hosts(hosts: Vec<Host>) -> Arc<Self> {
        Arc::new(Self { hosts: TokioMutex::new(hosts), ..Self::default() })
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub async fn host(&self, uuid: &str) -> Option<Host> {
        self.hosts.lock().await.iter().find(|host| host.uuid == uuid).cloned()
    }

    pub fn single_writes(&self) -> usize {
        self.single_writes.load(Ordering::SeqCst)
    }

    pub fn bulk_writes(&self) -> usize {
        self.bulk_writes.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SgSyncError::Database("database is locked".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl HostRepository for InMemoryHostRepository {
    async fn get_hosts_without_ip_set(&self, namespace: Option<&str>) -> Result<Vec<Host>> {
        let hosts = self.hosts.lock().await;
        Ok(hosts
            .iter()
            .filter(|host| !host.has_ip_set())
            .filter(|host| namespace.map_or(true, |ns| host.identity.namespace == ns))
            .cloned()
            .collect())
    }

    async fn get_host_by_uuid(&self, uuid: &str) -> Result<Option<Host>> {
        Ok(self.host(uuid).await)
    }

    async fn list_hosts(&self, identifiers: &[ResourceIdentifier]) -> Result<Vec<Host>> {
        let hosts = self.hosts.lock().await;
        Ok(hosts.iter().filter(|host| identifiers.contains(&host.identity)).cloned().collect())
    }

    async fn update_host_ip_set(
        &self,
        identifier: &ResourceIdentifier,
        ip_set: &[String],
    ) -> Result<()> {
        self.check_writable()?;
        self.single_writes.fetch_add(1, Ordering::SeqCst);
        let mut hosts = self.hosts.lock().await;
        let host = hosts
            .iter_mut()
            .find(|host| &host.identity == identifier)
            .ok_or_else(|| SgSyncError::NotFound(identifier.key()))?;
        host.ip_set = ip_set.to_vec();
        Ok(())
    }

    async fn update_hosts_ip_set(&self, updates: &[HostIpSetUpdate]) -> Result<()> {
        self.check_writable()?;
        self.bulk_writes.fetch_add(1, Ordering::SeqCst);
        let mut hosts = self.hosts.lock().await;
        for update in updates {
            if let Some(host) = hosts.iter_mut().find(|host| host.identity == update.identifier) {
                host.ip_set = update.ip_set.clone();
            }
        }
        Ok(())
    }
}

pub fn local_host(namespace: &str, name: &str, uuid: &str) -> Host {
    Host {
        identity: ResourceIdentifier::new(namespace, name),
        uuid: uuid.to_string(),
        ip_set: Vec::new(),
        address_group: None,
    }
}

pub fn remote_host(uuid: &str, ips: &[&str]) -> RemoteHost {
    RemoteHost {
        uuid: uuid.to_string(),
        name: uuid.to_string(),
        ip_list: ips.iter().map(|ip| (*ip).to_string()).collect(),
        security_group: None,
    }
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}
