//! Host entity processor

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use sgsync_domain::{ChangeEvent, HostProcessorSettings, HostSyncResult, SyncSubjectType};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use super::synchronizer::HostSynchronizer;
use crate::reconcile::manager::EntityProcessor;
use crate::sync::errors::SyncError;

/// Runs a host reconciliation pass for every change event, over all
/// namespaces or an allow-list.
pub struct HostProcessor {
    synchronizer: Arc<HostSynchronizer>,
    settings: HostProcessorSettings,
    last_result: RwLock<Option<HostSyncResult>>,
}

impl HostProcessor {
    pub fn new(synchronizer: Arc<HostSynchronizer>, settings: HostProcessorSettings) -> Self {
        Self { synchronizer, settings, last_result: RwLock::new(None) }
    }

    /// Result of the most recent completed pass.
    pub fn last_result(&self) -> Option<HostSyncResult> {
        self.last_result.read().clone()
    }

    async fn sync_namespaces(&self, cancel: &CancellationToken) -> Result<HostSyncResult, SyncError> {
        let mut result = HostSyncResult::new();

        for namespace in &self.settings.namespaces {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let pass = tokio::select! {
                () = cancel.cancelled() => return Err(SyncError::Cancelled),
                pass = self.synchronizer.sync_hosts(namespace) => pass,
            };
            match pass {
                Ok(namespace_result) => result.merge(namespace_result),
                Err(e) => warn!(%namespace, error = %e, "namespace reconciliation failed, skipping"),
            }
        }

        result.set_detail("scope", format!("namespaces:{}", self.settings.namespaces.join(",")));
        Ok(result)
    }
}

#[async_trait]
impl EntityProcessor for HostProcessor {
    fn entity_type(&self) -> SyncSubjectType {
        SyncSubjectType::Hosts
    }

    #[instrument(skip(self, event, cancel), fields(timestamp = %event.timestamp))]
    async fn process_changes(
        &self,
        event: &ChangeEvent,
        cancel: CancellationToken,
    ) -> Result<(), SyncError> {
        let result = if self.settings.sync_all_namespaces {
            tokio::select! {
                () = cancel.cancelled() => return Err(SyncError::Cancelled),
                pass = self.synchronizer.sync_all_hosts() => pass?,
            }
        } else {
            self.sync_namespaces(&cancel).await?
        };

        info!(
            requested = result.total_requested,
            synced = result.total_synced,
            failed = result.total_failed,
            success_rate = %format!("{:.1}", result.success_rate()),
            "host reconciliation completed"
        );
        *self.last_result.write() = Some(result);
        Ok(())
    }
}
