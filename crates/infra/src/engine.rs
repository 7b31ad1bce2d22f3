//! Engine composition
//!
//! [`SyncEngine`] builds both directions of the synchronization from one
//! [`Config`] plus the two ports, and starts or stops them together.

use std::sync::Arc;

use sgsync_core::{HostRepository, RemoteGateway};
use sgsync_domain::Config;
use tracing::{info, instrument, warn};

use crate::reconcile::{ChangeDetector, HostProcessor, HostSynchronizer, ReverseSyncManager};
use crate::sync::{build_retry_executor, register_remote_syncers, SyncError, SyncManager};

/// Push and pull paths wired to one remote gateway and one host repository.
pub struct SyncEngine {
    gateway: Arc<dyn RemoteGateway>,
    sync_manager: Arc<SyncManager>,
    detector: Arc<ChangeDetector>,
    reverse_sync: Arc<ReverseSyncManager>,
    host_synchronizer: Arc<HostSynchronizer>,
    host_processor: Arc<HostProcessor>,
}

impl SyncEngine {
    /// Validate `config` and build every component.
    ///
    /// # Errors
    /// Returns `SyncError::Config` for an invalid configuration.
    pub fn new(
        config: &Config,
        gateway: Arc<dyn RemoteGateway>,
        repository: Arc<dyn HostRepository>,
    ) -> Result<Self, SyncError> {
        config.validate()?;

        let retry = build_retry_executor(&config.retry)?;
        let sync_manager = Arc::new(SyncManager::new(&config.sync, retry));
        register_remote_syncers(&sync_manager, &gateway)?;

        let detector = Arc::new(ChangeDetector::new(Arc::clone(&gateway), config.detector.clone()));
        let reverse_sync = Arc::new(ReverseSyncManager::new(
            Arc::clone(&detector),
            Arc::clone(&gateway),
            config.reverse_sync.clone(),
        ));

        let host_synchronizer = Arc::new(HostSynchronizer::new(
            repository,
            Arc::clone(&gateway),
            config.host_sync.clone(),
        ));
        let host_processor = Arc::new(HostProcessor::new(
            Arc::clone(&host_synchronizer),
            config.host_processor.clone(),
        ));
        reverse_sync.register_processor(host_processor.clone())?;

        Ok(Self { gateway, sync_manager, detector, reverse_sync, host_synchronizer, host_processor })
    }

    /// Start the push-path cleanup task, then the pull path.
    ///
    /// # Errors
    /// Returns the first start failure; the push path is stopped again if the
    /// pull path fails to start.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), SyncError> {
        self.sync_manager.start().await?;

        if let Err(e) = self.reverse_sync.start().await {
            if let Err(stop_err) = self.sync_manager.stop().await {
                warn!(error = %stop_err, "sync manager did not stop after failed start");
            }
            return Err(e);
        }

        info!("sync engine started");
        Ok(())
    }

    /// Stop both paths and close the gateway. Failures are logged.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        self.reverse_sync.stop().await;

        if let Err(e) = self.sync_manager.stop().await {
            warn!(error = %e, "sync manager did not stop cleanly");
        }
        if let Err(e) = self.gateway.close().await {
            warn!(error = %e, "failed to close remote gateway");
        }
        info!("sync engine stopped");
    }

    pub fn sync_manager(&self) -> &Arc<SyncManager> {
        &self.sync_manager
    }

    pub fn detector(&self) -> &Arc<ChangeDetector> {
        &self.detector
    }

    pub fn reverse_sync(&self) -> &Arc<ReverseSyncManager> {
        &self.reverse_sync
    }

    pub fn host_synchronizer(&self) -> &Arc<HostSynchronizer> {
        &self.host_synchronizer
    }

    pub fn host_processor(&self) -> &Arc<HostProcessor> {
        &self.host_processor
    }
}
