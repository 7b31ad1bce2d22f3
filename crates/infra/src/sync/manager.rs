//! Sync manager
//!
//! Routes local entities to the syncer registered for their subject type.
//! Single-entity syncs pass through the debounce gate and the retry executor;
//! batches skip debounce and are grouped per subject. A background task
//! periodically drops stale debounce entries.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use sgsync_common::{Clock, SystemClock};
use sgsync_domain::{SyncOperation, SyncSettings, SyncSubjectType, SyncableEntity};
use tracing::{debug, info, instrument, warn};

use super::errors::SyncError;
use super::retry::SyncRetryExecutor;
use super::syncer::EntitySyncer;
use super::tracker::{SubjectSyncStats, SyncTracker};
use crate::lifecycle::BackgroundTask;

/// Push-path entry point.
pub struct SyncManager {
    syncers: RwLock<HashMap<SyncSubjectType, Arc<dyn EntitySyncer>>>,
    tracker: Arc<SyncTracker>,
    retry: SyncRetryExecutor,
    settings: SyncSettings,
    cleanup_task: BackgroundTask,
}

impl SyncManager {
    /// Manager reading time from the system clock. No syncers are registered
    /// and the cleanup loop is not running until [`start`](Self::start).
    pub fn new(settings: &SyncSettings, retry: SyncRetryExecutor) -> Self {
        Self::with_clock(settings, retry, Arc::new(SystemClock))
    }

    /// Same as [`new`](Self::new) with an injected clock for the debounce
    /// tracker.
    pub fn with_clock(
        settings: &SyncSettings,
        retry: SyncRetryExecutor,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            syncers: RwLock::new(HashMap::new()),
            tracker: Arc::new(SyncTracker::with_clock(settings.debounce_interval(), clock)),
            retry,
            settings: settings.clone(),
            cleanup_task: BackgroundTask::new("sync-manager-cleanup"),
        }
    }

    /// Register the syncer for `subject`, replacing any previous one.
    ///
    /// # Errors
    /// Returns `SyncError::SubjectMismatch` when the syncer handles another
    /// subject.
    pub fn register_syncer(
        &self,
        subject: SyncSubjectType,
        syncer: Arc<dyn EntitySyncer>,
    ) -> Result<(), SyncError> {
        let actual = syncer.subject_type();
        if actual != subject {
            return Err(SyncError::SubjectMismatch { expected: subject, actual });
        }

        if self.syncers.write().insert(subject, syncer).is_some() {
            debug!(%subject, "syncer replaced");
        }
        Ok(())
    }

    /// Whether a syncer is registered for `subject`.
    pub fn has_syncer(&self, subject: SyncSubjectType) -> bool {
        self.syncers.read().contains_key(&subject)
    }

    fn syncer(&self, subject: SyncSubjectType) -> Option<Arc<dyn EntitySyncer>> {
        self.syncers.read().get(&subject).cloned()
    }

    /// Sync one entity, subject to debounce.
    ///
    /// A debounced call returns `Ok(())` without contacting the remote.
    ///
    /// # Errors
    /// Returns `InvalidArgument` for an empty sync key,
    /// `SyncerNotRegistered` for an unknown subject, or the syncer's error
    /// once retries are exhausted.
    pub async fn sync_entity(
        &self,
        entity: &dyn SyncableEntity,
        operation: SyncOperation,
    ) -> Result<(), SyncError> {
        self.sync_single(entity, operation, false).await
    }

    /// Same as [`sync_entity`](Self::sync_entity) but ignores the debounce
    /// window. The attempt still refreshes the key's entry.
    ///
    /// # Errors
    /// See [`sync_entity`](Self::sync_entity).
    pub async fn sync_entity_forced(
        &self,
        entity: &dyn SyncableEntity,
        operation: SyncOperation,
    ) -> Result<(), SyncError> {
        self.sync_single(entity, operation, true).await
    }

    #[instrument(skip(self, entity), fields(subject = %entity.subject_type()))]
    async fn sync_single(
        &self,
        entity: &dyn SyncableEntity,
        operation: SyncOperation,
        forced: bool,
    ) -> Result<(), SyncError> {
        let key = entity.sync_key();
        if key.trim().is_empty() {
            return Err(SyncError::InvalidArgument("entity sync key is empty".to_string()));
        }
        if operation == SyncOperation::NoOp {
            return Ok(());
        }

        let subject = entity.subject_type();
        let syncer = self.syncer(subject).ok_or(SyncError::SyncerNotRegistered(subject))?;

        let debounce_key = format!("{subject}:{key}");
        let allowed = if forced {
            self.tracker.should_sync_forced(&debounce_key, operation)
        } else {
            self.tracker.should_sync(&debounce_key, operation)
        };
        if !allowed {
            debug!(key = %debounce_key, "sync skipped");
            return Ok(());
        }

        let cancel = self.cleanup_task.token();
        let result = self
            .retry
            .execute(&cancel, || syncer.sync(entity, operation))
            .await
            .map_err(SyncError::from);

        self.tracker.track(subject, operation, result.is_ok());
        match &result {
            Ok(()) => debug!(key = %debounce_key, %operation, "entity synced"),
            Err(e) => warn!(key = %debounce_key, %operation, error = %e, "entity sync failed"),
        }
        result
    }

    /// Sync a mixed batch, one request per subject type.
    ///
    /// Debounce does not apply. Every subject group is attempted; the error of
    /// the last failing group is returned.
    ///
    /// # Errors
    /// Returns the last group failure, if any.
    #[instrument(skip(self, entities), fields(count = entities.len()))]
    pub async fn sync_batch(
        &self,
        entities: &[Arc<dyn SyncableEntity>],
        operation: SyncOperation,
    ) -> Result<(), SyncError> {
        if entities.is_empty() || operation == SyncOperation::NoOp {
            return Ok(());
        }

        let mut groups: BTreeMap<SyncSubjectType, Vec<Arc<dyn SyncableEntity>>> = BTreeMap::new();
        for entity in entities {
            groups.entry(entity.subject_type()).or_default().push(Arc::clone(entity));
        }

        let cancel = self.cleanup_task.token();
        let mut last_error = None;

        for (subject, group) in groups {
            let Some(syncer) = self.syncer(subject) else {
                warn!(%subject, "no syncer registered for batch group");
                self.tracker.track(subject, operation, false);
                last_error = Some(SyncError::SyncerNotRegistered(subject));
                continue;
            };

            let result = self
                .retry
                .execute(&cancel, || syncer.sync_batch(&group, operation))
                .await
                .map_err(SyncError::from);

            self.tracker.track(subject, operation, result.is_ok());
            if let Err(e) = result {
                warn!(%subject, count = group.len(), error = %e, "batch group sync failed");
                last_error = Some(e);
            }
        }

        last_error.map_or(Ok(()), Err)
    }

    /// Start the periodic debounce cleanup.
    ///
    /// # Errors
    /// Returns `SyncError::AlreadyRunning` if already started.
    pub async fn start(&self) -> Result<(), SyncError> {
        let tracker = Arc::clone(&self.tracker);
        let interval = self.settings.cleanup_interval();
        let max_age = self.settings.debounce_entry_max_age();

        self.cleanup_task
            .spawn(move |cancel| async move {
                loop {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        () = tokio::time::sleep(interval) => {
                            let removed = tracker.cleanup_old_entries(max_age);
                            if removed > 0 {
                                debug!(removed, "stale debounce entries removed");
                            }
                        }
                    }
                }
                debug!("sync manager cleanup loop stopped");
            })
            .await?;

        info!(interval_secs = interval.as_secs(), "sync manager started");
        Ok(())
    }

    /// Stop the cleanup task and cancel in-flight retry waits.
    ///
    /// # Errors
    /// Returns `SyncError::NotRunning` when the manager was never started.
    pub async fn stop(&self) -> Result<(), SyncError> {
        if !self.cleanup_task.stop().await? {
            return Err(SyncError::NotRunning("sync manager".to_string()));
        }
        info!("sync manager stopped");
        Ok(())
    }

    pub async fn is_running(&self) -> bool {
        self.cleanup_task.is_running().await
    }

    /// Snapshot of per-subject counters.
    pub fn sync_stats(&self) -> HashMap<SyncSubjectType, SubjectSyncStats> {
        self.tracker.stats()
    }

    pub fn tracker(&self) -> &Arc<SyncTracker> {
        &self.tracker
    }

    pub fn debounce_interval(&self) -> Duration {
        self.tracker.debounce_interval()
    }
}
