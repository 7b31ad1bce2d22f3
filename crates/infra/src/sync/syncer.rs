//! Per-subject syncers
//!
//! An [`EntitySyncer`] turns local entities of one subject into a remote
//! request. [`RemoteEntitySyncer`] is the gateway-backed implementation used
//! for every subject.

use std::sync::Arc;

use async_trait::async_trait;
use sgsync_core::RemoteGateway;
use sgsync_domain::{
    RemoteRecord, SyncOperation, SyncPayload, SyncRequest, SyncSubjectType, SyncableEntity,
};
use tracing::{debug, instrument};

use super::errors::SyncError;
use super::manager::SyncManager;

/// Pushes entities of one subject type to the remote system.
#[async_trait]
pub trait EntitySyncer: Send + Sync {
    /// Subject this syncer accepts.
    fn subject_type(&self) -> SyncSubjectType;

    /// Push one entity.
    async fn sync(&self, entity: &dyn SyncableEntity, operation: SyncOperation)
        -> Result<(), SyncError>;

    /// Push a homogeneous batch in one request.
    async fn sync_batch(
        &self,
        entities: &[Arc<dyn SyncableEntity>],
        operation: SyncOperation,
    ) -> Result<(), SyncError>;
}

/// Converts entities with [`SyncableEntity::to_remote`] and sends them
/// through a [`RemoteGateway`].
pub struct RemoteEntitySyncer {
    subject: SyncSubjectType,
    gateway: Arc<dyn RemoteGateway>,
}

impl RemoteEntitySyncer {
    pub fn new(subject: SyncSubjectType, gateway: Arc<dyn RemoteGateway>) -> Self {
        Self { subject, gateway }
    }

    fn convert(&self, entity: &dyn SyncableEntity) -> Result<RemoteRecord, SyncError> {
        let actual = entity.subject_type();
        if actual != self.subject {
            return Err(SyncError::SubjectMismatch { expected: self.subject, actual });
        }
        entity.to_remote().map_err(SyncError::from)
    }

    async fn send(
        &self,
        records: Vec<RemoteRecord>,
        operation: SyncOperation,
    ) -> Result<(), SyncError> {
        let count = records.len();
        let payload = SyncPayload::from_records(self.subject, records)?;
        let request = SyncRequest::new(operation, self.subject, payload)?;

        self.gateway.sync(&request).await?;
        debug!(subject = %self.subject, %operation, count, "remote sync applied");
        Ok(())
    }
}

#[async_trait]
impl EntitySyncer for RemoteEntitySyncer {
    fn subject_type(&self) -> SyncSubjectType {
        self.subject
    }

    #[instrument(skip(self, entity), fields(subject = %self.subject))]
    async fn sync(
        &self,
        entity: &dyn SyncableEntity,
        operation: SyncOperation,
    ) -> Result<(), SyncError> {
        let record = self.convert(entity)?;
        self.send(vec![record], operation).await
    }

    #[instrument(skip(self, entities), fields(subject = %self.subject, count = entities.len()))]
    async fn sync_batch(
        &self,
        entities: &[Arc<dyn SyncableEntity>],
        operation: SyncOperation,
    ) -> Result<(), SyncError> {
        if entities.is_empty() {
            return Ok(());
        }

        let records = entities
            .iter()
            .map(|entity| self.convert(entity.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.send(records, operation).await
    }
}

/// Register a [`RemoteEntitySyncer`] for every subject type.
///
/// # Errors
/// Propagates registration failures from the manager.
pub fn register_remote_syncers(
    manager: &SyncManager,
    gateway: &Arc<dyn RemoteGateway>,
) -> Result<(), SyncError> {
    for subject in SyncSubjectType::ALL {
        manager.register_syncer(
            subject,
            Arc::new(RemoteEntitySyncer::new(subject, Arc::clone(gateway))),
        )?;
    }
    Ok(())
}
