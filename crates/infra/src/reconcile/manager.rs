//! Reverse sync manager
//!
//! The single [`ChangeHandler`] attached to the [`ChangeDetector`]. Every
//! change event fans out to all registered [`EntityProcessor`]s in parallel,
//! bounded by a semaphore and one shared processing timeout. A processor
//! failure never prevents the others from running; failures are aggregated
//! into one error for the event.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use sgsync_core::RemoteGateway;
use sgsync_domain::{ChangeEvent, ReverseSyncSettings, SyncSubjectType};
use tokio::sync::{Mutex as TokioMutex, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::detector::{ChangeDetector, ChangeHandler, DetectorHealth, SubscriptionId};
use crate::lifecycle::BackgroundTask;
use crate::sync::errors::SyncError;

/// Reconciles one entity type after a remote change.
#[async_trait]
pub trait EntityProcessor: Send + Sync {
    /// Entity type handled; unique per manager.
    fn entity_type(&self) -> SyncSubjectType;

    /// Re-derive local state. `cancel` fires on shutdown or when the shared
    /// processing timeout elapses; long passes should observe it.
    async fn process_changes(
        &self,
        event: &ChangeEvent,
        cancel: CancellationToken,
    ) -> Result<(), SyncError>;
}

/// Counters for one processor type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProcessorStats {
    /// Events handed to the processor, including ones cut short by timeout
    pub invocations: u64,
    pub successes: u64,
    pub failures: u64,
    /// Running mean of `process_changes` wall time
    pub average_latency: Duration,
    /// Text of the most recent failure; kept after later successes
    pub last_error: Option<String>,
    pub last_run: Option<DateTime<Utc>>,
}

/// Cumulative reverse sync counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReverseSyncStats {
    pub total_events: u64,
    /// Events where every processor succeeded
    pub processed_events: u64,
    /// Events where at least one processor failed
    pub failed_events: u64,
    pub average_processing_time: Duration,
    pub last_event_time: Option<DateTime<Utc>>,
    pub processors: BTreeMap<SyncSubjectType, ProcessorStats>,
}

/// Result of one health probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub checked_at: DateTime<Utc>,
    pub remote_healthy: bool,
    pub remote_error: Option<String>,
    pub detector: DetectorHealth,
    pub processor_count: usize,
    /// Remote reachable and detector not exhausted
    pub healthy: bool,
}

/// Outcome of one processor within a fan-out.
struct ProcessorRun {
    entity_type: SyncSubjectType,
    elapsed: Duration,
    result: Result<(), SyncError>,
}

/// Cancel `deadline` once `timeout` elapses, flagging `timed_out` first.
/// Ends early when the deadline is cancelled by the caller.
fn spawn_deadline_timer(
    deadline: CancellationToken,
    timeout: Duration,
    timed_out: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = deadline.cancelled() => {}
            () = tokio::time::sleep(timeout) => {
                timed_out.store(true, Ordering::SeqCst);
                deadline.cancel();
            }
        }
    })
}

/// Returns false when the timer task failed to join.
async fn join_deadline_timer(timer: JoinHandle<()>) -> bool {
    match timer.await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "processing timer task failed");
            false
        }
    }
}

fn running_average(average: Duration, sample: Duration, count: u64) -> Duration {
    if count <= 1 {
        return sample;
    }
    let count = u128::from(count);
    let nanos = (average.as_nanos() * (count - 1) + sample.as_nanos()) / count;
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

/// Holds the manager weakly so the detector's handler list does not keep it
/// alive.
struct WeakForwarder(Weak<ReverseSyncManager>);

#[async_trait]
impl ChangeHandler for WeakForwarder {
    async fn on_change(&self, event: &ChangeEvent) -> Result<(), SyncError> {
        match self.0.upgrade() {
            Some(manager) => manager.dispatch(event).await,
            None => Ok(()),
        }
    }
}

/// Pull-path orchestrator.
pub struct ReverseSyncManager {
    detector: Arc<ChangeDetector>,
    gateway: Arc<dyn RemoteGateway>,
    settings: ReverseSyncSettings,
    processors: RwLock<BTreeMap<SyncSubjectType, Arc<dyn EntityProcessor>>>,
    semaphore: Arc<Semaphore>,
    stats: RwLock<ReverseSyncStats>,
    subscription: TokioMutex<Option<SubscriptionId>>,
    health_task: BackgroundTask,
    last_health: RwLock<Option<HealthReport>>,
}

impl ReverseSyncManager {
    /// Build a stopped manager. `max_concurrent_processors` of 0 is treated
    /// as 1.
    pub fn new(
        detector: Arc<ChangeDetector>,
        gateway: Arc<dyn RemoteGateway>,
        settings: ReverseSyncSettings,
    ) -> Self {
        let permits = settings.max_concurrent_processors.max(1);
        Self {
            detector,
            gateway,
            settings,
            processors: RwLock::new(BTreeMap::new()),
            semaphore: Arc::new(Semaphore::new(permits)),
            stats: RwLock::new(ReverseSyncStats::default()),
            subscription: TokioMutex::new(None),
            health_task: BackgroundTask::new("reverse-sync-health"),
            last_health: RwLock::new(None),
        }
    }

    /// Add a processor.
    ///
    /// # Errors
    /// Returns `SyncError::DuplicateProcessor` when one is already registered
    /// for the same entity type.
    pub fn register_processor(&self, processor: Arc<dyn EntityProcessor>) -> Result<(), SyncError> {
        let entity_type = processor.entity_type();
        let mut processors = self.processors.write();
        if processors.contains_key(&entity_type) {
            return Err(SyncError::DuplicateProcessor(entity_type));
        }
        processors.insert(entity_type, processor);
        info!(%entity_type, "entity processor registered");
        Ok(())
    }

    /// Registered entity types in ascending order.
    pub fn processor_types(&self) -> Vec<SyncSubjectType> {
        self.processors.read().keys().copied().collect()
    }

    pub fn detector(&self) -> &Arc<ChangeDetector> {
        &self.detector
    }

    /// Subscribe to the detector, start it, and launch the health loop.
    ///
    /// # Errors
    /// Returns `SyncError::AlreadyRunning` if started twice, or the detector's
    /// start error (the subscription is rolled back).
    #[instrument(skip(self))]
    pub async fn start(self: &Arc<Self>) -> Result<(), SyncError> {
        let mut subscription = self.subscription.lock().await;
        if subscription.is_some() {
            return Err(SyncError::AlreadyRunning("reverse sync manager".to_string()));
        }

        let id = self.detector.subscribe(Arc::new(WeakForwarder(Arc::downgrade(self))));
        if let Err(e) = self.detector.start().await {
            self.detector.unsubscribe(id);
            error!(error = %e, "failed to start change detector");
            return Err(e);
        }
        *subscription = Some(id);

        if let Some(interval) = self.settings.health_check_interval() {
            let weak = Arc::downgrade(self);
            let spawned = self
                .health_task
                .spawn(move |cancel| async move {
                    loop {
                        tokio::select! {
                            () = cancel.cancelled() => break,
                            () = tokio::time::sleep(interval) => {
                                let Some(manager) = weak.upgrade() else { break };
                                let report = manager.check_health().await;
                                if !report.healthy {
                                    warn!(
                                        remote_healthy = report.remote_healthy,
                                        detector_state = ?report.detector.state,
                                        "reverse sync unhealthy"
                                    );
                                }
                            }
                        }
                    }
                    debug!("health check loop stopped");
                })
                .await;
            if let Err(e) = spawned {
                warn!(error = %e, "health check loop not started");
            }
        }

        info!(processors = self.processors.read().len(), "reverse sync manager started");
        Ok(())
    }

    /// Stop the health loop and the detector, then unsubscribe.
    ///
    /// Errors from either are logged, not returned. Stopping an idle manager
    /// is a no-op.
    #[instrument(skip(self))]
    pub async fn stop(&self) {
        let mut subscription = self.subscription.lock().await;

        if let Err(e) = self.health_task.stop().await {
            warn!(error = %e, "health check loop did not stop cleanly");
        }

        let Some(id) = subscription.take() else {
            debug!("reverse sync manager was not running");
            return;
        };

        if let Err(e) = self.detector.stop().await {
            warn!(error = %e, "change detector did not stop cleanly");
        }
        self.detector.unsubscribe(id);
        info!("reverse sync manager stopped");
    }

    pub async fn is_running(&self) -> bool {
        self.subscription.lock().await.is_some()
    }

    /// Probe the remote system and the detector; the report is kept for
    /// [`last_health`](Self::last_health).
    pub async fn check_health(&self) -> HealthReport {
        let remote_error = self.gateway.health().await.err().map(|e| e.to_string());
        let detector = self.detector.health();
        let remote_healthy = remote_error.is_none();
        let healthy = remote_healthy && !detector.is_exhausted();

        let report = HealthReport {
            checked_at: Utc::now(),
            remote_healthy,
            remote_error,
            detector,
            processor_count: self.processors.read().len(),
            healthy,
        };
        *self.last_health.write() = Some(report.clone());
        report
    }

    /// Report stored by the most recent health check, periodic or manual.
    pub fn last_health(&self) -> Option<HealthReport> {
        self.last_health.read().clone()
    }

    /// Snapshot of the cumulative counters.
    pub fn stats(&self) -> ReverseSyncStats {
        self.stats.read().clone()
    }

    /// Zero every counter, including per-processor ones.
    pub fn reset_stats(&self) {
        *self.stats.write() = ReverseSyncStats::default();
    }

    #[instrument(skip(self, event), fields(timestamp = %event.timestamp))]
    async fn dispatch(&self, event: &ChangeEvent) -> Result<(), SyncError> {
        let processors: Vec<Arc<dyn EntityProcessor>> =
            self.processors.read().values().cloned().collect();
        let started = Instant::now();

        let timeout = self.settings.processing_timeout();
        let deadline = self.health_task.token().child_token();
        let timed_out = Arc::new(AtomicBool::new(false));
        let timer = spawn_deadline_timer(deadline.clone(), timeout, Arc::clone(&timed_out));

        let mut handles = Vec::with_capacity(processors.len());
        for processor in processors {
            let entity_type = processor.entity_type();
            let semaphore = Arc::clone(&self.semaphore);
            let cancel = deadline.clone();
            let event = event.clone();

            let handle = tokio::spawn(async move {
                let permit = tokio::select! {
                    () = cancel.cancelled() => None,
                    permit = semaphore.acquire_owned() => permit.ok(),
                };
                let Some(_permit) = permit else {
                    return ProcessorRun {
                        entity_type,
                        elapsed: Duration::ZERO,
                        result: Err(SyncError::Cancelled),
                    };
                };

                let begun = Instant::now();
                let result = processor.process_changes(&event, cancel).await;
                ProcessorRun { entity_type, elapsed: begun.elapsed(), result }
            });
            handles.push((entity_type, handle));
        }

        let mut runs = Vec::with_capacity(handles.len());
        for (entity_type, handle) in handles {
            let run = match handle.await {
                Ok(run) => run,
                Err(e) => ProcessorRun {
                    entity_type,
                    elapsed: Duration::ZERO,
                    result: Err(SyncError::Internal(format!("processor task failed: {e}"))),
                },
            };
            runs.push(run);
        }

        deadline.cancel();
        join_deadline_timer(timer).await;

        let elapsed = started.elapsed();
        let hit_timeout = timed_out.load(Ordering::SeqCst);
        let mut errors = Vec::new();
        for run in &mut runs {
            if hit_timeout && matches!(run.result, Err(SyncError::Cancelled)) {
                run.result = Err(SyncError::Timeout(timeout));
            }
            if let Err(e) = &run.result {
                warn!(entity_type = %run.entity_type, error = %e, "processor failed");
                errors.push(format!("{}: {e}", run.entity_type));
            }
        }

        if self.settings.enable_statistics {
            self.record(&runs, elapsed, errors.is_empty());
        }

        if errors.is_empty() {
            debug!(
                processors = runs.len(),
                elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                "change processed"
            );
            Ok(())
        } else {
            Err(SyncError::Aggregate(errors.join("; ")))
        }
    }

    fn record(&self, runs: &[ProcessorRun], elapsed: Duration, success: bool) {
        let now = Utc::now();
        let mut stats = self.stats.write();

        stats.total_events += 1;
        if success {
            stats.processed_events += 1;
        } else {
            stats.failed_events += 1;
        }
        stats.average_processing_time =
            running_average(stats.average_processing_time, elapsed, stats.total_events);
        stats.last_event_time = Some(now);

        for run in runs {
            let entry = stats.processors.entry(run.entity_type).or_default();
            entry.invocations += 1;
            match &run.result {
                Ok(()) => entry.successes += 1,
                Err(e) => {
                    entry.failures += 1;
                    entry.last_error = Some(e.to_string());
                }
            }
            entry.average_latency =
                running_average(entry.average_latency, run.elapsed, entry.invocations);
            entry.last_run = Some(now);
        }
    }
}

#[async_trait]
impl ChangeHandler for ReverseSyncManager {
    async fn on_change(&self, event: &ChangeEvent) -> Result<(), SyncError> {
        self.dispatch(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_average() {
        let avg = running_average(Duration::ZERO, Duration::from_millis(10), 1);
        assert_eq!(avg, Duration::from_millis(10));

        let avg = running_average(avg, Duration::from_millis(20), 2);
        assert_eq!(avg, Duration::from_millis(15));

        let avg = running_average(avg, Duration::from_millis(30), 3);
        assert_eq!(avg, Duration::from_millis(20));
    }

    #[tokio::test]
    async fn test_deadline_timer_fires_and_flags_timeout() {
        let deadline = CancellationToken::new();
        let timed_out = Arc::new(AtomicBool::new(false));
        let timer =
            spawn_deadline_timer(deadline.clone(), Duration::from_millis(10), Arc::clone(&timed_out));

        deadline.cancelled().await;
        assert!(join_deadline_timer(timer).await);
        assert!(timed_out.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_deadline_timer_stops_when_cancelled_first() {
        let deadline = CancellationToken::new();
        let timed_out = Arc::new(AtomicBool::new(false));
        let timer =
            spawn_deadline_timer(deadline.clone(), Duration::from_secs(60), Arc::clone(&timed_out));

        deadline.cancel();
        assert!(join_deadline_timer(timer).await);
        assert!(!timed_out.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failed_timer_join_is_reported() {
        let timer: JoinHandle<()> = tokio::spawn(async { panic!("timer blew up") });
        assert!(!join_deadline_timer(timer).await);
    }
}
