//! Remote change detection
//!
//! [`ChangeDetector`] keeps one long-lived status stream open against the
//! remote system. Every strictly newer timestamp becomes a [`ChangeEvent`]
//! delivered to the subscribed handlers, one event at a time. Failed or
//! closed streams are reopened after `reconnect_interval` until `max_retries`
//! consecutive failures, after which the detector reports
//! [`DetectorState::Exhausted`] and stays idle until restarted.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use parking_lot::RwLock;
use serde::Serialize;
use sgsync_core::{RemoteGateway, StatusStream};
use sgsync_domain::{ChangeEvent, DetectorSettings};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::lifecycle::BackgroundTask;
use crate::sync::errors::SyncError;

/// Handle returned by [`ChangeDetector::subscribe`].
pub type SubscriptionId = Uuid;

/// Receiver of change signals.
#[async_trait]
pub trait ChangeHandler: Send + Sync {
    async fn on_change(&self, event: &ChangeEvent) -> Result<(), SyncError>;
}

/// Connection state of the monitor loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorState {
    Stopped,
    Connecting,
    Connected,
    /// Waiting out the reconnect interval after a failure
    Reconnecting,
    /// Gave up after `max_retries` consecutive failures
    Exhausted,
}

/// Point-in-time view of the detector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorHealth {
    pub state: DetectorState,
    pub consecutive_failures: u32,
    pub events_delivered: u64,
    pub events_suppressed: u64,
    pub last_event_time: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub event_source: String,
}

impl DetectorHealth {
    fn new(event_source: &str) -> Self {
        Self {
            state: DetectorState::Stopped,
            consecutive_failures: 0,
            events_delivered: 0,
            events_suppressed: 0,
            last_event_time: None,
            last_error: None,
            event_source: event_source.to_string(),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.state == DetectorState::Exhausted
    }
}

struct DetectorShared {
    handlers: RwLock<Vec<(SubscriptionId, Arc<dyn ChangeHandler>)>>,
    health: RwLock<DetectorHealth>,
    last_observed: RwLock<Option<DateTime<Utc>>>,
}

impl DetectorShared {
    fn set_state(&self, state: DetectorState) {
        self.health.write().state = state;
    }

    fn record_failure(&self, message: String) -> u32 {
        let mut health = self.health.write();
        health.consecutive_failures += 1;
        health.last_error = Some(message);
        health.consecutive_failures
    }

    /// Advance the high-water mark if `timestamp` is strictly newer.
    fn observe(&self, timestamp: DateTime<Utc>) -> bool {
        let mut last = self.last_observed.write();
        match *last {
            Some(previous) if timestamp <= previous => false,
            _ => {
                *last = Some(timestamp);
                true
            }
        }
    }

    fn handler_snapshot(&self) -> Vec<(SubscriptionId, Arc<dyn ChangeHandler>)> {
        self.handlers.read().clone()
    }
}

/// Why a stream stopped being consumed.
enum StreamEnd {
    Cancelled,
    Failed(String),
}

/// Watches the remote status stream and fans change events out to handlers.
pub struct ChangeDetector {
    gateway: Arc<dyn RemoteGateway>,
    settings: DetectorSettings,
    shared: Arc<DetectorShared>,
    task: BackgroundTask,
}

impl ChangeDetector {
    /// Build a stopped detector with no handlers.
    pub fn new(gateway: Arc<dyn RemoteGateway>, settings: DetectorSettings) -> Self {
        let health = DetectorHealth::new(&settings.event_source);
        Self {
            gateway,
            settings,
            shared: Arc::new(DetectorShared {
                handlers: RwLock::new(Vec::new()),
                health: RwLock::new(health),
                last_observed: RwLock::new(None),
            }),
            task: BackgroundTask::new("change-detector"),
        }
    }

    /// Add a handler; keep the returned id to remove it later.
    pub fn subscribe(&self, handler: Arc<dyn ChangeHandler>) -> SubscriptionId {
        let id = Uuid::new_v4();
        self.shared.handlers.write().push((id, handler));
        debug!(subscription = %id, "change handler subscribed");
        id
    }

    /// Remove exactly the handler registered under `id`.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.shared.handlers.write();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        let removed = handlers.len() != before;
        if removed {
            debug!(subscription = %id, "change handler unsubscribed");
        }
        removed
    }

    pub fn handler_count(&self) -> usize {
        self.shared.handlers.read().len()
    }

    /// Snapshot of the connection state and delivery counters.
    pub fn health(&self) -> DetectorHealth {
        self.shared.health.read().clone()
    }

    /// Newest timestamp seen so far.
    pub fn last_observed(&self) -> Option<DateTime<Utc>> {
        *self.shared.last_observed.read()
    }

    pub async fn is_running(&self) -> bool {
        self.task.is_running().await
    }

    /// Spawn the monitor loop.
    ///
    /// # Errors
    /// Returns `SyncError::AlreadyRunning` if the loop is active. A detector
    /// that reached `Exhausted` may be started again.
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<(), SyncError> {
        let gateway = Arc::clone(&self.gateway);
        let shared = Arc::clone(&self.shared);
        let settings = self.settings.clone();

        self.task
            .spawn(move |cancel| async move {
                {
                    let mut health = shared.health.write();
                    health.consecutive_failures = 0;
                    health.last_error = None;
                }
                monitor_loop(gateway, shared, settings, cancel).await;
            })
            .await?;

        info!(source = %self.settings.event_source, "change detector started");
        Ok(())
    }

    /// Cancel the monitor loop and wait for it to exit.
    ///
    /// # Errors
    /// Returns `SyncError::NotRunning` when never started, or the join
    /// failure from the background task.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<(), SyncError> {
        let stopped = self.task.stop().await;
        self.shared.set_state(DetectorState::Stopped);

        if !stopped? {
            return Err(SyncError::NotRunning("change detector".to_string()));
        }
        info!("change detector stopped");
        Ok(())
    }
}

async fn monitor_loop(
    gateway: Arc<dyn RemoteGateway>,
    shared: Arc<DetectorShared>,
    settings: DetectorSettings,
    cancel: CancellationToken,
) {
    let reconnect_interval = settings.reconnect_interval();

    loop {
        shared.set_state(DetectorState::Connecting);

        let opened = tokio::select! {
            () = cancel.cancelled() => break,
            opened = gateway.get_statuses() => opened,
        };

        let failure = match opened {
            Ok(stream) => {
                {
                    let mut health = shared.health.write();
                    health.state = DetectorState::Connected;
                    health.consecutive_failures = 0;
                }
                debug!("status stream opened");

                match consume_stream(stream, &shared, &settings.event_source, &cancel).await {
                    StreamEnd::Cancelled => break,
                    StreamEnd::Failed(message) => message,
                }
            }
            Err(e) => format!("failed to open status stream: {e}"),
        };

        let failures = shared.record_failure(failure.clone());
        if settings.max_retries > 0 && failures > settings.max_retries {
            shared.set_state(DetectorState::Exhausted);
            error!(
                failures,
                max_retries = settings.max_retries,
                error = %failure,
                "change detector exhausted reconnect attempts"
            );
            return;
        }

        shared.set_state(DetectorState::Reconnecting);
        warn!(
            failures,
            reconnect_ms = u64::try_from(reconnect_interval.as_millis()).unwrap_or(u64::MAX),
            error = %failure,
            "status stream failed, reconnecting"
        );

        tokio::select! {
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(reconnect_interval) => {}
        }
    }

    shared.set_state(DetectorState::Stopped);
    debug!("change detector monitor loop stopped");
}

async fn consume_stream(
    mut stream: StatusStream,
    shared: &DetectorShared,
    event_source: &str,
    cancel: &CancellationToken,
) -> StreamEnd {
    loop {
        let item = tokio::select! {
            () = cancel.cancelled() => return StreamEnd::Cancelled,
            item = stream.next() => item,
        };

        let timestamp = match item {
            None => return StreamEnd::Failed("status stream closed".to_string()),
            Some(Err(e)) => return StreamEnd::Failed(format!("status stream error: {e}")),
            Some(Ok(timestamp)) => timestamp,
        };

        if !shared.observe(timestamp) {
            shared.health.write().events_suppressed += 1;
            debug!(%timestamp, "duplicate status timestamp suppressed");
            continue;
        }

        let event = ChangeEvent::new(timestamp, event_source);
        tokio::select! {
            () = cancel.cancelled() => return StreamEnd::Cancelled,
            () = notify_handlers(shared, &event) => {}
        }
    }
}

/// Deliver `event` to every subscribed handler in registration order.
async fn notify_handlers(shared: &DetectorShared, event: &ChangeEvent) {
    let handlers = shared.handler_snapshot();
    let mut errors = Vec::new();

    for (id, handler) in &handlers {
        if let Err(e) = handler.on_change(event).await {
            errors.push(format!("{id}: {e}"));
        }
    }

    {
        let mut health = shared.health.write();
        health.events_delivered += 1;
        health.last_event_time = Some(event.timestamp);
    }

    if errors.is_empty() {
        debug!(timestamp = %event.timestamp, handlers = handlers.len(), "change event delivered");
    } else {
        warn!(
            timestamp = %event.timestamp,
            failed = errors.len(),
            handlers = handlers.len(),
            errors = %errors.join("; "),
            "change handlers reported errors"
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::stream;
    use sgsync_domain::{RemoteHost, Result as DomainResult, SgSyncError, SyncRequest};
    use tokio::sync::Mutex as TokioMutex;

    use super::*;

    /// Gateway whose status streams are scripted per `get_statuses` call.
    struct ScriptedGateway {
        scripts: TokioMutex<VecDeque<DomainResult<Vec<DateTime<Utc>>>>>,
        opens: AtomicUsize,
    }

    impl ScriptedGateway {
        fn new(scripts: Vec<DomainResult<Vec<DateTime<Utc>>>>) -> Self {
            Self { scripts: TokioMutex::new(scripts.into()), opens: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl RemoteGateway for ScriptedGateway {
        async fn sync(&self, _request: &SyncRequest) -> DomainResult<()> {
            Ok(())
        }

        async fn health(&self) -> DomainResult<()> {
            Ok(())
        }

        async fn get_statuses(&self) -> DomainResult<StatusStream> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            match self.scripts.lock().await.pop_front() {
                Some(Ok(timestamps)) => Ok(stream::iter(timestamps.into_iter().map(Ok)).boxed()),
                Some(Err(e)) => Err(e),
                // Out of script: hang until cancelled.
                None => Ok(stream::pending().boxed()),
            }
        }

        async fn get_hosts_by_uuids(&self, _uuids: &[String]) -> DomainResult<Vec<RemoteHost>> {
            Ok(Vec::new())
        }

        async fn list_all_hosts(&self) -> DomainResult<Vec<RemoteHost>> {
            Ok(Vec::new())
        }

        async fn get_hosts_in_security_group(&self, _group: &str) -> DomainResult<Vec<RemoteHost>> {
            Ok(Vec::new())
        }

        async fn close(&self) -> DomainResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingHandler {
        events: TokioMutex<Vec<ChangeEvent>>,
        fail: bool,
    }

    #[async_trait]
    impl ChangeHandler for RecordingHandler {
        async fn on_change(&self, event: &ChangeEvent) -> Result<(), SyncError> {
            self.events.lock().await.push(event.clone());
            if self.fail {
                return Err(SyncError::Internal("handler failure".to_string()));
            }
            Ok(())
        }
    }

    fn settings(max_retries: u32) -> DetectorSettings {
        DetectorSettings { reconnect_interval_ms: 5, max_retries, event_source: "test".to_string() }
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        for _ in 0..200 {
            if check() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Validates `ChangeDetector` behavior for the duplicate timestamp
    /// scenario.
    ///
    /// Assertions:
    /// - `[T, T, T+1s]` delivers exactly two events.
    /// - The duplicate is counted as suppressed.
    /// - A failing handler does not stop delivery to the others.
    #[tokio::test]
    async fn test_duplicate_timestamps_suppressed() {
        let t = Utc::now();
        let later = t + chrono::Duration::seconds(1);
        let gateway = Arc::new(ScriptedGateway::new(vec![Ok(vec![t, t, later])]));
        let detector = ChangeDetector::new(gateway, settings(0));

        let failing = Arc::new(RecordingHandler { fail: true, ..Default::default() });
        let recording = Arc::new(RecordingHandler::default());
        detector.subscribe(failing.clone());
        detector.subscribe(recording.clone());

        detector.start().await.expect("start");
        wait_until(|| detector.health().events_delivered >= 2).await;
        detector.stop().await.expect("stop");

        let events = recording.events.lock().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].timestamp, t);
        assert_eq!(events[1].timestamp, later);
        assert_eq!(events[0].source, "test");
        assert_eq!(failing.events.lock().await.len(), 2);
        assert_eq!(detector.health().events_suppressed, 1);
        assert_eq!(detector.last_observed(), Some(later));
    }

    #[tokio::test]
    async fn test_exhausts_after_max_retries() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Err(SgSyncError::Network("refused".to_string())),
            Err(SgSyncError::Network("refused".to_string())),
            Err(SgSyncError::Network("refused".to_string())),
        ]));
        let detector = ChangeDetector::new(gateway.clone(), settings(2));

        detector.start().await.expect("start");
        wait_until(|| detector.health().is_exhausted()).await;

        let health = detector.health();
        assert_eq!(health.state, DetectorState::Exhausted);
        assert_eq!(health.consecutive_failures, 3);
        assert!(health.last_error.is_some_and(|e| e.contains("refused")));
        assert_eq!(gateway.opens.load(Ordering::SeqCst), 3);

        // The loop has exited but the detector can be restarted.
        detector.start().await.expect("restart after exhaustion");
        detector.stop().await.expect("stop");
    }

    #[tokio::test]
    async fn test_closed_stream_triggers_reconnect() {
        let t = Utc::now();
        let gateway = Arc::new(ScriptedGateway::new(vec![Ok(vec![t]), Ok(vec![t])]));
        let detector = ChangeDetector::new(gateway.clone(), settings(0));
        let recording = Arc::new(RecordingHandler::default());
        detector.subscribe(recording.clone());

        detector.start().await.expect("start");
        wait_until(|| gateway.opens.load(Ordering::SeqCst) >= 3).await;
        detector.stop().await.expect("stop");

        assert!(gateway.opens.load(Ordering::SeqCst) >= 3);
        assert_eq!(recording.events.lock().await.len(), 1);
        assert_eq!(detector.health().state, DetectorState::Stopped);
    }

    #[tokio::test]
    async fn test_lifecycle_errors() {
        let gateway = Arc::new(ScriptedGateway::new(Vec::new()));
        let detector = ChangeDetector::new(gateway, settings(0));

        assert!(matches!(detector.stop().await, Err(SyncError::NotRunning(_))));
        detector.start().await.expect("start");
        assert!(matches!(detector.start().await, Err(SyncError::AlreadyRunning(_))));
        detector.stop().await.expect("stop");
    }

    #[test]
    fn test_unsubscribe_removes_only_that_handler() {
        let gateway = Arc::new(ScriptedGateway::new(Vec::new()));
        let detector = ChangeDetector::new(gateway, settings(0));

        let first = detector.subscribe(Arc::new(RecordingHandler::default()));
        let second = detector.subscribe(Arc::new(RecordingHandler::default()));

        assert!(detector.unsubscribe(second));
        assert!(!detector.unsubscribe(second));
        assert_eq!(detector.handler_count(), 1);
        assert!(detector.unsubscribe(first));
        assert_eq!(detector.handler_count(), 0);
    }
}
