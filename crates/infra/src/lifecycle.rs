//! Background task ownership shared by the long-running components.
//!
//! A [`BackgroundTask`] owns one spawned task plus the cancellation token that
//! stops it. The token is replaced after every stop so a component can be
//! restarted, and callers may borrow the current token to make their own
//! waits (retry backoff, processing fan-out) stop together with the task.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Mutex as TokioMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::sync::errors::SyncError;

type TaskHandle = Arc<TokioMutex<Option<JoinHandle<()>>>>;

/// Join timeout used when stopping a task.
pub const DEFAULT_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// One owned background task with explicit start/stop.
#[derive(Debug)]
pub struct BackgroundTask {
    name: &'static str,
    cancellation: Mutex<CancellationToken>,
    task_handle: TaskHandle,
    join_timeout: Duration,
}

impl BackgroundTask {
    pub fn new(name: &'static str) -> Self {
        Self::with_join_timeout(name, DEFAULT_JOIN_TIMEOUT)
    }

    pub fn with_join_timeout(name: &'static str, join_timeout: Duration) -> Self {
        Self {
            name,
            cancellation: Mutex::new(CancellationToken::new()),
            task_handle: Arc::new(TokioMutex::new(None)),
            join_timeout,
        }
    }

    /// Token for the current run. Cancelled by the next [`stop`](Self::stop).
    pub fn token(&self) -> CancellationToken {
        self.cancellation.lock().clone()
    }

    /// True while a spawned task has not finished.
    pub async fn is_running(&self) -> bool {
        let guard = self.task_handle.lock().await;
        guard.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Spawn the task body with the current token.
    ///
    /// # Errors
    /// Returns `SyncError::AlreadyRunning` if a previous run is still active.
    pub async fn spawn<F, Fut>(&self, body: F) -> Result<(), SyncError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut guard = self.task_handle.lock().await;
        if guard.as_ref().is_some_and(|handle| !handle.is_finished()) {
            return Err(SyncError::AlreadyRunning(self.name.to_string()));
        }

        let cancel = {
            let mut token = self.cancellation.lock();
            if token.is_cancelled() {
                *token = CancellationToken::new();
            }
            token.clone()
        };

        *guard = Some(tokio::spawn(body(cancel)));
        debug!(task = self.name, "background task spawned");
        Ok(())
    }

    /// Cancel the current run and wait for the task to finish.
    ///
    /// The token is always cancelled and replaced, even when no task was
    /// spawned, so in-flight waits borrowed from [`token`](Self::token) end.
    /// Returns whether a task had been spawned.
    ///
    /// # Errors
    /// Returns `SyncError::Timeout` when the task does not finish within the
    /// join timeout and `SyncError::Internal` if it panicked.
    pub async fn stop(&self) -> Result<bool, SyncError> {
        {
            let mut token = self.cancellation.lock();
            token.cancel();
            *token = CancellationToken::new();
        }

        let Some(handle) = self.task_handle.lock().await.take() else {
            return Ok(false);
        };

        match tokio::time::timeout(self.join_timeout, handle).await {
            Ok(Ok(())) => Ok(true),
            Ok(Err(e)) => {
                warn!(task = self.name, error = %e, "background task panicked");
                Err(SyncError::Internal(format!("{} task panicked: {e}", self.name)))
            }
            Err(_) => {
                warn!(task = self.name, "background task did not complete within timeout");
                Err(SyncError::Timeout(self.join_timeout))
            }
        }
    }
}

impl Drop for BackgroundTask {
    fn drop(&mut self) {
        self.cancellation.lock().cancel();
    }
}
