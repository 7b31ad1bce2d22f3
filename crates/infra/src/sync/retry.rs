//! Retry executor for remote calls on the push path.

use sgsync_common::{ClassifiedRetry, Jitter, RetryConfig, RetryExecutor};
use sgsync_domain::{RetryJitter, RetrySettings};

use super::errors::SyncError;

/// Executor used for every remote sync: exponential backoff, retry decided by
/// [`SyncError`] classification.
pub type SyncRetryExecutor = RetryExecutor<ClassifiedRetry>;

/// Build the executor from configuration.
///
/// `max_retries` counts retries, so the executor makes `max_retries + 1`
/// attempts. Jitter is off unless the settings ask for it.
///
/// # Errors
/// Returns `SyncError::Common` when the settings do not form a valid retry
/// configuration.
pub fn build_retry_executor(settings: &RetrySettings) -> Result<SyncRetryExecutor, SyncError> {
    let config = RetryConfig::builder()
        .max_attempts(settings.max_retries.saturating_add(1))
        .exponential_backoff(
            settings.initial_delay(),
            settings.backoff_factor,
            settings.max_delay(),
        )
        .jitter(jitter_for(settings.jitter))
        .build()?;

    Ok(RetryExecutor::new(config, ClassifiedRetry))
}

fn jitter_for(jitter: RetryJitter) -> Jitter {
    match jitter {
        RetryJitter::None => Jitter::None,
        RetryJitter::Full => Jitter::Full,
        RetryJitter::Equal => Jitter::Equal,
    }
}
