//! Generic retry executor with exponential backoff and cancellable waits
//!
//! The executor runs an async operation until it succeeds, the policy says
//! stop, or the attempt budget runs out. Every backoff wait races a
//! [`CancellationToken`] so a shutdown never has to sit through a long delay.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::error::{CommonError, CommonResult, ErrorClassification};

/// Errors that can occur during retry operations
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// All retry attempts have been exhausted; carries the last failure
    #[error("All retry attempts exhausted after {attempts} tries: {source}")]
    AttemptsExhausted { attempts: u32, source: E },

    /// The operation failed with a non-retryable error
    #[error("Operation failed with non-retryable error: {source}")]
    NonRetryable { source: E },

    /// The cancellation token fired while waiting between attempts
    #[error("Retry cancelled after {attempts} attempts")]
    Cancelled { attempts: u32 },
}

impl<E> RetryError<E> {
    /// The last operation error, if the executor gave up because of one.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            Self::AttemptsExhausted { source, .. } | Self::NonRetryable { source } => Some(source),
            Self::Cancelled { .. } => None,
        }
    }

    /// Whether the executor stopped because of cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// Outcome of a retry execution including result and summary statistics.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    pub result: RetryResult<T, E>,
    /// Attempts made, including the first
    pub attempts: u32,
    /// Sum of the backoff waits that completed
    pub total_delay: Duration,
}

impl<T, E> RetryOutcome<T, E> {
    /// Consume the outcome and return only the result.
    pub fn into_result(self) -> RetryResult<T, E> {
        self.result
    }
}

/// Decides whether a failed attempt should be retried
pub trait RetryPolicy<E> {
    /// Determine if the error should be retried and optionally provide a custom
    /// delay
    fn should_retry(&self, error: &E, attempt: u32) -> RetryDecision;
}

/// Decision for whether to retry an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the operation with the default backoff delay
    Retry,
    /// Retry the operation with a custom delay
    RetryAfter(Duration),
    /// Don't retry the operation
    Stop,
}

/// Retries errors that classify themselves as retryable, honoring any
/// suggested `retry_after` delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifiedRetry;

impl<E: ErrorClassification> RetryPolicy<E> for ClassifiedRetry {
    fn should_retry(&self, error: &E, _attempt: u32) -> RetryDecision {
        if !error.is_retryable() {
            return RetryDecision::Stop;
        }
        match error.retry_after() {
            Some(delay) => RetryDecision::RetryAfter(delay),
            None => RetryDecision::Retry,
        }
    }
}

/// Exponential backoff: `min(initial_delay * base^attempt, max_delay)`
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffStrategy {
    pub initial_delay: Duration,
    pub base: f64,
    pub max_delay: Duration,
}

impl BackoffStrategy {
    /// Delay to wait after the failed attempt `attempt` (0-based).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_nanos() as f64 * self.base.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_nanos() as f64 {
            return self.max_delay;
        }
        Duration::from_nanos(scaled.max(0.0).round() as u64)
    }
}

/// Jitter type for adding randomness to retry delays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Jitter {
    /// No jitter
    #[default]
    None,
    /// Full jitter: 0 to calculated_delay
    Full,
    /// Equal jitter: calculated_delay/2 to calculated_delay
    Equal,
}

impl Jitter {
    /// Apply jitter to the calculated delay
    pub fn apply(&self, delay: Duration) -> Duration {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        match self {
            Self::None => delay,
            Self::Full if millis > 0 => {
                Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
            }
            Self::Equal if millis > 0 => {
                let half = millis / 2;
                Duration::from_millis(half + rand::thread_rng().gen_range(0..=millis - half))
            }
            Self::Full | Self::Equal => delay,
        }
    }
}

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Backoff strategy for calculating delays
    pub backoff: BackoffStrategy,
    /// Jitter type for randomizing delays
    pub jitter: Jitter,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff: BackoffStrategy {
                initial_delay: Duration::from_millis(100),
                base: 2.0,
                max_delay: Duration::from_secs(5),
            },
            jitter: Jitter::None,
        }
    }
}

impl RetryConfig {
    /// Create a configuration builder
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> CommonResult<()> {
        if self.max_attempts == 0 {
            return Err(CommonError::config_field(
                "max_attempts",
                "max_attempts must be greater than 0",
            ));
        }

        let BackoffStrategy { base, initial_delay, max_delay } = &self.backoff;
        if *base < 1.0 || !base.is_finite() {
            return Err(CommonError::config_field(
                "backoff_factor",
                "exponential base must be a finite value >= 1.0",
            ));
        }
        if initial_delay > max_delay {
            return Err(CommonError::config_field(
                "initial_delay",
                "initial delay must not exceed max delay",
            ));
        }

        Ok(())
    }
}

/// Builder for RetryConfig with fluent API
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self { config: RetryConfig::default() }
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn exponential_backoff(
        mut self,
        initial_delay: Duration,
        base: f64,
        max_delay: Duration,
    ) -> Self {
        self.config.backoff = BackoffStrategy { initial_delay, base, max_delay };
        self
    }

    pub fn jitter(mut self, jitter: Jitter) -> Self {
        self.config.jitter = jitter;
        self
    }

    pub fn build(self) -> CommonResult<RetryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// The main retry executor
#[derive(Debug, Clone)]
pub struct RetryExecutor<P> {
    config: RetryConfig,
    policy: P,
}

impl<P> RetryExecutor<P> {
    /// Create a new retry executor with the given configuration and policy
    pub fn new(config: RetryConfig, policy: P) -> Self {
        Self { config, policy }
    }

    /// The active configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute an operation with retry logic
    pub async fn execute<F, Fut, T, E>(
        &self,
        cancel: &CancellationToken,
        operation: F,
    ) -> RetryResult<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with_outcome(cancel, operation).await.into_result()
    }

    /// Execute an operation with retry logic and return outcome statistics.
    #[instrument(skip_all, fields(max_attempts = self.config.max_attempts))]
    pub async fn execute_with_outcome<F, Fut, T, E>(
        &self,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> RetryOutcome<T, E>
    where
        P: RetryPolicy<E>,
        E: fmt::Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut total_delay = Duration::ZERO;
        let mut attempt: u32 = 0;

        let finish = |result: RetryResult<T, E>, attempts: u32, total_delay: Duration| {
            RetryOutcome { result, attempts, total_delay }
        };

        loop {
            if cancel.is_cancelled() {
                return finish(Err(RetryError::Cancelled { attempts: attempt }), attempt, total_delay);
            }

            let attempt_number = attempt + 1;
            debug!(attempt = attempt_number, max = self.config.max_attempts, "executing operation");

            let error = match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "operation succeeded after retries");
                    }
                    return finish(Ok(value), attempt_number, total_delay);
                }
                Err(error) => error,
            };

            let delay = match self.policy.should_retry(&error, attempt) {
                RetryDecision::Stop => {
                    debug!(error = %error, "error is not retryable");
                    return finish(
                        Err(RetryError::NonRetryable { source: error }),
                        attempt_number,
                        total_delay,
                    );
                }
                RetryDecision::Retry => {
                    self.config.jitter.apply(self.config.backoff.calculate_delay(attempt))
                }
                RetryDecision::RetryAfter(custom) => custom,
            };

            if attempt_number >= self.config.max_attempts {
                warn!(attempts = attempt_number, error = %error, "all retry attempts exhausted");
                return finish(
                    Err(RetryError::AttemptsExhausted { attempts: attempt_number, source: error }),
                    attempt_number,
                    total_delay,
                );
            }

            warn!(
                attempt = attempt_number,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "operation failed, retrying"
            );

            tokio::select! {
                () = cancel.cancelled() => {
                    debug!(attempts = attempt_number, "retry wait cancelled");
                    return finish(
                        Err(RetryError::Cancelled { attempts: attempt_number }),
                        attempt_number,
                        total_delay,
                    );
                }
                () = tokio::time::sleep(delay) => {}
            }

            total_delay += delay;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for the retry executor, backoff and policies.

    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Instant;

    use super::*;

    #[derive(Debug)]
    struct TestError {
        retryable: bool,
    }

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test error (retryable: {})", self.retryable)
        }
    }

    impl ErrorClassification for TestError {
        fn is_retryable(&self) -> bool {
            self.retryable
        }

        fn severity(&self) -> crate::error::ErrorSeverity {
            crate::error::ErrorSeverity::Warning
        }

        fn is_critical(&self) -> bool {
            false
        }

        fn retry_after(&self) -> Option<Duration> {
            None
        }
    }

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig::builder()
            .max_attempts(max_attempts)
            .exponential_backoff(Duration::from_millis(1), 2.0, Duration::from_millis(4))
            .build()
            .expect("valid config")
    }

    /// Validates `BackoffStrategy::calculate_delay` behavior for the doubling and
    /// cap scenario.
    ///
    /// Assertions:
    /// - Confirms delays double per attempt.
    /// - Confirms the delay is capped at `max_delay`.
    #[test]
    fn test_backoff_strategy_exponential() {
        let strategy = BackoffStrategy {
            initial_delay: Duration::from_millis(100),
            base: 2.0,
            max_delay: Duration::from_secs(1),
        };

        assert_eq!(strategy.calculate_delay(0), Duration::from_millis(100));
        assert_eq!(strategy.calculate_delay(1), Duration::from_millis(200));
        assert_eq!(strategy.calculate_delay(2), Duration::from_millis(400));
        assert_eq!(strategy.calculate_delay(3), Duration::from_millis(800));
        assert_eq!(strategy.calculate_delay(4), Duration::from_secs(1));
        assert_eq!(strategy.calculate_delay(200), Duration::from_secs(1));
    }

    /// Validates `Jitter` behavior for the bounded jitter scenario.
    ///
    /// Assertions:
    /// - Confirms `Jitter::None` keeps the delay.
    /// - Ensures full and equal jitter stay within their ranges.
    #[test]
    fn test_jitter_bounds() {
        let delay = Duration::from_millis(100);
        assert_eq!(Jitter::None.apply(delay), delay);

        for _ in 0..50 {
            assert!(Jitter::Full.apply(delay) <= delay);
            let equal = Jitter::Equal.apply(delay);
            assert!(equal >= Duration::from_millis(50) && equal <= delay);
        }
        assert_eq!(Jitter::Full.apply(Duration::ZERO), Duration::ZERO);
    }

    /// Validates `RetryConfig::validate` behavior for invalid settings.
    ///
    /// Assertions:
    /// - Ensures zero attempts is rejected.
    /// - Ensures a base below 1.0 is rejected.
    #[test]
    fn test_retry_config_validation() {
        assert!(RetryConfig::builder().max_attempts(0).build().is_err());
        assert!(RetryConfig::builder()
            .exponential_backoff(Duration::from_millis(10), 0.5, Duration::from_secs(1))
            .build()
            .is_err());
        assert!(RetryConfig::default().validate().is_ok());
    }

    /// Validates `ClassifiedRetry` behavior for the classification scenario.
    ///
    /// Assertions:
    /// - Confirms retryable errors map to `Retry`.
    /// - Confirms permanent errors map to `Stop`.
    #[test]
    fn test_classified_retry_decisions() {
        let policy = ClassifiedRetry;
        assert_eq!(policy.should_retry(&TestError { retryable: true }, 0), RetryDecision::Retry);
        assert_eq!(policy.should_retry(&TestError { retryable: false }, 0), RetryDecision::Stop);
    }

    /// Validates `RetryExecutor::execute` behavior for the transient failure
    /// exhaustion scenario.
    ///
    /// Assertions:
    /// - Confirms the operation runs exactly `max_attempts` times.
    /// - Confirms the exhaustion error carries the last failure.
    #[tokio::test]
    async fn test_transient_failure_exhausts_attempts() {
        let executor = RetryExecutor::new(fast_config(4), ClassifiedRetry);
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let result: RetryResult<(), TestError> = executor
            .execute(&cancel, || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(TestError { retryable: true })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        match result {
            Err(RetryError::AttemptsExhausted { attempts, source }) => {
                assert_eq!(attempts, 4);
                assert!(source.retryable);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    /// Validates `RetryExecutor::execute` behavior for the permanent failure
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms a permanent error is attempted once.
    /// - Confirms the error surfaces as `NonRetryable`.
    #[tokio::test]
    async fn test_permanent_failure_single_attempt() {
        let executor = RetryExecutor::new(fast_config(5), ClassifiedRetry);
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let outcome = executor
            .execute_with_outcome(&cancel, || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(TestError { retryable: false })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.attempts, 1);
        assert!(matches!(outcome.result, Err(RetryError::NonRetryable { .. })));
    }

    /// Validates `RetryExecutor::execute` behavior for the eventual success
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms the value from the third attempt is returned.
    #[tokio::test]
    async fn test_success_after_retries() {
        let executor = RetryExecutor::new(fast_config(5), ClassifiedRetry);
        let calls = Arc::new(AtomicU32::new(0));
        let cancel = CancellationToken::new();

        let outcome = executor
            .execute_with_outcome(&cancel, || {
                let calls = Arc::clone(&calls);
                async move {
                    let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    if n < 3 {
                        Err(TestError { retryable: true })
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(outcome.attempts, 3);
        assert_eq!(outcome.result.ok(), Some(3));
    }

    /// Validates `RetryExecutor::execute` behavior for the cancellation during
    /// backoff scenario.
    ///
    /// Assertions:
    /// - Confirms a cancelled wait returns `Cancelled`.
    /// - Ensures the executor returns well before the backoff delay elapses.
    #[tokio::test]
    async fn test_cancel_during_backoff_returns_promptly() {
        let config = RetryConfig::builder()
            .max_attempts(3)
            .exponential_backoff(Duration::from_secs(30), 1.0, Duration::from_secs(30))
            .build()
            .expect("valid config");
        let executor = RetryExecutor::new(config, ClassifiedRetry);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let started = Instant::now();
        let result: RetryResult<(), TestError> =
            executor.execute(&cancel, || async { Err(TestError { retryable: true }) }).await;

        assert!(matches!(result, Err(RetryError::Cancelled { attempts: 1 })));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    /// Validates `RetryExecutor::execute` behavior for a token cancelled before
    /// the first attempt.
    ///
    /// Assertions:
    /// - Confirms the operation never runs.
    #[tokio::test]
    async fn test_pre_cancelled_token_skips_operation() {
        let executor = RetryExecutor::new(fast_config(3), ClassifiedRetry);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let calls = Arc::new(AtomicU32::new(0));

        let result: RetryResult<(), TestError> = executor
            .execute(&cancel, || {
                let calls = Arc::clone(&calls);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await;

        assert!(result.as_ref().is_err_and(RetryError::is_cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
