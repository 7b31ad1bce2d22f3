//! Resilience primitives.
//!
//! - **Retry**: [`RetryExecutor`] runs a fallible async operation with
//!   exponential backoff, optional jitter and cancellable waits. The
//!   [`ClassifiedRetry`] policy lets the error decide whether another attempt
//!   makes sense through [`ErrorClassification`](crate::ErrorClassification).

pub mod retry;

pub use retry::{
    BackoffStrategy, ClassifiedRetry, Jitter, RetryConfig, RetryConfigBuilder, RetryDecision,
    RetryError, RetryExecutor, RetryOutcome, RetryPolicy, RetryResult,
};
