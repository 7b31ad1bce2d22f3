//! Modular common utilities shared across sgsync crates.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: error types and error classification
//! - `runtime`: async infrastructure (retry executor, clocks)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod resilience;

// Time abstractions (production clock + deterministic mock clock)
// ---------------------------------------------------------------
#[cfg(any(feature = "runtime", test))]
pub mod testing;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{CommonError, CommonResult, ErrorClassification, ErrorSeverity};
#[cfg(feature = "runtime")]
pub use resilience::{
    BackoffStrategy, ClassifiedRetry, Jitter, RetryConfig, RetryDecision, RetryError,
    RetryExecutor, RetryOutcome, RetryPolicy,
};
#[cfg(any(feature = "runtime", test))]
pub use testing::time::{Clock, MockClock, SystemClock};
