//! Common error types shared by the sgsync crates.
//!
//! Three pieces make up the error layer:
//!
//! 1. **`CommonError`**: error patterns that appear in more than one crate
//!    (timeouts, backend failures, configuration problems).
//! 2. **`ErrorClassification`**: a uniform way to ask an error whether it is
//!    retryable and how severe it is. The retry executor's `ClassifiedRetry`
//!    policy is driven entirely by this trait.
//! 3. **`ErrorSeverity`**: severity levels used for logging decisions.
//!
//! Crate-specific errors compose with `CommonError` instead of duplicating it:
//!
//! ```rust,ignore
//! #[derive(Debug, Error)]
//! pub enum SyncError {
//!     #[error("conversion failed: {0}")]
//!     Conversion(String),
//!
//!     #[error(transparent)]
//!     Common(#[from] CommonError),
//! }
//! ```

use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Result alias for operations returning [`CommonError`].
pub type CommonResult<T> = Result<T, CommonError>;

/// Error patterns shared across crates.
#[derive(Debug, Clone, Error)]
pub enum CommonError {
    /// Invalid or missing configuration
    #[error("Configuration error: {message}")]
    Config { message: String, field: Option<String> },

    /// An operation exceeded its deadline
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout { operation: String, duration: Duration },

    /// An external service failed
    #[error("Backend '{service}' error: {message}")]
    Backend { service: String, message: String, is_retryable: bool },

    /// Invariant violation or unexpected internal state
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CommonError {
    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config { message: message.into(), field: None }
    }

    /// Create a configuration error naming the offending field
    pub fn config_field<F: Into<String>, S: Into<String>>(field: F, message: S) -> Self {
        Self::Config { message: message.into(), field: Some(field.into()) }
    }

    /// Create a timeout error
    pub fn timeout<S: Into<String>>(operation: S, duration: Duration) -> Self {
        Self::Timeout { operation: operation.into(), duration }
    }

    /// Create a backend error; `is_retryable` marks transient failures
    pub fn backend<S: Into<String>, M: Into<String>>(
        service: S,
        message: M,
        is_retryable: bool,
    ) -> Self {
        Self::Backend { service: service.into(), message: message.into(), is_retryable }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal { message: message.into() }
    }
}

impl ErrorClassification for CommonError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::Backend { is_retryable, .. } => *is_retryable,
            Self::Config { .. } | Self::Internal { .. } => false,
        }
    }

    fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Timeout { .. } | Self::Backend { is_retryable: true, .. } => {
                ErrorSeverity::Warning
            }
            Self::Backend { .. } | Self::Config { .. } => ErrorSeverity::Error,
            Self::Internal { .. } => ErrorSeverity::Critical,
        }
    }

    fn is_critical(&self) -> bool {
        self.severity() == ErrorSeverity::Critical
    }

    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// Error classification trait for consistent error handling across crates
///
/// Retry decisions, log levels and health reporting all read errors through
/// this interface.
pub trait ErrorClassification {
    /// Check if this error is retryable
    ///
    /// Retryable errors are transient issues that may succeed if attempted
    /// again, such as network timeouts or temporary service unavailability.
    fn is_retryable(&self) -> bool;

    /// Get the error severity level
    fn severity(&self) -> ErrorSeverity;

    /// Check if this is a critical error requiring immediate attention
    fn is_critical(&self) -> bool;

    /// Get the suggested retry delay if applicable
    ///
    /// `Some` overrides the executor's backoff for the next attempt.
    fn retry_after(&self) -> Option<Duration>;
}

/// Error severity levels for logging and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational, typically for debugging
    Info,
    /// Warning, should be monitored but not critical
    Warning,
    /// Error, requires attention and action
    Error,
    /// Critical, immediate action required
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Warning => write!(f, "WARN"),
            Self::Error => write!(f, "ERROR"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}
