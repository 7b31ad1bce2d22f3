//! Sync-specific error types
//!
//! Provides error classification for sync operations. Remote and storage
//! failures arrive as text, so their retryability is decided from the message:
//! constraint-style messages are permanent, connectivity-style messages are
//! transient, and anything unrecognized is retried.

use std::time::Duration;

use sgsync_common::error::{CommonError, ErrorClassification, ErrorSeverity};
use sgsync_common::RetryError;
use sgsync_domain::{SgSyncError, SyncSubjectType};
use thiserror::Error;

/// Message fragments that mark a failure as permanent. Checked first.
const PERMANENT_PATTERNS: &[&str] = &[
    "integrity",
    "unique",
    "constraint",
    "duplicate key",
    "already exists",
    "foreign key",
    "violates",
];

/// Message fragments that mark a failure as transient.
const TRANSIENT_PATTERNS: &[&str] = &[
    "timeout",
    "timed out",
    "unavailable",
    "connection",
    "network",
    "deadline exceeded",
    "temporarily",
    "reset by peer",
    "broken pipe",
];

/// Categories of sync errors for retry logic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncErrorCategory {
    /// Caller error (invalid entity, unknown subject, duplicate registration)
    InvalidArgument,
    /// Entity could not be converted to its remote form
    Conversion,
    /// Remote or storage failure that may succeed on retry
    Transient,
    /// Remote or storage failure that will not succeed on retry
    Permanent,
    /// Remote or storage failure matching no known pattern; retried
    Unknown,
    /// Start/stop misuse
    Lifecycle,
    /// Work was cancelled
    Cancelled,
    /// Invalid configuration
    Config,
}

/// Sync operation errors
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No syncer registered for subject '{0}'")]
    SyncerNotRegistered(SyncSubjectType),

    #[error("Subject mismatch: expected '{expected}', got '{actual}'")]
    SubjectMismatch { expected: SyncSubjectType, actual: SyncSubjectType },

    #[error("Processor for entity type '{0}' is already registered")]
    DuplicateProcessor(SyncSubjectType),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0} is already running")]
    AlreadyRunning(String),

    #[error("{0} is not running")]
    NotRunning(String),

    #[error("Retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted { attempts: u32, source: Box<SyncError> },

    #[error("{0}")]
    Aggregate(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Common(#[from] CommonError),
}

/// Classify free-form failure text.
fn classify_message(message: &str) -> SyncErrorCategory {
    let lower = message.to_ascii_lowercase();
    if PERMANENT_PATTERNS.iter().any(|p| lower.contains(p)) {
        return SyncErrorCategory::Permanent;
    }
    if TRANSIENT_PATTERNS.iter().any(|p| lower.contains(p)) {
        return SyncErrorCategory::Transient;
    }
    SyncErrorCategory::Unknown
}

impl SyncError {
    /// Get the error category for this error
    pub fn category(&self) -> SyncErrorCategory {
        match self {
            Self::InvalidArgument(_)
            | Self::SyncerNotRegistered(_)
            | Self::SubjectMismatch { .. }
            | Self::DuplicateProcessor(_) => SyncErrorCategory::InvalidArgument,
            Self::Conversion(_) => SyncErrorCategory::Conversion,
            Self::Remote(message) | Self::Storage(message) => classify_message(message),
            Self::Network(_) | Self::Timeout(_) => SyncErrorCategory::Transient,
            Self::NotFound(_)
            | Self::RetriesExhausted { .. }
            | Self::Aggregate(_)
            | Self::Internal(_) => SyncErrorCategory::Permanent,
            Self::Config(_) => SyncErrorCategory::Config,
            Self::Cancelled => SyncErrorCategory::Cancelled,
            Self::AlreadyRunning(_) | Self::NotRunning(_) => SyncErrorCategory::Lifecycle,
            Self::Common(err) => {
                if err.is_retryable() {
                    SyncErrorCategory::Transient
                } else {
                    SyncErrorCategory::Permanent
                }
            }
        }
    }

    /// Check if this error should be retried
    pub fn should_retry(&self) -> bool {
        matches!(self.category(), SyncErrorCategory::Transient | SyncErrorCategory::Unknown)
    }
}

impl ErrorClassification for SyncError {
    fn is_retryable(&self) -> bool {
        self.should_retry()
    }

    fn severity(&self) -> ErrorSeverity {
        match self.category() {
            SyncErrorCategory::Cancelled => ErrorSeverity::Info,
            SyncErrorCategory::Transient
            | SyncErrorCategory::Unknown
            | SyncErrorCategory::Lifecycle => ErrorSeverity::Warning,
            SyncErrorCategory::InvalidArgument
            | SyncErrorCategory::Conversion
            | SyncErrorCategory::Permanent
            | SyncErrorCategory::Config => ErrorSeverity::Error,
        }
    }

    fn is_critical(&self) -> bool {
        matches!(self, Self::Internal(_))
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Common(err) => err.retry_after(),
            _ => None,
        }
    }
}

/// Convert from SgSyncError to SyncError
impl From<SgSyncError> for SyncError {
    fn from(err: SgSyncError) -> Self {
        match err {
            SgSyncError::Database(message) => Self::Storage(message),
            SgSyncError::Remote(message) => Self::Remote(message),
            SgSyncError::Network(message) => Self::Network(message),
            SgSyncError::Conversion(message) => Self::Conversion(message),
            SgSyncError::Config(message) => Self::Config(message),
            SgSyncError::NotFound(message) => Self::NotFound(message),
            SgSyncError::InvalidInput(message) => Self::InvalidArgument(message),
            SgSyncError::Internal(message) => Self::Internal(message),
        }
    }
}

/// Unwrap retry executor outcomes into the underlying sync error
impl From<RetryError<SyncError>> for SyncError {
    fn from(err: RetryError<SyncError>) -> Self {
        match err {
            RetryError::AttemptsExhausted { attempts, source } => {
                Self::RetriesExhausted { attempts, source: Box::new(source) }
            }
            RetryError::NonRetryable { source } => source,
            RetryError::Cancelled { .. } => Self::Cancelled,
        }
    }
}
