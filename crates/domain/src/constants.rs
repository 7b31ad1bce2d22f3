//! Domain-level defaults
//!
//! Centralized location for the default values used by configuration and by
//! components that fall back when a setting is out of range.

// Push path
pub const DEFAULT_DEBOUNCE_INTERVAL_MS: u64 = 1_000;
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_DEBOUNCE_ENTRY_MAX_AGE_SECS: u64 = 600;

// Retry
pub const DEFAULT_RETRY_INITIAL_DELAY_MS: u64 = 100;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 5_000;
pub const DEFAULT_RETRY_BACKOFF_FACTOR: f64 = 2.0;
pub const DEFAULT_RETRY_MAX_RETRIES: u32 = 3;

// Change detection
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_DETECTOR_MAX_RETRIES: u32 = 10;
pub const DEFAULT_EVENT_SOURCE: &str = "remote";

// Reverse sync
pub const DEFAULT_PROCESSING_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_CONCURRENT_PROCESSORS: usize = 4;
pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 30;

// Host reconciliation
pub const DEFAULT_HOST_BATCH_SIZE: usize = 100;
pub const DEFAULT_HOST_SYNC_TIMEOUT_SECS: u64 = 30;

// Logging
pub const DEFAULT_LOG_LEVEL: &str = "info";
