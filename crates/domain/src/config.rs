//! Configuration management
//!
//! Every section deserializes with `#[serde(default)]`, so a config file only
//! needs the keys it wants to change.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_CLEANUP_INTERVAL_SECS, DEFAULT_DEBOUNCE_ENTRY_MAX_AGE_SECS,
    DEFAULT_DEBOUNCE_INTERVAL_MS, DEFAULT_DETECTOR_MAX_RETRIES, DEFAULT_EVENT_SOURCE,
    DEFAULT_HEALTH_CHECK_INTERVAL_SECS, DEFAULT_HOST_BATCH_SIZE, DEFAULT_HOST_SYNC_TIMEOUT_SECS,
    DEFAULT_LOG_LEVEL, DEFAULT_MAX_CONCURRENT_PROCESSORS, DEFAULT_PROCESSING_TIMEOUT_SECS,
    DEFAULT_RECONNECT_INTERVAL_MS, DEFAULT_RETRY_BACKOFF_FACTOR, DEFAULT_RETRY_INITIAL_DELAY_MS,
    DEFAULT_RETRY_MAX_DELAY_MS, DEFAULT_RETRY_MAX_RETRIES,
};
use crate::errors::{Result, SgSyncError};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub logging: LoggingSettings,
    pub sync: SyncSettings,
    pub retry: RetrySettings,
    pub detector: DetectorSettings,
    pub reverse_sync: ReverseSyncSettings,
    pub host_sync: HostSyncSettings,
    pub host_processor: HostProcessorSettings,
}

impl Config {
    /// Check cross-field constraints that serde cannot express.
    ///
    /// # Errors
    /// Returns `SgSyncError::Config` naming the first offending setting.
    pub fn validate(&self) -> Result<()> {
        self.retry.validate()?;

        if self.sync.cleanup_interval_secs == 0 {
            return Err(SgSyncError::Config(
                "sync.cleanup_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.sync.debounce_entry_max_age() < self.sync.debounce_interval() {
            return Err(SgSyncError::Config(
                "sync.debounce_entry_max_age_secs must cover sync.debounce_interval_ms".to_string(),
            ));
        }

        if self.reverse_sync.max_concurrent_processors == 0 {
            return Err(SgSyncError::Config(
                "reverse_sync.max_concurrent_processors must be greater than 0".to_string(),
            ));
        }
        if self.reverse_sync.processing_timeout_secs == 0 {
            return Err(SgSyncError::Config(
                "reverse_sync.processing_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.host_sync.sync_timeout_secs == 0 {
            return Err(SgSyncError::Config(
                "host_sync.sync_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.detector.event_source.trim().is_empty() {
            return Err(SgSyncError::Config("detector.event_source must not be empty".to_string()));
        }
        if !self.host_processor.sync_all_namespaces && self.host_processor.namespaces.is_empty() {
            return Err(SgSyncError::Config(
                "host_processor.namespaces must list at least one namespace when \
                 sync_all_namespaces is false"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: DEFAULT_LOG_LEVEL.to_string(), json: false }
    }
}

/// Push-path debounce configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    pub debounce_interval_ms: u64,
    pub cleanup_interval_secs: u64,
    pub debounce_entry_max_age_secs: u64,
}

impl SyncSettings {
    pub fn debounce_interval(&self) -> Duration {
        Duration::from_millis(self.debounce_interval_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn debounce_entry_max_age(&self) -> Duration {
        Duration::from_secs(self.debounce_entry_max_age_secs)
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            debounce_interval_ms: DEFAULT_DEBOUNCE_INTERVAL_MS,
            cleanup_interval_secs: DEFAULT_CLEANUP_INTERVAL_SECS,
            debounce_entry_max_age_secs: DEFAULT_DEBOUNCE_ENTRY_MAX_AGE_SECS,
        }
    }
}

/// Retry configuration for remote calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_factor: f64,
    /// Retries after the first attempt
    pub max_retries: u32,
    pub jitter: RetryJitter,
}

impl RetrySettings {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    fn validate(&self) -> Result<()> {
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            return Err(SgSyncError::Config(format!(
                "retry.backoff_factor must be >= 1.0, got {}",
                self.backoff_factor
            )));
        }
        if self.initial_delay_ms > self.max_delay_ms {
            return Err(SgSyncError::Config(
                "retry.initial_delay_ms must not exceed retry.max_delay_ms".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: DEFAULT_RETRY_INITIAL_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
            backoff_factor: DEFAULT_RETRY_BACKOFF_FACTOR,
            max_retries: DEFAULT_RETRY_MAX_RETRIES,
            jitter: RetryJitter::None,
        }
    }
}

/// Randomization applied to each backoff delay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryJitter {
    #[default]
    None,
    /// Anywhere between zero and the computed delay
    Full,
    /// Between half the computed delay and the full delay
    Equal,
}

impl fmt::Display for RetryJitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Full => "full",
            Self::Equal => "equal",
        })
    }
}

impl FromStr for RetryJitter {
    type Err = SgSyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(Self::None),
            "full" => Ok(Self::Full),
            "equal" => Ok(Self::Equal),
            other => Err(SgSyncError::Config(format!("unknown retry jitter '{other}'"))),
        }
    }
}

/// Change detector configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    pub reconnect_interval_ms: u64,
    /// Consecutive stream failures tolerated; 0 retries forever
    pub max_retries: u32,
    /// Label stamped on every emitted change event
    pub event_source: String,
}

impl DetectorSettings {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            max_retries: DEFAULT_DETECTOR_MAX_RETRIES,
            event_source: DEFAULT_EVENT_SOURCE.to_string(),
        }
    }
}

/// Reverse sync manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverseSyncSettings {
    pub processing_timeout_secs: u64,
    pub max_concurrent_processors: usize,
    /// Period of the health-check task; 0 disables it
    pub health_check_interval_secs: u64,
    pub enable_statistics: bool,
}

impl ReverseSyncSettings {
    pub fn processing_timeout(&self) -> Duration {
        Duration::from_secs(self.processing_timeout_secs)
    }

    /// `None` when the periodic health check is disabled.
    pub fn health_check_interval(&self) -> Option<Duration> {
        (self.health_check_interval_secs > 0)
            .then(|| Duration::from_secs(self.health_check_interval_secs))
    }
}

impl Default for ReverseSyncSettings {
    fn default() -> Self {
        Self {
            processing_timeout_secs: DEFAULT_PROCESSING_TIMEOUT_SECS,
            max_concurrent_processors: DEFAULT_MAX_CONCURRENT_PROCESSORS,
            health_check_interval_secs: DEFAULT_HEALTH_CHECK_INTERVAL_SECS,
            enable_statistics: true,
        }
    }
}

/// Host synchronizer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostSyncSettings {
    /// Hosts per remote lookup; 0 falls back to the default
    pub batch_size: usize,
    pub sync_timeout_secs: u64,
    pub enable_ip_set_validation: bool,
}

impl HostSyncSettings {
    pub fn sync_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_timeout_secs)
    }

    pub fn effective_batch_size(&self) -> usize {
        if self.batch_size == 0 {
            DEFAULT_HOST_BATCH_SIZE
        } else {
            self.batch_size
        }
    }
}

impl Default for HostSyncSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_HOST_BATCH_SIZE,
            sync_timeout_secs: DEFAULT_HOST_SYNC_TIMEOUT_SECS,
            enable_ip_set_validation: true,
        }
    }
}

/// Host processor scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostProcessorSettings {
    pub sync_all_namespaces: bool,
    /// Namespaces reconciled when `sync_all_namespaces` is false
    pub namespaces: Vec<String>,
}

impl Default for HostProcessorSettings {
    fn default() -> Self {
        Self { sync_all_namespaces: true, namespaces: Vec::new() }
    }
}
