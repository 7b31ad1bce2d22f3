//! Tracing setup
//!
//! Installs a global `tracing-subscriber` fmt subscriber. `RUST_LOG` takes
//! precedence over the configured level.

use sgsync_domain::LoggingSettings;
use tracing_subscriber::EnvFilter;

use crate::sync::errors::SyncError;

/// Build the filter: `RUST_LOG` if set and valid, otherwise `level`.
///
/// # Errors
/// Returns `SyncError::Config` when `level` is not a valid filter directive.
pub fn build_filter(level: &str) -> Result<EnvFilter, SyncError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| SyncError::Config(format!("invalid log level '{level}': {e}")))
}

/// Install the global subscriber.
///
/// # Errors
/// Returns `SyncError::Config` for an invalid level, or when a global
/// subscriber is already installed.
pub fn init_tracing(settings: &LoggingSettings) -> Result<(), SyncError> {
    let filter = build_filter(&settings.level)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = if settings.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| SyncError::Config(format!("failed to install tracing subscriber: {e}")))
}
