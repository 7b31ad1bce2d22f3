//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Probe the standard locations for a config file; use defaults if none
//!    exists
//! 2. Apply `SGSYNC_*` environment overrides on top
//! 3. Validate the result
//!
//! ## Environment Variables
//! - `SGSYNC_LOG_LEVEL`: default tracing filter
//! - `SGSYNC_LOG_JSON`: JSON log output (true/false)
//! - `SGSYNC_DEBOUNCE_INTERVAL_MS`: push-path debounce interval
//! - `SGSYNC_RETRY_MAX_RETRIES`: retries after the first attempt
//! - `SGSYNC_RETRY_INITIAL_DELAY_MS`: first backoff delay
//! - `SGSYNC_RETRY_MAX_DELAY_MS`: backoff cap
//! - `SGSYNC_RETRY_BACKOFF_FACTOR`: backoff multiplier
//! - `SGSYNC_RETRY_JITTER`: backoff jitter (`none`, `full`, `equal`)
//! - `SGSYNC_DETECTOR_RECONNECT_INTERVAL_MS`: wait between stream reconnects
//! - `SGSYNC_DETECTOR_MAX_RETRIES`: consecutive stream failures tolerated
//!   (0 = forever)
//! - `SGSYNC_EVENT_SOURCE`: source label on change events
//! - `SGSYNC_PROCESSING_TIMEOUT_SECS`: shared timeout for one fan-out
//! - `SGSYNC_MAX_CONCURRENT_PROCESSORS`: processors running at once
//! - `SGSYNC_HEALTH_CHECK_INTERVAL_SECS`: health probe period (0 = off)
//! - `SGSYNC_HOST_BATCH_SIZE`: hosts per remote lookup
//! - `SGSYNC_HOST_SYNC_TIMEOUT_SECS`: remote lookup timeout
//! - `SGSYNC_IP_SET_VALIDATION`: validate remote IP entries (true/false)
//! - `SGSYNC_NAMESPACES`: comma-separated namespace allow-list; setting it
//!   disables all-namespace reconciliation
//!
//! ## File Locations
//! The loader probes (in order) `sgsync.{toml,json}` and
//! `config.{toml,json}` in the working directory, its parent and grandparent,
//! then next to the executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use sgsync_domain::{Config, Result, SgSyncError};

const CONFIG_FILE_NAMES: &[&str] = &["sgsync.toml", "sgsync.json", "config.toml", "config.json"];

/// Load configuration from the first file found (or defaults), apply
/// environment overrides and validate.
///
/// # Errors
/// Returns `SgSyncError::Config` if the file cannot be parsed, an override
/// has an invalid value, or validation fails.
pub fn load() -> Result<Config> {
    let config = match probe_config_paths() {
        Some(path) => load_from_file(&path)?,
        None => {
            tracing::debug!("No config file found, using defaults");
            Config::default()
        }
    };

    let config = apply_overrides(config, |key| std::env::var(key).ok())?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file. No overrides, no validation.
///
/// # Errors
/// Returns `SgSyncError::Config` if the file is missing, unreadable or
/// malformed.
pub fn load_from_file(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Err(SgSyncError::Config(format!("Config file not found: {}", path.display())));
    }

    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| SgSyncError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, path)
}

/// Parse configuration text; format is chosen by the extension of `path`
/// (`.toml` or `.json`, JSON when absent).
///
/// # Errors
/// Returns `SgSyncError::Config` for an unsupported extension or invalid
/// content.
pub fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| SgSyncError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| SgSyncError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(SgSyncError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file among the standard locations.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.clone());
        dirs.push(cwd.join(".."));
        dirs.push(cwd.join("../.."));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Apply `SGSYNC_*` overrides read through `lookup`.
///
/// `lookup` is `std::env::var` in production; tests pass a map.
///
/// # Errors
/// Returns `SgSyncError::Config` naming the variable with an unparsable
/// value.
pub fn apply_overrides<F>(mut config: Config, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(level) = lookup("SGSYNC_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = env_bool(&lookup, "SGSYNC_LOG_JSON") {
        config.logging.json = json;
    }

    override_parsed(&lookup, "SGSYNC_DEBOUNCE_INTERVAL_MS", &mut config.sync.debounce_interval_ms)?;

    override_parsed(&lookup, "SGSYNC_RETRY_MAX_RETRIES", &mut config.retry.max_retries)?;
    override_parsed(&lookup, "SGSYNC_RETRY_INITIAL_DELAY_MS", &mut config.retry.initial_delay_ms)?;
    override_parsed(&lookup, "SGSYNC_RETRY_MAX_DELAY_MS", &mut config.retry.max_delay_ms)?;
    override_parsed(&lookup, "SGSYNC_RETRY_BACKOFF_FACTOR", &mut config.retry.backoff_factor)?;
    override_parsed(&lookup, "SGSYNC_RETRY_JITTER", &mut config.retry.jitter)?;

    override_parsed(
        &lookup,
        "SGSYNC_DETECTOR_RECONNECT_INTERVAL_MS",
        &mut config.detector.reconnect_interval_ms,
    )?;
    override_parsed(&lookup, "SGSYNC_DETECTOR_MAX_RETRIES", &mut config.detector.max_retries)?;
    if let Some(source) = lookup("SGSYNC_EVENT_SOURCE") {
        config.detector.event_source = source;
    }

    override_parsed(
        &lookup,
        "SGSYNC_PROCESSING_TIMEOUT_SECS",
        &mut config.reverse_sync.processing_timeout_secs,
    )?;
    override_parsed(
        &lookup,
        "SGSYNC_MAX_CONCURRENT_PROCESSORS",
        &mut config.reverse_sync.max_concurrent_processors,
    )?;
    override_parsed(
        &lookup,
        "SGSYNC_HEALTH_CHECK_INTERVAL_SECS",
        &mut config.reverse_sync.health_check_interval_secs,
    )?;

    override_parsed(&lookup, "SGSYNC_HOST_BATCH_SIZE", &mut config.host_sync.batch_size)?;
    override_parsed(
        &lookup,
        "SGSYNC_HOST_SYNC_TIMEOUT_SECS",
        &mut config.host_sync.sync_timeout_secs,
    )?;
    if let Some(validate) = env_bool(&lookup, "SGSYNC_IP_SET_VALIDATION") {
        config.host_sync.enable_ip_set_validation = validate;
    }

    if let Some(list) = lookup("SGSYNC_NAMESPACES") {
        let namespaces: Vec<String> = list
            .split(',')
            .map(str::trim)
            .filter(|ns| !ns.is_empty())
            .map(str::to_string)
            .collect();
        if !namespaces.is_empty() {
            config.host_processor.sync_all_namespaces = false;
            config.host_processor.namespaces = namespaces;
        }
    }

    Ok(config)
}

/// Overwrite `target` when `key` is set.
fn override_parsed<F, T>(lookup: &F, key: &str, target: &mut T) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(raw) = lookup(key) {
        *target = raw
            .trim()
            .parse()
            .map_err(|e| SgSyncError::Config(format!("Invalid value for {key}: {e}")))?;
    }
    Ok(())
}

/// Parse boolean from a variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive).
/// Anything else counts as false; `None` when unset.
fn env_bool<F>(lookup: &F, key: &str) -> Option<bool>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}
