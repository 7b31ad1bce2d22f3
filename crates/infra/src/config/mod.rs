//! Configuration loading
//!
//! Reads a [`Config`](sgsync_domain::Config) from a TOML or JSON file (or
//! defaults), then applies `SGSYNC_*` environment overrides and validates.

pub mod loader;

// Re-export commonly used items
pub use loader::{apply_overrides, load, load_from_file, parse_config, probe_config_paths};
