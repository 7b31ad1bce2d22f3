//! # SgSync Domain
//!
//! Domain types for the security-group synchronization engine.
//!
//! This crate contains:
//! - Local resource models (services, address groups, networks, hosts, rules)
//! - The remote wire model and sync request envelopes
//! - Domain error types and Result definitions
//! - Configuration structures
//!
//! ## Architecture
//! - No dependencies on other sgsync crates
//! - Only external dependencies allowed
//! - Pure domain models and data structures

pub mod config;
pub mod constants;
pub mod errors;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
