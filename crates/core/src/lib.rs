//! # SgSync Core
//!
//! Port interfaces and pure helpers - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for the remote system and local storage
//! - Pure validation helpers shared by the reconciliation path
//!
//! ## Architecture Principles
//! - Only depends on `sgsync-domain`
//! - No database, network or runtime code
//! - All external dependencies via traits

pub mod hosts;
pub mod sync;
pub mod utils;

pub use hosts::ports::HostRepository;
pub use sync::ports::{RemoteGateway, StatusStream};
pub use utils::ip::{filter_valid_ips, is_valid_ip_entry};
