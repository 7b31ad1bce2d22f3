//! Error types used throughout the domain and its ports

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for sgsync ports and domain conversions
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum SgSyncError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Remote error: {0}")]
    Remote(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for sgsync operations
pub type Result<T> = std::result::Result<T, SgSyncError>;
