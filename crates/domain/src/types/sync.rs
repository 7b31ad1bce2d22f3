//! Sync operations, subjects and change events

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::remote::RemoteRecord;
use crate::errors::Result;

/// What a push should do on the remote side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    /// Accepted and ignored
    NoOp,
    /// Replace the remote set for the subject
    FullSync,
    Upsert,
    /// Always bypasses debounce
    Delete,
}

impl fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NoOp => "noop",
            Self::FullSync => "full_sync",
            Self::Upsert => "upsert",
            Self::Delete => "delete",
        };
        f.write_str(label)
    }
}

/// Kind of object being synchronized. Dispatch key for syncers and
/// processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncSubjectType {
    Groups,
    Networks,
    Hosts,
    Rules,
    Services,
}

impl SyncSubjectType {
    pub const ALL: [Self; 5] =
        [Self::Groups, Self::Networks, Self::Hosts, Self::Rules, Self::Services];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Groups => "groups",
            Self::Networks => "networks",
            Self::Hosts => "hosts",
            Self::Rules => "rules",
            Self::Services => "services",
        }
    }
}

impl fmt::Display for SyncSubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability of a local resource to be pushed to the remote system.
pub trait SyncableEntity: Send + Sync + fmt::Debug {
    /// Subject this entity is routed to.
    fn subject_type(&self) -> SyncSubjectType;

    /// Stable key used for debouncing; empty keys are rejected.
    fn sync_key(&self) -> String;

    /// Convert into the remote wire record.
    ///
    /// # Errors
    /// Returns `SgSyncError::Conversion` when the entity cannot be expressed
    /// remotely.
    fn to_remote(&self) -> Result<RemoteRecord>;
}

/// "Something changed remotely, re-derive your state."
///
/// Carries no payload beyond when and where the change was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub timestamp: DateTime<Utc>,
    pub source: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ChangeEvent {
    pub fn new(timestamp: DateTime<Utc>, source: impl Into<String>) -> Self {
        Self { timestamp, source: source.into(), metadata: HashMap::new() }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
