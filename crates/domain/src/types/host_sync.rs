//! Host reconciliation results

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::identity::ResourceIdentifier;

/// Outcome of one reconciliation pass. Built fresh per pass and returned by
/// value; partial failures are recorded per host uuid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSyncResult {
    pub synced_hosts: Vec<String>,
    pub failed_hosts: Vec<String>,
    /// Error text per failed host uuid
    pub errors: HashMap<String, String>,
    pub total_requested: usize,
    pub total_synced: usize,
    pub total_failed: usize,
    /// Free-form annotations (scope, batch counts, ...)
    pub details: HashMap<String, String>,
}

impl HostSyncResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count `count` more hosts as targeted by this pass.
    pub fn add_requested(&mut self, count: usize) {
        self.total_requested += count;
    }

    /// Mark one host as written back.
    pub fn record_synced(&mut self, uuid: impl Into<String>) {
        self.synced_hosts.push(uuid.into());
        self.total_synced += 1;
    }

    /// Mark one host as failed, keeping `error` under its uuid. A later
    /// failure for the same uuid replaces the stored text.
    pub fn record_failed(&mut self, uuid: impl Into<String>, error: impl Into<String>) {
        let uuid = uuid.into();
        self.errors.insert(uuid.clone(), error.into());
        self.failed_hosts.push(uuid);
        self.total_failed += 1;
    }

    /// Set a free-form annotation, replacing any previous value.
    pub fn set_detail(&mut self, key: impl Into<String>, value: impl ToString) {
        self.details.insert(key.into(), value.to_string());
    }

    /// Fold another pass into this one. Details from `other` win on key
    /// collisions.
    pub fn merge(&mut self, other: Self) {
        self.synced_hosts.extend(other.synced_hosts);
        self.failed_hosts.extend(other.failed_hosts);
        self.errors.extend(other.errors);
        self.total_requested += other.total_requested;
        self.total_synced += other.total_synced;
        self.total_failed += other.total_failed;
        self.details.extend(other.details);
    }

    /// Percentage of requested hosts that were synced; 0 when nothing was
    /// requested.
    pub fn success_rate(&self) -> f64 {
        if self.total_requested == 0 {
            return 0.0;
        }
        self.total_synced as f64 / self.total_requested as f64 * 100.0
    }

    /// True when no host failed. An empty pass counts as a success.
    pub fn is_complete_success(&self) -> bool {
        self.total_failed == 0
    }
}

/// Derived IP set to write back for one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostIpSetUpdate {
    pub identifier: ResourceIdentifier,
    pub uuid: String,
    pub ip_set: Vec<String>,
}
