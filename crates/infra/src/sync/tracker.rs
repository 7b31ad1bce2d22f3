//! Debounce gate and per-subject statistics for the push path.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use sgsync_common::{Clock, SystemClock};
use sgsync_domain::{SyncOperation, SyncSubjectType};
use tracing::debug;

/// Last allowed sync for one key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebounceEntry {
    pub key: String,
    pub last_sync_time: Instant,
    pub operation: SyncOperation,
}

/// Counters for one subject type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubjectSyncStats {
    pub total_syncs: u64,
    pub successful_syncs: u64,
    pub failed_syncs: u64,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub last_operation: Option<SyncOperation>,
}

/// Suppresses repeated syncs of the same key within the debounce interval
/// and keeps per-subject counters.
///
/// `should_sync` checks and refreshes an entry under one write lock, so two
/// concurrent callers for the same key cannot both be allowed.
pub struct SyncTracker {
    debounce_interval: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, DebounceEntry>>,
    stats: RwLock<HashMap<SyncSubjectType, SubjectSyncStats>>,
}

impl std::fmt::Debug for SyncTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncTracker")
            .field("debounce_interval", &self.debounce_interval)
            .field("entries", &self.entries.read().len())
            .finish_non_exhaustive()
    }
}

impl SyncTracker {
    pub fn new(debounce_interval: Duration) -> Self {
        Self::with_clock(debounce_interval, Arc::new(SystemClock))
    }

    /// Tracker reading time from `clock`; tests pass a `MockClock`.
    pub fn with_clock(debounce_interval: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            debounce_interval,
            clock,
            entries: RwLock::new(HashMap::new()),
            stats: RwLock::new(HashMap::new()),
        }
    }

    pub fn debounce_interval(&self) -> Duration {
        self.debounce_interval
    }

    /// Decide whether `key` may be synced now and record the attempt if so.
    ///
    /// Allowed when the key was never seen, when the last allowed sync is at
    /// least one debounce interval old, or when `operation` is a delete.
    pub fn should_sync(&self, key: &str, operation: SyncOperation) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries.write();

        let allowed = match entries.get(key) {
            None => true,
            Some(_) if operation == SyncOperation::Delete => true,
            Some(entry) => now.saturating_duration_since(entry.last_sync_time) >= self.debounce_interval,
        };

        if allowed {
            entries.insert(
                key.to_string(),
                DebounceEntry { key: key.to_string(), last_sync_time: now, operation },
            );
        } else {
            debug!(key, %operation, "sync suppressed by debounce");
        }
        allowed
    }

    /// Record an attempt for `key` without consulting the debounce window.
    pub fn should_sync_forced(&self, key: &str, operation: SyncOperation) -> bool {
        let now = self.clock.now();
        self.entries.write().insert(
            key.to_string(),
            DebounceEntry { key: key.to_string(), last_sync_time: now, operation },
        );
        true
    }

    /// Count one sync outcome against `subject`.
    pub fn track(&self, subject: SyncSubjectType, operation: SyncOperation, success: bool) {
        let now = DateTime::<Utc>::from(self.clock.system_time());
        let mut stats = self.stats.write();
        let entry = stats.entry(subject).or_default();

        entry.total_syncs += 1;
        if success {
            entry.successful_syncs += 1;
        } else {
            entry.failed_syncs += 1;
        }
        entry.last_sync_time = Some(now);
        entry.last_operation = Some(operation);
    }

    /// Drop entries whose last allowed sync is older than `max_age`.
    /// Returns how many were removed.
    ///
    /// An entry still inside its debounce window is never dropped, so the
    /// effective age is `max(max_age, debounce_interval)`.
    pub fn cleanup_old_entries(&self, max_age: Duration) -> usize {
        let now = self.clock.now();
        let max_age = max_age.max(self.debounce_interval);
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|_, entry| now.saturating_duration_since(entry.last_sync_time) <= max_age);
        before - entries.len()
    }

    /// Snapshot of all subject counters.
    pub fn stats(&self) -> HashMap<SyncSubjectType, SubjectSyncStats> {
        self.stats.read().clone()
    }

    pub fn subject_stats(&self, subject: SyncSubjectType) -> Option<SubjectSyncStats> {
        self.stats.read().get(&subject).cloned()
    }

    pub fn entry(&self, key: &str) -> Option<DebounceEntry> {
        self.entries.read().get(key).cloned()
    }

    /// Number of keys currently held in the debounce map.
    pub fn tracked_keys(&self) -> usize {
        self.entries.read().len()
    }
}
