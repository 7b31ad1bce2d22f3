//! Time abstraction for testability
//!
//! Components that make time-based decisions (debounce windows, age-based
//! sweeps) read time through [`Clock`] so tests can move time forward without
//! sleeping.
//!
//! ```rust,ignore
//! use std::time::Duration;
//!
//! use sgsync_common::testing::{Clock, MockClock};
//!
//! let clock = MockClock::new();
//! let start = clock.now();
//! clock.advance(Duration::from_millis(1100));
//! assert_eq!(clock.since(start), Duration::from_millis(1100));
//! ```

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of monotonic and wall-clock time.
pub trait Clock: Send + Sync {
    /// Current monotonic instant
    fn now(&self) -> Instant;

    /// Current wall-clock time
    fn system_time(&self) -> SystemTime;

    /// Time elapsed since `earlier`, saturating at zero.
    fn since(&self, earlier: Instant) -> Duration {
        self.now().saturating_duration_since(earlier)
    }

    /// Milliseconds since the UNIX epoch
    fn millis_since_epoch(&self) -> u64 {
        let millis = self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        u64::try_from(millis).unwrap_or(u64::MAX)
    }
}

/// Real system clock. Use this in production code.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Manually advanced clock for deterministic tests.
///
/// Clones share the same elapsed counter, so a test can keep one handle and
/// hand another to the component under test.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
    base_system_time: SystemTime,
}

impl MockClock {
    /// Create a mock clock frozen at the current real time.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
            base_system_time: SystemTime::now(),
        }
    }

    /// Move the clock forward by `duration`.
    pub fn advance(&self, duration: Duration) {
        // Test utility: panic on poisoned mutex to fail tests early
        let mut elapsed = self.elapsed.lock().expect("mutex poisoned");
        *elapsed += duration;
    }

    /// Set the total simulated time since creation.
    pub fn set_elapsed(&self, duration: Duration) {
        // Test utility: panic on poisoned mutex to fail tests early
        let mut elapsed = self.elapsed.lock().expect("mutex poisoned");
        *elapsed = duration;
    }

    /// Total simulated time since creation.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        // Test utility: panic on poisoned mutex to fail tests early
        *self.elapsed.lock().expect("mutex poisoned")
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        self.base_system_time + self.elapsed()
    }
}
