//! Test support shared by the sgsync crates.
//!
//! - **[`time`]**: the [`Clock`](time::Clock) abstraction with a real
//!   [`SystemClock`](time::SystemClock) and a hand-advanced
//!   [`MockClock`](time::MockClock) for deterministic debounce tests.

pub mod time;

pub use time::{Clock, MockClock, SystemClock};
