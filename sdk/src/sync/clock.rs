//! Wall-clock sources for countdown derivation.

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Source of the current wall-clock time.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;

    /// Returns the clock's name for diagnostics.
    fn name(&self) -> &str {
        "Clock"
    }
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn name(&self) -> &str {
        "SystemClock"
    }
}

/// Wall clock that advances with the tokio clock.
///
/// Captures the wall time once and adds tokio-measured elapsed time, so a
/// paused runtime freezes it and `tokio::time::advance` moves it.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeClock {
    origin: Instant,
    wall: DateTime<Utc>,
}

impl RuntimeClock {
    /// Anchors the clock at the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    /// Anchors the clock so the current instant reads as `wall`.
    #[must_use]
    pub fn starting_at(wall: DateTime<Utc>) -> Self {
        Self {
            origin: Instant::now(),
            wall,
        }
    }
}

impl Default for RuntimeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for RuntimeClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.origin.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.wall + elapsed
    }

    fn name(&self) -> &str {
        "RuntimeClock"
    }
}
