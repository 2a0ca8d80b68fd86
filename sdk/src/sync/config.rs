//! View synchronizer configuration.

use std::time::Duration;

use super::error::SyncError;

/// Default poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;

/// Default countdown tick in milliseconds.
pub const DEFAULT_COUNTDOWN_INTERVAL_MS: u64 = 1_000;

/// Default flash duration in milliseconds.
pub const DEFAULT_FLASH_DURATION_MS: u64 = 2_000;

/// Default capacity of a view's event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// View synchronizer configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Re-fetch interval while polling.
    pub poll_interval: Duration,

    /// Countdown recomputation interval.
    pub countdown_interval: Duration,

    /// How long a price flash stays on.
    pub flash_duration: Duration,

    /// Buffered view events per subscriber before the oldest are dropped.
    pub event_capacity: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            countdown_interval: Duration::from_millis(DEFAULT_COUNTDOWN_INTERVAL_MS),
            flash_duration: Duration::from_millis(DEFAULT_FLASH_DURATION_MS),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl SyncConfig {
    /// Sets the poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the countdown interval.
    #[must_use]
    pub fn with_countdown_interval(mut self, interval: Duration) -> Self {
        self.countdown_interval = interval;
        self
    }

    /// Sets the flash duration.
    #[must_use]
    pub fn with_flash_duration(mut self, duration: Duration) -> Self {
        self.flash_duration = duration;
        self
    }

    /// Sets the event channel capacity.
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any interval is zero or the capacity is zero.
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.poll_interval.is_zero() || self.countdown_interval.is_zero() {
            return Err(SyncError::InvalidConfig(
                "poll_interval and countdown_interval must be > 0".to_string(),
            ));
        }

        if self.event_capacity == 0 {
            return Err(SyncError::InvalidConfig(
                "event_capacity must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
