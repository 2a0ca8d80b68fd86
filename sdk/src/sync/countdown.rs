//! Time-remaining derivation.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Time left before bidding ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Countdown {
    /// The auction has no end time.
    Unknown,
    /// Time remaining, truncated to whole seconds.
    Remaining(Duration),
    /// The end time has passed.
    Ended,
}

impl Countdown {
    /// Derives the countdown for `end_time` as seen at `now`.
    #[must_use]
    pub fn derive(end_time: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        let Some(end_time) = end_time else {
            return Self::Unknown;
        };

        match (end_time - now).to_std() {
            Ok(left) if !left.is_zero() => Self::Remaining(Duration::from_secs(left.as_secs())),
            _ => Self::Ended,
        }
    }

    /// Returns true once the end time has passed.
    #[must_use]
    pub const fn is_ended(&self) -> bool {
        matches!(self, Self::Ended)
    }
}

impl fmt::Display for Countdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unknown => write!(f, "N/A"),
            Self::Remaining(left) => {
                let secs = left.as_secs();
                write!(f, "{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
            }
            Self::Ended => write!(f, "Ended"),
        }
    }
}
