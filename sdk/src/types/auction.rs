//! Auction types.
//!
//! Provides the auction identifier and the authoritative auction snapshot.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::SdkError;

/// Opaque auction identifier.
///
/// The server hands out numeric ids, but the client never does arithmetic
/// on them, so they are kept as text. Deserializes from either a JSON string
/// or a JSON integer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AuctionId(String);

impl AuctionId {
    /// Parses an auction id.
    ///
    /// # Errors
    ///
    /// Returns `SdkError::InvalidAuctionId` if the id is empty or contains
    /// `/`, which would make the derived topic key ambiguous.
    pub fn parse(value: impl Into<String>) -> Result<Self, SdkError> {
        let value = value.into();
        let trimmed = value.trim();

        if trimmed.is_empty() {
            return Err(SdkError::InvalidAuctionId("id cannot be empty".to_string()));
        }

        if trimmed.contains('/') {
            return Err(SdkError::InvalidAuctionId(format!(
                "id cannot contain '/': {}",
                trimmed
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AuctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<u64> for AuctionId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl std::str::FromStr for AuctionId {
    type Err = SdkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for AuctionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match RawId::deserialize(deserializer)? {
            RawId::Number(n) => Ok(Self::from(n)),
            RawId::Text(s) => Self::parse(s).map_err(serde::de::Error::custom),
        }
    }
}

/// Point-in-time state of an auction as reported by the server.
///
/// Fields the sync layer does not interpret (name, location, images, ...)
/// are preserved in [`AuctionSnapshot::display`] so the UI can render them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuctionSnapshot {
    /// Auction id.
    pub id: AuctionId,

    /// Highest accepted bid, or the start price if no bids yet.
    pub current_price: Decimal,

    /// Opening price.
    pub start_price: Decimal,

    /// Whether bidding is still open.
    pub active: bool,

    /// When bidding opened.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,

    /// When bidding closes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    /// Passthrough display fields.
    #[serde(flatten)]
    pub display: Map<String, Value>,
}

impl AuctionSnapshot {
    /// Creates a snapshot with no display fields.
    #[must_use]
    pub fn new(id: AuctionId, current_price: Decimal, start_price: Decimal, active: bool) -> Self {
        Self {
            id,
            current_price,
            start_price,
            active,
            start_time: None,
            end_time: None,
            display: Map::new(),
        }
    }

    /// Sets the end time.
    #[must_use]
    pub fn with_end_time(mut self, end_time: DateTime<Utc>) -> Self {
        self.end_time = Some(end_time);
        self
    }

    /// Returns true if bidding is open at `now`.
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.active && self.end_time.is_some_and(|end| now < end)
    }

    /// Returns a passthrough display field.
    #[must_use]
    pub fn display_field(&self, name: &str) -> Option<&Value> {
        self.display.get(name)
    }

    /// Returns the listing title, falling back to the id.
    #[must_use]
    pub fn title(&self) -> String {
        self.display
            .get("fishName")
            .or_else(|| self.display.get("title"))
            .and_then(Value::as_str)
            .map_or_else(|| format!("auction {}", self.id), str::to_string)
    }
}
