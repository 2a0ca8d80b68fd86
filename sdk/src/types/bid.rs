//! Bid types.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SdkError;

/// Server echo of an accepted bid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BidReceipt {
    /// Accepted amount.
    pub amount: Decimal,

    /// When the server recorded the bid.
    #[serde(default)]
    pub bid_time: Option<DateTime<Utc>>,

    /// Remaining fields (bid id, bidder, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Request body for placing a bid.
#[derive(Debug, Clone, Copy, Serialize)]
pub(crate) struct BidRequest {
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

/// User-entered bid amount.
pub struct BidAmount;

impl BidAmount {
    /// Parses a bid amount typed by the user.
    ///
    /// # Errors
    ///
    /// Returns `SdkError::InvalidAmount` for empty, non-numeric or
    /// non-finite input (`NaN`, `inf`).
    pub fn parse(input: &str) -> Result<Decimal, SdkError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(SdkError::InvalidAmount("amount is required".to_string()));
        }

        Decimal::from_str(trimmed)
            .or_else(|_| Decimal::from_scientific(trimmed))
            .map_err(|_| SdkError::InvalidAmount(format!("not a number: {}", trimmed)))
    }
}
