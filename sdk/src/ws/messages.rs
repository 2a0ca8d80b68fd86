//! Push channel message types.
//!
//! [`PushMessage`] is the decoded payload delivered to topic listeners.
//! [`ClientFrame`] and [`ServerFrame`] are the envelope [`WsTransport`]
//! speaks on the socket.
//!
//! [`WsTransport`]: super::transport::WsTransport

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::WsError;
use crate::types::AuctionId;

/// Decoded push payload.
///
/// The server historically named these `BID_PLACED` and `AUCTION_CLOSED`;
/// both spellings are accepted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum PushMessage {
    /// A new highest bid.
    #[serde(rename = "PRICE_UPDATE", alias = "BID_PLACED", rename_all = "camelCase")]
    PriceUpdate {
        /// New current price.
        current_price: Decimal,
        /// Price before this bid.
        previous_price: Option<Decimal>,
        /// Auction the bid belongs to (present on wildcard feeds).
        auction_id: Option<AuctionId>,
        /// Masked bidder identity.
        bidder: Option<String>,
        /// Server timestamp.
        timestamp: Option<String>,
    },

    /// Bidding has closed.
    #[serde(rename = "CLOSED", alias = "AUCTION_CLOSED", rename_all = "camelCase")]
    Closed {
        /// Final hammer price.
        final_price: Decimal,
        /// Auction that closed.
        auction_id: Option<AuctionId>,
        /// Masked winner identity, if any.
        winner: Option<String>,
        /// Number of bids placed.
        total_bids: Option<u64>,
        /// Server timestamp.
        timestamp: Option<String>,
    },

    /// A new auction was listed.
    #[serde(rename = "AUCTION_CREATED", rename_all = "camelCase")]
    AuctionCreated {
        /// New auction id.
        auction_id: AuctionId,
        /// Opening price.
        start_price: Option<Decimal>,
        /// Listing title.
        fish_name: Option<String>,
        /// Market location.
        location: Option<String>,
    },

    /// Any other message type.
    #[serde(other)]
    Unknown,
}

impl PushMessage {
    /// Decodes a text payload.
    ///
    /// # Errors
    ///
    /// Returns `WsError::Malformed` for malformed JSON or a known
    /// message type with missing/invalid fields.
    pub fn decode(payload: &str) -> Result<Self, WsError> {
        serde_json::from_str(payload).map_err(|e| WsError::Malformed(e.to_string()))
    }

    /// Returns true for message types the client does not understand.
    #[must_use]
    pub const fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }
}

/// Client-to-server frames.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientFrame {
    /// Open a subscription.
    Subscribe {
        /// Client-assigned subscription id.
        id: String,
        /// Topic key.
        topic: String,
    },
    /// Close a subscription.
    Unsubscribe {
        /// Subscription id.
        id: String,
    },
    /// Publish a payload to a destination.
    Send {
        /// Destination key.
        destination: String,
        /// Payload text.
        body: String,
    },
    /// Heartbeat.
    Ping {
        /// Timestamp in milliseconds.
        timestamp: i64,
    },
}

/// Server-to-client frames.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    /// A payload published on a topic.
    Message {
        /// Topic key.
        topic: String,
        /// Payload, either a JSON string or an inline JSON value.
        body: Value,
    },
    /// Heartbeat reply.
    Pong {
        /// Echoed timestamp.
        #[serde(default)]
        timestamp: Option<i64>,
    },
    /// Server-side error.
    Error {
        /// Error code.
        code: String,
        /// Error message.
        message: String,
    },
}

/// Returns a frame body as payload text.
pub(crate) fn body_text(body: Value) -> String {
    match body {
        Value::String(text) => text,
        other => other.to_string(),
    }
}
