//! Push channel topics.

use std::fmt;

use super::auction::AuctionId;
use crate::error::SdkError;

/// Delivery scope on the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Updates for a single auction (`auction/{id}`).
    Auction(AuctionId),
    /// Every bid on every auction (`bids/*`).
    AllBids,
    /// Newly listed auctions (`auctions`).
    Auctions,
}

impl Topic {
    /// Returns the topic for an auction.
    #[must_use]
    pub fn auction(id: &AuctionId) -> Self {
        Self::Auction(id.clone())
    }

    /// Parses a topic key.
    ///
    /// # Errors
    ///
    /// Returns `SdkError::InvalidTopic` for unknown keys.
    pub fn parse(key: &str) -> Result<Self, SdkError> {
        match key {
            "bids/*" => Ok(Self::AllBids),
            "auctions" => Ok(Self::Auctions),
            _ => match key.strip_prefix("auction/") {
                Some(id) => AuctionId::parse(id)
                    .map(Self::Auction)
                    .map_err(|_| SdkError::InvalidTopic(key.to_string())),
                None => Err(SdkError::InvalidTopic(key.to_string())),
            },
        }
    }

    /// Returns true for feeds spanning many auctions.
    #[must_use]
    pub const fn is_wildcard(&self) -> bool {
        matches!(self, Self::AllBids | Self::Auctions)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auction(id) => write!(f, "auction/{}", id),
            Self::AllBids => write!(f, "bids/*"),
            Self::Auctions => write!(f, "auctions"),
        }
    }
}
