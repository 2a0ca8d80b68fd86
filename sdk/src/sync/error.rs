//! View synchronizer errors.

use rust_decimal::Decimal;

use crate::client::ClientError;
use crate::types::AuctionId;

/// Errors starting a view.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The auction does not exist.
    #[error("auction {0} not found")]
    NotFound(AuctionId),

    /// The initial snapshot could not be loaded.
    #[error("auction {id} unavailable: {source}")]
    Unavailable {
        /// Auction that failed to load.
        id: AuctionId,
        /// Underlying client error.
        #[source]
        source: ClientError,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SyncError {
    /// Maps an initial fetch failure.
    pub(crate) fn from_fetch(id: &AuctionId, err: ClientError) -> Self {
        if err.is_not_found() {
            Self::NotFound(id.clone())
        } else {
            Self::Unavailable {
                id: id.clone(),
                source: err,
            }
        }
    }
}

/// Errors placing a bid.
#[derive(Debug, thiserror::Error)]
pub enum BidError {
    /// The amount is not a finite positive number.
    #[error("invalid bid amount: {0}")]
    InvalidAmount(String),

    /// The amount does not beat the current price.
    #[error("bid {amount} must be higher than {current}")]
    TooLow {
        /// Current price.
        current: Decimal,
        /// Offered amount.
        amount: Decimal,
    },

    /// Bidding has ended.
    #[error("auction is closed")]
    Closed,

    /// The server refused the bid.
    #[error("bid rejected: {0}")]
    Rejected(#[from] ClientError),
}
