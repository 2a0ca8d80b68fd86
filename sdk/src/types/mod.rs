//! Core types for the auction live SDK.
//!
//! - [`AuctionId`], [`AuctionSnapshot`] — auction identity and state
//! - [`BidReceipt`], [`BidAmount`] — bid echo and input parsing
//! - [`Topic`] — push channel delivery scopes

pub mod auction;
pub mod bid;
pub mod topic;

pub use auction::{AuctionId, AuctionSnapshot};
pub use bid::{BidAmount, BidReceipt};
pub use topic::Topic;
