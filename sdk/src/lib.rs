//! Auction Live SDK - client-side synchronization for live auctions.
//!
//! This crate keeps a displayed auction current in the face of an
//! unreliable push channel. It falls back to polling when the channel is
//! down, returns to push when it recovers, and derives a local countdown
//! from the auction's end time.
//!
//! # Modules
//!
//! - [`types`] — [`AuctionId`], [`AuctionSnapshot`], [`BidReceipt`], [`Topic`]
//! - [`client`] — REST client for snapshots and bids
//! - [`ws`] — push transport and the shared [`ChannelManager`]
//! - [`sync`] — per-auction [`ViewSynchronizer`]
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use auction_live_sdk::{AuctionClient, ChannelManager, SyncConfig, ViewSynchronizer};
//! use auction_live_sdk::ws::{ChannelConfig, WsTransport};
//! use auction_live_sdk::types::AuctionId;
//!
//! let config = ChannelConfig::new("wss://auction.example/ws");
//! let channel = ChannelManager::new(Arc::new(WsTransport::new(config.clone())?), config)?;
//! let api = Arc::new(AuctionClient::with_base_url("https://auction.example/api")?);
//!
//! let view = ViewSynchronizer::start(AuctionId::from(42), channel, api, SyncConfig::default()).await?;
//! println!("{} ends in {}", view.snapshot().title(), view.countdown());
//! ```

pub mod client;
pub mod error;
pub mod sync;
pub mod types;
pub mod ws;

#[cfg(test)]
mod testing;

pub use client::{AuctionApi, AuctionClient, ClientConfig, ClientError};
pub use error::SdkError;
pub use sync::{
    BidError, Countdown, SyncConfig, SyncError, SyncMode, ViewEvent, ViewSynchronizer,
};
pub use types::{AuctionId, AuctionSnapshot, BidAmount, BidReceipt, Topic};
pub use ws::{ChannelConfig, ChannelManager, ConnectionState, PushMessage, WsError};
