//! Push channel for real-time auction updates.
//!
//! [`ChannelManager`] keeps one logical connection over a [`PushTransport`],
//! multiplexes topic subscriptions on it and reconnects with a bounded,
//! linearly growing delay. [`WsTransport`] is the WebSocket transport.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use auction_live_sdk::types::{AuctionId, Topic};
//! use auction_live_sdk::ws::{ChannelConfig, ChannelManager, WsTransport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ChannelConfig::new("wss://auction.example/ws");
//!     let transport = Arc::new(WsTransport::new(config.clone())?);
//!     let channel = ChannelManager::new(transport, config)?;
//!
//!     channel.connect().await?;
//!     let topic = Topic::auction(&AuctionId::from(42));
//!     channel.subscribe(topic, |msg| println!("received: {:?}", msg));
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod messages;
pub mod transport;

pub use channel::{
    ChannelLease, ChannelManager, ConnectionObserver, ConnectionState, MessageListener,
    ReconnectBudget, SubscriptionHandle,
};
pub use config::ChannelConfig;
pub use error::WsError;
pub use messages::{ClientFrame, PushMessage, ServerFrame};
pub use transport::{PushTransport, TransportEvent, WireId, WsTransport};
