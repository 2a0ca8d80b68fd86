//! Live view synchronization.
//!
//! A [`ViewSynchronizer`] keeps one auction's [`SnapshotStore`] current:
//! push updates while the channel is connected, a fixed-interval re-fetch
//! otherwise, and a locally ticking [`Countdown`] in both modes.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use auction_live_sdk::client::AuctionClient;
//! use auction_live_sdk::sync::{SyncConfig, ViewEvent, ViewSynchronizer};
//! use auction_live_sdk::types::AuctionId;
//!
//! let view = ViewSynchronizer::start(
//!     AuctionId::from(42),
//!     channel.clone(),
//!     Arc::new(AuctionClient::with_defaults()?),
//!     SyncConfig::default(),
//! )
//! .await?;
//!
//! let mut events = view.events();
//! while let Ok(event) = events.recv().await {
//!     if let ViewEvent::Flash { price } = event {
//!         println!("new price: {}", price);
//!     }
//! }
//! view.teardown().await;
//! ```

pub mod clock;
pub mod config;
pub mod countdown;
pub mod error;
pub mod store;
pub mod view;

pub use clock::{Clock, RuntimeClock, SystemClock};
pub use config::SyncConfig;
pub use countdown::Countdown;
pub use error::{BidError, SyncError};
pub use store::SnapshotStore;
pub use view::{SyncMode, ViewEvent, ViewSynchronizer};
