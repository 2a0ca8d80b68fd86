//! HTTP client for the auction REST API.
//!
//! The sync layer depends on the [`AuctionApi`] trait; [`AuctionClient`] is
//! the reqwest-backed implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use auction_live_sdk::client::{AuctionClient, ClientConfig};
//! use auction_live_sdk::AuctionId;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = AuctionClient::new(
//!         ClientConfig::new("http://localhost:9001/api").with_auth_token("jwt"),
//!     )?;
//!
//!     let auction = client.get_auction(&AuctionId::from(7)).await?;
//!     println!("{} at {}", auction.title(), auction.current_price);
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod http;

pub use config::ClientConfig;
pub use error::ClientError;
pub use http::{AuctionApi, AuctionClient};
