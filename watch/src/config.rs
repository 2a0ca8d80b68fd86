//! Shell configuration.
//!
//! Read from the environment once at startup.

use std::time::Duration;

use auction_live_sdk::client::ClientConfig;
use auction_live_sdk::sync::SyncConfig;
use auction_live_sdk::types::AuctionId;
use auction_live_sdk::ws::ChannelConfig;

/// Default REST base URL.
pub const DEFAULT_API_URL: &str = "http://localhost:9001/api";

/// Default push channel URL.
pub const DEFAULT_WS_URL: &str = "ws://localhost:9001/ws";

/// Configuration for the watch shell.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// REST base URL (`AUCTION_API_URL`).
    pub api_url: String,

    /// Push channel URL (`AUCTION_WS_URL`).
    pub ws_url: String,

    /// Auctions to follow (`AUCTION_IDS`, comma separated, repeats ignored).
    pub auction_ids: Vec<AuctionId>,

    /// Bearer token for both transports (`AUCTION_TOKEN`).
    pub token: Option<String>,

    /// Poll interval (`POLL_INTERVAL_MS`).
    pub poll_interval: Duration,
}

impl WatchConfig {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is malformed or no auction is given.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is malformed or no auction is given.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut auction_ids: Vec<AuctionId> = Vec::new();
        for raw in lookup("AUCTION_IDS").unwrap_or_default().split(',').map(str::trim) {
            if raw.is_empty() {
                continue;
            }
            let id = AuctionId::parse(raw).map_err(|_| ConfigError::InvalidAuctionId(raw.to_string()))?;
            // One view per auction; a second would share the first one's topic.
            if !auction_ids.contains(&id) {
                auction_ids.push(id);
            }
        }

        if auction_ids.is_empty() {
            return Err(ConfigError::NoAuctions);
        }

        let poll_interval = match lookup("POLL_INTERVAL_MS") {
            Some(raw) => {
                let ms: u64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidPollInterval(raw.clone()))?;
                if ms == 0 {
                    return Err(ConfigError::InvalidPollInterval(raw));
                }
                Duration::from_millis(ms)
            }
            None => SyncConfig::default().poll_interval,
        };

        Ok(Self {
            api_url: lookup("AUCTION_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            ws_url: lookup("AUCTION_WS_URL").unwrap_or_else(|| DEFAULT_WS_URL.to_string()),
            auction_ids,
            token: lookup("AUCTION_TOKEN").filter(|t| !t.is_empty()),
            poll_interval,
        })
    }

    /// Returns the REST client configuration.
    #[must_use]
    pub fn client(&self) -> ClientConfig {
        let config = ClientConfig::new(&self.api_url);
        match &self.token {
            Some(token) => config.with_auth_token(token),
            None => config,
        }
    }

    /// Returns the push channel configuration.
    #[must_use]
    pub fn channel(&self) -> ChannelConfig {
        let config = ChannelConfig::new(&self.ws_url);
        match &self.token {
            Some(token) => config.with_auth_token(token),
            None => config,
        }
    }

    /// Returns the view configuration.
    #[must_use]
    pub fn sync(&self) -> SyncConfig {
        SyncConfig::default().with_poll_interval(self.poll_interval)
    }
}

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No auction ids were given.
    #[error("AUCTION_IDS must name at least one auction")]
    NoAuctions,

    /// An auction id is malformed.
    #[error("invalid auction id in AUCTION_IDS: {0}")]
    InvalidAuctionId(String),

    /// The poll interval is not a positive integer.
    #[error("POLL_INTERVAL_MS must be a positive integer, got {0}")]
    InvalidPollInterval(String),
}
