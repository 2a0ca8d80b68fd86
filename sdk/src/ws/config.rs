//! Push channel configuration.
//!
//! Provides configuration options for the WebSocket transport and the
//! channel manager's reconnect policy.

use std::time::Duration;

/// Default WebSocket URL.
pub const DEFAULT_WS_URL: &str = "ws://localhost:9001/ws";

/// Default heartbeat interval in seconds.
pub const DEFAULT_HEARTBEAT_SECS: u64 = 30;

/// Default connect timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default base reconnect delay in milliseconds.
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 3_000;

/// Default maximum automatic reconnect attempts.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

/// Push channel configuration.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// WebSocket URL.
    pub url: String,

    /// Heartbeat interval.
    pub heartbeat_interval: Duration,

    /// How long a single connect attempt may take.
    pub connect_timeout: Duration,

    /// Base reconnect delay. Attempt `n` waits `n × reconnect_delay`.
    pub reconnect_delay: Duration,

    /// Automatic reconnect attempts before giving up.
    pub max_reconnect_attempts: u32,

    /// Optional token for authentication.
    pub auth_token: Option<String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WS_URL.to_string(),
            heartbeat_interval: Duration::from_secs(DEFAULT_HEARTBEAT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            reconnect_delay: Duration::from_millis(DEFAULT_RECONNECT_DELAY_MS),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            auth_token: None,
        }
    }
}

impl ChannelConfig {
    /// Creates a new configuration with the given URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the base reconnect delay.
    #[must_use]
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Sets the maximum reconnection attempts.
    #[must_use]
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    /// Sets the auth token.
    #[must_use]
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Returns the connection URL with the auth token if set.
    #[must_use]
    pub fn connection_url(&self) -> String {
        match &self.auth_token {
            Some(token) => {
                if self.url.contains('?') {
                    format!("{}&access_token={}", self.url, token)
                } else {
                    format!("{}?access_token={}", self.url, token)
                }
            }
            None => self.url.clone(),
        }
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), super::error::WsError> {
        if self.url.is_empty() {
            return Err(super::error::WsError::InvalidConfig(
                "url cannot be empty".to_string(),
            ));
        }

        if !self.url.starts_with("ws://") && !self.url.starts_with("wss://") {
            return Err(super::error::WsError::InvalidConfig(
                "url must start with ws:// or wss://".to_string(),
            ));
        }

        if self.reconnect_delay.is_zero() {
            return Err(super::error::WsError::InvalidConfig(
                "reconnect_delay must be > 0".to_string(),
            ));
        }

        if self.heartbeat_interval.is_zero() || self.connect_timeout.is_zero() {
            return Err(super::error::WsError::InvalidConfig(
                "heartbeat_interval and connect_timeout must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}
