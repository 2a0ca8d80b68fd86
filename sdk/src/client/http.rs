//! HTTP client implementation.
//!
//! Provides the request/response client for the auction REST API.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::{de::DeserializeOwned, Deserialize};
use tracing::debug;

use super::config::ClientConfig;
use super::error::ClientError;
use crate::types::bid::BidRequest;
use crate::types::{AuctionId, AuctionSnapshot, BidReceipt};

/// Request/response operations the sync layer needs from the server.
#[async_trait]
pub trait AuctionApi: Send + Sync {
    /// Fetches the current snapshot of an auction.
    async fn fetch_auction(&self, id: &AuctionId) -> Result<AuctionSnapshot, ClientError>;

    /// Places a bid on an auction.
    async fn place_bid(&self, id: &AuctionId, amount: Decimal) -> Result<BidReceipt, ClientError>;
}

/// Server error body: `{ "message": ... }`, possibly with more fields.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    message: Option<String>,
}

/// HTTP client for the auction REST API.
#[derive(Debug, Clone)]
pub struct AuctionClient {
    config: ClientConfig,
    http: reqwest::Client,
}

impl AuctionClient {
    /// Creates a new client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be created.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        config.validate()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(ref token) = config.auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| ClientError::InvalidConfig(format!("auth_token: {}", e)))?;
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .user_agent(&config.user_agent)
            .build()
            .map_err(ClientError::Transport)?;

        Ok(Self { config, http })
    }

    /// Creates a new client with default configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_defaults() -> Result<Self, ClientError> {
        Self::new(ClientConfig::default())
    }

    /// Creates a new client with the given base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, ClientError> {
        Self::new(ClientConfig::new(base_url))
    }

    /// Returns the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Sends a request and decodes the JSON body.
    ///
    /// 404 maps to `NotFound`, other 4xx to `Rejected` and 5xx to
    /// `Unavailable`. Nothing is retried here; polling is the retry.
    async fn execute<T: DeserializeOwned>(
        &self,
        resource: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, ClientError> {
        let resp = request.send().await?;
        let status = resp.status();

        if status.is_success() {
            let body = resp.text().await?;
            return serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()));
        }

        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(resource.to_string()));
        }

        let body = resp.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }

    /// Gets an auction by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the auction is not found.
    pub async fn get_auction(&self, id: &AuctionId) -> Result<AuctionSnapshot, ClientError> {
        let url = self.config.url(&format!("/auctions/{}", id));
        debug!(auction = %id, "fetching auction");
        self.execute(&format!("auction {}", id), self.http.get(&url))
            .await
    }

    /// Places a bid.
    ///
    /// # Errors
    ///
    /// Returns an error if the server rejects the bid or the request fails.
    pub async fn post_bid(
        &self,
        id: &AuctionId,
        amount: Decimal,
    ) -> Result<BidReceipt, ClientError> {
        let url = self.config.url(&format!("/auctions/{}/bid", id));
        debug!(auction = %id, %amount, "placing bid");
        self.execute(
            &format!("auction {}", id),
            self.http.post(&url).json(&BidRequest { amount }),
        )
        .await
    }
}

#[async_trait]
impl AuctionApi for AuctionClient {
    async fn fetch_auction(&self, id: &AuctionId) -> Result<AuctionSnapshot, ClientError> {
        self.get_auction(id).await
    }

    async fn place_bid(&self, id: &AuctionId, amount: Decimal) -> Result<BidReceipt, ClientError> {
        self.post_bid(id, amount).await
    }
}

/// Classifies a non-success response other than 404.
fn status_error(status: StatusCode, body: &str) -> ClientError {
    let message = match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(ApiErrorResponse {
            message: Some(message),
        }) => message,
        _ if body.is_empty() => status.canonical_reason().unwrap_or_default().to_string(),
        _ => body.to_string(),
    };

    if status.is_server_error() {
        ClientError::Unavailable {
            status: status.as_u16(),
            message,
        }
    } else {
        ClientError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}
