//! SDK error types.
//!
//! Provides error types for value validation shared across the SDK.

/// SDK errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SdkError {
    /// Invalid auction identifier.
    #[error("invalid auction id: {0}")]
    InvalidAuctionId(String),

    /// Invalid topic key.
    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    /// Invalid bid amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),
}
