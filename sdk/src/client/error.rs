//! REST client errors.
//!
//! Besides success, a call ends in one of four ways: the auction does not
//! exist, the server is down, the server refuses the request, or no usable
//! answer arrives at all. The sync layer treats every one of them as
//! recoverable; only the initial load and bid submission surface them.

/// Failure of an auction REST call.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server has no such resource (404).
    #[error("{0} not found")]
    NotFound(String),

    /// The server answered with a 5xx status.
    #[error("server unavailable ({status}): {message}")]
    Unavailable {
        /// HTTP status.
        status: u16,
        /// Server message, or the raw body.
        message: String,
    },

    /// The server refused the request with a 4xx status, such as a bid
    /// that does not beat the current price or a missing login.
    #[error("rejected ({status}): {message}")]
    Rejected {
        /// HTTP status.
        status: u16,
        /// Server message, or the raw body.
        message: String,
    },

    /// The request got no answer: connect failure, timeout or reset.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A success response whose body is not what the API promises.
    #[error("unexpected response body: {0}")]
    Decode(String),

    /// The client configuration cannot be used.
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl ClientError {
    /// Returns true if the auction does not exist.
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if the server refused the request itself.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Returns the HTTP status the server answered with, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::NotFound(_) => Some(404),
            Self::Unavailable { status, .. } | Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}
