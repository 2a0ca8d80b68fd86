//! Push channel errors.
//!
//! These never reach the user on their own: a failed connect or a broken
//! socket sends the views to polling, and a bad payload is dropped.

/// Failure on the push channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WsError {
    /// The socket could not be opened or the handshake timed out.
    #[error("cannot reach push server: {0}")]
    Connection(String),

    /// The socket broke after it was open.
    #[error("socket error: {0}")]
    Socket(String),

    /// An outbound frame could not be encoded.
    #[error("cannot encode frame: {0}")]
    Encode(String),

    /// An inbound payload is not a push message.
    #[error("malformed push payload: {0}")]
    Malformed(String),

    /// The operation needs a live connection.
    #[error("push channel not connected")]
    NotConnected,

    /// The connection was closed while the operation ran.
    #[error("push channel closed")]
    Closed,

    /// The topic could not be registered on the wire.
    #[error("cannot subscribe: {0}")]
    Subscribe(String),

    /// The socket writer task has stopped.
    #[error("socket writer stopped")]
    WriterStopped,

    /// The channel configuration cannot be used.
    #[error("invalid channel configuration: {0}")]
    InvalidConfig(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for WsError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Socket(err.to_string())
    }
}
