//! Error types for client operations.

use thiserror::Error;

/// Error type for feed client operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// WebSocket transport error.
    #[error("websocket error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    /// Outbound frame could not be encoded.
    #[error("encode error: {0}")]
    Encode(#[from] ironbook_core::Error),

    /// Connection timeout.
    #[error("connection timeout")]
    ConnectTimeout,

    /// Connection closed by the server.
    #[error("connection closed")]
    ConnectionClosed,

    /// Operation requires a live connection.
    #[error("not connected")]
    NotConnected,

    /// Transport-specific failure.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
    },
}

impl ClientError {
    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ClientError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::WebSocket(Box::new(err))
    }
}

/// Error type for request signing.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The shared secret was rejected by the MAC.
    #[error("invalid signing key")]
    InvalidKey,

    /// Login payload could not be serialized.
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}
