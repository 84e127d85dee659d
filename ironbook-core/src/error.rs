//! Error types for IronBook core operations.

use thiserror::Error;

/// Core error type for IronBook operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Instrument name is not a valid pair.
    #[error("invalid instrument: {value:?}")]
    InvalidInstrument {
        /// Offending value.
        value: String,
    },

    /// Outbound frame could not be serialized.
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

impl Error {
    /// Creates an invalid instrument error.
    pub fn invalid_instrument(value: impl Into<String>) -> Self {
        Self::InvalidInstrument {
            value: value.into(),
        }
    }
}

/// Result type alias for IronBook core operations.
pub type Result<T> = std::result::Result<T, Error>;
