//! Error types for book reconstruction.

use ironbook_core::InstrumentId;
use std::time::Duration;
use thiserror::Error;

/// Error applying a message to an instrument's book. Always retryable.
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Message was routed to the wrong reconciler.
    #[error("message for {got} routed to {expected} reconciler")]
    InstrumentMismatch {
        /// Instrument owned by the reconciler.
        expected: InstrumentId,
        /// Instrument carried by the message.
        got: InstrumentId,
    },

    /// Row cannot be applied to a book.
    #[error("invalid row at nonce {nonce}: price {price}")]
    InvalidRow {
        /// Nonce of the offending message.
        nonce: u64,
        /// Offending fixed-point price.
        price: i64,
    },
}

/// Error waiting for a requested snapshot.
#[derive(Debug, Error)]
pub enum SyncError {
    /// No matching snapshot arrived in time. The request can be retried.
    #[error("no snapshot for {instrument} within {waited:?}")]
    Timeout {
        /// Instrument the snapshot was requested for.
        instrument: InstrumentId,
        /// How long the caller waited.
        waited: Duration,
    },
}

/// Error fetching the instrument catalog.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Request failed before a response was read.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("catalog request failed with HTTP status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// Server answered but flagged the request as unsuccessful.
    #[error("catalog request rejected by exchange")]
    Rejected,
}

/// Error loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration is not valid JSON for the expected shape.
    #[error("parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field holds an unusable value.
    #[error("invalid {field}: {reason}")]
    Invalid {
        /// Field name.
        field: &'static str,
        /// What is wrong with it.
        reason: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: &'static str) -> Self {
        Self::Invalid { field, reason }
    }
}

/// Error type for tracker operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// Configuration rejected at setup.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Tracker was already started.
    #[error("tracker already started")]
    AlreadyStarted,

    /// Operation needs a tracked instrument.
    #[error("{instrument} is not tracked")]
    NotTracked {
        /// Requested instrument.
        instrument: InstrumentId,
    },

    /// The feed driver is not running.
    #[error("feed driver is not running")]
    DriverClosed,

    /// Snapshot request failed.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Instrument catalog failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
