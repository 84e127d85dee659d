//! Outbound hub invocation encoding.
//!
//! The feed is driven by named hub invocations carrying the feed-order
//! instrument name as the sole argument:
//!
//! ```text
//! {"H": "c2", "M": "SubscribeToExchangeDeltas", "A": ["USD-BTC"], "I": 0}
//! ```

use crate::error::Result;
use crate::types::InstrumentId;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::write::DeflateEncoder;
use serde::Serialize;
use std::io::Write;

/// Hub method subscribing to an instrument's delta stream.
pub const SUBSCRIBE_METHOD: &str = "SubscribeToExchangeDeltas";

/// Hub method requesting a full book snapshot.
pub const QUERY_STATE_METHOD: &str = "queryExchangeState";

/// A single hub invocation frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HubInvocation {
    /// Hub name.
    #[serde(rename = "H")]
    pub hub: String,
    /// Method name.
    #[serde(rename = "M")]
    pub method: String,
    /// Positional arguments.
    #[serde(rename = "A")]
    pub args: Vec<String>,
    /// Invocation id echoed back in responses.
    #[serde(rename = "I")]
    pub id: u64,
}

impl HubInvocation {
    /// Creates an invocation of `method` on `hub`.
    #[must_use]
    pub fn new(hub: impl Into<String>, method: impl Into<String>, args: Vec<String>, id: u64) -> Self {
        Self {
            hub: hub.into(),
            method: method.into(),
            args,
            id,
        }
    }

    /// Creates a delta subscription for `instrument`.
    #[must_use]
    pub fn subscribe(hub: &str, instrument: &InstrumentId, id: u64) -> Self {
        Self::new(hub, SUBSCRIBE_METHOD, vec![instrument.to_wire()], id)
    }

    /// Creates a snapshot query for `instrument`.
    #[must_use]
    pub fn query_state(hub: &str, instrument: &InstrumentId, id: u64) -> Self {
        Self::new(hub, QUERY_STATE_METHOD, vec![instrument.to_wire()], id)
    }

    /// Serializes the invocation to its JSON text frame.
    ///
    /// # Errors
    /// Returns [`crate::Error::Encode`] if serialization fails.
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Compresses a payload with raw DEFLATE and base64-encodes it, mirroring
/// the exchange's payload framing.
///
/// # Errors
/// Returns an IO error if compression fails.
pub fn compress_payload(payload: &[u8]) -> std::io::Result<String> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(payload)?;
    Ok(STANDARD.encode(encoder.finish()?))
}
