//! Feed frame decoding and classification.
//!
//! Inbound frames are JSON envelopes. Book payloads inside them are base64
//! strings holding DEFLATE-compressed JSON. Everything here is pure: a frame
//! that cannot be decoded yields `None` and is dropped by the caller, it is
//! never an error.
//!
//! ```text
//! snapshot: {"R": "<base64>", "I": "1"}
//! diff:     {"C": "...", "M": [{"H": "C2", "M": "uE", "A": ["<base64>"]}]}
//! ```

use crate::message::{MessageKind, OrderBookMessage};
use crate::types::{BookRow, InstrumentId, Nonce, Side, to_fixed};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flate2::read::{DeflateDecoder, ZlibDecoder};
use serde::Deserialize;
use serde_json::Value;
use std::io::Read;

/// Hub method name carried by market delta frames.
pub const MARKET_DELTA_METHOD: &str = "uE";

/// Row type marking a removed price level in diff payloads.
const ROW_TYPE_REMOVE: u8 = 1;

/// Classification of a raw envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameClass {
    /// Response to an explicit snapshot query.
    Snapshot,
    /// Pushed market delta.
    Diff,
    /// Anything else (acks, heartbeats, unrelated hub traffic).
    None,
}

/// Classifies a parsed envelope.
///
/// A frame is a snapshot when it carries a non-boolean `R` field (boolean
/// results are subscription acks), and a diff when its first hub message is
/// a market delta.
#[must_use]
pub fn classify(envelope: &Value) -> FrameClass {
    match envelope.get("R") {
        Some(Value::Bool(_)) | None => {}
        Some(_) => return FrameClass::Snapshot,
    }

    let is_delta = envelope
        .get("M")
        .and_then(Value::as_array)
        .and_then(|messages| messages.first())
        .and_then(Value::as_object)
        .and_then(|first| first.get("M"))
        .and_then(Value::as_str)
        == Some(MARKET_DELTA_METHOD);

    if is_delta {
        FrameClass::Diff
    } else {
        FrameClass::None
    }
}

/// Decodes one raw text frame into a normalized book message.
///
/// Returns `None` for irrelevant frames and for any frame whose payload is
/// malformed.
#[must_use]
pub fn decode_frame(raw: &str) -> Option<OrderBookMessage> {
    let envelope: Value = serde_json::from_str(raw).ok()?;

    let (kind, encoded) = match classify(&envelope) {
        FrameClass::Snapshot => (MessageKind::Snapshot, envelope.get("R")?.as_str()?),
        FrameClass::Diff => (
            MessageKind::Diff,
            envelope
                .get("M")?
                .get(0)?
                .get("A")?
                .get(0)?
                .as_str()?,
        ),
        FrameClass::None => return None,
    };

    let payload = decode_payload(encoded)?;
    let book: WireBook = serde_json::from_slice(&payload).ok()?;
    book.into_message(kind)
}

/// Decodes a base64 payload, inflating it with raw DEFLATE first and falling
/// back to zlib framing.
#[must_use]
pub fn decode_payload(encoded: &str) -> Option<Vec<u8>> {
    let compressed = STANDARD.decode(encoded.trim()).ok()?;

    let mut out = Vec::new();
    if DeflateDecoder::new(compressed.as_slice())
        .read_to_end(&mut out)
        .is_ok()
    {
        return Some(out);
    }

    out.clear();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut out)
        .ok()
        .map(|_| out)
}

/// Decompressed book payload as sent by the exchange.
#[derive(Debug, Deserialize)]
struct WireBook {
    /// Market name in `QUOTE-BASE` order.
    #[serde(rename = "M")]
    market: String,
    #[serde(rename = "N")]
    nonce: Nonce,
    #[serde(rename = "Z", default)]
    buys: Vec<WireRow>,
    #[serde(rename = "S", default)]
    sells: Vec<WireRow>,
}

#[derive(Debug, Deserialize)]
struct WireRow {
    #[serde(rename = "TY", default)]
    row_type: Option<u8>,
    #[serde(rename = "R")]
    rate: f64,
    #[serde(rename = "Q")]
    quantity: f64,
}

impl WireBook {
    fn into_message(self, kind: MessageKind) -> Option<OrderBookMessage> {
        let instrument = InstrumentId::from_wire(&self.market).ok()?;

        let mut rows = Vec::with_capacity(self.buys.len() + self.sells.len());
        for row in &self.buys {
            rows.push(row.to_row(Side::Bid)?);
        }
        for row in &self.sells {
            rows.push(row.to_row(Side::Ask)?);
        }

        Some(OrderBookMessage {
            kind,
            instrument,
            nonce: self.nonce,
            rows,
        })
    }
}

impl WireRow {
    fn to_row(&self, side: Side) -> Option<BookRow> {
        let price = to_fixed(self.rate)?;
        if price <= 0 {
            return None;
        }
        let size = if self.row_type == Some(ROW_TYPE_REMOVE) {
            0
        } else {
            u64::try_from(to_fixed(self.quantity)?).ok()?
        };
        Some(BookRow::new(side, price, size))
    }
}
