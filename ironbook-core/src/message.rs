//! Classified order book messages as they leave the decoder.

use crate::types::{BookRow, InstrumentId, Nonce, Side};

/// Kind of a classified book message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Full replacement of the instrument's rows.
    Snapshot,
    /// Incremental upserts and deletions.
    Diff,
}

/// A normalized snapshot or diff for one instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBookMessage {
    /// Snapshot or diff.
    pub kind: MessageKind,
    /// Normalized `BASE-QUOTE` instrument.
    pub instrument: InstrumentId,
    /// Exchange sequence token.
    pub nonce: Nonce,
    /// Rows carried by the message.
    pub rows: Vec<BookRow>,
}

impl OrderBookMessage {
    /// Creates a snapshot message.
    #[must_use]
    pub fn snapshot(instrument: InstrumentId, nonce: Nonce, rows: Vec<BookRow>) -> Self {
        Self {
            kind: MessageKind::Snapshot,
            instrument,
            nonce,
            rows,
        }
    }

    /// Creates a diff message.
    #[must_use]
    pub fn diff(instrument: InstrumentId, nonce: Nonce, rows: Vec<BookRow>) -> Self {
        Self {
            kind: MessageKind::Diff,
            instrument,
            nonce,
            rows,
        }
    }

    /// Returns true for snapshot messages.
    #[must_use]
    pub fn is_snapshot(&self) -> bool {
        self.kind == MessageKind::Snapshot
    }

    /// Iterates over the bid rows.
    pub fn bids(&self) -> impl Iterator<Item = &BookRow> {
        self.rows.iter().filter(|r| r.side == Side::Bid)
    }

    /// Iterates over the ask rows.
    pub fn asks(&self) -> impl Iterator<Item = &BookRow> {
        self.rows.iter().filter(|r| r.side == Side::Ask)
    }
}
