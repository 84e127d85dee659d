//! Order book management.

use crate::reconciler::SyncState;
use ironbook_core::{BookRow, InstrumentId, Nonce, Side, Timestamp};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Price level in order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceLevel {
    /// Fixed-point price.
    pub price: i64,
    /// Fixed-point size resting at this level.
    pub size: u64,
}

/// One side of the order book.
#[derive(Debug, Clone)]
pub struct BookSide {
    levels: BTreeMap<i64, u64>,
    is_bid: bool,
}

impl BookSide {
    /// Creates a new book side.
    #[must_use]
    pub fn new(is_bid: bool) -> Self {
        Self {
            levels: BTreeMap::new(),
            is_bid,
        }
    }

    /// Upserts a level, or removes it when `size` is zero.
    #[inline]
    pub fn update(&mut self, price: i64, size: u64) {
        if size == 0 {
            self.levels.remove(&price);
        } else {
            self.levels.insert(price, size);
        }
    }

    /// Returns the top of book (best price).
    #[inline]
    #[must_use]
    pub fn top(&self) -> Option<PriceLevel> {
        let (price, size) = if self.is_bid {
            self.levels.iter().next_back()?
        } else {
            self.levels.iter().next()?
        };
        Some(PriceLevel {
            price: *price,
            size: *size,
        })
    }

    /// Returns the N best levels, best first.
    #[must_use]
    pub fn best_n(&self, n: usize) -> Vec<PriceLevel> {
        let to_level = |(price, size): (&i64, &u64)| PriceLevel {
            price: *price,
            size: *size,
        };
        if self.is_bid {
            self.levels.iter().rev().take(n).map(to_level).collect()
        } else {
            self.levels.iter().take(n).map(to_level).collect()
        }
    }

    /// Returns the size resting at a specific price.
    #[must_use]
    pub fn get(&self, price: i64) -> Option<u64> {
        self.levels.get(&price).copied()
    }

    /// Clears all levels.
    pub fn clear(&mut self) {
        self.levels.clear();
    }

    /// Returns the number of price levels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Returns true if there are no levels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Full order book for an instrument.
#[derive(Debug, Clone)]
pub struct OrderBook {
    /// Instrument identifier.
    pub instrument: InstrumentId,
    /// Bid side.
    pub bids: BookSide,
    /// Ask side.
    pub asks: BookSide,
    /// Nonce of the last applied snapshot or diff.
    pub last_nonce: Nonce,
    /// When the book last changed.
    pub last_update: Timestamp,
}

impl OrderBook {
    /// Creates an empty order book for the given instrument.
    #[must_use]
    pub fn new(instrument: InstrumentId) -> Self {
        Self {
            instrument,
            bids: BookSide::new(true),
            asks: BookSide::new(false),
            last_nonce: 0,
            last_update: Timestamp::EPOCH,
        }
    }

    /// Returns the bid-ask spread.
    #[inline]
    #[must_use]
    pub fn spread(&self) -> Option<i64> {
        match (self.bids.top(), self.asks.top()) {
            (Some(bid), Some(ask)) => Some(ask.price - bid.price),
            _ => None,
        }
    }

    /// Returns the best bid level.
    #[inline]
    #[must_use]
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids.top()
    }

    /// Returns the best ask level.
    #[inline]
    #[must_use]
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks.top()
    }

    /// Applies one row to its side.
    #[inline]
    pub fn apply_row(&mut self, row: &BookRow) {
        match row.side {
            Side::Bid => self.bids.update(row.price, row.size),
            Side::Ask => self.asks.update(row.price, row.size),
        }
    }

    /// Applies a diff's rows in order.
    pub fn apply_diff(&mut self, nonce: Nonce, rows: &[BookRow], at: Timestamp) {
        for row in rows {
            self.apply_row(row);
        }
        self.last_nonce = nonce;
        self.last_update = at;
    }

    /// Replaces the entire book.
    pub fn apply_snapshot(&mut self, nonce: Nonce, rows: &[BookRow], at: Timestamp) {
        self.bids.clear();
        self.asks.clear();
        self.apply_diff(nonce, rows, at);
    }
}

/// Point-in-time copy of a book for readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookSnapshot {
    /// Instrument identifier.
    pub instrument: InstrumentId,
    /// Reconciliation state when the copy was taken.
    pub state: SyncState,
    /// Nonce of the last applied message.
    pub last_nonce: Nonce,
    /// When the book last changed.
    pub last_update: Timestamp,
    /// Bid levels, best first.
    pub bids: Vec<PriceLevel>,
    /// Ask levels, best first.
    pub asks: Vec<PriceLevel>,
}

#[derive(Debug)]
struct BookCell {
    book: OrderBook,
    state: SyncState,
}

/// Creates the single writer and a reader for a new, empty book.
#[must_use]
pub fn book_handle(instrument: InstrumentId) -> (BookWriter, BookReader) {
    let cell = Arc::new(RwLock::new(BookCell {
        book: OrderBook::new(instrument),
        state: SyncState::AwaitingSnapshot,
    }));
    (
        BookWriter {
            cell: Arc::clone(&cell),
        },
        BookReader { cell },
    )
}

/// Exclusive mutation handle, owned by the instrument's reconciler.
#[derive(Debug)]
pub struct BookWriter {
    cell: Arc<RwLock<BookCell>>,
}

impl BookWriter {
    /// Runs `f` against the book under the write lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut OrderBook) -> R) -> R {
        f(&mut self.cell.write().book)
    }

    /// Publishes the reconciliation state to readers.
    pub fn set_state(&self, state: SyncState) {
        self.cell.write().state = state;
    }

    /// Creates another reader for this book.
    #[must_use]
    pub fn reader(&self) -> BookReader {
        BookReader {
            cell: Arc::clone(&self.cell),
        }
    }
}

/// Shared read handle. Every accessor takes a short read lock.
#[derive(Debug, Clone)]
pub struct BookReader {
    cell: Arc<RwLock<BookCell>>,
}

impl BookReader {
    /// Returns the instrument.
    #[must_use]
    pub fn instrument(&self) -> InstrumentId {
        self.cell.read().book.instrument.clone()
    }

    /// Returns the reconciliation state.
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.cell.read().state
    }

    /// Returns true once a snapshot has been applied and no resync is pending.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.state() == SyncState::Synced
    }

    /// Returns the best bid level.
    #[must_use]
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.cell.read().book.best_bid()
    }

    /// Returns the best ask level.
    #[must_use]
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.cell.read().book.best_ask()
    }

    /// Returns the bid-ask spread.
    #[must_use]
    pub fn spread(&self) -> Option<i64> {
        self.cell.read().book.spread()
    }

    /// Returns the size resting at `price` on `side`.
    #[must_use]
    pub fn size_at(&self, side: Side, price: i64) -> Option<u64> {
        let cell = self.cell.read();
        match side {
            Side::Bid => cell.book.bids.get(price),
            Side::Ask => cell.book.asks.get(price),
        }
    }

    /// Returns the `n` best levels of each side, best first.
    #[must_use]
    pub fn depth(&self, n: usize) -> (Vec<PriceLevel>, Vec<PriceLevel>) {
        let cell = self.cell.read();
        (cell.book.bids.best_n(n), cell.book.asks.best_n(n))
    }

    /// Returns the nonce of the last applied message.
    #[must_use]
    pub fn last_nonce(&self) -> Nonce {
        self.cell.read().book.last_nonce
    }

    /// Returns when the book last changed.
    #[must_use]
    pub fn last_update(&self) -> Timestamp {
        self.cell.read().book.last_update
    }

    /// Copies the whole book.
    #[must_use]
    pub fn snapshot(&self) -> BookSnapshot {
        let cell = self.cell.read();
        BookSnapshot {
            instrument: cell.book.instrument.clone(),
            state: cell.state,
            last_nonce: cell.book.last_nonce,
            last_update: cell.book.last_update,
            bids: cell.book.bids.best_n(usize::MAX),
            asks: cell.book.asks.best_n(usize::MAX),
        }
    }
}
