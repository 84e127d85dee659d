//! # IronBook
//!
//! Live order books reconstructed from an exchange push feed.
//!
//! The feed delivers compressed full snapshots on request and a continuous
//! stream of incremental diffs. IronBook reconciles both into a consistent
//! book per instrument, reconnects on its own, and keeps the set of tracked
//! instruments in line with the exchange's catalog.
//!
//! ## Quick Start
//!
//! ```ignore
//! use ironbook::prelude::*;
//!
//! let config = TrackerConfig::from_path("ironbook.json")?;
//! let tracker = OrderBookTracker::new(config)?;
//! tracker.start(WsConnector::default()).await?;
//!
//! let btc = InstrumentId::parse("BTC-USD")?;
//! if let Some(book) = tracker.book(&btc) {
//!     println!("{:?} / {:?}", book.best_bid(), book.best_ask());
//! }
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`] - Instrument identifiers, book rows, frame decoding and encoding
//! - [`channel`] - Bounded ring and lossy broadcast
//! - [`client`] - Feed session, transports, reconnect backoff, request signing
//! - [`marketdata`] - Books, reconcilers, snapshot sync, tracker

pub mod prelude;

/// Instrument identifiers, book rows and the wire codec.
pub mod core {
    pub use ironbook_core::*;
}

/// Buffering primitives.
pub mod channel {
    pub use ironbook_channel::*;
}

/// Feed session and transports.
pub mod client {
    pub use ironbook_client::*;
}

/// Book reconstruction and tracking.
pub mod marketdata {
    pub use ironbook_marketdata::*;
}

// Re-export commonly used items at the crate root
pub use ironbook_core::{BookRow, InstrumentId, OrderBookMessage, Side, decode_frame};

pub use ironbook_client::{MemoryConnector, WsConnector};
pub use ironbook_marketdata::{BookReader, OrderBookTracker, SyncState, TrackerConfig};
