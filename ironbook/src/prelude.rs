//! Prelude module for convenient imports.
//!
//! ```ignore
//! use ironbook::prelude::*;
//! ```

// Core types
pub use ironbook_core::error::{Error as CoreError, Result as CoreResult};
pub use ironbook_core::{
    BookRow, InstrumentId, MessageKind, Nonce, OrderBookMessage, Side, Timestamp, decode_frame,
};

// Channel types
pub use ironbook_channel::{BoundedRing, BroadcastReceiver, BroadcastSender};

// Client types
pub use ironbook_client::{
    ClientError, Connector, FeedAuth, FeedSession, MemoryConnector, ReconnectConfig,
    SessionBuilder, SessionConfig, WsConnector,
};

// Market data types
pub use ironbook_marketdata::{
    AppliedDiff, BookReader, BookSnapshot, InstrumentCatalog, OrderBookTracker, PriceLevel,
    RestCatalogFetcher, SnapshotRefresh, SyncState, TrackerConfig, TrackerError,
};
