//! # IronBook Market Data
//!
//! Order book reconstruction from a push feed of snapshots and diffs.
//!
//! This crate provides:
//! - Price-ordered books with lock-guarded readers
//! - Per-instrument snapshot/diff reconciliation with a replay buffer
//! - Snapshot request and wait
//! - A feed driver that reconnects forever and routes into bounded queues
//! - A tracker keeping the tracked set in line with the instrument catalog

pub mod book;
pub mod config;
pub mod driver;
pub mod error;
pub mod instruments;
pub mod reconciler;
pub mod replay;
pub mod schedule;
pub mod sync;
pub mod tracker;

pub use book::{BookReader, BookSide, BookSnapshot, OrderBook, PriceLevel};
pub use config::{SnapshotRefresh, TrackerConfig};
pub use driver::FeedCommand;
pub use error::{CatalogError, ConfigError, ReconcileError, SyncError, TrackerError};
pub use instruments::{CatalogFetcher, Instrument, InstrumentCatalog, RestCatalogFetcher};
pub use reconciler::{AppliedDiff, InstrumentReconciler, Outcome, ReconcilerConfig, SyncState};
pub use replay::ReplayBuffer;
pub use sync::{SnapshotSlots, SnapshotSynchronizer};
pub use tracker::{OrderBookTracker, RefreshSummary, RouteOutcome, TrackedSet};
