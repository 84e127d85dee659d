//! Per-instrument snapshot/diff reconciliation.
//!
//! Each tracked instrument gets one [`InstrumentReconciler`] running in its
//! own task and consuming a single bounded queue. It owns the instrument's
//! book and moves through:
//!
//! ```text
//! Unseen -> AwaitingSnapshot -> Synced -> (resync | reconnect) -> AwaitingSnapshot
//! ```
//!
//! Diffs seen before the first snapshot go to a replay buffer. The snapshot
//! discards buffered diffs it already covers and the rest are replayed in
//! nonce order.

use crate::book::{BookReader, BookWriter, book_handle};
use crate::driver::FeedCommand;
use crate::error::ReconcileError;
use crate::replay::{DEFAULT_REPLAY_CAPACITY, ReplayBuffer};
use crate::sync::SnapshotSlots;
use ironbook_channel::{BoundedRing, BroadcastSender};
use ironbook_core::{BookRow, InstrumentId, MessageKind, Nonce, OrderBookMessage, Timestamp};
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Default number of recently applied diffs kept per instrument.
pub const DEFAULT_DIFF_WINDOW: usize = 32;

/// Reconciliation state of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncState {
    /// Not tracked, no book.
    Unseen,
    /// Tracked, buffering diffs until a snapshot arrives.
    AwaitingSnapshot,
    /// Snapshot applied, diffs applied in nonce order.
    Synced,
}

/// Configuration for instrument reconcilers.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Diffs held while awaiting a snapshot.
    pub replay_capacity: usize,
    /// Recently applied diffs kept for inspection.
    pub diff_window: usize,
    /// Pause after a failed message before resuming.
    pub error_backoff: Duration,
    /// Treat a nonce jump while synced as a gap and resync.
    pub resync_on_gap: bool,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            replay_capacity: DEFAULT_REPLAY_CAPACITY,
            diff_window: DEFAULT_DIFF_WINDOW,
            error_backoff: Duration::from_secs(5),
            resync_on_gap: false,
        }
    }
}

/// A diff as applied to a book, published to diff subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedDiff {
    /// Instrument identifier.
    pub instrument: InstrumentId,
    /// Nonce of the diff.
    pub nonce: Nonce,
    /// Rows applied.
    pub rows: Vec<BookRow>,
    /// When the diff was applied.
    pub applied_at: Timestamp,
}

/// Shared window of the most recently applied diffs.
#[derive(Debug, Clone)]
pub struct RecentDiffs {
    ring: Arc<Mutex<BoundedRing<AppliedDiff>>>,
}

impl RecentDiffs {
    /// Creates a window of `capacity` diffs.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Arc::new(Mutex::new(BoundedRing::new(capacity))),
        }
    }

    fn push(&self, diff: AppliedDiff) {
        self.ring.lock().push(diff);
    }

    /// Copies the window, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<AppliedDiff> {
        self.ring.lock().iter().cloned().collect()
    }

    /// Returns the number of diffs in the window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.lock().len()
    }

    /// Returns true if no diff has been applied yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.lock().is_empty()
    }
}

/// What a message did to the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Snapshot applied; `replayed` buffered diffs applied after it.
    SnapshotApplied {
        /// Buffered diffs applied on top of the snapshot.
        replayed: usize,
    },
    /// Diff applied to the book.
    DiffApplied,
    /// Diff held until the next snapshot.
    Buffered,
    /// Message at or below the last applied nonce, ignored.
    Stale,
    /// Nonce jump while synced; the reconciler is awaiting a snapshot again.
    GapDetected {
        /// Nonce that was expected.
        expected: Nonce,
        /// Nonce that arrived.
        received: Nonce,
    },
}

/// Reconciles one instrument's message stream into its book.
pub struct InstrumentReconciler {
    instrument: InstrumentId,
    config: ReconcilerConfig,
    state: SyncState,
    last_nonce: Nonce,
    book: BookWriter,
    replay: ReplayBuffer,
    recent: RecentDiffs,
    diffs: BroadcastSender<AppliedDiff>,
    slots: SnapshotSlots,
    resync: Arc<AtomicBool>,
    commands: Option<mpsc::UnboundedSender<FeedCommand>>,
}

impl InstrumentReconciler {
    /// Creates a reconciler with an empty book, awaiting its first snapshot.
    #[must_use]
    pub fn new(
        instrument: InstrumentId,
        config: ReconcilerConfig,
        diffs: BroadcastSender<AppliedDiff>,
        slots: SnapshotSlots,
    ) -> Self {
        let (book, _) = book_handle(instrument.clone());
        Self {
            replay: ReplayBuffer::new(config.replay_capacity),
            recent: RecentDiffs::new(config.diff_window),
            instrument,
            config,
            state: SyncState::AwaitingSnapshot,
            last_nonce: 0,
            book,
            diffs,
            slots,
            resync: Arc::new(AtomicBool::new(false)),
            commands: None,
        }
    }

    /// Routes snapshot requests for detected gaps to the feed driver.
    #[must_use]
    pub fn with_commands(mut self, commands: mpsc::UnboundedSender<FeedCommand>) -> Self {
        self.commands = Some(commands);
        self
    }

    /// Returns the instrument.
    #[must_use]
    pub fn instrument(&self) -> &InstrumentId {
        &self.instrument
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Returns the last applied nonce.
    #[must_use]
    pub fn last_nonce(&self) -> Nonce {
        self.last_nonce
    }

    /// Returns a read handle to the owned book.
    #[must_use]
    pub fn reader(&self) -> BookReader {
        self.book.reader()
    }

    /// Returns the recent diff window.
    #[must_use]
    pub fn recent(&self) -> RecentDiffs {
        self.recent.clone()
    }

    /// Flag that sends the reconciler back to awaiting a snapshot before it
    /// handles its next message.
    #[must_use]
    pub fn resync_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.resync)
    }

    /// Returns the number of buffered diffs.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.replay.len()
    }

    /// Leaves `Synced` until the next snapshot. Book contents stay readable.
    pub fn begin_resync(&mut self) {
        if self.state != SyncState::AwaitingSnapshot {
            tracing::info!("Resyncing {} from next snapshot", self.instrument);
        }
        self.set_state(SyncState::AwaitingSnapshot);
    }

    fn set_state(&mut self, state: SyncState) {
        self.state = state;
        self.book.set_state(state);
    }

    /// Applies one message.
    ///
    /// # Errors
    /// Returns [`ReconcileError`] if the message belongs to another instrument
    /// or carries a row that cannot be applied. The book is left untouched.
    pub fn on_message(&mut self, message: OrderBookMessage) -> Result<Outcome, ReconcileError> {
        if self.resync.swap(false, Ordering::AcqRel) {
            self.begin_resync();
        }

        if message.instrument != self.instrument {
            return Err(ReconcileError::InstrumentMismatch {
                expected: self.instrument.clone(),
                got: message.instrument,
            });
        }
        if let Some(row) = message.rows.iter().find(|r| r.price <= 0) {
            return Err(ReconcileError::InvalidRow {
                nonce: message.nonce,
                price: row.price,
            });
        }

        match (message.kind, self.state) {
            (MessageKind::Snapshot, SyncState::Synced) if message.nonce < self.last_nonce => {
                tracing::debug!(
                    "Discarding stale {} snapshot {} (last {})",
                    self.instrument,
                    message.nonce,
                    self.last_nonce
                );
                Ok(Outcome::Stale)
            }
            (MessageKind::Snapshot, _) => Ok(self.apply_snapshot(message)),
            (MessageKind::Diff, SyncState::Synced) => Ok(self.on_synced_diff(message)),
            (MessageKind::Diff, _) => {
                self.buffer(message);
                Ok(Outcome::Buffered)
            }
        }
    }

    fn buffer(&mut self, diff: OrderBookMessage) {
        if let Some(dropped) = self.replay.push(diff) {
            tracing::warn!(
                "Replay buffer full for {}, dropped diff {}",
                self.instrument,
                dropped.nonce
            );
        }
    }

    fn on_synced_diff(&mut self, diff: OrderBookMessage) -> Outcome {
        if diff.nonce <= self.last_nonce {
            tracing::trace!("Duplicate {} diff {}", self.instrument, diff.nonce);
            return Outcome::Stale;
        }

        let expected = self.last_nonce + 1;
        if self.config.resync_on_gap && diff.nonce > expected {
            let received = diff.nonce;
            tracing::warn!(
                "Nonce gap on {}: expected {}, got {}",
                self.instrument,
                expected,
                received
            );
            self.set_state(SyncState::AwaitingSnapshot);
            self.buffer(diff);
            self.request_snapshot();
            return Outcome::GapDetected { expected, received };
        }

        self.apply_diff(diff);
        Outcome::DiffApplied
    }

    fn apply_snapshot(&mut self, snapshot: OrderBookMessage) -> Outcome {
        let now = Timestamp::now();
        self.book
            .update(|book| book.apply_snapshot(snapshot.nonce, &snapshot.rows, now));
        self.last_nonce = snapshot.nonce;

        let pending = self.replay.take_after(snapshot.nonce);
        let mut replayed = 0;
        for diff in pending {
            if diff.nonce > self.last_nonce {
                self.apply_diff(diff);
                replayed += 1;
            }
        }

        self.set_state(SyncState::Synced);
        tracing::debug!(
            "Processed order book snapshot for {} at {} ({} replayed)",
            self.instrument,
            snapshot.nonce,
            replayed
        );
        self.slots.publish(snapshot, now);
        Outcome::SnapshotApplied { replayed }
    }

    fn apply_diff(&mut self, diff: OrderBookMessage) {
        let now = Timestamp::now();
        self.book
            .update(|book| book.apply_diff(diff.nonce, &diff.rows, now));
        self.last_nonce = diff.nonce;

        let applied = AppliedDiff {
            instrument: diff.instrument,
            nonce: diff.nonce,
            rows: diff.rows,
            applied_at: now,
        };
        self.recent.push(applied.clone());
        self.diffs.send(applied);
    }

    fn request_snapshot(&self) {
        if let Some(commands) = &self.commands
            && commands
                .send(FeedCommand::QuerySnapshot(self.instrument.clone()))
                .is_err()
        {
            tracing::debug!("Feed driver gone, {} snapshot not requested", self.instrument);
        }
    }

    /// Consumes `queue` until it closes or `cancel` fires.
    ///
    /// Failed messages are logged and followed by the configured backoff.
    /// The number of applied diffs is logged once per wall-clock minute.
    pub async fn run(
        mut self,
        mut queue: mpsc::Receiver<OrderBookMessage>,
        cancel: CancellationToken,
    ) {
        let mut diffs_accepted: u64 = 0;
        let mut report = minute_ticker();

        loop {
            let message = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = report.tick() => {
                    tracing::debug!(
                        "Processed {} order book diffs for {}",
                        diffs_accepted,
                        self.instrument
                    );
                    diffs_accepted = 0;
                    continue;
                }
                message = queue.recv() => match message {
                    Some(message) => message,
                    None => break,
                },
            };

            match self.on_message(message) {
                Ok(Outcome::DiffApplied) => diffs_accepted += 1,
                Ok(Outcome::SnapshotApplied { replayed }) => diffs_accepted += replayed as u64,
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(
                        "Unexpected error tracking order book for {}: {}. Retrying after {:?}",
                        self.instrument,
                        e,
                        self.config.error_backoff
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.error_backoff) => {}
                    }
                }
            }
        }

        self.set_state(SyncState::Unseen);
        tracing::debug!("Stopped reconciling {}", self.instrument);
    }
}

/// Interval that ticks at the top of every wall-clock minute.
fn minute_ticker() -> Interval {
    let into_minute = Timestamp::now().as_secs() % 60;
    let first = Instant::now() + Duration::from_secs(60 - into_minute);
    let mut ticker = tokio::time::interval_at(first, Duration::from_secs(60));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironbook_channel::broadcast;
    use ironbook_core::Side;

    fn btc() -> InstrumentId {
        InstrumentId::parse("BTC-USD").unwrap()
    }

    fn reconciler(config: ReconcilerConfig) -> InstrumentReconciler {
        InstrumentReconciler::new(btc(), config, broadcast::channel(64), SnapshotSlots::new())
    }

    fn snapshot(nonce: Nonce, rows: Vec<BookRow>) -> OrderBookMessage {
        OrderBookMessage::snapshot(btc(), nonce, rows)
    }

    fn diff(nonce: Nonce, rows: Vec<BookRow>) -> OrderBookMessage {
        OrderBookMessage::diff(btc(), nonce, rows)
    }

    #[test]
    fn test_stale_diff_dropped_and_removal_applied() {
        let mut r = reconciler(ReconcilerConfig::default());
        let reader = r.reader();

        r.on_message(snapshot(100, vec![BookRow::bid(100, 1)])).unwrap();
        assert_eq!(r.state(), SyncState::Synced);

        assert_eq!(
            r.on_message(diff(99, vec![BookRow::bid(100, 5)])).unwrap(),
            Outcome::Stale
        );
        assert_eq!(reader.size_at(Side::Bid, 100), Some(1));

        assert_eq!(
            r.on_message(diff(101, vec![BookRow::bid(100, 0)])).unwrap(),
            Outcome::DiffApplied
        );
        assert_eq!(reader.size_at(Side::Bid, 100), None);
        assert_eq!(reader.last_nonce(), 101);
    }

    #[test]
    fn test_equal_nonce_is_duplicate() {
        let mut r = reconciler(ReconcilerConfig::default());
        r.on_message(snapshot(10, vec![])).unwrap();
        r.on_message(diff(11, vec![BookRow::ask(200, 1)])).unwrap();

        assert_eq!(
            r.on_message(diff(11, vec![BookRow::ask(200, 9)])).unwrap(),
            Outcome::Stale
        );
        assert_eq!(r.reader().size_at(Side::Ask, 200), Some(1));
    }

    #[test]
    fn test_early_diffs_buffered_then_replayed() {
        let mut r = reconciler(ReconcilerConfig::default());
        let reader = r.reader();

        assert_eq!(
            r.on_message(diff(5, vec![BookRow::bid(50, 1)])).unwrap(),
            Outcome::Buffered
        );
        r.on_message(diff(12, vec![BookRow::bid(120, 1)])).unwrap();
        r.on_message(diff(11, vec![BookRow::bid(110, 1)])).unwrap();
        assert_eq!(r.buffered(), 3);
        assert!(reader.best_bid().is_none());

        assert_eq!(
            r.on_message(snapshot(10, vec![BookRow::bid(100, 1)])).unwrap(),
            Outcome::SnapshotApplied { replayed: 2 }
        );
        assert_eq!(r.buffered(), 0);
        assert_eq!(reader.size_at(Side::Bid, 50), None);
        assert_eq!(reader.size_at(Side::Bid, 110), Some(1));
        assert_eq!(reader.best_bid().unwrap().price, 120);
        assert_eq!(r.last_nonce(), 12);
    }

    #[test]
    fn test_in_order_stream_converges() {
        let mut r = reconciler(ReconcilerConfig::default());
        r.on_message(snapshot(1, vec![BookRow::bid(100, 1), BookRow::ask(101, 1)]))
            .unwrap();
        r.on_message(diff(2, vec![BookRow::bid(99, 4)])).unwrap();
        r.on_message(diff(3, vec![BookRow::ask(101, 0), BookRow::ask(102, 2)]))
            .unwrap();
        r.on_message(diff(4, vec![BookRow::bid(100, 3)])).unwrap();

        let mut expected = reconciler(ReconcilerConfig::default());
        expected
            .on_message(snapshot(
                4,
                vec![BookRow::bid(100, 3), BookRow::bid(99, 4), BookRow::ask(102, 2)],
            ))
            .unwrap();

        let got = r.reader().snapshot();
        let want = expected.reader().snapshot();
        assert_eq!(got.bids, want.bids);
        assert_eq!(got.asks, want.asks);
        assert_eq!(got.last_nonce, want.last_nonce);
    }

    #[test]
    fn test_stale_snapshot_while_synced_discarded() {
        let mut r = reconciler(ReconcilerConfig::default());
        r.on_message(snapshot(20, vec![BookRow::bid(100, 1)])).unwrap();

        assert_eq!(
            r.on_message(snapshot(15, vec![BookRow::bid(90, 1)])).unwrap(),
            Outcome::Stale
        );
        assert_eq!(r.reader().best_bid().unwrap().price, 100);
    }

    #[test]
    fn test_resync_flag_returns_to_awaiting() {
        let mut r = reconciler(ReconcilerConfig::default());
        r.on_message(snapshot(10, vec![])).unwrap();

        r.resync_flag().store(true, Ordering::Release);
        assert_eq!(
            r.on_message(diff(11, vec![BookRow::bid(1, 1)])).unwrap(),
            Outcome::Buffered
        );
        assert_eq!(r.state(), SyncState::AwaitingSnapshot);
        assert_eq!(r.reader().state(), SyncState::AwaitingSnapshot);

        r.on_message(snapshot(8, vec![])).unwrap();
        assert_eq!(r.state(), SyncState::Synced);
        assert_eq!(r.last_nonce(), 11);
    }

    #[test]
    fn test_gap_policy_requests_snapshot() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut r = reconciler(ReconcilerConfig {
            resync_on_gap: true,
            ..ReconcilerConfig::default()
        })
        .with_commands(tx);

        r.on_message(snapshot(10, vec![])).unwrap();
        r.on_message(diff(11, vec![])).unwrap();
        assert_eq!(
            r.on_message(diff(14, vec![])).unwrap(),
            Outcome::GapDetected {
                expected: 12,
                received: 14
            }
        );
        assert_eq!(r.state(), SyncState::AwaitingSnapshot);
        assert_eq!(rx.try_recv().unwrap(), FeedCommand::QuerySnapshot(btc()));
    }

    #[test]
    fn test_gaps_ignored_by_default() {
        let mut r = reconciler(ReconcilerConfig::default());
        r.on_message(snapshot(10, vec![])).unwrap();
        assert_eq!(r.on_message(diff(20, vec![])).unwrap(), Outcome::DiffApplied);
    }

    #[test]
    fn test_mismatch_and_invalid_rows_rejected() {
        let mut r = reconciler(ReconcilerConfig::default());
        let eth = InstrumentId::parse("ETH-USD").unwrap();

        let err = r
            .on_message(OrderBookMessage::snapshot(eth, 1, vec![]))
            .unwrap_err();
        assert!(matches!(err, ReconcileError::InstrumentMismatch { .. }));

        let err = r
            .on_message(snapshot(1, vec![BookRow::bid(0, 1)]))
            .unwrap_err();
        assert!(matches!(err, ReconcileError::InvalidRow { price: 0, .. }));
        assert_eq!(r.state(), SyncState::AwaitingSnapshot);
    }

    #[test]
    fn test_applied_diffs_published_and_windowed() {
        let diffs = broadcast::channel(64);
        let mut rx = diffs.subscribe();
        let mut r = InstrumentReconciler::new(
            btc(),
            ReconcilerConfig {
                diff_window: 2,
                ..ReconcilerConfig::default()
            },
            diffs,
            SnapshotSlots::new(),
        );

        r.on_message(diff(3, vec![])).unwrap();
        r.on_message(snapshot(1, vec![])).unwrap();
        for nonce in 4..=6 {
            r.on_message(diff(nonce, vec![])).unwrap();
        }

        let published: Vec<Nonce> = rx.recv_all().into_iter().map(|(_, d)| d.nonce).collect();
        assert_eq!(published, vec![3, 4, 5, 6]);

        let window: Vec<Nonce> = r.recent().to_vec().iter().map(|d| d.nonce).collect();
        assert_eq!(window, vec![5, 6]);
    }

    #[test]
    fn test_snapshot_published_to_slot() {
        let slots = SnapshotSlots::new();
        let mut r = InstrumentReconciler::new(
            btc(),
            ReconcilerConfig::default(),
            broadcast::channel(8),
            slots.clone(),
        );
        r.on_message(snapshot(42, vec![])).unwrap();

        let taken = slots.take_since(&btc(), Timestamp::EPOCH).unwrap();
        assert_eq!(taken.nonce, 42);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let r = reconciler(ReconcilerConfig::default());
        let reader = r.reader();
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(r.run(rx, cancel.clone()));
        tx.send(snapshot(1, vec![BookRow::bid(10, 1)])).await.unwrap();

        while !reader.is_synced() {
            tokio::task::yield_now().await;
        }
        cancel.cancel();
        task.await.unwrap();
        assert_eq!(reader.state(), SyncState::Unseen);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn count(&self, needle: &str) -> usize {
            String::from_utf8_lossy(&self.0.lock()).matches(needle).count()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_quiet_instrument_reports_every_minute() {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let r = reconciler(ReconcilerConfig::default());
        let reader = r.reader();
        let (tx, rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(r.run(rx, cancel.clone()));

        tokio::time::sleep(Duration::from_secs(61)).await;
        assert!(logs.count("Processed 0 order book diffs for BTC-USD") >= 1);

        tx.send(snapshot(1, vec![])).await.unwrap();
        tx.send(diff(2, vec![BookRow::bid(10, 1)])).await.unwrap();
        tokio::time::sleep(Duration::from_secs(61)).await;
        assert_eq!(logs.count("Processed 1 order book diffs for BTC-USD"), 1);
        assert_eq!(reader.last_nonce(), 2);

        cancel.cancel();
        task.await.unwrap();
        assert_eq!(reader.state(), SyncState::Unseen);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_backs_off_after_error() {
        let r = reconciler(ReconcilerConfig::default());
        let reader = r.reader();
        let (tx, rx) = mpsc::channel(8);
        let task = tokio::spawn(r.run(rx, CancellationToken::new()));

        let start = tokio::time::Instant::now();
        tx.send(snapshot(1, vec![BookRow::bid(-5, 1)])).await.unwrap();
        tx.send(snapshot(2, vec![BookRow::bid(5, 1)])).await.unwrap();
        drop(tx);
        task.await.unwrap();

        assert!(start.elapsed() >= Duration::from_secs(5));
        assert_eq!(reader.last_nonce(), 2);
    }
}
