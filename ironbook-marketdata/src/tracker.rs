//! Order book tracker.
//!
//! The tracker keeps one reconciler task, bounded queue and book per tracked
//! instrument, runs the feed driver that fills those queues, and keeps the
//! tracked set in line with the instruments that are currently available.

use crate::book::BookReader;
use crate::config::TrackerConfig;
use crate::driver::{FeedCommand, run_feed};
use crate::error::TrackerError;
use crate::instruments::InstrumentCatalog;
use crate::reconciler::{AppliedDiff, InstrumentReconciler, ReconcilerConfig, RecentDiffs, SyncState};
use crate::schedule::run_snapshot_schedule;
use crate::sync::{SnapshotSlots, SnapshotSynchronizer};
use ironbook_channel::{BroadcastReceiver, BroadcastSender};
use ironbook_client::{Connector, SessionBuilder, SubscriptionSource};
use ironbook_core::{InstrumentId, OrderBookMessage, Timestamp};
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument as _;

/// Where a routed message ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Queued for the instrument's reconciler.
    Delivered,
    /// Instrument not tracked; message dropped.
    Untracked,
    /// Queue full; message dropped and the instrument flagged for resync.
    Overflow,
    /// Reconciler gone; message dropped.
    Closed,
}

/// Instruments added and removed by a refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Newly tracked instruments, including restarted ones.
    pub added: Vec<InstrumentId>,
    /// Instruments no longer tracked.
    pub removed: Vec<InstrumentId>,
}

impl RefreshSummary {
    /// Returns true if the refresh changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

struct TrackedEntry {
    reader: BookReader,
    recent: RecentDiffs,
    queue: mpsc::Sender<OrderBookMessage>,
    resync: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl TrackedEntry {
    fn is_live(&self) -> bool {
        !self.task.is_finished()
    }
}

/// Live mapping from instrument to its reconciler task and book.
///
/// Mutated only by refreshes; the feed driver routes through it under a
/// short read lock.
pub struct TrackedSet {
    entries: RwLock<HashMap<InstrumentId, TrackedEntry>>,
    reconciler: ReconcilerConfig,
    queue_capacity: usize,
    diffs: BroadcastSender<AppliedDiff>,
    slots: SnapshotSlots,
    commands: mpsc::UnboundedSender<FeedCommand>,
    shutdown: CancellationToken,
    feed_running: AtomicBool,
}

impl TrackedSet {
    /// Creates an empty tracked set.
    #[must_use]
    pub fn new(
        reconciler: ReconcilerConfig,
        queue_capacity: usize,
        diffs: BroadcastSender<AppliedDiff>,
        slots: SnapshotSlots,
        commands: mpsc::UnboundedSender<FeedCommand>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            reconciler,
            queue_capacity: queue_capacity.max(1),
            diffs,
            slots,
            commands,
            shutdown,
            feed_running: AtomicBool::new(false),
        }
    }

    /// Brings the tracked set in line with `available`.
    ///
    /// Instruments whose task has finished count as untracked and are
    /// restarted if still available. Calling this again with the same list
    /// changes nothing.
    pub fn refresh(&self, available: &[InstrumentId]) -> RefreshSummary {
        let available: HashSet<&InstrumentId> = available.iter().collect();
        let mut summary = RefreshSummary::default();
        let mut entries = self.entries.write();

        let tracking: HashSet<InstrumentId> = entries
            .iter()
            .filter(|(_, entry)| entry.is_live())
            .map(|(id, _)| id.clone())
            .collect();

        for id in &tracking {
            if !available.contains(id)
                && let Some(entry) = entries.remove(id)
            {
                entry.cancel.cancel();
                self.slots.remove(id);
                tracing::info!("Stopped order book tracking for {}", id);
                summary.removed.push(id.clone());
            }
        }

        entries.retain(|id, entry| entry.is_live() || available.contains(id));

        for id in available {
            if tracking.contains(id) {
                continue;
            }
            if let Some(finished) = entries.remove(id) {
                tracing::warn!("Order book task for {} ended, restarting", id);
                finished.cancel.cancel();
            }
            entries.insert(id.clone(), self.spawn(id.clone()));
            tracing::info!("Started order book tracking for {}", id);
            summary.added.push(id.clone());
        }
        drop(entries);

        summary.added.sort();
        summary.removed.sort();
        if self.feed_running.load(Ordering::Acquire) {
            for id in &summary.added {
                let _ = self.commands.send(FeedCommand::Subscribe(id.clone()));
            }
        }
        summary
    }

    fn spawn(&self, instrument: InstrumentId) -> TrackedEntry {
        let reconciler = InstrumentReconciler::new(
            instrument.clone(),
            self.reconciler.clone(),
            self.diffs.clone(),
            self.slots.clone(),
        )
        .with_commands(self.commands.clone());

        let (queue, rx) = mpsc::channel(self.queue_capacity);
        let cancel = self.shutdown.child_token();
        let reader = reconciler.reader();
        let recent = reconciler.recent();
        let resync = reconciler.resync_flag();

        let span = tracing::info_span!("book", instrument = %instrument);
        let task = tokio::spawn(reconciler.run(rx, cancel.clone()).instrument(span));

        TrackedEntry {
            reader,
            recent,
            queue,
            resync,
            cancel,
            task,
        }
    }

    /// Delivers a message to its instrument's queue without waiting.
    ///
    /// A full queue drops the message, flags the instrument for resync and
    /// asks the feed for a fresh snapshot.
    pub fn route(&self, message: OrderBookMessage) -> RouteOutcome {
        let entries = self.entries.read();
        let Some(entry) = entries.get(&message.instrument) else {
            tracing::trace!("Dropping message for untracked {}", message.instrument);
            return RouteOutcome::Untracked;
        };

        match entry.queue.try_send(message) {
            Ok(()) => RouteOutcome::Delivered,
            Err(TrySendError::Full(dropped)) => {
                if !entry.resync.swap(true, Ordering::AcqRel) {
                    tracing::warn!(
                        "Queue full for {}, dropped message {} and resyncing",
                        dropped.instrument,
                        dropped.nonce
                    );
                    let _ = self
                        .commands
                        .send(FeedCommand::QuerySnapshot(dropped.instrument));
                }
                RouteOutcome::Overflow
            }
            Err(TrySendError::Closed(_)) => RouteOutcome::Closed,
        }
    }

    /// Flags every instrument for resync.
    pub fn mark_all_resync(&self) {
        for entry in self.entries.read().values() {
            entry.resync.store(true, Ordering::Release);
        }
    }

    /// Returns the book reader of a tracked instrument.
    #[must_use]
    pub fn reader(&self, instrument: &InstrumentId) -> Option<BookReader> {
        self.entries
            .read()
            .get(instrument)
            .map(|entry| entry.reader.clone())
    }

    /// Returns the instrument's reconciliation state.
    #[must_use]
    pub fn state(&self, instrument: &InstrumentId) -> SyncState {
        self.entries
            .read()
            .get(instrument)
            .filter(|entry| entry.is_live())
            .map_or(SyncState::Unseen, |entry| entry.reader.state())
    }

    /// Returns the recently applied diffs of a tracked instrument.
    #[must_use]
    pub fn recent_diffs(&self, instrument: &InstrumentId) -> Vec<AppliedDiff> {
        self.entries
            .read()
            .get(instrument)
            .map(|entry| entry.recent.to_vec())
            .unwrap_or_default()
    }

    /// Returns true if the instrument has a live reconciler.
    #[must_use]
    pub fn contains(&self, instrument: &InstrumentId) -> bool {
        self.entries
            .read()
            .get(instrument)
            .is_some_and(TrackedEntry::is_live)
    }

    /// Returns the number of tracked instruments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if nothing is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    fn set_feed_running(&self, running: bool) {
        self.feed_running.store(running, Ordering::Release);
    }

    fn is_feed_running(&self) -> bool {
        self.feed_running.load(Ordering::Acquire)
    }

    /// Cancels every reconciler and forgets all instruments.
    pub fn clear(&self) {
        for (_, entry) in self.entries.write().drain() {
            entry.cancel.cancel();
        }
    }
}

impl SubscriptionSource for TrackedSet {
    fn instruments(&self) -> Vec<InstrumentId> {
        let mut instruments: Vec<InstrumentId> = self
            .entries
            .read()
            .iter()
            .filter(|(_, entry)| entry.is_live())
            .map(|(id, _)| id.clone())
            .collect();
        instruments.sort();
        instruments
    }
}

/// Maintains order books for a changing set of instruments from one push
/// feed.
pub struct OrderBookTracker {
    config: TrackerConfig,
    tracked: Arc<TrackedSet>,
    diffs: BroadcastSender<AppliedDiff>,
    synchronizer: SnapshotSynchronizer,
    commands: mpsc::UnboundedSender<FeedCommand>,
    command_rx: Mutex<Option<mpsc::UnboundedReceiver<FeedCommand>>>,
    catalog: Option<Arc<InstrumentCatalog>>,
    shutdown: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl OrderBookTracker {
    /// Creates a stopped tracker.
    ///
    /// # Errors
    /// Returns [`TrackerError::Config`] if the configuration is invalid.
    pub fn new(config: TrackerConfig) -> Result<Self, TrackerError> {
        config.validate()?;

        let diffs = ironbook_channel::broadcast::channel(config.diff_broadcast_capacity);
        let slots = SnapshotSlots::new();
        let (commands, command_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let tracked = Arc::new(TrackedSet::new(
            config.reconciler_config(),
            config.queue_capacity,
            diffs.clone(),
            slots.clone(),
            commands.clone(),
            shutdown.clone(),
        ));
        let synchronizer = SnapshotSynchronizer::new(
            slots,
            config.snapshot_timeout(),
            config.snapshot_poll_interval(),
        );

        Ok(Self {
            config,
            tracked,
            diffs,
            synchronizer,
            commands,
            command_rx: Mutex::new(Some(command_rx)),
            catalog: None,
            shutdown,
            tasks: Mutex::new(Vec::new()),
        })
    }

    /// Sources the tracked set from `catalog` instead of the configured list.
    #[must_use]
    pub fn with_catalog(mut self, catalog: Arc<InstrumentCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Returns the tracked set.
    #[must_use]
    pub fn tracked_set(&self) -> &Arc<TrackedSet> {
        &self.tracked
    }

    /// Brings the tracked set in line with `available`.
    pub fn refresh(&self, available: &[InstrumentId]) -> RefreshSummary {
        self.tracked.refresh(available)
    }

    /// Starts the feed driver and the periodic tasks.
    ///
    /// The initial tracked set comes from the catalog when one is attached,
    /// otherwise from the configured instrument list.
    ///
    /// # Errors
    /// Returns [`TrackerError::AlreadyStarted`] on a second call.
    pub async fn start<C: Connector>(&self, connector: C) -> Result<(), TrackerError> {
        let commands = self
            .command_rx
            .lock()
            .take()
            .ok_or(TrackerError::AlreadyStarted)?;

        let initial = match &self.catalog {
            Some(catalog) => catalog.available_instruments().await,
            None => self.config.instruments.clone(),
        };
        let summary = self.tracked.refresh(&initial);
        tracing::info!("Tracking {} instruments", summary.added.len());

        let session = SessionBuilder::new(connector)
            .config(self.config.session_config())
            .subscriptions(Arc::clone(&self.tracked) as Arc<dyn SubscriptionSource>)
            .build();
        self.tracked.set_feed_running(true);

        let mut tasks = Vec::new();
        tasks.push(tokio::spawn(
            run_feed(
                session,
                Arc::clone(&self.tracked),
                commands,
                self.config.reconnect_config(),
                self.shutdown.child_token(),
            )
            .instrument(tracing::info_span!("feed")),
        ));
        tasks.push(tokio::spawn(run_snapshot_schedule(
            self.config.snapshot_refresh,
            Arc::clone(&self.tracked) as Arc<dyn SubscriptionSource>,
            self.commands.clone(),
            self.shutdown.child_token(),
        )));
        if let Some(catalog) = &self.catalog {
            tasks.push(tokio::spawn(run_catalog_refresh(
                Arc::clone(catalog),
                Arc::clone(&self.tracked),
                self.config.catalog_refresh_interval(),
                self.shutdown.child_token(),
            )));
        }
        self.tasks.lock().extend(tasks);
        Ok(())
    }

    /// Returns the book reader for an instrument.
    #[must_use]
    pub fn book(&self, instrument: &InstrumentId) -> Option<BookReader> {
        self.tracked.reader(instrument)
    }

    /// Returns the instrument's reconciliation state, `Unseen` when untracked.
    #[must_use]
    pub fn state(&self, instrument: &InstrumentId) -> SyncState {
        self.tracked.state(instrument)
    }

    /// Returns the tracked instruments.
    #[must_use]
    pub fn tracked(&self) -> Vec<InstrumentId> {
        self.tracked.instruments()
    }

    /// Returns the instrument's most recently applied diffs, oldest first.
    #[must_use]
    pub fn recent_diffs(&self, instrument: &InstrumentId) -> Vec<AppliedDiff> {
        self.tracked.recent_diffs(instrument)
    }

    /// Subscribes to every diff applied from now on, across instruments.
    #[must_use]
    pub fn subscribe_diffs(&self) -> BroadcastReceiver<AppliedDiff> {
        self.diffs.subscribe()
    }

    /// Asks the feed for a fresh snapshot and waits until it is applied.
    ///
    /// # Errors
    /// [`TrackerError::NotTracked`] for untracked instruments,
    /// [`TrackerError::DriverClosed`] if the feed is not running, and
    /// [`TrackerError::Sync`] if no snapshot arrives in time.
    pub async fn request_snapshot(
        &self,
        instrument: &InstrumentId,
    ) -> Result<OrderBookMessage, TrackerError> {
        if !self.tracked.contains(instrument) {
            return Err(TrackerError::NotTracked {
                instrument: instrument.clone(),
            });
        }
        if !self.tracked.is_feed_running() {
            return Err(TrackerError::DriverClosed);
        }

        let requested_at = Timestamp::now();
        self.commands
            .send(FeedCommand::QuerySnapshot(instrument.clone()))
            .map_err(|_| TrackerError::DriverClosed)?;
        Ok(self
            .synchronizer
            .wait_for_snapshot(instrument, requested_at)
            .await?)
    }

    /// Stops every task and forgets all instruments.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracked.set_feed_running(false);
        self.tracked.clear();

        let tasks: Vec<_> = self.tasks.lock().drain(..).collect();
        futures::future::join_all(tasks).await;
        tracing::info!("Order book tracker stopped");
    }
}

impl Drop for OrderBookTracker {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Refreshes the tracked set from `catalog` every `interval`, until cancelled.
///
/// An empty listing keeps the current set.
pub async fn run_catalog_refresh(
    catalog: Arc<InstrumentCatalog>,
    tracked: Arc<TrackedSet>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let available = catalog.available_instruments().await;
        if available.is_empty() {
            tracing::warn!("Catalog listed no instruments, keeping tracked set");
            continue;
        }
        let summary = tracked.refresh(&available);
        if !summary.is_empty() {
            tracing::info!(
                "Catalog refresh: {} added, {} removed",
                summary.added.len(),
                summary.removed.len()
            );
        }
    }
}
