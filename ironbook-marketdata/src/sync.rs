//! Snapshot request/response correlation.
//!
//! Reconcilers publish every applied snapshot into a per-instrument slot. A
//! caller that asked the feed for a fresh snapshot polls the slot until one
//! published at or after its request shows up, and consumes it.

use crate::error::SyncError;
use ironbook_core::{InstrumentId, OrderBookMessage, Timestamp};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Default time to wait for a requested snapshot.
pub const DEFAULT_SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default interval between slot polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Most recently applied snapshot for one instrument.
#[derive(Debug, Clone)]
pub struct SnapshotSlot {
    /// When the snapshot was applied.
    pub published_at: Timestamp,
    /// The snapshot itself.
    pub message: OrderBookMessage,
}

/// Pending snapshot slots, shared between reconcilers and waiters.
#[derive(Debug, Clone, Default)]
pub struct SnapshotSlots {
    slots: Arc<Mutex<HashMap<InstrumentId, SnapshotSlot>>>,
}

impl SnapshotSlots {
    /// Creates an empty slot table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `message` as the instrument's latest snapshot.
    pub fn publish(&self, message: OrderBookMessage, published_at: Timestamp) {
        self.slots.lock().insert(
            message.instrument.clone(),
            SnapshotSlot {
                published_at,
                message,
            },
        );
    }

    /// Removes and returns the slot if it was published at or after
    /// `requested_at`. Older slots stay in place.
    pub fn take_since(
        &self,
        instrument: &InstrumentId,
        requested_at: Timestamp,
    ) -> Option<OrderBookMessage> {
        let mut slots = self.slots.lock();
        match slots.get(instrument) {
            Some(slot) if slot.published_at >= requested_at => {
                slots.remove(instrument).map(|slot| slot.message)
            }
            _ => None,
        }
    }

    /// Drops the instrument's slot.
    pub fn remove(&self, instrument: &InstrumentId) {
        self.slots.lock().remove(instrument);
    }

    /// Returns true if a slot exists for the instrument.
    #[must_use]
    pub fn contains(&self, instrument: &InstrumentId) -> bool {
        self.slots.lock().contains_key(instrument)
    }
}

/// Timeout-bounded wait for fresh snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotSynchronizer {
    slots: SnapshotSlots,
    timeout: Duration,
    poll_interval: Duration,
}

impl SnapshotSynchronizer {
    /// Creates a synchronizer over `slots`.
    #[must_use]
    pub fn new(slots: SnapshotSlots, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            slots,
            timeout,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
        }
    }

    /// Returns the slot table.
    #[must_use]
    pub fn slots(&self) -> &SnapshotSlots {
        &self.slots
    }

    /// Waits for a snapshot of `instrument` published at or after
    /// `requested_at`, consuming it.
    ///
    /// # Errors
    /// Returns [`SyncError::Timeout`] if none shows up within the timeout.
    pub async fn wait_for_snapshot(
        &self,
        instrument: &InstrumentId,
        requested_at: Timestamp,
    ) -> Result<OrderBookMessage, SyncError> {
        let deadline = Instant::now() + self.timeout;

        loop {
            if let Some(message) = self.slots.take_since(instrument, requested_at) {
                return Ok(message);
            }

            let now = Instant::now();
            if now >= deadline {
                tracing::debug!("Timed out waiting for {} snapshot", instrument);
                return Err(SyncError::Timeout {
                    instrument: instrument.clone(),
                    waited: self.timeout,
                });
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }
}

impl Default for SnapshotSynchronizer {
    fn default() -> Self {
        Self::new(
            SnapshotSlots::new(),
            DEFAULT_SNAPSHOT_TIMEOUT,
            DEFAULT_POLL_INTERVAL,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn btc() -> InstrumentId {
        InstrumentId::parse("BTC-USD").unwrap()
    }

    fn snapshot(nonce: u64) -> OrderBookMessage {
        OrderBookMessage::snapshot(btc(), nonce, vec![])
    }

    #[test]
    fn test_take_since_consumes_once() {
        let slots = SnapshotSlots::new();
        slots.publish(snapshot(7), Timestamp::new(100));

        assert!(slots.take_since(&btc(), Timestamp::new(101)).is_none());
        assert!(slots.contains(&btc()));

        let taken = slots.take_since(&btc(), Timestamp::new(100)).unwrap();
        assert_eq!(taken.nonce, 7);
        assert!(slots.take_since(&btc(), Timestamp::new(0)).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_returns_published_snapshot() {
        let sync = SnapshotSynchronizer::default();
        let slots = sync.slots().clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            slots.publish(snapshot(9), Timestamp::new(50));
        });

        let message = sync
            .wait_for_snapshot(&btc(), Timestamp::new(50))
            .await
            .unwrap();
        assert_eq!(message.nonce, 9);
        assert!(!sync.slots().contains(&btc()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out_on_stale_slot() {
        let sync = SnapshotSynchronizer::new(
            SnapshotSlots::new(),
            Duration::from_secs(10),
            Duration::from_secs(1),
        );
        sync.slots().publish(snapshot(1), Timestamp::new(10));

        let start = Instant::now();
        let err = sync
            .wait_for_snapshot(&btc(), Timestamp::new(20))
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Timeout { .. }));
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(11));
        assert!(sync.slots().contains(&btc()));
    }
}
