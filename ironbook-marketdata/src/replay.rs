//! Replay buffer for diffs that arrive ahead of their base snapshot.

use ironbook_channel::BoundedRing;
use ironbook_core::{Nonce, OrderBookMessage};

/// Default number of diffs held while awaiting a snapshot.
pub const DEFAULT_REPLAY_CAPACITY: usize = 1000;

/// Bounded FIFO of early diffs. The oldest diff is dropped on overflow.
#[derive(Debug)]
pub struct ReplayBuffer {
    ring: BoundedRing<OrderBookMessage>,
}

impl ReplayBuffer {
    /// Creates a buffer holding at most `capacity` diffs.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            ring: BoundedRing::new(capacity),
        }
    }

    /// Buffers a diff, returning the oldest one if it had to be dropped.
    pub fn push(&mut self, diff: OrderBookMessage) -> Option<OrderBookMessage> {
        self.ring.push(diff)
    }

    /// Empties the buffer and returns the diffs newer than `nonce`, in
    /// ascending nonce order. Everything at or below `nonce` is discarded.
    pub fn take_after(&mut self, nonce: Nonce) -> Vec<OrderBookMessage> {
        let mut newer: Vec<_> = self.ring.drain().filter(|d| d.nonce > nonce).collect();
        newer.sort_by_key(|d| d.nonce);
        newer
    }

    /// Returns the number of buffered diffs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns true if nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Returns the configured capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ring.capacity()
    }

    /// Total diffs dropped on overflow since creation.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.ring.evicted()
    }
}

impl Default for ReplayBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_REPLAY_CAPACITY)
    }
}
