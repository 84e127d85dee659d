//! Broadcast channel for one-to-many messaging.
//!
//! A bounded, lossy broadcast: senders never block, the oldest buffered
//! message is evicted when the buffer is full, and receivers that fall behind
//! the eviction point are told how many messages they missed.

use parking_lot::RwLock;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Notify;

/// Creates a new broadcast channel with the given capacity.
///
/// # Arguments
/// * `capacity` - Maximum number of messages to buffer
///
/// # Returns
/// A sender that can create receivers.
#[must_use]
pub fn channel<T: Clone>(capacity: usize) -> BroadcastSender<T> {
    BroadcastSender::new(capacity)
}

/// Error returned by [`BroadcastReceiver::try_recv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TryRecvError {
    /// No new message is buffered.
    Empty,
    /// The receiver fell behind; this many messages were skipped.
    Lagged(u64),
    /// Every sender is gone and the buffer is drained.
    Closed,
}

/// Error returned by [`BroadcastReceiver::recv`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvError {
    /// The receiver fell behind; this many messages were skipped.
    Lagged(u64),
    /// Every sender is gone and the buffer is drained.
    Closed,
}

impl fmt::Display for RecvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lagged(n) => write!(f, "receiver lagged by {n} messages"),
            Self::Closed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for RecvError {}

/// Shared state for the broadcast channel.
struct BroadcastState<T> {
    /// Message buffer, contiguous by sequence.
    buffer: VecDeque<(u64, T)>,
    /// Sequence assigned to the next message.
    sequence: u64,
    /// Channel capacity.
    capacity: usize,
    /// Live sender handles.
    senders: usize,
}

struct Shared<T> {
    state: RwLock<BroadcastState<T>>,
    notify: Notify,
}

/// Sender half of a broadcast channel. Cloning adds another producer.
pub struct BroadcastSender<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone> BroadcastSender<T> {
    /// Creates a new broadcast sender.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of messages to buffer (at least one)
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            shared: Arc::new(Shared {
                state: RwLock::new(BroadcastState {
                    buffer: VecDeque::with_capacity(capacity),
                    sequence: 0,
                    capacity,
                    senders: 1,
                }),
                notify: Notify::new(),
            }),
        }
    }

    /// Sends a message to all receivers.
    ///
    /// # Returns
    /// The sequence number of the sent message.
    pub fn send(&self, item: T) -> u64 {
        let seq = {
            let mut state = self.shared.state.write();
            let seq = state.sequence;
            state.sequence += 1;

            while state.buffer.len() >= state.capacity {
                state.buffer.pop_front();
            }

            state.buffer.push_back((seq, item));
            seq
        };
        self.shared.notify.notify_waiters();
        seq
    }

    /// Creates a new receiver that starts at the next send.
    #[must_use]
    pub fn subscribe(&self) -> BroadcastReceiver<T> {
        let next_seq = self.shared.state.read().sequence;
        BroadcastReceiver {
            shared: Arc::clone(&self.shared),
            next_seq,
        }
    }

    /// Creates a new receiver that will receive all buffered messages.
    #[must_use]
    pub fn subscribe_from_start(&self) -> BroadcastReceiver<T> {
        let state = self.shared.state.read();
        let next_seq = state
            .buffer
            .front()
            .map_or(state.sequence, |(seq, _)| *seq);
        drop(state);

        BroadcastReceiver {
            shared: Arc::clone(&self.shared),
            next_seq,
        }
    }

    /// Returns the sequence that the next message will receive.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.shared.state.read().sequence
    }

    /// Returns the number of buffered messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.state.read().buffer.len()
    }

    /// Returns true if the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Clone for BroadcastSender<T> {
    fn clone(&self) -> Self {
        self.shared.state.write().senders += 1;
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Drop for BroadcastSender<T> {
    fn drop(&mut self) {
        let last = {
            let mut state = self.shared.state.write();
            state.senders -= 1;
            state.senders == 0
        };
        if last {
            self.shared.notify.notify_waiters();
        }
    }
}

/// Receiver half of a broadcast channel.
pub struct BroadcastReceiver<T> {
    shared: Arc<Shared<T>>,
    next_seq: u64,
}

impl<T: Clone> BroadcastReceiver<T> {
    /// Receives the next buffered message without waiting.
    ///
    /// # Errors
    /// [`TryRecvError::Empty`] when nothing new is buffered,
    /// [`TryRecvError::Lagged`] when messages were evicted before being read
    /// (the receiver skips ahead to the oldest buffered message), and
    /// [`TryRecvError::Closed`] once all senders are dropped and the buffer
    /// holds nothing new.
    pub fn try_recv(&mut self) -> Result<(u64, T), TryRecvError> {
        let state = self.shared.state.read();

        if let Some((front_seq, _)) = state.buffer.front()
            && self.next_seq < *front_seq
        {
            let missed = front_seq - self.next_seq;
            self.next_seq = *front_seq;
            return Err(TryRecvError::Lagged(missed));
        }

        let front_seq = state.buffer.front().map_or(state.sequence, |(s, _)| *s);
        let index = (self.next_seq - front_seq) as usize;
        if let Some((seq, item)) = state.buffer.get(index) {
            self.next_seq = seq + 1;
            return Ok((*seq, item.clone()));
        }

        if state.senders == 0 {
            Err(TryRecvError::Closed)
        } else {
            Err(TryRecvError::Empty)
        }
    }

    /// Waits for the next message.
    ///
    /// # Errors
    /// [`RecvError::Lagged`] if messages were missed, [`RecvError::Closed`]
    /// once all senders are gone and the buffer is drained.
    pub async fn recv(&mut self) -> Result<(u64, T), RecvError> {
        loop {
            let shared = Arc::clone(&self.shared);
            let notified = shared.notify.notified();

            match self.try_recv() {
                Ok(message) => return Ok(message),
                Err(TryRecvError::Lagged(n)) => return Err(RecvError::Lagged(n)),
                Err(TryRecvError::Closed) => return Err(RecvError::Closed),
                Err(TryRecvError::Empty) => notified.await,
            }
        }
    }

    /// Receives all available messages, skipping over any that were evicted.
    pub fn recv_all(&mut self) -> Vec<(u64, T)> {
        let mut result = Vec::new();
        loop {
            match self.try_recv() {
                Ok(message) => result.push(message),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
        result
    }

    /// Checks if any sender is still connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.shared.state.read().senders > 0
    }

    /// Returns the number of messages sent but not yet read by this receiver.
    #[must_use]
    pub fn lag(&self) -> u64 {
        let state = self.shared.state.read();
        state.sequence.saturating_sub(self.next_seq)
    }

    /// Returns the next expected sequence number.
    #[must_use]
    pub fn next_sequence(&self) -> u64 {
        self.next_seq
    }
}

impl<T> Clone for BroadcastReceiver<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            next_seq: self.next_seq,
        }
    }
}
