//! In-memory connector for driving a session without a network.
//!
//! Every successful connect opens a fresh connection whose inbound frames are
//! scripted with [`MemoryConnector::push_text`] and whose outbound frames are
//! recorded per connection.

use crate::error::ClientError;
use crate::session::{Connector, FeedConnection, FeedFrame};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

struct MemoryState {
    current: Option<mpsc::UnboundedSender<FeedFrame>>,
    pending: Vec<FeedFrame>,
    sent: Vec<Arc<Mutex<Vec<String>>>>,
    fail_next: usize,
}

/// Scripted connector. Clones share the same state.
#[derive(Clone)]
pub struct MemoryConnector {
    state: Arc<Mutex<MemoryState>>,
    connects: Arc<watch::Sender<usize>>,
}

impl MemoryConnector {
    /// Creates a connector with no connections yet.
    #[must_use]
    pub fn new() -> Self {
        let (connects, _) = watch::channel(0);
        Self {
            state: Arc::new(Mutex::new(MemoryState {
                current: None,
                pending: Vec::new(),
                sent: Vec::new(),
                fail_next: 0,
            })),
            connects: Arc::new(connects),
        }
    }

    /// Queues a text frame on the current connection, or on the next one if
    /// none is open.
    pub fn push_text(&self, text: impl Into<String>) {
        self.push(FeedFrame::Text(text.into()));
    }

    /// Queues a control frame.
    pub fn push_control(&self) {
        self.push(FeedFrame::Control);
    }

    fn push(&self, frame: FeedFrame) {
        let mut state = self.state.lock();
        let frame = match &state.current {
            Some(tx) => match tx.send(frame) {
                Ok(()) => return,
                Err(mpsc::error::SendError(frame)) => frame,
            },
            None => frame,
        };
        state.current = None;
        state.pending.push(frame);
    }

    /// Closes the current connection from the peer side. Frames already
    /// queued are still delivered before the close.
    pub fn close_current(&self) {
        self.state.lock().current = None;
    }

    /// Makes the next `n` connect attempts fail.
    pub fn fail_next_connects(&self, n: usize) {
        self.state.lock().fail_next = n;
    }

    /// Number of successful connects so far.
    #[must_use]
    pub fn connect_count(&self) -> usize {
        self.state.lock().sent.len()
    }

    /// Frames sent on the `idx`-th connection, oldest first.
    #[must_use]
    pub fn sent(&self, idx: usize) -> Vec<String> {
        self.state
            .lock()
            .sent
            .get(idx)
            .map(|sent| sent.lock().clone())
            .unwrap_or_default()
    }

    /// Waits until at least `n` connects have succeeded.
    pub async fn wait_for_connects(&self, n: usize) {
        let mut rx = self.connects.subscribe();
        let _ = rx.wait_for(|count| *count >= n).await;
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(&self) -> Result<MemoryConnection, ClientError> {
        let (connection, count) = {
            let mut state = self.state.lock();
            if state.fail_next > 0 {
                state.fail_next -= 1;
                return Err(ClientError::transport("scripted connect failure"));
            }

            let (tx, rx) = mpsc::unbounded_channel();
            for frame in state.pending.drain(..) {
                let _ = tx.send(frame);
            }
            let sent = Arc::new(Mutex::new(Vec::new()));
            state.sent.push(Arc::clone(&sent));
            state.current = Some(tx);
            (MemoryConnection { inbound: rx, sent }, state.sent.len())
        };

        self.connects.send_replace(count);
        Ok(connection)
    }
}

/// Connection produced by [`MemoryConnector`].
pub struct MemoryConnection {
    inbound: mpsc::UnboundedReceiver<FeedFrame>,
    sent: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl FeedConnection for MemoryConnection {
    async fn send_text(&mut self, text: String) -> Result<(), ClientError> {
        self.sent.lock().push(text);
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<FeedFrame>, ClientError> {
        Ok(self.inbound.recv().await)
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.inbound.close();
        Ok(())
    }
}
