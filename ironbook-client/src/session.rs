//! Feed session management.
//!
//! A [`FeedSession`] owns at most one transport connection. Connecting
//! subscribes every instrument the [`SubscriptionSource`] reports at that
//! moment, so a reconnect always follows the current tracked set. The frame
//! stream ends when nothing arrives within the message timeout, which turns
//! a silently dead connection into an observable end-of-stream.

use crate::builder::SessionConfig;
use crate::error::ClientError;
use async_trait::async_trait;
use futures::Stream;
use ironbook_core::{HubInvocation, InstrumentId};
use std::sync::Arc;
use tokio::time::Instant;

/// A frame read from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedFrame {
    /// JSON text frame.
    Text(String),
    /// Ping, pong or any frame that carries no feed content.
    Control,
}

/// One live transport connection.
#[async_trait]
pub trait FeedConnection: Send {
    /// Sends a text frame.
    ///
    /// # Errors
    /// Returns an error if the transport fails.
    async fn send_text(&mut self, text: String) -> Result<(), ClientError>;

    /// Receives the next frame.
    ///
    /// # Returns
    /// `Ok(Some(frame))` if received, `Ok(None)` if the connection closed.
    ///
    /// # Errors
    /// Returns an error if the transport fails.
    async fn recv(&mut self) -> Result<Option<FeedFrame>, ClientError>;

    /// Closes the connection.
    ///
    /// # Errors
    /// Returns an error if the close handshake fails.
    async fn close(&mut self) -> Result<(), ClientError>;
}

/// Factory for transport connections.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Connection type produced by this connector.
    type Connection: FeedConnection + 'static;

    /// Establishes a new connection.
    ///
    /// # Errors
    /// Returns an error if the transport cannot be established.
    async fn connect(&self) -> Result<Self::Connection, ClientError>;
}

/// Supplies the instruments to subscribe on each connect.
pub trait SubscriptionSource: Send + Sync {
    /// Returns the instruments to subscribe right now.
    fn instruments(&self) -> Vec<InstrumentId>;
}

impl SubscriptionSource for Vec<InstrumentId> {
    fn instruments(&self) -> Vec<InstrumentId> {
        self.clone()
    }
}

/// Push feed session wrapping one transport connection at a time.
pub struct FeedSession<C: Connector> {
    connector: C,
    config: SessionConfig,
    subscriptions: Arc<dyn SubscriptionSource>,
    connection: Option<C::Connection>,
    subscribed: Vec<InstrumentId>,
    next_invocation_id: u64,
    last_activity: Instant,
}

impl<C: Connector> FeedSession<C> {
    /// Creates a disconnected session.
    #[must_use]
    pub fn new(
        connector: C,
        subscriptions: Arc<dyn SubscriptionSource>,
        config: SessionConfig,
    ) -> Self {
        Self {
            connector,
            config,
            subscriptions,
            connection: None,
            subscribed: Vec::new(),
            next_invocation_id: 0,
            last_activity: Instant::now(),
        }
    }

    /// Returns the session configuration.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns true while a connection is held.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    /// Returns the instruments subscribed on the current connection.
    #[must_use]
    pub fn subscribed(&self) -> &[InstrumentId] {
        &self.subscribed
    }

    /// Connects and subscribes every instrument from the subscription source.
    ///
    /// Calling this while connected is a no-op that keeps the existing
    /// connection.
    ///
    /// # Errors
    /// Returns `ClientError` if the transport cannot be established in time
    /// or a subscription cannot be sent. No connection is kept on error.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        if self.connection.is_some() {
            return Ok(());
        }

        let mut connection =
            tokio::time::timeout(self.config.connect_timeout, self.connector.connect())
                .await
                .map_err(|_| ClientError::ConnectTimeout)??;

        self.next_invocation_id = 0;
        let instruments = self.subscriptions.instruments();

        if let Err(e) = self.subscribe_all(&mut connection, &instruments).await {
            let _ = connection.close().await;
            return Err(e);
        }

        tracing::info!("Feed connected, {} instruments subscribed", instruments.len());
        self.subscribed = instruments;
        self.connection = Some(connection);
        self.last_activity = Instant::now();
        Ok(())
    }

    async fn subscribe_all(
        &mut self,
        connection: &mut C::Connection,
        instruments: &[InstrumentId],
    ) -> Result<(), ClientError> {
        for instrument in instruments {
            self.send_subscription(connection, instrument).await?;
        }
        Ok(())
    }

    async fn send_subscription(
        &mut self,
        connection: &mut C::Connection,
        instrument: &InstrumentId,
    ) -> Result<(), ClientError> {
        let id = self.invocation_id();
        let subscribe = HubInvocation::subscribe(&self.config.hub, instrument, id);
        connection.send_text(subscribe.to_text()?).await?;
        tracing::info!("Subscribed to {} deltas", instrument);

        if self.config.request_snapshot_on_subscribe {
            let id = self.invocation_id();
            let query = HubInvocation::query_state(&self.config.hub, instrument, id);
            connection.send_text(query.to_text()?).await?;
            tracing::debug!("Queried {} snapshot", instrument);
        }
        Ok(())
    }

    /// Subscribes one more instrument on the live connection.
    ///
    /// Instruments already subscribed on this connection are skipped.
    ///
    /// # Errors
    /// Returns [`ClientError::NotConnected`] without a connection, or the
    /// transport error if the send fails.
    pub async fn subscribe(&mut self, instrument: &InstrumentId) -> Result<(), ClientError> {
        if self.subscribed.contains(instrument) {
            return Ok(());
        }
        let mut connection = self.connection.take().ok_or(ClientError::NotConnected)?;
        let result = self.send_subscription(&mut connection, instrument).await;
        self.connection = Some(connection);
        result?;
        self.subscribed.push(instrument.clone());
        Ok(())
    }

    fn invocation_id(&mut self) -> u64 {
        let id = self.next_invocation_id;
        self.next_invocation_id += 1;
        id
    }

    /// Requests a fresh snapshot for `instrument` over the live connection.
    ///
    /// # Errors
    /// Returns [`ClientError::NotConnected`] without a connection, or the
    /// transport error if the send fails.
    pub async fn query_snapshot(&mut self, instrument: &InstrumentId) -> Result<(), ClientError> {
        let id = self.invocation_id();
        let query = HubInvocation::query_state(&self.config.hub, instrument, id);
        let connection = self.connection.as_mut().ok_or(ClientError::NotConnected)?;
        connection.send_text(query.to_text()?).await
    }

    /// Waits for the next text frame.
    ///
    /// Returns `None` when the stream is over: no text frame within the
    /// message timeout of the previous one, transport error, peer close, or no
    /// connection at all. The caller is expected to
    /// [`disconnect`](Self::disconnect) and reconnect.
    ///
    /// Cancel safe: dropping the future does not move the inactivity deadline.
    pub async fn next_frame(&mut self) -> Option<String> {
        let timeout = self.config.message_timeout;
        let deadline = self.last_activity + timeout;
        let connection = self.connection.as_mut()?;

        loop {
            match tokio::time::timeout_at(deadline, connection.recv()).await {
                Ok(Ok(Some(FeedFrame::Text(text)))) => {
                    self.last_activity = Instant::now();
                    return Some(text);
                }
                Ok(Ok(Some(FeedFrame::Control))) => continue,
                Ok(Ok(None)) => {
                    tracing::warn!("Feed connection closed by peer");
                    return None;
                }
                Ok(Err(e)) => {
                    tracing::warn!("Feed transport error: {}", e);
                    return None;
                }
                Err(_) => {
                    tracing::warn!("No message within {:?}, going to reconnect", timeout);
                    return None;
                }
            }
        }
    }

    /// Lazy stream of text frames, ending under the same conditions as
    /// [`next_frame`](Self::next_frame).
    pub fn frames(&mut self) -> impl Stream<Item = String> + '_ {
        futures::stream::unfold(self, |session| async move {
            session.next_frame().await.map(|frame| (frame, session))
        })
    }

    /// Tears down the connection and clears subscription state.
    pub async fn disconnect(&mut self) {
        if let Some(mut connection) = self.connection.take()
            && let Err(e) = connection.close().await
        {
            tracing::debug!("Error closing feed connection: {}", e);
        }
        self.subscribed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SessionBuilder;
    use crate::memory::MemoryConnector;
    use futures::StreamExt;
    use parking_lot::RwLock;
    use std::time::Duration;

    struct SharedSet(RwLock<Vec<InstrumentId>>);

    impl SubscriptionSource for SharedSet {
        fn instruments(&self) -> Vec<InstrumentId> {
            self.0.read().clone()
        }
    }

    fn id(s: &str) -> InstrumentId {
        InstrumentId::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_connect_subscribes_and_queries() {
        let connector = MemoryConnector::new();
        let mut session = SessionBuilder::new(connector.clone())
            .subscriptions(Arc::new(vec![id("BTC-USD")]))
            .build();

        session.connect().await.unwrap();
        assert!(session.is_connected());
        assert_eq!(session.subscribed(), &[id("BTC-USD")]);

        let sent = connector.sent(0);
        assert_eq!(sent.len(), 2);
        assert!(sent[0].contains("SubscribeToExchangeDeltas"));
        assert!(sent[0].contains("USD-BTC"));
        assert!(sent[1].contains("queryExchangeState"));
    }

    #[tokio::test]
    async fn test_invocation_ids_increase_per_frame() {
        let connector = MemoryConnector::new();
        let mut session = SessionBuilder::new(connector.clone())
            .subscriptions(Arc::new(vec![id("BTC-USD"), id("ETH-USD")]))
            .build();

        session.connect().await.unwrap();
        let ids: Vec<u64> = connector
            .sent(0)
            .iter()
            .map(|f| {
                let value: serde_json::Value = serde_json::from_str(f).unwrap();
                value["I"].as_u64().unwrap()
            })
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let connector = MemoryConnector::new();
        let mut session = SessionBuilder::new(connector.clone())
            .subscriptions(Arc::new(vec![id("BTC-USD")]))
            .build();

        session.connect().await.unwrap();
        session.connect().await.unwrap();
        assert_eq!(connector.connect_count(), 1);
        assert_eq!(connector.sent(0).len(), 2);
    }

    #[tokio::test]
    async fn test_snapshot_query_can_be_disabled() {
        let connector = MemoryConnector::new();
        let mut session = SessionBuilder::new(connector.clone())
            .subscriptions(Arc::new(vec![id("BTC-USD"), id("ETH-USD")]))
            .request_snapshot_on_subscribe(false)
            .build();

        session.connect().await.unwrap();
        let sent = connector.sent(0);
        assert_eq!(sent.len(), 2);
        assert!(sent.iter().all(|f| f.contains("SubscribeToExchangeDeltas")));
    }

    #[tokio::test]
    async fn test_reconnect_uses_current_subscriptions() {
        let connector = MemoryConnector::new();
        let source = Arc::new(SharedSet(RwLock::new(vec![id("BTC-USD")])));
        let mut session = SessionBuilder::new(connector.clone())
            .subscriptions(source.clone())
            .request_snapshot_on_subscribe(false)
            .build();

        session.connect().await.unwrap();
        session.disconnect().await;
        assert!(!session.is_connected());

        *source.0.write() = vec![id("ETH-USD"), id("LTC-BTC")];
        session.connect().await.unwrap();

        assert_eq!(connector.connect_count(), 2);
        let sent = connector.sent(1);
        assert_eq!(sent.len(), 2);
        assert!(sent[0].contains("USD-ETH"));
        assert!(sent[1].contains("BTC-LTC"));
    }

    #[tokio::test]
    async fn test_connect_failure_keeps_no_connection() {
        let connector = MemoryConnector::new();
        connector.fail_next_connects(1);
        let mut session = SessionBuilder::new(connector.clone()).build();

        assert!(session.connect().await.is_err());
        assert!(!session.is_connected());
        assert!(session.connect().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_frames_end_after_inactivity() {
        let connector = MemoryConnector::new();
        let mut session = SessionBuilder::new(connector.clone())
            .message_timeout(Duration::from_secs(30))
            .build();
        session.connect().await.unwrap();

        connector.push_text("one");
        connector.push_control();
        connector.push_text("two");

        let frames: Vec<String> = session.frames().collect().await;
        assert_eq!(frames, vec!["one".to_string(), "two".to_string()]);
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_frames_end_on_peer_close() {
        let connector = MemoryConnector::new();
        let mut session = SessionBuilder::new(connector.clone()).build();
        session.connect().await.unwrap();

        connector.push_text("only");
        connector.close_current();

        assert_eq!(session.next_frame().await.as_deref(), Some("only"));
        assert!(session.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn test_subscribe_on_live_connection() {
        let connector = MemoryConnector::new();
        let mut session = SessionBuilder::new(connector.clone())
            .subscriptions(Arc::new(vec![id("BTC-USD")]))
            .request_snapshot_on_subscribe(false)
            .build();

        assert!(matches!(
            session.subscribe(&id("ETH-USD")).await,
            Err(ClientError::NotConnected)
        ));

        session.connect().await.unwrap();
        session.subscribe(&id("ETH-USD")).await.unwrap();
        session.subscribe(&id("BTC-USD")).await.unwrap();

        assert_eq!(session.subscribed(), &[id("BTC-USD"), id("ETH-USD")]);
        let sent = connector.sent(0);
        assert_eq!(sent.len(), 2);
        assert!(sent[1].contains("USD-ETH"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_wait_keeps_deadline() {
        let connector = MemoryConnector::new();
        let mut session = SessionBuilder::new(connector.clone())
            .message_timeout(Duration::from_secs(30))
            .build();
        session.connect().await.unwrap();

        let first = tokio::time::timeout(Duration::from_secs(20), session.next_frame()).await;
        assert!(first.is_err());

        let start = tokio::time::Instant::now();
        assert!(session.next_frame().await.is_none());
        assert!(start.elapsed() <= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_query_snapshot_requires_connection() {
        let connector = MemoryConnector::new();
        let mut session = SessionBuilder::new(connector.clone()).build();

        let err = session.query_snapshot(&id("BTC-USD")).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConnected));

        session.connect().await.unwrap();
        session.query_snapshot(&id("BTC-USD")).await.unwrap();
        assert!(connector.sent(0)[0].contains("queryExchangeState"));
    }
}
