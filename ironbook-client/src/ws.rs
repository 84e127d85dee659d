//! WebSocket transport for the push feed.

use crate::error::ClientError;
use crate::session::{Connector, FeedConnection, FeedFrame};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

/// Default push feed endpoint.
pub const DEFAULT_FEED_URL: &str = "wss://ftx.com/ws/";

/// Connects to a fixed WebSocket URL.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    /// Creates a connector for `url`.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new(DEFAULT_FEED_URL)
    }
}

#[async_trait]
impl Connector for WsConnector {
    type Connection = WsConnection;

    async fn connect(&self) -> Result<WsConnection, ClientError> {
        let (stream, response) = connect_async(self.url.as_str()).await?;
        tracing::debug!("WebSocket handshake to {} ({})", self.url, response.status());
        Ok(WsConnection { stream })
    }
}

/// Live WebSocket connection.
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FeedConnection for WsConnection {
    async fn send_text(&mut self, text: String) -> Result<(), ClientError> {
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<FeedFrame>, ClientError> {
        match self.stream.next().await {
            None | Some(Ok(Message::Close(_))) => Ok(None),
            Some(Err(e)) => Err(e.into()),
            Some(Ok(Message::Text(text))) => Ok(Some(FeedFrame::Text(text.as_str().to_owned()))),
            Some(Ok(Message::Binary(data))) => match String::from_utf8(data.to_vec()) {
                Ok(text) => Ok(Some(FeedFrame::Text(text))),
                Err(_) => Ok(Some(FeedFrame::Control)),
            },
            Some(Ok(_)) => Ok(Some(FeedFrame::Control)),
        }
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        self.stream.close(None).await?;
        Ok(())
    }
}
