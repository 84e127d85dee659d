//! Session configuration and builder.

use crate::session::{Connector, FeedSession, SubscriptionSource};
use ironbook_core::InstrumentId;
use std::sync::Arc;
use std::time::Duration;

/// Default hub name for market data invocations.
pub const DEFAULT_HUB: &str = "c2";

/// Configuration for a feed session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Hub that subscription and snapshot invocations are addressed to.
    pub hub: String,
    /// Inactivity window after which the frame stream ends.
    pub message_timeout: Duration,
    /// Maximum time to establish the transport.
    pub connect_timeout: Duration,
    /// Issue an explicit snapshot query after each subscription.
    pub request_snapshot_on_subscribe: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            hub: DEFAULT_HUB.to_string(),
            message_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            request_snapshot_on_subscribe: true,
        }
    }
}

/// Builder for configuring and creating a feed session.
pub struct SessionBuilder<C> {
    connector: C,
    config: SessionConfig,
    subscriptions: Option<Arc<dyn SubscriptionSource>>,
}

impl<C: Connector> SessionBuilder<C> {
    /// Creates a new builder over the given transport connector.
    #[must_use]
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            config: SessionConfig::default(),
            subscriptions: None,
        }
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the hub name.
    #[must_use]
    pub fn hub(mut self, hub: impl Into<String>) -> Self {
        self.config.hub = hub.into();
        self
    }

    /// Sets the inactivity timeout.
    #[must_use]
    pub fn message_timeout(mut self, timeout: Duration) -> Self {
        self.config.message_timeout = timeout;
        self
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Enables or disables snapshot queries on subscribe.
    #[must_use]
    pub fn request_snapshot_on_subscribe(mut self, enabled: bool) -> Self {
        self.config.request_snapshot_on_subscribe = enabled;
        self
    }

    /// Sets where the instrument list is read from on every connect.
    #[must_use]
    pub fn subscriptions(mut self, source: Arc<dyn SubscriptionSource>) -> Self {
        self.subscriptions = Some(source);
        self
    }

    /// Builds the session. Nothing connects until [`FeedSession::connect`].
    #[must_use]
    pub fn build(self) -> FeedSession<C> {
        let subscriptions = self
            .subscriptions
            .unwrap_or_else(|| Arc::new(Vec::<InstrumentId>::new()) as Arc<dyn SubscriptionSource>);
        FeedSession::new(self.connector, subscriptions, self.config)
    }
}
