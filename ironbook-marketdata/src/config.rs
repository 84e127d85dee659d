//! Tracker configuration.
//!
//! Every field has a default, so a JSON file only needs the values it
//! changes:
//!
//! ```json
//! {
//!   "instruments": ["BTC-USD", "ETH-USD"],
//!   "message_timeout_secs": 30,
//!   "snapshot_refresh": { "mode": "interval", "secs": 600 },
//!   "resync_on_gap": true
//! }
//! ```

use crate::error::ConfigError;
use crate::reconciler::ReconcilerConfig;
use ironbook_client::{ReconnectConfig, SessionConfig};
use ironbook_core::InstrumentId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// When tracked instruments are asked for a fresh snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SnapshotRefresh {
    /// At the top of every UTC hour.
    TopOfHour,
    /// Every `secs` seconds.
    Interval {
        /// Seconds between re-requests.
        secs: u64,
    },
    /// Never; snapshots come only from subscribe and explicit requests.
    Disabled,
}

/// Configuration for an order book tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Static instrument list used when no catalog is attached.
    pub instruments: Vec<InstrumentId>,
    /// Hub addressed by subscriptions and snapshot queries.
    pub hub: String,
    /// Seconds without a frame before the feed is considered dead.
    pub message_timeout_secs: u64,
    /// Seconds allowed for establishing the transport.
    pub connect_timeout_secs: u64,
    /// Query a snapshot right after each subscription.
    pub request_snapshot_on_subscribe: bool,
    /// First reconnect delay, in milliseconds.
    pub reconnect_initial_delay_ms: u64,
    /// Upper bound for the reconnect delay, in seconds.
    pub reconnect_max_delay_secs: u64,
    /// Reconnect delay growth factor.
    pub reconnect_backoff_multiplier: f64,
    /// Seconds to wait for a requested snapshot.
    pub snapshot_timeout_secs: u64,
    /// Milliseconds between snapshot slot polls.
    pub snapshot_poll_ms: u64,
    /// Periodic snapshot re-request schedule.
    pub snapshot_refresh: SnapshotRefresh,
    /// Diffs buffered per instrument while awaiting a snapshot.
    pub replay_capacity: usize,
    /// Per-instrument inbound queue capacity.
    pub queue_capacity: usize,
    /// Recently applied diffs kept per instrument.
    pub diff_window: usize,
    /// Capacity of the applied diff broadcast.
    pub diff_broadcast_capacity: usize,
    /// Seconds a reconciler pauses after a failed message.
    pub error_backoff_secs: u64,
    /// Resync an instrument when its nonces jump while synced.
    pub resync_on_gap: bool,
    /// Base URL of the REST API serving the instrument catalog.
    pub rest_url: String,
    /// Seconds a fetched catalog stays fresh.
    pub catalog_ttl_secs: u64,
    /// Seconds between tracked set refreshes from the catalog.
    pub catalog_refresh_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            instruments: Vec::new(),
            hub: ironbook_client::builder::DEFAULT_HUB.to_string(),
            message_timeout_secs: 30,
            connect_timeout_secs: 10,
            request_snapshot_on_subscribe: true,
            reconnect_initial_delay_ms: 100,
            reconnect_max_delay_secs: 30,
            reconnect_backoff_multiplier: 2.0,
            snapshot_timeout_secs: 10,
            snapshot_poll_ms: 1000,
            snapshot_refresh: SnapshotRefresh::TopOfHour,
            replay_capacity: 1000,
            queue_capacity: 4096,
            diff_window: 32,
            diff_broadcast_capacity: 4096,
            error_backoff_secs: 5,
            resync_on_gap: false,
            rest_url: crate::instruments::DEFAULT_REST_URL.to_string(),
            catalog_ttl_secs: 30 * 60,
            catalog_refresh_secs: 5 * 60,
        }
    }
}

impl TrackerConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the JSON is malformed or a value is unusable.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON configuration file.
    ///
    /// # Errors
    /// Returns [`ConfigError`] if the file cannot be read or is invalid.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Checks that capacities and timeouts are usable.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("message_timeout_secs", self.message_timeout_secs),
            ("connect_timeout_secs", self.connect_timeout_secs),
            ("snapshot_timeout_secs", self.snapshot_timeout_secs),
            ("snapshot_poll_ms", self.snapshot_poll_ms),
            ("replay_capacity", self.replay_capacity as u64),
            ("queue_capacity", self.queue_capacity as u64),
            ("diff_window", self.diff_window as u64),
            ("diff_broadcast_capacity", self.diff_broadcast_capacity as u64),
            ("catalog_refresh_secs", self.catalog_refresh_secs),
            ("reconnect_initial_delay_ms", self.reconnect_initial_delay_ms),
            ("reconnect_max_delay_secs", self.reconnect_max_delay_secs),
        ];
        if let Some((field, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::invalid(field, "must be greater than zero"));
        }
        if self.hub.is_empty() {
            return Err(ConfigError::invalid("hub", "must not be empty"));
        }
        if self.reconnect_backoff_multiplier.is_nan() || self.reconnect_backoff_multiplier < 1.0 {
            return Err(ConfigError::invalid(
                "reconnect_backoff_multiplier",
                "must be at least 1.0",
            ));
        }
        if let SnapshotRefresh::Interval { secs: 0 } = self.snapshot_refresh {
            return Err(ConfigError::invalid(
                "snapshot_refresh",
                "interval must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Feed session settings.
    #[must_use]
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            hub: self.hub.clone(),
            message_timeout: Duration::from_secs(self.message_timeout_secs),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_snapshot_on_subscribe: self.request_snapshot_on_subscribe,
        }
    }

    /// Reconnect backoff settings.
    #[must_use]
    pub fn reconnect_config(&self) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(self.reconnect_initial_delay_ms),
            max_delay: Duration::from_secs(self.reconnect_max_delay_secs),
            backoff_multiplier: self.reconnect_backoff_multiplier,
        }
    }

    /// Per-instrument reconciler settings.
    #[must_use]
    pub fn reconciler_config(&self) -> ReconcilerConfig {
        ReconcilerConfig {
            replay_capacity: self.replay_capacity,
            diff_window: self.diff_window,
            error_backoff: Duration::from_secs(self.error_backoff_secs),
            resync_on_gap: self.resync_on_gap,
        }
    }

    /// Time to wait for a requested snapshot.
    #[must_use]
    pub fn snapshot_timeout(&self) -> Duration {
        Duration::from_secs(self.snapshot_timeout_secs)
    }

    /// Interval between snapshot slot polls.
    #[must_use]
    pub fn snapshot_poll_interval(&self) -> Duration {
        Duration::from_millis(self.snapshot_poll_ms)
    }

    /// Lifetime of a fetched catalog.
    #[must_use]
    pub fn catalog_ttl(&self) -> Duration {
        Duration::from_secs(self.catalog_ttl_secs)
    }

    /// Interval between catalog-driven refreshes.
    #[must_use]
    pub fn catalog_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.catalog_refresh_secs)
    }
}
