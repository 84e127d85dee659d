//! Reconnection backoff for the feed session.
//!
//! A market data feed keeps reconnecting for the life of the process, so
//! there is no attempt cap: failures only stretch the delay up to
//! [`ReconnectConfig::max_delay`].

use std::time::Duration;

/// Configuration for reconnection behavior.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Initial delay before first reconnect attempt.
    pub initial_delay: Duration,
    /// Maximum delay between reconnect attempts.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
        }
    }
}

/// Tracks reconnection state and calculates delays.
#[derive(Debug)]
pub struct ReconnectState {
    config: ReconnectConfig,
    attempts: usize,
    current_delay: Duration,
}

impl ReconnectState {
    /// Creates a new reconnect state with the given configuration.
    #[must_use]
    pub fn new(config: ReconnectConfig) -> Self {
        let initial_delay = config.initial_delay;
        Self {
            config,
            attempts: 0,
            current_delay: initial_delay,
        }
    }

    /// Records a failed connection attempt and returns the delay before the
    /// next attempt.
    pub fn on_failure(&mut self) -> Duration {
        self.attempts += 1;

        let delay = self.current_delay;

        let next_delay = Duration::from_secs_f64(
            self.current_delay.as_secs_f64() * self.config.backoff_multiplier.max(1.0),
        );
        self.current_delay = next_delay.min(self.config.max_delay);

        delay
    }

    /// Resets the reconnection state after a successful connection.
    pub fn on_success(&mut self) {
        self.attempts = 0;
        self.current_delay = self.config.initial_delay;
    }

    /// Returns the number of consecutive failed attempts.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts
    }
}
