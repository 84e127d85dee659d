//! Periodic snapshot re-requests.

use crate::config::SnapshotRefresh;
use crate::driver::FeedCommand;
use chrono::{DateTime, TimeDelta, Timelike, Utc};
use ironbook_client::SubscriptionSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

const ONE_HOUR: Duration = Duration::from_secs(3600);

/// Time from `now` until the next top of a UTC hour.
#[must_use]
pub fn until_next_hour(now: DateTime<Utc>) -> Duration {
    now.with_minute(0)
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .map(|this_hour| this_hour + TimeDelta::hours(1))
        .and_then(|next_hour| (next_hour - now).to_std().ok())
        .unwrap_or(ONE_HOUR)
}

impl SnapshotRefresh {
    /// Delay until the next scheduled re-request, `None` when disabled.
    #[must_use]
    pub fn next_delay(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            Self::TopOfHour => Some(until_next_hour(now)),
            Self::Interval { secs } => Some(Duration::from_secs(*secs)),
            Self::Disabled => None,
        }
    }
}

/// Asks for a snapshot of every tracked instrument on each tick of
/// `schedule`, until cancelled.
pub async fn run_snapshot_schedule(
    schedule: SnapshotRefresh,
    tracked: Arc<dyn SubscriptionSource>,
    commands: mpsc::UnboundedSender<FeedCommand>,
    cancel: CancellationToken,
) {
    while let Some(delay) = schedule.next_delay(Utc::now()) {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }

        let instruments = tracked.instruments();
        for instrument in &instruments {
            if commands
                .send(FeedCommand::QuerySnapshot(instrument.clone()))
                .is_err()
            {
                tracing::debug!("Feed driver gone, stopping snapshot schedule");
                return;
            }
        }
        tracing::info!("Scheduled snapshot query for {} instruments", instruments.len());
    }
}
