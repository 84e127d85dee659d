//! Feed driver: the single task that owns the feed session.
//!
//! It connects, decodes every frame, routes book messages into the tracked
//! set, and carries out commands from the rest of the tracker. When the frame
//! stream ends it tears the session down and reconnects with backoff, forever,
//! until cancelled. Every instrument is flagged for resync on reconnect since
//! diffs may have been lost while the connection was down.

use crate::tracker::TrackedSet;
use ironbook_client::{
    Connector, FeedSession, ReconnectConfig, ReconnectState, SubscriptionSource,
};
use ironbook_core::{InstrumentId, decode_frame};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Requests carried out by the feed driver on the live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedCommand {
    /// Subscribe an instrument added after connect.
    Subscribe(InstrumentId),
    /// Ask for a fresh snapshot.
    QuerySnapshot(InstrumentId),
}

/// Runs the feed until `cancel` fires.
pub async fn run_feed<C: Connector>(
    mut session: FeedSession<C>,
    tracked: Arc<TrackedSet>,
    mut commands: mpsc::UnboundedReceiver<FeedCommand>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut backoff = ReconnectState::new(reconnect);

    'session: loop {
        let connected = tokio::select! {
            _ = cancel.cancelled() => break 'session,
            result = session.connect() => result,
        };

        if let Err(e) = connected {
            let delay = backoff.on_failure();
            tracing::warn!(
                "Feed connect failed (attempt {}): {}. Retrying in {:?}",
                backoff.attempts(),
                e,
                delay
            );
            tokio::select! {
                _ = cancel.cancelled() => break 'session,
                _ = tokio::time::sleep(delay) => continue 'session,
            }
        }

        backoff.on_success();
        tracked.mark_all_resync();
        for instrument in tracked.instruments() {
            if let Err(e) = session.subscribe(&instrument).await {
                tracing::warn!("Failed to subscribe {}: {}", instrument, e);
            }
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    session.disconnect().await;
                    break 'session;
                }
                Some(command) = commands.recv() => {
                    execute(&mut session, command).await;
                }
                frame = session.next_frame() => match frame {
                    Some(text) => dispatch(&tracked, &text),
                    None => break,
                },
            }
        }

        session.disconnect().await;
        tracing::info!("Reinitializing feed connection");
    }

    tracing::debug!("Feed driver stopped");
}

async fn execute<C: Connector>(session: &mut FeedSession<C>, command: FeedCommand) {
    let result = match &command {
        // Deltas still flow for a re-added instrument; its fresh reconciler
        // only needs a snapshot.
        FeedCommand::Subscribe(instrument) if session.subscribed().contains(instrument) => {
            session.query_snapshot(instrument).await
        }
        FeedCommand::Subscribe(instrument) => session.subscribe(instrument).await,
        FeedCommand::QuerySnapshot(instrument) => {
            tracing::info!("Query {} snapshot", instrument);
            session.query_snapshot(instrument).await
        }
    };
    if let Err(e) = result {
        tracing::warn!("Feed command {:?} failed: {}", command, e);
    }
}

fn dispatch(tracked: &TrackedSet, text: &str) {
    match decode_frame(text) {
        Some(message) => {
            tracked.route(message);
        }
        None => tracing::trace!("Ignoring non-book frame"),
    }
}
