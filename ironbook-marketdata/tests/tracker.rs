//! End-to-end tracker tests over a scripted in-memory feed.
//!
//! Covers:
//! - Snapshot then diffs, with stale diffs dropped
//! - Diffs arriving before the snapshot
//! - Reconnect on inactivity and on peer close
//! - Tracked set refreshes while the feed runs
//! - Explicit snapshot requests

use ironbook_client::MemoryConnector;
use ironbook_core::types::to_fixed;
use ironbook_core::{InstrumentId, Side, compress_payload};
use ironbook_marketdata::{
    OrderBookTracker, SnapshotRefresh, SyncError, SyncState, TrackerConfig, TrackerError,
};
use serde_json::{Value, json};
use std::time::Duration;

fn id(s: &str) -> InstrumentId {
    InstrumentId::parse(s).unwrap()
}

fn px(value: f64) -> i64 {
    to_fixed(value).unwrap()
}

/// Routes tracker logs to the test harness; set `RUST_LOG` to see them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn config(instruments: &[&str]) -> TrackerConfig {
    init_tracing();
    TrackerConfig {
        instruments: instruments.iter().map(|s| id(s)).collect(),
        snapshot_refresh: SnapshotRefresh::Disabled,
        snapshot_poll_ms: 10,
        ..TrackerConfig::default()
    }
}

fn payload(market: &str, nonce: u64, bids: Value, asks: Value) -> String {
    json!({ "M": market, "N": nonce, "Z": bids, "S": asks }).to_string()
}

fn snapshot_frame(market: &str, nonce: u64, bids: Value, asks: Value) -> String {
    let encoded = compress_payload(payload(market, nonce, bids, asks).as_bytes()).unwrap();
    json!({ "R": encoded, "I": "0" }).to_string()
}

fn diff_frame(market: &str, nonce: u64, bids: Value, asks: Value) -> String {
    let encoded = compress_payload(payload(market, nonce, bids, asks).as_bytes()).unwrap();
    json!({ "C": "d-1", "M": [{ "H": "C2", "M": "uE", "A": [encoded] }] }).to_string()
}

fn count(frames: &[String], needle: &str) -> usize {
    frames.iter().filter(|f| f.contains(needle)).count()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..5000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn test_snapshot_then_diffs() {
    let connector = MemoryConnector::new();
    let tracker = OrderBookTracker::new(config(&["BTC-USD"])).unwrap();
    let mut diffs = tracker.subscribe_diffs();
    tracker.start(connector.clone()).await.unwrap();
    wait_until(|| count(&connector.sent(0), "USD-BTC") == 2).await;

    let sent = connector.sent(0);
    assert_eq!(count(&sent, "SubscribeToExchangeDeltas"), 1);
    assert_eq!(count(&sent, "queryExchangeState"), 1);
    assert_eq!(count(&sent, "USD-BTC"), 2);

    connector.push_text(snapshot_frame(
        "USD-BTC",
        100,
        json!([{ "R": 100.0, "Q": 1.0 }]),
        json!([{ "R": 101.0, "Q": 2.0 }]),
    ));
    connector.push_text(diff_frame(
        "USD-BTC",
        99,
        json!([{ "R": 99.0, "Q": 5.0 }]),
        json!([]),
    ));
    connector.push_text(diff_frame(
        "USD-BTC",
        101,
        json!([{ "TY": 1, "R": 100.0, "Q": 0.0 }]),
        json!([]),
    ));

    let book = tracker.book(&id("BTC-USD")).unwrap();
    wait_until(|| book.last_nonce() == 101).await;

    assert_eq!(tracker.state(&id("BTC-USD")), SyncState::Synced);
    assert!(book.best_bid().is_none());
    assert!(book.size_at(Side::Bid, px(99.0)).is_none());
    assert_eq!(book.best_ask().unwrap().price, px(101.0));

    let recent = tracker.recent_diffs(&id("BTC-USD"));
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].nonce, 101);

    let (_, applied) = diffs.recv().await.unwrap();
    assert_eq!(applied.nonce, 101);
    assert_eq!(applied.instrument, id("BTC-USD"));

    tracker.shutdown().await;
}

#[tokio::test]
async fn test_diffs_before_snapshot_replayed() {
    let connector = MemoryConnector::new();
    let tracker = OrderBookTracker::new(config(&["BTC-USD"])).unwrap();
    tracker.start(connector.clone()).await.unwrap();

    connector.push_text(diff_frame(
        "USD-BTC",
        5,
        json!([{ "R": 90.0, "Q": 1.0 }]),
        json!([]),
    ));
    connector.push_text(diff_frame(
        "USD-BTC",
        11,
        json!([{ "R": 100.0, "Q": 3.0 }]),
        json!([]),
    ));

    let book = tracker.book(&id("BTC-USD")).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(book.state(), SyncState::AwaitingSnapshot);
    assert!(book.best_bid().is_none());

    connector.push_text(snapshot_frame(
        "USD-BTC",
        10,
        json!([{ "R": 100.0, "Q": 1.0 }]),
        json!([]),
    ));
    wait_until(|| book.is_synced()).await;

    assert_eq!(book.last_nonce(), 11);
    assert_eq!(book.size_at(Side::Bid, px(100.0)), Some(px(3.0) as u64));
    assert!(book.size_at(Side::Bid, px(90.0)).is_none());

    tracker.shutdown().await;
}

#[tokio::test]
async fn test_untracked_and_foreign_frames_ignored() {
    let connector = MemoryConnector::new();
    let tracker = OrderBookTracker::new(config(&["BTC-USD"])).unwrap();
    tracker.start(connector.clone()).await.unwrap();

    connector.push_text(r#"{"R":true,"I":"0"}"#);
    connector.push_text("not json");
    connector.push_text(snapshot_frame("USD-ETH", 1, json!([]), json!([])));
    connector.push_text(snapshot_frame(
        "USD-BTC",
        1,
        json!([{ "R": 100.0, "Q": 1.0 }]),
        json!([]),
    ));

    let book = tracker.book(&id("BTC-USD")).unwrap();
    wait_until(|| book.is_synced()).await;
    assert!(tracker.book(&id("ETH-USD")).is_none());
    assert_eq!(tracker.state(&id("ETH-USD")), SyncState::Unseen);

    tracker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_inactivity_reconnects_with_current_set() {
    let connector = MemoryConnector::new();
    let tracker = OrderBookTracker::new(TrackerConfig {
        message_timeout_secs: 5,
        ..config(&["BTC-USD"])
    })
    .unwrap();
    tracker.start(connector.clone()).await.unwrap();
    connector.wait_for_connects(1).await;

    tracker.refresh(&[id("BTC-USD"), id("ETH-USD")]);
    wait_until(|| count(&connector.sent(0), "USD-ETH") == 2).await;

    connector.wait_for_connects(2).await;
    wait_until(|| count(&connector.sent(1), "USD-ETH") == 2).await;
    let resent = connector.sent(1);
    assert_eq!(count(&resent, "SubscribeToExchangeDeltas"), 2);
    assert_eq!(count(&resent, "USD-BTC"), 2);
    assert_eq!(count(&resent, "USD-ETH"), 2);

    tracker.shutdown().await;
}

#[tokio::test]
async fn test_peer_close_resyncs_from_next_snapshot() {
    let connector = MemoryConnector::new();
    let tracker = OrderBookTracker::new(config(&["BTC-USD"])).unwrap();
    tracker.start(connector.clone()).await.unwrap();

    connector.push_text(snapshot_frame(
        "USD-BTC",
        100,
        json!([{ "R": 100.0, "Q": 1.0 }]),
        json!([]),
    ));
    let book = tracker.book(&id("BTC-USD")).unwrap();
    wait_until(|| book.is_synced()).await;

    connector.close_current();
    connector.wait_for_connects(2).await;

    connector.push_text(diff_frame(
        "USD-BTC",
        101,
        json!([{ "R": 100.0, "Q": 7.0 }]),
        json!([]),
    ));
    wait_until(|| book.state() == SyncState::AwaitingSnapshot).await;
    assert_eq!(book.last_nonce(), 100);

    connector.push_text(snapshot_frame(
        "USD-BTC",
        150,
        json!([{ "R": 100.0, "Q": 2.0 }]),
        json!([]),
    ));
    wait_until(|| book.is_synced()).await;
    assert_eq!(book.last_nonce(), 150);
    assert_eq!(book.size_at(Side::Bid, px(100.0)), Some(px(2.0) as u64));

    tracker.shutdown().await;
}

#[tokio::test]
async fn test_refresh_while_running() {
    let connector = MemoryConnector::new();
    let tracker = OrderBookTracker::new(config(&["BTC-USD"])).unwrap();
    tracker.start(connector.clone()).await.unwrap();
    connector.wait_for_connects(1).await;

    connector.push_text(snapshot_frame(
        "USD-BTC",
        100,
        json!([{ "R": 100.0, "Q": 1.0 }]),
        json!([]),
    ));
    let book = tracker.book(&id("BTC-USD")).unwrap();
    wait_until(|| book.is_synced()).await;

    let summary = tracker.refresh(&[]);
    assert_eq!(summary.removed, vec![id("BTC-USD")]);
    assert!(tracker.book(&id("BTC-USD")).is_none());
    assert_eq!(tracker.state(&id("BTC-USD")), SyncState::Unseen);
    assert!(tracker.tracked().is_empty());

    let summary = tracker.refresh(&[id("BTC-USD")]);
    assert_eq!(summary.added, vec![id("BTC-USD")]);
    let book = tracker.book(&id("BTC-USD")).unwrap();
    assert_eq!(book.state(), SyncState::AwaitingSnapshot);
    assert!(book.best_bid().is_none());

    // Still subscribed on this connection, so only a snapshot is queried.
    wait_until(|| count(&connector.sent(0), "queryExchangeState") == 2).await;
    assert_eq!(count(&connector.sent(0), "SubscribeToExchangeDeltas"), 1);

    tracker.shutdown().await;
}

#[tokio::test]
async fn test_request_snapshot() {
    let connector = MemoryConnector::new();
    let tracker = OrderBookTracker::new(config(&["BTC-USD"])).unwrap();
    tracker.start(connector.clone()).await.unwrap();
    connector.wait_for_connects(1).await;

    let responder = {
        let connector = connector.clone();
        tokio::spawn(async move {
            wait_until(|| count(&connector.sent(0), "queryExchangeState") == 2).await;
            connector.push_text(snapshot_frame(
                "USD-BTC",
                200,
                json!([{ "R": 100.0, "Q": 1.0 }]),
                json!([{ "R": 102.0, "Q": 1.0 }]),
            ));
        })
    };

    let snapshot = tracker.request_snapshot(&id("BTC-USD")).await.unwrap();
    responder.await.unwrap();
    assert_eq!(snapshot.nonce, 200);
    assert!(snapshot.is_snapshot());
    assert_eq!(tracker.book(&id("BTC-USD")).unwrap().last_nonce(), 200);

    tracker.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_request_snapshot_times_out() {
    let connector = MemoryConnector::new();
    let tracker = OrderBookTracker::new(TrackerConfig {
        message_timeout_secs: 60,
        ..config(&["BTC-USD"])
    })
    .unwrap();
    tracker.start(connector.clone()).await.unwrap();

    let err = tracker.request_snapshot(&id("BTC-USD")).await.unwrap_err();
    assert!(matches!(err, TrackerError::Sync(SyncError::Timeout { .. })));

    tracker.shutdown().await;
}

#[tokio::test]
async fn test_start_twice_and_shutdown() {
    let connector = MemoryConnector::new();
    let tracker = OrderBookTracker::new(config(&["BTC-USD", "ETH-BTC"])).unwrap();
    tracker.start(connector.clone()).await.unwrap();
    assert!(matches!(
        tracker.start(connector.clone()).await,
        Err(TrackerError::AlreadyStarted)
    ));
    assert_eq!(tracker.tracked(), vec![id("BTC-USD"), id("ETH-BTC")]);

    tracker.shutdown().await;
    assert!(tracker.tracked().is_empty());
    assert_eq!(tracker.state(&id("BTC-USD")), SyncState::Unseen);
    assert!(matches!(
        tracker.request_snapshot(&id("BTC-USD")).await,
        Err(TrackerError::NotTracked { .. })
    ));
}
