//! Tracks live order books and prints the top of each book periodically.
//!
//! Run with: `cargo run --example track -- [config.json]`
//!
//! Without a configured instrument list, every spot market from the exchange
//! catalog is tracked.

use ironbook::core::types::from_fixed;
use ironbook::marketdata::{InstrumentCatalog, RestCatalogFetcher};
use ironbook::prelude::*;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => TrackerConfig::from_path(path)?,
        None => TrackerConfig::default(),
    };

    let mut tracker = OrderBookTracker::new(config.clone())?;
    if config.instruments.is_empty() {
        let fetcher = Arc::new(RestCatalogFetcher::new(config.rest_url.clone()));
        let catalog = InstrumentCatalog::new(fetcher, config.catalog_ttl());
        tracker = tracker.with_catalog(Arc::new(catalog));
    }

    tracker.start(WsConnector::default()).await?;
    println!("Tracking {} instruments", tracker.tracked().len());

    let mut ticker = tokio::time::interval(Duration::from_secs(10));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {}
        }

        for instrument in tracker.tracked().iter().take(10) {
            let Some(book) = tracker.book(instrument) else {
                continue;
            };
            match (book.best_bid(), book.best_ask()) {
                (Some(bid), Some(ask)) => println!(
                    "{:<12} {:?} bid {:.8} x {:.8}  ask {:.8} x {:.8}",
                    instrument.as_str(),
                    book.state(),
                    from_fixed(bid.price),
                    from_fixed(bid.size as i64),
                    from_fixed(ask.price),
                    from_fixed(ask.size as i64),
                ),
                _ => println!("{:<12} {:?}", instrument.as_str(), book.state()),
            }
        }
    }

    tracker.shutdown().await;
    Ok(())
}
