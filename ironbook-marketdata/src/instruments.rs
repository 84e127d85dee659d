//! Instrument catalog.
//!
//! The catalog lists the spot markets the exchange trades, most active
//! first. Fetches are cached for a TTL; concurrent callers on a miss share a
//! single in-flight fetch.

use crate::error::CatalogError;
use async_trait::async_trait;
use ironbook_core::InstrumentId;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default REST API base URL.
pub const DEFAULT_REST_URL: &str = "https://ftx.com/api";

/// Path of the markets listing, relative to the REST base URL.
pub const MARKETS_PATH: &str = "/markets";

/// Instrument definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Instrument {
    /// Normalized identifier.
    pub id: InstrumentId,
    /// Exchange market name.
    pub name: String,
    /// Traded 24h volume in USD.
    pub volume_usd_24h: f64,
    /// Last traded price, if any.
    pub last_price: Option<f64>,
    /// Whether the market currently trades.
    pub enabled: bool,
}

/// Source of catalog listings.
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    /// Fetches the current instrument list.
    ///
    /// # Errors
    /// Returns [`CatalogError`] if the listing cannot be obtained.
    async fn fetch(&self) -> Result<Vec<Instrument>, CatalogError>;
}

#[derive(Debug, Deserialize)]
struct MarketsResponse {
    success: bool,
    #[serde(default)]
    result: Vec<WireMarket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMarket {
    name: String,
    #[serde(rename = "type")]
    market_type: String,
    #[serde(default)]
    enabled: bool,
    #[serde(default)]
    volume_usd24h: Option<f64>,
    #[serde(default)]
    last: Option<f64>,
}

/// Turns a markets listing into spot instruments, sorted by 24h USD volume
/// descending. Unparseable market names are skipped.
///
/// # Errors
/// Returns [`CatalogError::Rejected`] if the listing is flagged unsuccessful.
fn spot_instruments(response: MarketsResponse) -> Result<Vec<Instrument>, CatalogError> {
    if !response.success {
        return Err(CatalogError::Rejected);
    }

    let mut instruments: Vec<Instrument> = response
        .result
        .into_iter()
        .filter(|m| m.market_type == "spot")
        .filter_map(|m| match InstrumentId::from_catalog_name(&m.name) {
            Ok(id) => Some(Instrument {
                id,
                volume_usd_24h: m.volume_usd24h.unwrap_or(0.0),
                last_price: m.last,
                enabled: m.enabled,
                name: m.name,
            }),
            Err(e) => {
                tracing::debug!("Skipping catalog market: {}", e);
                None
            }
        })
        .collect();

    instruments.sort_by(|a, b| b.volume_usd_24h.total_cmp(&a.volume_usd_24h));
    Ok(instruments)
}

/// Fetches the catalog from the exchange REST API.
#[derive(Debug, Clone)]
pub struct RestCatalogFetcher {
    client: reqwest::Client,
    base_url: String,
}

impl RestCatalogFetcher {
    /// Creates a fetcher for `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Uses an existing HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Full markets URL.
    #[must_use]
    pub fn markets_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), MARKETS_PATH)
    }
}

impl Default for RestCatalogFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_REST_URL)
    }
}

#[async_trait]
impl CatalogFetcher for RestCatalogFetcher {
    async fn fetch(&self) -> Result<Vec<Instrument>, CatalogError> {
        let response = self.client.get(self.markets_url()).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                status: status.as_u16(),
            });
        }
        spot_instruments(response.json().await?)
    }
}

struct CachedCatalog {
    fetched_at: Instant,
    instruments: Arc<Vec<Instrument>>,
}

/// TTL cache over a [`CatalogFetcher`].
pub struct InstrumentCatalog {
    fetcher: Arc<dyn CatalogFetcher>,
    ttl: Duration,
    cache: Mutex<Option<CachedCatalog>>,
}

impl InstrumentCatalog {
    /// Creates a catalog caching `fetcher` results for `ttl`.
    #[must_use]
    pub fn new(fetcher: Arc<dyn CatalogFetcher>, ttl: Duration) -> Self {
        Self {
            fetcher,
            ttl,
            cache: Mutex::new(None),
        }
    }

    /// Returns the instrument list, fetching it if the cache is empty or
    /// expired.
    ///
    /// # Errors
    /// Returns the fetch error. A failed fetch leaves the cache unchanged.
    pub async fn instruments(&self) -> Result<Arc<Vec<Instrument>>, CatalogError> {
        let mut cache = self.cache.lock().await;
        if let Some(cached) = cache.as_ref()
            && cached.fetched_at.elapsed() < self.ttl
        {
            return Ok(Arc::clone(&cached.instruments));
        }

        let instruments = Arc::new(self.fetcher.fetch().await?);
        tracing::info!("Fetched {} catalog instruments", instruments.len());
        *cache = Some(CachedCatalog {
            fetched_at: Instant::now(),
            instruments: Arc::clone(&instruments),
        });
        Ok(instruments)
    }

    /// Identifiers of every listed instrument, most active first.
    ///
    /// A failed fetch yields an empty list and a warning.
    pub async fn available_instruments(&self) -> Vec<InstrumentId> {
        match self.instruments().await {
            Ok(instruments) => instruments.iter().map(|i| i.id.clone()).collect(),
            Err(e) => {
                tracing::warn!(
                    "Error getting active exchange information: {}. Check network connection",
                    e
                );
                Vec::new()
            }
        }
    }

    /// Looks up one instrument.
    ///
    /// # Errors
    /// Returns the fetch error if the catalog has to be refetched and fails.
    pub async fn get(&self, id: &InstrumentId) -> Result<Option<Instrument>, CatalogError> {
        Ok(self.instruments().await?.iter().find(|i| &i.id == id).cloned())
    }

    /// Indexes the catalog by identifier.
    ///
    /// # Errors
    /// Returns the fetch error if the catalog has to be refetched and fails.
    pub async fn by_id(&self) -> Result<HashMap<InstrumentId, Instrument>, CatalogError> {
        Ok(self
            .instruments()
            .await?
            .iter()
            .map(|i| (i.id.clone(), i.clone()))
            .collect())
    }

    /// Drops the cached listing so the next call refetches.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }
}
