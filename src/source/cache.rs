use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use error_stack::Report;
use futures::future::BoxFuture;
use tracing::debug;

use crate::error::SourceError;
use crate::model::{Bar, Interval, Period};
use crate::source::MarketDataSource;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    symbol: String,
    period: Period,
    interval: Interval,
}

struct CacheEntry {
    bars: Vec<Bar>,
    fetched_at: Instant,
}

/// Caching decorator over a [`MarketDataSource`].
///
/// History responses are cached per `(symbol, period, interval)` for a fixed
/// TTL; expired entries are refetched and replaced. Live prices are never
/// cached. The cache is owned by whoever builds the source stack, not by the
/// screener.
pub struct CachedSource {
    inner: Arc<dyn MarketDataSource>,
    ttl: Duration,
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
}

impl CachedSource {
    pub fn new(inner: Arc<dyn MarketDataSource>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lookup(&self, key: &CacheKey) -> Option<Vec<Bar>> {
        let entries = self.entries.lock().expect("cache mutex poisoned");
        entries
            .get(key)
            .filter(|e| e.fetched_at.elapsed() < self.ttl)
            .map(|e| e.bars.clone())
    }

    fn store(&self, key: CacheKey, bars: Vec<Bar>) {
        let mut entries = self.entries.lock().expect("cache mutex poisoned");
        entries.insert(
            key,
            CacheEntry {
                bars,
                fetched_at: Instant::now(),
            },
        );
    }
}

impl MarketDataSource for CachedSource {
    fn fetch_history(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> BoxFuture<'_, Result<Vec<Bar>, Report<SourceError>>> {
        let key = CacheKey {
            symbol: symbol.to_owned(),
            period,
            interval,
        };
        Box::pin(async move {
            if let Some(bars) = self.lookup(&key) {
                debug!(symbol = %key.symbol, period = %period, "history served from cache");
                return Ok(bars);
            }
            let bars = self
                .inner
                .fetch_history(&key.symbol, period, interval)
                .await?;
            self.store(key, bars.clone());
            Ok(bars)
        })
    }

    fn fetch_live_price(
        &self,
        symbol: &str,
    ) -> BoxFuture<'_, Result<Option<f64>, Report<SourceError>>> {
        self.inner.fetch_live_price(symbol)
    }
}
