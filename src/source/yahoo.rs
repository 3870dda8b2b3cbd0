use std::num::NonZeroU32;
use std::sync::Arc;

use chrono::DateTime;
use error_stack::{Report, ResultExt};
use futures::future::BoxFuture;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::Deserialize;
use tracing::debug;

use crate::error::SourceError;
use crate::model::{Bar, Interval, Period};
use crate::source::MarketDataSource;

const YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";
/// Unofficial API; stay well below the point where Yahoo starts throttling.
const REQUESTS_PER_SECOND: u32 = 5;

/// Market data adapter for the Yahoo Finance v8 chart endpoint.
pub struct YahooSource {
    client: reqwest::Client,
    base_url: String,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl YahooSource {
    pub fn new() -> Self {
        Self::with_base_url(YAHOO_BASE_URL)
    }

    /// Override the endpoint base URL (used by tests and mirrors).
    pub fn with_base_url(base_url: &str) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(REQUESTS_PER_SECOND).unwrap());
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    async fn fetch_chart(
        &self,
        symbol: &str,
        range: &str,
        interval: &str,
    ) -> Result<Vec<Bar>, Report<SourceError>> {
        // Wait for the rate limiter before making the request
        self.rate_limiter.until_ready().await;

        let url = format!("{}/v8/finance/chart/{symbol}", self.base_url);
        let params = [("range", range), ("interval", interval)];

        let response = self
            .client
            .get(&url)
            .query(&params)
            .send()
            .await
            .change_context(SourceError::Request {
                symbol: symbol.to_owned(),
            })?;

        if !response.status().is_success() {
            return Err(Report::new(SourceError::Request {
                symbol: symbol.to_owned(),
            })
            .attach(format!("HTTP status: {}", response.status())));
        }

        let chart: ChartResponse =
            response
                .json()
                .await
                .change_context(SourceError::ResponseParse {
                    symbol: symbol.to_owned(),
                })?;

        let bars = chart_to_bars(chart);
        debug!(symbol, range, interval, bars = bars.len(), "yahoo chart fetched");
        Ok(bars)
    }
}

impl Default for YahooSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketDataSource for YahooSource {
    fn fetch_history(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> BoxFuture<'_, Result<Vec<Bar>, Report<SourceError>>> {
        let symbol = symbol.to_owned();
        Box::pin(async move {
            self.fetch_chart(&symbol, period.as_str(), interval.as_str())
                .await
        })
    }

    fn fetch_live_price(
        &self,
        symbol: &str,
    ) -> BoxFuture<'_, Result<Option<f64>, Report<SourceError>>> {
        let symbol = symbol.to_owned();
        Box::pin(async move {
            // Latest traded price = last minute close of today's session
            let bars = self.fetch_chart(&symbol, "1d", Interval::Min1.as_str()).await?;
            Ok(bars.last().map(|b| b.close))
        })
    }
}

/// Flatten a chart response into bars, oldest-first.
///
/// Yahoo pads series with nulls for halted or missing intervals; entries
/// without a close price are dropped rather than surfaced as malformed bars.
fn chart_to_bars(chart: ChartResponse) -> Vec<Bar> {
    let Some(result) = chart.chart.result.and_then(|mut r| {
        if r.is_empty() { None } else { Some(r.remove(0)) }
    }) else {
        return Vec::new();
    };

    let timestamps = result.timestamp.unwrap_or_default();
    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Vec::new();
    };

    let mut bars = Vec::with_capacity(timestamps.len());
    for (i, &ts) in timestamps.iter().enumerate() {
        let Some(timestamp) = DateTime::from_timestamp(ts, 0) else {
            continue;
        };
        let Some(close) = field(&quote.close, i) else {
            continue;
        };
        // Open/high/low fall back to the close when absent so a sparse
        // minute chart still yields usable bars.
        let open = field(&quote.open, i).unwrap_or(close);
        let high = field(&quote.high, i).unwrap_or(close);
        let low = field(&quote.low, i).unwrap_or(close);

        bars.push(Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume: field(&quote.volume, i),
        });
    }
    bars
}

fn field(series: &Option<Vec<Option<f64>>>, i: usize) -> Option<f64> {
    series.as_ref().and_then(|v| v.get(i).copied().flatten())
}

// ── Chart response types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    timestamp: Option<Vec<i64>>,
    indicators: ChartIndicators,
}

#[derive(Debug, Deserialize)]
struct ChartIndicators {
    quote: Vec<ChartQuote>,
}

#[derive(Debug, Deserialize, Default)]
struct ChartQuote {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<f64>>>,
}
