use std::sync::Arc;

use chrono::{DateTime, Utc};
use error_stack::Report;
use futures::StreamExt;
use futures::stream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::ScreenerError;
use crate::model::{Bar, Interval, Period, SummaryRow, SymbolRecord};
use crate::source::MarketDataSource;

/// Trailing trading-day windows used by the summary math.
const BARS_52W: usize = 252;
const BARS_2Y: usize = 504;
const BARS_5Y: usize = 1260;

/// Default `filter_near_52week_high` threshold: within 5% of the high.
pub const NEAR_HIGH_THRESHOLD: f64 = 0.95;
/// Default `filter_near_52week_low` threshold: within 5% of the low.
pub const NEAR_LOW_THRESHOLD: f64 = 1.05;

#[derive(Debug, Clone)]
pub struct ScreenOptions {
    /// Number of symbols fetched and summarized concurrently.
    pub concurrency: usize,
    /// Fetch a live quote per symbol; otherwise the last close stands in.
    pub include_live_prices: bool,
}

impl Default for ScreenOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            include_live_prices: true,
        }
    }
}

/// Result of one screener run: one row per successfully processed symbol,
/// in universe order, plus the count of symbols that yielded no row.
#[derive(Debug, Clone)]
pub struct ScreenOutcome {
    pub rows: Vec<SummaryRow>,
    pub skipped: usize,
    pub generated_at: DateTime<Utc>,
}

impl ScreenOutcome {
    pub fn mean_return_1y(&self) -> Option<f64> {
        mean(self.rows.iter().filter_map(|r| r.return_1y))
    }

    pub fn mean_return_5y(&self) -> Option<f64> {
        mean(self.rows.iter().filter_map(|r| r.return_5y))
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

/// Screen the whole universe: fetch five years of daily history per symbol,
/// summarize, and collect rows in universe order.
///
/// Symbols run concurrently up to `options.concurrency`; `buffered` yields
/// results in input order regardless of completion order. A failed or empty
/// fetch skips that symbol and the run continues. Cancelling `cancel`
/// aborts the run and discards its partial results.
pub async fn run(
    universe: &[SymbolRecord],
    source: Arc<dyn MarketDataSource>,
    options: &ScreenOptions,
    cancel: &CancellationToken,
) -> Result<ScreenOutcome, Report<ScreenerError>> {
    let include_live = options.include_live_prices;

    let mut results = stream::iter(universe.iter().cloned())
        .map(|record| {
            let source = Arc::clone(&source);
            let cancel = cancel.clone();
            async move {
                tokio::select! {
                    _ = cancel.cancelled() => Err(ScreenerError::Cancelled),
                    row = process_symbol(source.as_ref(), &record, include_live) => Ok(row),
                }
            }
        })
        .buffered(options.concurrency.max(1));

    let mut rows = Vec::with_capacity(universe.len());
    let mut skipped = 0usize;
    while let Some(result) = results.next().await {
        match result {
            Ok(Some(row)) => rows.push(row),
            Ok(None) => skipped += 1,
            Err(e) => return Err(Report::new(e)),
        }
    }

    info!(rows = rows.len(), skipped, "screener run complete");
    Ok(ScreenOutcome {
        rows,
        skipped,
        generated_at: Utc::now(),
    })
}

async fn process_symbol(
    source: &dyn MarketDataSource,
    record: &SymbolRecord,
    include_live: bool,
) -> Option<SummaryRow> {
    let bars = match source
        .fetch_history(&record.symbol, Period::Year5, Interval::Day1)
        .await
    {
        Ok(bars) => bars,
        Err(e) => {
            warn!(symbol = %record.symbol, error = ?e, "history fetch failed, skipping");
            return None;
        }
    };

    if bars.is_empty() {
        debug!(symbol = %record.symbol, "no history, skipping");
        return None;
    }

    let live_price = if include_live {
        match source.fetch_live_price(&record.symbol).await {
            Ok(price) => price,
            Err(e) => {
                warn!(
                    symbol = %record.symbol,
                    error = ?e,
                    "live price fetch failed, falling back to last close"
                );
                None
            }
        }
    } else {
        None
    };

    summarize(record, &bars, live_price)
}

/// Pure per-symbol summary math. Returns `None` only for an empty series.
pub fn summarize(record: &SymbolRecord, bars: &[Bar], live_price: Option<f64>) -> Option<SummaryRow> {
    let historical_price = bars.last()?.close;
    let n = bars.len();

    // With less than a year of history the 52-week window degenerates to
    // the last close.
    let (high_52w, low_52w) = if n >= BARS_52W {
        let window = &bars[n - BARS_52W..];
        (
            window.iter().map(|b| b.high).fold(f64::MIN, f64::max),
            window.iter().map(|b| b.low).fold(f64::MAX, f64::min),
        )
    } else {
        (historical_price, historical_price)
    };

    let current_price = live_price.unwrap_or(historical_price);

    // The 5-year return divides by the earliest available close rather than
    // the bar 1260 positions back; the gate and the base differ on purpose,
    // matching the established table semantics.
    let return_5y =
        (n >= BARS_5Y).then(|| historical_price / bars[0].close - 1.0);

    Some(SummaryRow {
        symbol: record.symbol.clone(),
        name: record.name.clone(),
        current_price,
        price_change_pct: ratio_pct(current_price - historical_price, historical_price),
        high_52w,
        low_52w,
        pct_from_high: ratio_pct(high_52w - current_price, high_52w),
        pct_from_low: ratio_pct(current_price - low_52w, low_52w),
        return_1y: trailing_return(bars, BARS_52W),
        return_2y: trailing_return(bars, BARS_2Y),
        return_5y,
    })
}

fn trailing_return(bars: &[Bar], span: usize) -> Option<f64> {
    let n = bars.len();
    (n >= span).then(|| bars[n - 1].close / bars[n - span].close - 1.0)
}

/// Percentage of `numerator / denominator`, or `None` on a zero denominator.
fn ratio_pct(numerator: f64, denominator: f64) -> Option<f64> {
    (denominator != 0.0).then(|| numerator / denominator * 100.0)
}

/// Keep rows trading at or above `threshold` times their 52-week high.
pub fn filter_near_52week_high(rows: &[SummaryRow], threshold: f64) -> Vec<SummaryRow> {
    rows.iter()
        .filter(|r| r.current_price >= r.high_52w * threshold)
        .cloned()
        .collect()
}

/// Keep rows trading at or below `threshold` times their 52-week low.
pub fn filter_near_52week_low(rows: &[SummaryRow], threshold: f64) -> Vec<SummaryRow> {
    rows.iter()
        .filter(|r| r.current_price <= r.low_52w * threshold)
        .cloned()
        .collect()
}

/// Case-insensitive substring match on symbol or display name.
pub fn search(rows: &[SummaryRow], query: &str) -> Vec<SummaryRow> {
    let needle = query.to_lowercase();
    rows.iter()
        .filter(|r| {
            r.symbol.to_lowercase().contains(&needle) || r.name.to_lowercase().contains(&needle)
        })
        .cloned()
        .collect()
}

/// Fetch one symbol's bars for the deep-dive charts.
///
/// Failures degrade to an empty series so the indicator engine renders
/// "no data" instead of an error page.
pub async fn detailed_series(
    source: &dyn MarketDataSource,
    symbol: &str,
    period: Period,
) -> Vec<Bar> {
    match source.fetch_history(symbol, period, Interval::Day1).await {
        Ok(bars) => bars,
        Err(e) => {
            warn!(symbol, error = ?e, "detail fetch failed, returning empty series");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    use futures::future::BoxFuture;

    use crate::error::SourceError;

    fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                timestamp: Utc::now() + chrono::Duration::days(i as i64),
                open: c,
                high: c,
                low: c,
                close: c,
                volume: Some(1.0),
            })
            .collect()
    }

    fn record(symbol: &str, name: &str) -> SymbolRecord {
        SymbolRecord {
            symbol: symbol.into(),
            name: name.into(),
        }
    }

    #[derive(Default)]
    struct MockSource {
        histories: HashMap<String, Vec<Bar>>,
        live_prices: HashMap<String, f64>,
        failing_history: HashSet<String>,
        failing_live: HashSet<String>,
    }

    impl MarketDataSource for MockSource {
        fn fetch_history(
            &self,
            symbol: &str,
            _period: Period,
            _interval: Interval,
        ) -> BoxFuture<'_, Result<Vec<Bar>, Report<SourceError>>> {
            let symbol = symbol.to_owned();
            Box::pin(async move {
                if self.failing_history.contains(&symbol) {
                    return Err(Report::new(SourceError::Request { symbol }));
                }
                Ok(self.histories.get(&symbol).cloned().unwrap_or_default())
            })
        }

        fn fetch_live_price(
            &self,
            symbol: &str,
        ) -> BoxFuture<'_, Result<Option<f64>, Report<SourceError>>> {
            let symbol = symbol.to_owned();
            Box::pin(async move {
                if self.failing_live.contains(&symbol) {
                    return Err(Report::new(SourceError::Request { symbol }));
                }
                Ok(self.live_prices.get(&symbol).copied())
            })
        }
    }

    // ── summarize ─────────────────────────────────────────────────────────────

    #[test]
    fn summarize_empty_series_yields_no_row() {
        assert!(summarize(&record("X", "X Ltd"), &[], None).is_none());
    }

    #[test]
    fn one_year_return_at_exactly_252_bars() {
        // close[0] = 100, close[251] = 150: the 1y base is close[n-252],
        // which is the earliest bar here.
        let mut closes: Vec<f64> = vec![100.0; 252];
        closes[251] = 150.0;
        let bars = bars_from_closes(&closes);
        let row = summarize(&record("X", "X Ltd"), &bars, None).unwrap();

        assert_eq!(row.return_1y, Some(0.5));
        assert_eq!(row.return_2y, None);
        assert_eq!(row.return_5y, None);
    }

    #[test]
    fn five_year_return_divides_by_earliest_close() {
        let mut closes: Vec<f64> = vec![200.0; 1300];
        closes[0] = 100.0;
        closes[1299] = 300.0;
        let bars = bars_from_closes(&closes);
        let row = summarize(&record("X", "X Ltd"), &bars, None).unwrap();

        assert_eq!(row.return_5y, Some(2.0));
        // 2y base is positionally indexed
        assert_eq!(row.return_2y, Some(0.5));
    }

    #[test]
    fn short_history_degenerates_52w_window_to_last_close() {
        let bars = bars_from_closes(&[90.0, 95.0, 100.0]);
        let row = summarize(&record("X", "X Ltd"), &bars, None).unwrap();

        assert_eq!(row.high_52w, 100.0);
        assert_eq!(row.low_52w, 100.0);
        assert_eq!(row.return_1y, None);
    }

    #[test]
    fn live_price_fallback_means_zero_change() {
        let bars = bars_from_closes(&[100.0, 110.0]);
        let row = summarize(&record("X", "X Ltd"), &bars, None).unwrap();

        assert_eq!(row.current_price, 110.0);
        assert_eq!(row.price_change_pct, Some(0.0));
    }

    #[test]
    fn live_price_drives_change_pct() {
        let bars = bars_from_closes(&[100.0, 100.0]);
        let row = summarize(&record("X", "X Ltd"), &bars, Some(105.0)).unwrap();

        assert_eq!(row.current_price, 105.0);
        assert_eq!(row.price_change_pct, Some(5.0));
    }

    #[test]
    fn fifty_two_week_window_uses_highs_and_lows() {
        let mut bars = bars_from_closes(&vec![100.0; 260]);
        bars[255].high = 180.0;
        bars[257].low = 60.0;
        // Outside the trailing 252-bar window, must not count
        bars[2].high = 500.0;
        let row = summarize(&record("X", "X Ltd"), &bars, None).unwrap();

        assert_eq!(row.high_52w, 180.0);
        assert_eq!(row.low_52w, 60.0);
        let pct_from_high = row.pct_from_high.unwrap();
        assert!((pct_from_high - (80.0 / 180.0 * 100.0)).abs() < 1e-9);
    }

    #[test]
    fn zero_52w_low_leaves_pct_from_low_undefined() {
        let mut bars = bars_from_closes(&vec![100.0; 252]);
        bars[200].low = 0.0;
        let row = summarize(&record("X", "X Ltd"), &bars, None).unwrap();

        assert_eq!(row.low_52w, 0.0);
        assert_eq!(row.pct_from_low, None);
        assert!(row.pct_from_high.is_some());
    }

    // ── filters and search ────────────────────────────────────────────────────

    fn row_with_prices(symbol: &str, current: f64, high: f64, low: f64) -> SummaryRow {
        SummaryRow {
            symbol: symbol.into(),
            name: format!("{symbol} Ltd"),
            current_price: current,
            price_change_pct: Some(0.0),
            high_52w: high,
            low_52w: low,
            pct_from_high: None,
            pct_from_low: None,
            return_1y: None,
            return_2y: None,
            return_5y: None,
        }
    }

    #[test]
    fn near_high_filter_threshold() {
        let rows = vec![
            row_with_prices("IN", 96.0, 100.0, 50.0),
            row_with_prices("OUT", 94.0, 100.0, 50.0),
        ];
        let kept = filter_near_52week_high(&rows, NEAR_HIGH_THRESHOLD);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].symbol, "IN");
    }

    #[test]
    fn near_low_filter_threshold() {
        let rows = vec![
            row_with_prices("IN", 52.0, 100.0, 50.0),
            row_with_prices("OUT", 53.0, 100.0, 50.0),
        ];
        let kept = filter_near_52week_low(&rows, NEAR_LOW_THRESHOLD);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].symbol, "IN");
    }

    #[test]
    fn search_matches_symbol_or_name_case_insensitive() {
        let rows = vec![
            row_with_prices("TCS.NS", 100.0, 100.0, 50.0),
            row_with_prices("INFY.NS", 100.0, 100.0, 50.0),
        ];
        assert_eq!(search(&rows, "tcs").len(), 1);
        assert_eq!(search(&rows, "infy LTD").len(), 0);
        assert_eq!(search(&rows, "Ltd").len(), 2);
        assert_eq!(search(&rows, "hdfc").len(), 0);
    }

    // ── run ───────────────────────────────────────────────────────────────────

    fn universe_of(symbols: &[&str]) -> Vec<SymbolRecord> {
        symbols
            .iter()
            .map(|s| record(s, &format!("{s} Ltd")))
            .collect()
    }

    #[tokio::test]
    async fn rows_follow_universe_order_despite_concurrency() {
        let mut source = MockSource::default();
        for (i, symbol) in ["A", "B", "C", "D", "E"].iter().enumerate() {
            source
                .histories
                .insert((*symbol).into(), bars_from_closes(&[100.0 + i as f64]));
        }
        let universe = universe_of(&["A", "B", "C", "D", "E"]);

        let outcome = run(
            &universe,
            Arc::new(source),
            &ScreenOptions {
                concurrency: 4,
                include_live_prices: false,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let symbols: Vec<&str> = outcome.rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, ["A", "B", "C", "D", "E"]);
        assert_eq!(outcome.skipped, 0);
    }

    #[tokio::test]
    async fn empty_history_skips_symbol_without_aborting() {
        let mut source = MockSource::default();
        source.histories.insert("A".into(), bars_from_closes(&[100.0]));
        // "B" has no history at all
        source.histories.insert("C".into(), bars_from_closes(&[100.0]));
        let universe = universe_of(&["A", "B", "C"]);

        let outcome = run(
            &universe,
            Arc::new(source),
            &ScreenOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        let symbols: Vec<&str> = outcome.rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, ["A", "C"]);
        assert_eq!(outcome.skipped, 1);
    }

    #[tokio::test]
    async fn fetch_failure_is_isolated_per_symbol() {
        let mut source = MockSource::default();
        source.histories.insert("A".into(), bars_from_closes(&[100.0]));
        source.histories.insert("B".into(), bars_from_closes(&[100.0]));
        source.failing_history.insert("A".into());
        let universe = universe_of(&["A", "B"]);

        let outcome = run(
            &universe,
            Arc::new(source),
            &ScreenOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.rows.len(), 1);
        assert_eq!(outcome.rows[0].symbol, "B");
        assert_eq!(outcome.skipped, 1);
    }

    #[tokio::test]
    async fn live_failure_falls_back_to_historical_close() {
        let mut source = MockSource::default();
        source
            .histories
            .insert("A".into(), bars_from_closes(&[100.0, 120.0]));
        source.failing_live.insert("A".into());
        let universe = universe_of(&["A"]);

        let outcome = run(
            &universe,
            Arc::new(source),
            &ScreenOptions {
                concurrency: 1,
                include_live_prices: true,
            },
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.rows[0].current_price, 120.0);
        assert_eq!(outcome.rows[0].price_change_pct, Some(0.0));
    }

    #[tokio::test]
    async fn never_more_rows_than_universe_entries() {
        let mut source = MockSource::default();
        source.histories.insert("A".into(), bars_from_closes(&[1.0]));
        let universe = universe_of(&["A", "B"]);

        let outcome = run(
            &universe,
            Arc::new(source),
            &ScreenOptions::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(outcome.rows.len() <= universe.len());
    }

    #[tokio::test]
    async fn cancelled_run_discards_partial_results() {
        let mut source = MockSource::default();
        source.histories.insert("A".into(), bars_from_closes(&[1.0]));
        let universe = universe_of(&["A", "B"]);

        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = run(
            &universe,
            Arc::new(source),
            &ScreenOptions::default(),
            &cancel,
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn detailed_series_failure_degrades_to_empty() {
        let mut source = MockSource::default();
        source.failing_history.insert("A".into());
        source.histories.insert("B".into(), bars_from_closes(&[1.0, 2.0]));

        assert!(detailed_series(&source, "A", Period::Year1).await.is_empty());
        assert_eq!(detailed_series(&source, "B", Period::Year1).await.len(), 2);
        assert!(detailed_series(&source, "MISSING", Period::Year1).await.is_empty());
    }

    #[test]
    fn mean_returns_ignore_undefined_entries() {
        let mut a = row_with_prices("A", 1.0, 1.0, 1.0);
        a.return_1y = Some(0.1);
        let mut b = row_with_prices("B", 1.0, 1.0, 1.0);
        b.return_1y = Some(0.3);
        let c = row_with_prices("C", 1.0, 1.0, 1.0);

        let outcome = ScreenOutcome {
            rows: vec![a, b, c],
            skipped: 0,
            generated_at: Utc::now(),
        };
        let mean_1y = outcome.mean_return_1y().unwrap();
        assert!((mean_1y - 0.2).abs() < 1e-12);
        assert_eq!(outcome.mean_return_5y(), None);
    }
}
