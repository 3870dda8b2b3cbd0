pub mod cache;
pub mod yahoo;

use error_stack::Report;
use futures::future::BoxFuture;

use crate::error::SourceError;
use crate::model::{Bar, Interval, Period};

/// Abstraction over a market data provider.
///
/// Uses `BoxFuture` (from `futures` crate) instead of `async fn` in trait
/// to keep the trait object-safe (`dyn MarketDataSource`).
pub trait MarketDataSource: Send + Sync {
    /// Fetch historical bars for one symbol, ordered oldest-first.
    ///
    /// An empty vector is a valid response (unknown symbol, no trading
    /// history for the requested window).
    fn fetch_history(
        &self,
        symbol: &str,
        period: Period,
        interval: Interval,
    ) -> BoxFuture<'_, Result<Vec<Bar>, Report<SourceError>>>;

    /// Fetch the latest traded price for one symbol, or `None` when the
    /// provider has nothing for it.
    fn fetch_live_price(&self, symbol: &str)
    -> BoxFuture<'_, Result<Option<f64>, Report<SourceError>>>;
}
