pub mod bollinger;
pub mod ma;
pub mod macd;
pub mod rsi;

use crate::model::{Bar, IndicatorSet};

use bollinger::BollingerBands;
use ma::Sma;
use macd::Macd;
use rsi::Rsi;

/// Extract close prices from a slice of bars.
pub fn close_prices(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}

/// Compute the full indicator set for one symbol's bar series.
///
/// Every output series is index-aligned to `bars` (same length, `f64::NAN`
/// inside each indicator's warm-up window). Accepts a series of any length,
/// including empty; short input just yields more NaN entries.
pub fn all_indicators(bars: &[Bar]) -> IndicatorSet {
    let closes = close_prices(bars);

    let macd = Macd::default().calculate(&closes);
    let bands = BollingerBands::default().calculate(&closes);

    IndicatorSet {
        rsi: Rsi::default().calculate(&closes),
        macd: macd.macd,
        signal: macd.signal,
        histogram: macd.histogram,
        ma20: Sma::window_20().calculate(&closes),
        ma50: Sma::window_50().calculate(&closes),
        ma200: Sma::window_200().calculate(&closes),
        bb_upper: bands.upper,
        bb_middle: bands.middle,
        bb_lower: bands.lower,
    }
}
