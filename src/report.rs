use std::fmt::Write;

use crate::model::{Bar, IndicatorSet, SummaryRow};
use crate::screener::ScreenOutcome;

/// Format a price with the rupee sign, two decimals.
pub fn format_price(value: f64) -> String {
    format!("\u{20b9}{value:.2}")
}

/// Format a return ratio (0.5 -> "50.00%"), "N/A" when undefined.
pub fn format_percentage(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}%", v * 100.0),
        None => "N/A".into(),
    }
}

/// Format a percent-point value with an explicit sign, "N/A" when undefined.
pub fn format_signed_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:+.2}%"),
        None => "N/A".into(),
    }
}

/// One header line for the table: row counts, mean returns, run timestamp.
pub fn render_overview(outcome: &ScreenOutcome) -> String {
    format!(
        "{} stocks | {} skipped | avg 1y return {} | avg 5y return {} | updated {}",
        outcome.rows.len(),
        outcome.skipped,
        format_percentage(outcome.mean_return_1y()),
        format_percentage(outcome.mean_return_5y()),
        outcome.generated_at.format("%H:%M:%S"),
    )
}

/// The summary table, one line per row in universe order.
pub fn render_table(rows: &[SummaryRow]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<14} {:<32} {:>12} {:>9} {:>12} {:>12} {:>9} {:>9} {:>9} {:>9} {:>9}",
        "Symbol", "Name", "Price", "Chg", "52W High", "52W Low", "FromHi", "FromLo", "1Y", "2Y",
        "5Y",
    );
    for row in rows {
        let _ = writeln!(
            out,
            "{:<14} {:<32} {:>12} {:>9} {:>12} {:>12} {:>9} {:>9} {:>9} {:>9} {:>9}",
            row.symbol,
            truncate(&row.name, 32),
            format_price(row.current_price),
            format_signed_pct(row.price_change_pct),
            format_price(row.high_52w),
            format_price(row.low_52w),
            format_signed_pct(row.pct_from_high),
            format_signed_pct(row.pct_from_low),
            format_percentage(row.return_1y),
            format_percentage(row.return_2y),
            format_percentage(row.return_5y),
        );
    }
    out
}

/// Indicator summary for one selected symbol: RSI level, MACD stance and
/// the price-versus-MA200 trend.
pub fn render_detail(symbol: &str, bars: &[Bar], indicators: &IndicatorSet) -> String {
    let Some(last_close) = bars.last().map(|b| b.close) else {
        return format!("{symbol}: no data");
    };

    let mut out = String::new();
    let _ = writeln!(out, "{symbol} — {}", format_price(last_close));

    match last_defined(&indicators.rsi) {
        Some(rsi) => {
            let status = if rsi < 30.0 {
                "Oversold"
            } else if rsi > 70.0 {
                "Overbought"
            } else {
                "Neutral"
            };
            let _ = writeln!(out, "  RSI (14): {rsi:.2} ({status})");
        }
        None => {
            let _ = writeln!(out, "  RSI (14): N/A");
        }
    }

    match (
        last_defined(&indicators.macd),
        last_defined(&indicators.signal),
    ) {
        (Some(macd), Some(signal)) => {
            let stance = if macd > signal { "Bullish" } else { "Bearish" };
            let _ = writeln!(out, "  MACD: {macd:.2} ({stance})");
        }
        _ => {
            let _ = writeln!(out, "  MACD: N/A");
        }
    }

    match last_defined(&indicators.ma200) {
        Some(ma200) if ma200 != 0.0 => {
            let trend = if last_close > ma200 {
                "Above MA200"
            } else {
                "Below MA200"
            };
            let _ = writeln!(
                out,
                "  Trend: {trend} ({:+.2}%)",
                (last_close / ma200 - 1.0) * 100.0
            );
        }
        _ => {
            let _ = writeln!(out, "  Trend: N/A");
        }
    }

    out
}

/// Last non-NaN entry of a series, scanning backwards.
fn last_defined(series: &[f64]) -> Option<f64> {
    series.iter().rev().copied().find(|v| !v.is_nan())
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
