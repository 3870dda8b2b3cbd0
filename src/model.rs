use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Trailing history window supported by the screener.
///
/// String representations match the config file format and the Yahoo chart
/// API `range` parameter (e.g. `"1mo"`, `"5y"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Period {
    Month1,
    Month3,
    Month6,
    Year1,
    Year2,
    Year5,
}

impl Period {
    /// Parse a config-format string into a `Period`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1mo" => Some(Self::Month1),
            "3mo" => Some(Self::Month3),
            "6mo" => Some(Self::Month6),
            "1y" => Some(Self::Year1),
            "2y" => Some(Self::Year2),
            "5y" => Some(Self::Year5),
            _ => None,
        }
    }

    /// Return the config-format string representation.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Month1 => "1mo",
            Self::Month3 => "3mo",
            Self::Month6 => "6mo",
            Self::Year1 => "1y",
            Self::Year2 => "2y",
            Self::Year5 => "5y",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Bar resolution requested from the data source.
///
/// Daily bars feed the summary table and indicators; minute bars are only
/// used to pick up the latest traded price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    Day1,
    Min1,
}

impl Interval {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day1 => "1d",
            Self::Min1 => "1m",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One OHLC observation. A series of bars is ordered oldest-first with
/// strictly increasing timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: Option<f64>,
}

/// One entry of the symbol universe, as loaded from the universe CSV.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SymbolRecord {
    #[serde(rename = "Symbol")]
    pub symbol: String,
    #[serde(rename = "Name")]
    pub name: String,
}

/// Per-symbol summary computed by one screener run.
///
/// Optional fields are `None` when the input history is too short for the
/// window (returns) or a denominator is zero (percent fields). Rows are
/// immutable snapshots; a new run produces a fresh set.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryRow {
    pub symbol: String,
    pub name: String,
    pub current_price: f64,
    pub price_change_pct: Option<f64>,
    pub high_52w: f64,
    pub low_52w: f64,
    pub pct_from_high: Option<f64>,
    pub pct_from_low: Option<f64>,
    pub return_1y: Option<f64>,
    pub return_2y: Option<f64>,
    pub return_5y: Option<f64>,
}

/// All indicator series for one symbol, index-aligned to the input bars.
///
/// Every vector has the same length as the bar series it was computed from;
/// entries inside an indicator's warm-up window are `f64::NAN`.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSet {
    pub rsi: Vec<f64>,
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
    pub ma20: Vec<f64>,
    pub ma50: Vec<f64>,
    pub ma200: Vec<f64>,
    pub bb_upper: Vec<f64>,
    pub bb_middle: Vec<f64>,
    pub bb_lower: Vec<f64>,
}
