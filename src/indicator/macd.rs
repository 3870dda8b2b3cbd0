use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::ma::Ema;

/// MACD line, signal line and histogram, index-aligned to the input.
#[derive(Debug, Clone, Default)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

/// MACD (Moving Average Convergence Divergence).
///
/// Built from recursive EMAs seeded with the first close, so all three
/// output series are defined from index 0.
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
}

impl Macd {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Result<Self, Report<IndicatorError>> {
        if fast >= slow {
            bail!(IndicatorError::InvalidParameter {
                name: "fast span must be < slow span".into(),
            });
        }
        Ok(Self {
            fast: Ema::new(fast)?,
            slow: Ema::new(slow)?,
            signal: Ema::new(signal)?,
        })
    }

    pub fn calculate(&self, closes: &[f64]) -> MacdSeries {
        let fast = self.fast.calculate(closes);
        let slow = self.slow.calculate(closes);

        let macd: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = self.signal.calculate(&macd);
        let histogram: Vec<f64> = macd.iter().zip(&signal).map(|(m, s)| m - s).collect();

        MacdSeries {
            macd,
            signal,
            histogram,
        }
    }
}

impl Default for Macd {
    fn default() -> Self {
        Self {
            fast: Ema::new(12).expect("span is non-zero"),
            slow: Ema::new(26).expect("span is non-zero"),
            signal: Ema::new(9).expect("span is non-zero"),
        }
    }
}
