use error_stack::{Report, bail};

use crate::error::IndicatorError;
use crate::indicator::ma::Sma;

/// Upper, middle and lower bands, index-aligned to the input.
#[derive(Debug, Clone, Default)]
pub struct BandSeries {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

/// Bollinger Bands: middle = SMA(window), bands at `multiplier` trailing
/// standard deviations.
///
/// Uses the sample standard deviation (divisor `window - 1`) for both bands.
pub struct BollingerBands {
    window: usize,
    multiplier: f64,
}

impl BollingerBands {
    pub fn new(window: usize, multiplier: f64) -> Result<Self, Report<IndicatorError>> {
        if window < 2 {
            bail!(IndicatorError::InvalidParameter {
                name: "window must be >= 2".into(),
            });
        }
        if multiplier <= 0.0 {
            bail!(IndicatorError::InvalidParameter {
                name: "multiplier must be > 0".into(),
            });
        }
        Ok(Self { window, multiplier })
    }

    pub fn calculate(&self, closes: &[f64]) -> BandSeries {
        let n = closes.len();
        let middle = Sma::new(self.window)
            .expect("window is >= 2")
            .calculate(closes);
        let mut upper = vec![f64::NAN; n];
        let mut lower = vec![f64::NAN; n];

        if n >= self.window {
            for (i, w) in closes.windows(self.window).enumerate() {
                let t = i + self.window - 1;
                let mean = middle[t];
                let variance = w.iter().map(|&p| (p - mean).powi(2)).sum::<f64>()
                    / (self.window - 1) as f64;
                let band = self.multiplier * variance.sqrt();
                upper[t] = mean + band;
                lower[t] = mean - band;
            }
        }

        BandSeries {
            upper,
            middle,
            lower,
        }
    }
}

impl Default for BollingerBands {
    fn default() -> Self {
        Self {
            window: 20,
            multiplier: 2.0,
        }
    }
}
