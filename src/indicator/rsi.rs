use error_stack::{Report, bail};

use crate::error::IndicatorError;

/// RSI (Relative Strength Index) with simple-moving-average smoothing of
/// gains and losses.
///
/// Output is index-aligned to the input closes: the first `period` entries
/// are NaN (the delta series starts one bar late, so the window fills at
/// index `period`). Sentinels for a zero average loss: RSI saturates to 100
/// when there were gains, and stays NaN for a perfectly flat window.
pub struct Rsi {
    period: usize,
}

impl Rsi {
    pub fn new(period: usize) -> Result<Self, Report<IndicatorError>> {
        if period == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "period must be > 0".into(),
            });
        }
        Ok(Self { period })
    }

    pub fn calculate(&self, closes: &[f64]) -> Vec<f64> {
        let n = closes.len();
        let mut out = vec![f64::NAN; n];
        if n <= self.period {
            return out;
        }

        // deltas[i] is the close-to-close change from bar i to bar i+1
        let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();

        for t in self.period..n {
            let window = &deltas[t - self.period..t];
            let avg_gain =
                window.iter().map(|&d| d.max(0.0)).sum::<f64>() / self.period as f64;
            let avg_loss =
                window.iter().map(|&d| (-d).max(0.0)).sum::<f64>() / self.period as f64;
            out[t] = rsi_value(avg_gain, avg_loss);
        }

        out
    }
}

impl Default for Rsi {
    fn default() -> Self {
        Self { period: 14 }
    }
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        // 0/0 stays undefined; gains with no losses saturate to 100
        if avg_gain == 0.0 {
            return f64::NAN;
        }
        return 100.0;
    }
    let rs = avg_gain / avg_loss;
    100.0 - 100.0 / (1.0 + rs)
}
