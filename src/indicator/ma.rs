use error_stack::{Report, bail};

use crate::error::IndicatorError;

/// Simple trailing moving average, index-aligned to the input.
///
/// Entries before the window fills (the first `window - 1` indices) are NaN.
pub struct Sma {
    window: usize,
}

impl Sma {
    pub fn new(window: usize) -> Result<Self, Report<IndicatorError>> {
        if window == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "window must be > 0".into(),
            });
        }
        Ok(Self { window })
    }

    /// The three standard screener windows.
    pub fn window_20() -> Self {
        Self { window: 20 }
    }

    pub fn window_50() -> Self {
        Self { window: 50 }
    }

    pub fn window_200() -> Self {
        Self { window: 200 }
    }

    pub fn calculate(&self, values: &[f64]) -> Vec<f64> {
        let n = values.len();
        let mut out = vec![f64::NAN; n];
        if n < self.window {
            return out;
        }
        for (t, w) in values.windows(self.window).enumerate() {
            out[t + self.window - 1] = w.iter().sum::<f64>() / self.window as f64;
        }
        out
    }
}

/// Exponential moving average in the recursive form `ema[t] = alpha * x[t] +
/// (1 - alpha) * ema[t-1]`, seeded with the first value, `alpha = 2/(span+1)`.
///
/// Defined at every index, so the output carries no NaN warm-up.
pub struct Ema {
    span: usize,
}

impl Ema {
    pub fn new(span: usize) -> Result<Self, Report<IndicatorError>> {
        if span == 0 {
            bail!(IndicatorError::InvalidParameter {
                name: "span must be > 0".into(),
            });
        }
        Ok(Self { span })
    }

    pub fn calculate(&self, values: &[f64]) -> Vec<f64> {
        let n = values.len();
        if n == 0 {
            return Vec::new();
        }

        let alpha = 2.0 / (self.span as f64 + 1.0);
        let mut out = Vec::with_capacity(n);
        let mut ema = values[0];
        out.push(ema);
        for &v in &values[1..] {
            ema = alpha * v + (1.0 - alpha) * ema;
            out.push(ema);
        }
        out
    }
}
