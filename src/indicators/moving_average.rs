use crate::error::EngineError;
use crate::Result;

fn ensure_history(indicator: &'static str, available: usize, period: usize) -> Result<()> {
    if period == 0 || available < period {
        return Err(EngineError::InsufficientData {
            indicator,
            required: period.max(1),
            available,
        });
    }
    Ok(())
}

/// Simple moving average of the last `period` closes
pub fn moving_average(closes: &[f64], period: usize) -> Result<f64> {
    ensure_history("MA", closes.len(), period)?;

    let sum: f64 = closes[closes.len() - period..].iter().sum();
    Ok(sum / period as f64)
}

/// Exponential moving average over the last `period` closes
///
/// Seeded with the first close of the window. The smoothing factor at step `i`
/// is `2 / (i - base + 1)`, so it shrinks as the window is walked instead of
/// staying at `2 / (period + 1)`. Sizing downstream depends on these exact numbers.
pub fn exponential_moving_average(closes: &[f64], period: usize) -> Result<f64> {
    ensure_history("EMA", closes.len(), period)?;

    let base = closes.len() - period;
    let mut ema = closes[base];
    for (i, close) in closes.iter().enumerate().skip(base + 1) {
        let multiplier = 2.0 / (i - base + 1) as f64;
        ema = (close - ema) * multiplier + ema;
    }

    Ok(ema)
}
