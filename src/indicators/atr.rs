/// Average True Range (ATR) indicator
///
/// Measures volatility as the mean true range over the last `period` bars.
/// True range here is measured against the bar's own close:
/// - High - Low
/// - Abs(High - Close)
/// - Abs(Low - Close)
///
/// which differs from the textbook definition that uses the previous close.
use crate::error::EngineError;
use crate::models::Bar;
use crate::Result;

/// True range of a single bar
pub fn true_range(bar: &Bar) -> f64 {
    (bar.high - bar.low)
        .max((bar.high - bar.close).abs())
        .max((bar.low - bar.close).abs())
}

/// Calculate ATR for the last `period` bars
pub fn average_true_range(bars: &[Bar], period: usize) -> Result<f64> {
    if period == 0 || bars.len() < period {
        return Err(EngineError::InsufficientData {
            indicator: "ATR",
            required: period.max(1),
            available: bars.len(),
        });
    }

    let sum: f64 = bars[bars.len() - period..].iter().map(true_range).sum();
    Ok(sum / period as f64)
}
