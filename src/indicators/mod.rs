// Technical indicators module
// Implements MA, EMA, ATR for the momentum bias and position sizing

pub mod atr;
pub mod moving_average;

pub use atr::{average_true_range, true_range};
pub use moving_average::{exponential_moving_average, moving_average};

use serde::{Deserialize, Serialize};

use crate::config::RiskParameters;
use crate::models::{Bar, Side};
use crate::Result;

/// Indicator values for one evaluation tick
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct IndicatorSnapshot {
    pub ma: f64,
    pub ema: f64,
    pub atr: f64,
    /// Last close in the window
    pub price: f64,
}

impl IndicatorSnapshot {
    /// Compute MA, EMA and ATR from the most recent bars
    pub fn from_bars(bars: &[Bar], params: &RiskParameters) -> Result<Self> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let ma = moving_average(&closes, params.ma_lookback)?;
        let ema = exponential_moving_average(&closes, params.ema_lookback)?;
        let atr = average_true_range(bars, params.atr_lookback)?;
        // Non-empty: the lookbacks above are all >= 1
        let price = closes[closes.len() - 1];

        Ok(Self {
            ma,
            ema,
            atr,
            price,
        })
    }

    /// Directional bias: short when MA > EMA, long when EMA > MA, none on a tie
    pub fn bias(&self) -> Option<Side> {
        if self.ma > self.ema {
            Some(Side::Short)
        } else if self.ema > self.ma {
            Some(Side::Long)
        } else {
            None
        }
    }
}
