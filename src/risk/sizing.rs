use serde::{Deserialize, Serialize};

use crate::config::RiskParameters;
use crate::error::EngineError;
use crate::Result;

/// Which cap ended up limiting the order size
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SizingConstraint {
    Equity,
    Risk,
}

/// Result of sizing a new position, in base units
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PositionSize {
    pub amount: f64,
    pub equity_cap: f64,
    pub risk_cap: f64,
    pub constraint: SizingConstraint,
}

/// Sizes new positions from balance, leverage and volatility
#[derive(Debug, Clone)]
pub struct RiskSizer<'a> {
    params: &'a RiskParameters,
}

impl<'a> RiskSizer<'a> {
    pub fn new(params: &'a RiskParameters) -> Self {
        Self { params }
    }

    /// Market inputs a size can be computed from; a zero ATR would mean unbounded size
    pub fn check_inputs(&self, price: f64, atr: f64) -> Result<()> {
        if !(atr.is_finite() && atr > 0.0) {
            return Err(EngineError::Sizing(format!("ATR must be positive, got {}", atr)));
        }
        if !(price.is_finite() && price > 0.0) {
            return Err(EngineError::Sizing(format!(
                "price must be positive, got {}",
                price
            )));
        }
        Ok(())
    }

    /// Size a position as the smaller of the leverage cap and the volatility cap
    ///
    /// - equity cap: `equity_fraction * leverage * balance / price`
    /// - risk cap: `balance * risk_multiplier / (atr * stop_multiplier)`
    ///
    /// Never sizes on invalid inputs: ATR, price and balance must all be positive.
    pub fn size(&self, balance: f64, price: f64, atr: f64) -> Result<PositionSize> {
        self.check_inputs(price, atr)?;
        if !(balance.is_finite() && balance > 0.0) {
            return Err(EngineError::Sizing(format!(
                "balance must be positive, got {}",
                balance
            )));
        }

        let equity_cap =
            (self.params.equity_fraction * self.params.leverage * balance) / price;
        let risk_cap =
            (balance * self.params.risk_multiplier) / self.params.stop_distance(atr);

        let (amount, constraint) = if risk_cap <= equity_cap {
            (risk_cap, SizingConstraint::Risk)
        } else {
            (equity_cap, SizingConstraint::Equity)
        };

        tracing::debug!(
            "Sized {:.6} (equity cap {:.6}, risk cap {:.6}, bound by {:?})",
            amount,
            equity_cap,
            risk_cap,
            constraint
        );

        Ok(PositionSize {
            amount,
            equity_cap,
            risk_cap,
            constraint,
        })
    }
}
