use std::path::Path;

use ::config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::Result;

/// Environment variable prefix, e.g. `MOMENTUM_LEVERAGE=3`
pub const ENV_PREFIX: &str = "MOMENTUM";

/// Trading and risk settings, fixed for the whole run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskParameters {
    /// Instrument traded on the exchange
    pub instrument: String,
    /// Currency of the account balance
    pub currency: String,
    pub ma_lookback: usize,
    pub ema_lookback: usize,
    pub atr_lookback: usize,
    /// Highest allowable portion of equity for a position
    pub equity_fraction: f64,
    pub leverage: f64,
    /// Portion of balance risked per stop distance
    pub risk_multiplier: f64,
    /// Stop distance in ATRs
    pub stop_multiplier: f64,
    /// Suppress repositioning for the rest of the day after a stop fires
    pub stop_cooldown: bool,
    /// Place a reduce-only stop alongside each entry
    pub place_stop_orders: bool,
    /// Give up on an exit after this many cancellations (unbounded when unset, at least 1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_retry_limit: Option<u32>,
}

impl Default for RiskParameters {
    fn default() -> Self {
        Self {
            instrument: "BTC-PERP".to_string(),
            currency: "USD".to_string(),
            ma_lookback: 18,
            ema_lookback: 8,
            atr_lookback: 14,
            equity_fraction: 0.75,
            leverage: 5.0,
            risk_multiplier: 0.10,
            stop_multiplier: 2.0,
            stop_cooldown: true,
            place_stop_orders: true,
            exit_retry_limit: None,
        }
    }
}

impl RiskParameters {
    /// Load parameters: defaults, then an optional file, then `MOMENTUM_*` env vars
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }

        let params: Self = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        params.validate()?;

        tracing::debug!("Loaded risk parameters: {:?}", params);
        Ok(params)
    }

    /// Reject settings that would make indicators or sizing meaningless
    pub fn validate(&self) -> Result<()> {
        for (name, lookback) in [
            ("ma_lookback", self.ma_lookback),
            ("ema_lookback", self.ema_lookback),
            ("atr_lookback", self.atr_lookback),
        ] {
            if lookback == 0 {
                return Err(EngineError::Config(format!("{} must be at least 1", name)));
            }
        }

        for (name, value) in [
            ("equity_fraction", self.equity_fraction),
            ("leverage", self.leverage),
            ("risk_multiplier", self.risk_multiplier),
            ("stop_multiplier", self.stop_multiplier),
        ] {
            if !(value.is_finite() && value > 0.0) {
                return Err(EngineError::Config(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        if self.exit_retry_limit == Some(0) {
            return Err(EngineError::Config(
                "exit_retry_limit must be at least 1 when set".to_string(),
            ));
        }

        if self.instrument.trim().is_empty() {
            return Err(EngineError::Config("instrument must be set".to_string()));
        }

        Ok(())
    }

    /// Bars needed before every indicator can be computed
    pub fn warmup_bars(&self) -> usize {
        self.ma_lookback.max(self.ema_lookback).max(self.atr_lookback)
    }

    /// Price distance from entry to the protective stop
    pub fn stop_distance(&self, atr: f64) -> f64 {
        atr * self.stop_multiplier
    }
}
