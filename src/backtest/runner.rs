use crate::backtest::metrics::{BacktestReport, EquityPoint};
use crate::backtest::simulated::SimulatedExchange;
use crate::config::RiskParameters;
use crate::error::EngineError;
use crate::execution::{BarWindow, RecalibrationCycle};
use crate::models::Bar;
use crate::Result;

/// Backtest runner that drives the recalibration cycle over historical bars
pub struct BacktestRunner<'a> {
    params: &'a RiskParameters,
    initial_portfolio_value: f64,
}

impl<'a> BacktestRunner<'a> {
    pub fn new(params: &'a RiskParameters, initial_portfolio_value: f64) -> Self {
        Self {
            params,
            initial_portfolio_value,
        }
    }

    /// Run a backtest over bars in time order
    ///
    /// One cycle per bar against a `SimulatedExchange`. Any open position is
    /// closed at the last close. Fatal cycle errors abort the run.
    pub fn run<I>(&self, bars: I) -> Result<BacktestReport>
    where
        I: IntoIterator<Item = Bar>,
    {
        let exchange = SimulatedExchange::new(self.initial_portfolio_value);
        let mut cycle = RecalibrationCycle::new(self.params, exchange);
        let mut window = BarWindow::new(self.params.warmup_bars());

        let mut events = Vec::new();
        let mut equity_curve = Vec::new();
        let mut cycles_skipped = 0;

        tracing::info!(
            "Starting backtest on {}: needs {} bars of history",
            self.params.instrument,
            self.params.warmup_bars()
        );

        for bar in bars {
            window.push(bar.clone())?;
            cycle.gateway_mut().advance(&bar);

            let outcome = cycle.on_bars(window.bars())?;
            if outcome.is_skipped() {
                cycles_skipped += 1;
            }
            events.extend(outcome.events);

            equity_curve.push(EquityPoint {
                timestamp: bar.timestamp,
                equity: cycle.gateway().equity(),
            });
        }

        let final_price = window
            .latest()
            .map(|bar| bar.close)
            .ok_or_else(|| EngineError::Feed("no bars to backtest".to_string()))?;

        let outcome = cycle.close_out(final_price)?;
        events.extend(outcome.events);

        let final_portfolio_value = cycle.gateway().equity();
        let report = BacktestReport::from_events(
            &events,
            equity_curve,
            self.initial_portfolio_value,
            final_portfolio_value,
            cycles_skipped,
        );

        tracing::info!(
            "Backtest complete: {} trades, P&L: ${:.2} ({:.2}%)",
            report.total_trades,
            report.total_pnl,
            report.total_return_pct
        );
        tracing::info!("Final portfolio value: {:.2}", final_portfolio_value);

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backtest::synthetic::{MarketScenario, SyntheticDataGenerator};

    fn small_params() -> RiskParameters {
        RiskParameters {
            ma_lookback: 6,
            ema_lookback: 3,
            atr_lookback: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_backtest_reversal_market() {
        tracing_subscriber::fmt()
            .with_env_filter("momentum_bot=debug")
            .try_init()
            .ok();

        let mut generator = SyntheticDataGenerator::new(42);
        let bars = generator.generate(MarketScenario::Reversal, 120);

        let params = small_params();
        let runner = BacktestRunner::new(&params, 10000.0);
        let report = runner.run(bars).unwrap();

        assert_eq!(report.bars_processed, 120);
        // Indicators need 6 bars before the first real cycle
        assert!(report.cycles_skipped >= 5);
        assert!(report.total_trades > 0);
        assert!(report.final_portfolio_value > 0.0);
        assert_eq!(
            report.total_trades,
            report.winning_trades + report.losing_trades
        );
    }

    #[test]
    fn test_final_value_matches_exchange_equity() {
        let mut generator = SyntheticDataGenerator::new(7);
        let bars = generator.generate(MarketScenario::Volatile, 80);

        let params = small_params();
        let report = BacktestRunner::new(&params, 5000.0).run(bars).unwrap();

        let realized: f64 = report.trades.iter().map(|t| t.pnl).sum();
        assert!((report.final_portfolio_value - (5000.0 + realized)).abs() < 1e-6);
        assert!((report.total_pnl - realized).abs() < 1e-6);
    }

    #[test]
    fn test_too_few_bars_only_skips() {
        let mut generator = SyntheticDataGenerator::new(1);
        let bars = generator.generate(MarketScenario::Uptrend, 4);

        let params = small_params();
        let report = BacktestRunner::new(&params, 10000.0).run(bars).unwrap();

        assert_eq!(report.cycles_skipped, 4);
        assert_eq!(report.total_trades, 0);
        assert_eq!(report.final_portfolio_value, 10000.0);
    }

    #[test]
    fn test_empty_feed_is_an_error() {
        let params = small_params();
        let result = BacktestRunner::new(&params, 10000.0).run(Vec::new());
        assert!(matches!(result, Err(EngineError::Feed(_))));
    }

    #[test]
    fn test_out_of_order_feed_halts() {
        let mut generator = SyntheticDataGenerator::new(3);
        let mut bars = generator.generate(MarketScenario::Sideways, 10);
        bars.swap(4, 5);

        let params = small_params();
        let result = BacktestRunner::new(&params, 10000.0).run(bars);
        assert!(matches!(result, Err(EngineError::OutOfOrderBar { .. })));
    }
}
