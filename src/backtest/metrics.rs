use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{ExitReason, Side, TradeEvent};

/// Record of a single round trip for analysis
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TradeRecord {
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub pnl: f64,
    pub pnl_pct: f64,
    pub exit_reason: ExitReason,
}

impl TradeRecord {
    pub fn from_event(event: &TradeEvent) -> Option<Self> {
        match *event {
            TradeEvent::Exited {
                side,
                entry_price,
                price,
                size,
                pnl_pct,
                reason,
            } => Some(Self {
                side,
                entry_price,
                exit_price: price,
                size,
                pnl: (price - entry_price) * size * side.sign(),
                pnl_pct,
                exit_reason: reason,
            }),
            TradeEvent::Entered { .. } => None,
        }
    }
}

/// Portfolio value after a bar was processed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: f64,
}

/// Summary of a backtest run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    // P&L
    pub initial_portfolio_value: f64,
    pub final_portfolio_value: f64,
    pub total_pnl: f64,
    pub total_return_pct: f64,

    // Trade statistics
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub long_trades: usize,
    pub short_trades: usize,
    pub stop_exits: usize,
    pub win_rate: f64,
    pub avg_pnl_pct: f64,
    pub largest_win: f64,
    pub largest_loss: f64,

    // Risk
    pub max_drawdown: f64,
    pub max_drawdown_pct: f64,

    // Cycles
    pub bars_processed: usize,
    pub cycles_skipped: usize,

    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
}

impl BacktestReport {
    pub fn from_events(
        events: &[TradeEvent],
        equity_curve: Vec<EquityPoint>,
        initial_portfolio_value: f64,
        final_portfolio_value: f64,
        cycles_skipped: usize,
    ) -> Self {
        let trades: Vec<TradeRecord> = events.iter().filter_map(TradeRecord::from_event).collect();
        let total_trades = trades.len();

        let total_pnl = final_portfolio_value - initial_portfolio_value;
        let total_return_pct = if initial_portfolio_value > 0.0 {
            total_pnl / initial_portfolio_value * 100.0
        } else {
            0.0
        };

        let winning_trades = trades.iter().filter(|t| t.pnl > 0.0).count();
        let losing_trades = total_trades - winning_trades;
        let long_trades = trades.iter().filter(|t| t.side == Side::Long).count();
        let short_trades = total_trades - long_trades;
        let stop_exits = trades
            .iter()
            .filter(|t| matches!(t.exit_reason, ExitReason::StopLoss | ExitReason::StopOrder))
            .count();

        let win_rate = if total_trades > 0 {
            winning_trades as f64 / total_trades as f64 * 100.0
        } else {
            0.0
        };
        let avg_pnl_pct = if total_trades > 0 {
            trades.iter().map(|t| t.pnl_pct).sum::<f64>() / total_trades as f64
        } else {
            0.0
        };

        let largest_win = trades.iter().map(|t| t.pnl).fold(0.0, f64::max);
        let largest_loss = trades.iter().map(|t| t.pnl).fold(0.0, f64::min);

        let (max_drawdown, max_drawdown_pct) =
            Self::calculate_drawdown(&equity_curve, initial_portfolio_value);

        Self {
            initial_portfolio_value,
            final_portfolio_value,
            total_pnl,
            total_return_pct,
            total_trades,
            winning_trades,
            losing_trades,
            long_trades,
            short_trades,
            stop_exits,
            win_rate,
            avg_pnl_pct,
            largest_win,
            largest_loss,
            max_drawdown,
            max_drawdown_pct,
            bars_processed: equity_curve.len(),
            cycles_skipped,
            trades,
            equity_curve,
        }
    }

    /// Largest peak-to-trough fall of the equity curve
    fn calculate_drawdown(curve: &[EquityPoint], initial: f64) -> (f64, f64) {
        let mut peak = initial;
        let mut max_drawdown = 0.0;
        let mut max_drawdown_pct = 0.0;

        for point in curve {
            peak = f64::max(peak, point.equity);
            let drawdown = peak - point.equity;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
                max_drawdown_pct = if peak > 0.0 {
                    drawdown / peak * 100.0
                } else {
                    0.0
                };
            }
        }

        (max_drawdown, max_drawdown_pct)
    }

    /// Print formatted report to stdout
    pub fn print_report(&self) {
        println!("\n{}", "=".repeat(60));
        println!("BACKTEST REPORT");
        println!("{}", "=".repeat(60));

        println!("\nP&L");
        println!("  Initial Portfolio:  ${:>12.2}", self.initial_portfolio_value);
        println!("  Final Portfolio:    ${:>12.2}", self.final_portfolio_value);
        println!("  Total P&L:          ${:>12.2}", self.total_pnl);
        println!("  Total Return:        {:>11.2}%", self.total_return_pct);

        println!("\nTrades");
        println!("  Total Trades:        {:>12}", self.total_trades);
        println!(
            "  Long / Short:        {:>12}",
            format!("{} / {}", self.long_trades, self.short_trades)
        );
        println!("  Winning Trades:      {:>12}", self.winning_trades);
        println!("  Losing Trades:       {:>12}", self.losing_trades);
        println!("  Stop Exits:          {:>12}", self.stop_exits);
        println!("  Win Rate:            {:>11.2}%", self.win_rate);
        println!("  Avg Trade:           {:>11.2}%", self.avg_pnl_pct);
        println!("  Largest Win:        ${:>12.2}", self.largest_win);
        println!("  Largest Loss:       ${:>12.2}", self.largest_loss);

        println!("\nRisk");
        println!("  Max Drawdown:       ${:>12.2}", self.max_drawdown);
        println!("  Max Drawdown %:      {:>11.2}%", self.max_drawdown_pct);

        println!("\nCycles");
        println!("  Bars Processed:      {:>12}", self.bars_processed);
        println!("  Cycles Skipped:      {:>12}", self.cycles_skipped);

        println!("\n{}", "=".repeat(60));
    }
}
