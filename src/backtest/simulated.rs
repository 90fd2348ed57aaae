use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::execution::OrderGateway;
use crate::models::{Bar, OrderConfirmation, OrderSide, OrderStatus, Position, Side};
use crate::Result;

const SIZE_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
struct SimPosition {
    side: Side,
    size: f64,
    entry_price: f64,
}

/// Conditional order waiting for its trigger
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RestingStop {
    pub order_id: Uuid,
    pub side: OrderSide,
    pub amount: f64,
    pub trigger_price: f64,
    pub reduce_only: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderType {
    Market,
    Stop,
}

/// Every order the exchange was asked to place
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderRecord {
    pub order_id: Uuid,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub amount: f64,
    pub trigger_price: Option<f64>,
    pub status: OrderStatus,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Backtest broker: fills market orders at the current close and runs
/// resting stops against each bar's range
///
/// Stops fill at their trigger price, even when a bar gaps through it.
/// Positions are netted on one instrument. Realized P&L settles into cash and
/// the reported balance is equity (cash plus unrealized P&L at the close).
#[derive(Debug, Clone)]
pub struct SimulatedExchange {
    cash: f64,
    position: Option<SimPosition>,
    stops: Vec<RestingStop>,
    current_bar: Option<Bar>,
    last_stop_fill: Option<DateTime<Utc>>,
    orders: Vec<OrderRecord>,
    cancel_next_market_orders: usize,
    fail_queries: bool,
}

impl SimulatedExchange {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            cash: initial_balance,
            position: None,
            stops: Vec::new(),
            current_bar: None,
            last_stop_fill: None,
            orders: Vec::new(),
            cancel_next_market_orders: 0,
            fail_queries: false,
        }
    }

    /// Move the market to a new bar, triggering any stops inside its range
    pub fn advance(&mut self, bar: &Bar) {
        self.current_bar = Some(bar.clone());

        let stops = std::mem::take(&mut self.stops);
        let mut resting = Vec::with_capacity(stops.len());

        for stop in stops {
            let triggered = match stop.side {
                OrderSide::Sell => bar.low <= stop.trigger_price,
                OrderSide::Buy => bar.high >= stop.trigger_price,
            };

            if !triggered {
                resting.push(stop);
                continue;
            }

            let price = stop.trigger_price;
            let amount = if stop.reduce_only {
                self.reducible_amount(stop.side).min(stop.amount)
            } else {
                stop.amount
            };
            if amount > SIZE_EPSILON {
                tracing::info!(
                    "Stop {:?} {:.6} triggered at ${:.2}",
                    stop.side,
                    amount,
                    price
                );
                self.apply_fill(stop.side, amount, price);
                self.last_stop_fill = Some(bar.timestamp);
            }
        }

        // Reduce-only orders die with the position they protect
        if self.position.is_none() {
            resting.retain(|stop| !stop.reduce_only);
        }
        self.stops = resting;
    }

    /// Cash plus unrealized P&L at the current close
    pub fn equity(&self) -> f64 {
        self.cash + self.to_position().unrealized_pnl()
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    pub fn resting_stops(&self) -> &[RestingStop] {
        &self.stops
    }

    pub fn orders(&self) -> &[OrderRecord] {
        &self.orders
    }

    pub fn current_bar(&self) -> Option<&Bar> {
        self.current_bar.as_ref()
    }

    /// Cancel the next `count` market orders instead of filling them
    pub fn cancel_next_market_orders(&mut self, count: usize) {
        self.cancel_next_market_orders = count;
    }

    /// Make balance/position/stop-history queries fail
    pub fn set_fail_queries(&mut self, fail: bool) {
        self.fail_queries = fail;
    }

    /// Open a position directly, as if it existed before the run started
    pub fn seed_position(&mut self, side: Side, size: f64, entry_price: f64) {
        self.position = Some(SimPosition {
            side,
            size,
            entry_price,
        });
    }

    fn current_price(&self) -> Option<f64> {
        self.current_bar.as_ref().map(|bar| bar.close)
    }

    fn to_position(&self) -> Position {
        match (self.position, self.current_price()) {
            (Some(p), Some(mark)) => Position::open(p.side, p.entry_price, p.size, mark),
            (Some(p), None) => Position::open(p.side, p.entry_price, p.size, p.entry_price),
            (None, _) => Position::Flat,
        }
    }

    /// Size an order on `side` could close without flipping the position
    fn reducible_amount(&self, side: OrderSide) -> f64 {
        match self.position {
            Some(p) if p.side.exit_order() == side => p.size,
            _ => 0.0,
        }
    }

    fn apply_fill(&mut self, side: OrderSide, amount: f64, price: f64) {
        let current = self
            .position
            .map(|p| p.side.sign() * p.size)
            .unwrap_or(0.0);
        let delta = side.sign() * amount;
        let net = current + delta;

        if let Some(p) = self.position {
            if current.signum() != delta.signum() {
                let closed = amount.min(p.size);
                self.cash += (price - p.entry_price) * closed * p.side.sign();
            }
        }

        self.position = if net.abs() <= SIZE_EPSILON {
            None
        } else {
            let side = if net > 0.0 { Side::Long } else { Side::Short };
            let entry_price = match self.position {
                // Adding to the same side: average the entry
                Some(p) if p.side == side && net.abs() > p.size => {
                    (p.entry_price * p.size + price * amount) / net.abs()
                }
                Some(p) if p.side == side => p.entry_price,
                // New or flipped position
                _ => price,
            };
            Some(SimPosition {
                side,
                size: net.abs(),
                entry_price,
            })
        };
    }

    fn record(
        &mut self,
        order_type: OrderType,
        side: OrderSide,
        amount: f64,
        trigger_price: Option<f64>,
        status: OrderStatus,
    ) -> OrderConfirmation {
        let order_id = Uuid::new_v4();
        self.orders.push(OrderRecord {
            order_id,
            order_type,
            side,
            amount,
            trigger_price,
            status,
            timestamp: self.current_bar.as_ref().map(|bar| bar.timestamp),
        });
        OrderConfirmation { order_id, status }
    }
}

impl OrderGateway for SimulatedExchange {
    fn fetch_balance(&mut self) -> Result<f64> {
        if self.fail_queries {
            return Err(EngineError::Account(
                "simulated balance query failure".to_string(),
            ));
        }
        Ok(self.equity())
    }

    fn fetch_position(&mut self) -> Result<Position> {
        if self.fail_queries {
            return Err(EngineError::Request(
                "simulated position query failure".to_string(),
            ));
        }
        Ok(self.to_position())
    }

    fn submit_market_order(&mut self, side: OrderSide, amount: f64) -> Result<OrderConfirmation> {
        let price = self
            .current_price()
            .ok_or_else(|| EngineError::Request("no market price yet".to_string()))?;

        if self.cancel_next_market_orders > 0 || !(amount > 0.0) {
            self.cancel_next_market_orders = self.cancel_next_market_orders.saturating_sub(1);
            tracing::debug!("Market {:?} {:.6} canceled", side, amount);
            return Ok(self.record(OrderType::Market, side, amount, None, OrderStatus::Canceled));
        }

        self.apply_fill(side, amount, price);
        Ok(self.record(
            OrderType::Market,
            side,
            amount,
            None,
            OrderStatus::Filled { price, amount },
        ))
    }

    fn submit_stop_order(
        &mut self,
        side: OrderSide,
        amount: f64,
        trigger_price: f64,
        reduce_only: bool,
    ) -> Result<OrderConfirmation> {
        if reduce_only && self.reducible_amount(side) <= SIZE_EPSILON {
            return Ok(self.record(
                OrderType::Stop,
                side,
                amount,
                Some(trigger_price),
                OrderStatus::Canceled,
            ));
        }

        let confirmation = self.record(
            OrderType::Stop,
            side,
            amount,
            Some(trigger_price),
            OrderStatus::Accepted,
        );
        self.stops.push(RestingStop {
            order_id: confirmation.order_id,
            side,
            amount,
            trigger_price,
            reduce_only,
        });
        Ok(confirmation)
    }

    fn cancel_all_orders(&mut self) -> Result<()> {
        if !self.stops.is_empty() {
            tracing::debug!("Canceling {} resting orders", self.stops.len());
        }
        self.stops.clear();
        Ok(())
    }

    fn was_stop_triggered_today(&mut self) -> Result<bool> {
        if self.fail_queries {
            return Err(EngineError::Request(
                "simulated order history failure".to_string(),
            ));
        }
        Ok(match (self.last_stop_fill, &self.current_bar) {
            (Some(fired), Some(bar)) => fired.date_naive() == bar.timestamp.date_naive(),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn bar(hour: i64, open: f64, high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::hours(hour),
            open,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_market_orders_fill_at_close() {
        let mut exchange = SimulatedExchange::new(10000.0);
        exchange.advance(&bar(0, 100.0, 101.0, 99.0, 100.0));

        let confirmation = exchange.submit_market_order(OrderSide::Buy, 2.0).unwrap();
        assert_eq!(
            confirmation.status,
            OrderStatus::Filled {
                price: 100.0,
                amount: 2.0
            }
        );

        exchange.advance(&bar(1, 100.0, 111.0, 99.0, 110.0));
        assert_eq!(
            exchange.fetch_position().unwrap(),
            Position::Long {
                entry_price: 100.0,
                size: 2.0,
                mark_price: 110.0
            }
        );
        assert_eq!(exchange.fetch_balance().unwrap(), 10020.0);

        exchange.submit_market_order(OrderSide::Sell, 2.0).unwrap();
        assert!(exchange.fetch_position().unwrap().is_flat());
        assert_eq!(exchange.cash(), 10020.0);
    }

    #[test]
    fn test_market_order_without_price_fails() {
        let mut exchange = SimulatedExchange::new(10000.0);
        let result = exchange.submit_market_order(OrderSide::Buy, 1.0);
        assert!(matches!(result, Err(EngineError::Request(_))));
    }

    #[test]
    fn test_short_pnl_settles_into_cash() {
        let mut exchange = SimulatedExchange::new(1000.0);
        exchange.advance(&bar(0, 100.0, 101.0, 99.0, 100.0));
        exchange.submit_market_order(OrderSide::Sell, 1.0).unwrap();

        exchange.advance(&bar(1, 100.0, 101.0, 89.0, 90.0));
        exchange.submit_market_order(OrderSide::Buy, 1.0).unwrap();

        assert_eq!(exchange.cash(), 1010.0);
        assert!(exchange.fetch_position().unwrap().is_flat());
    }

    #[test]
    fn test_canceled_market_orders() {
        let mut exchange = SimulatedExchange::new(10000.0);
        exchange.advance(&bar(0, 100.0, 101.0, 99.0, 100.0));
        exchange.cancel_next_market_orders(1);

        let first = exchange.submit_market_order(OrderSide::Buy, 1.0).unwrap();
        assert_eq!(first.status, OrderStatus::Canceled);
        assert!(exchange.fetch_position().unwrap().is_flat());

        let second = exchange.submit_market_order(OrderSide::Buy, 1.0).unwrap();
        assert!(matches!(second.status, OrderStatus::Filled { .. }));
        assert_eq!(exchange.orders().len(), 2);
    }

    #[test]
    fn test_stop_triggers_on_intrabar_low() {
        let mut exchange = SimulatedExchange::new(10000.0);
        exchange.advance(&bar(0, 100.0, 101.0, 99.0, 100.0));
        exchange.submit_market_order(OrderSide::Buy, 1.0).unwrap();
        let confirmation = exchange
            .submit_stop_order(OrderSide::Sell, 1.0, 95.0, true)
            .unwrap();
        assert_eq!(confirmation.status, OrderStatus::Accepted);
        assert!(!exchange.was_stop_triggered_today().unwrap());

        // Range stays above the trigger
        exchange.advance(&bar(1, 100.0, 102.0, 96.0, 98.0));
        assert_eq!(exchange.resting_stops().len(), 1);

        exchange.advance(&bar(2, 98.0, 99.0, 94.0, 97.0));
        assert!(exchange.fetch_position().unwrap().is_flat());
        assert!(exchange.resting_stops().is_empty());
        assert_eq!(exchange.cash(), 9995.0);
        assert!(exchange.was_stop_triggered_today().unwrap());
    }

    #[test]
    fn test_stop_fills_at_trigger_through_gap() {
        let mut exchange = SimulatedExchange::new(10000.0);
        exchange.advance(&bar(0, 100.0, 101.0, 99.0, 100.0));
        exchange.submit_market_order(OrderSide::Sell, 1.0).unwrap();
        exchange
            .submit_stop_order(OrderSide::Buy, 1.0, 104.0, true)
            .unwrap();

        exchange.advance(&bar(1, 108.0, 110.0, 107.0, 109.0));
        assert!(exchange.fetch_position().unwrap().is_flat());
        assert_eq!(exchange.cash(), 9996.0);
    }

    #[test]
    fn test_stop_cooldown_expires_next_day() {
        let mut exchange = SimulatedExchange::new(10000.0);
        exchange.advance(&bar(0, 100.0, 101.0, 99.0, 100.0));
        exchange.submit_market_order(OrderSide::Buy, 1.0).unwrap();
        exchange
            .submit_stop_order(OrderSide::Sell, 1.0, 95.0, true)
            .unwrap();

        exchange.advance(&bar(1, 96.0, 97.0, 90.0, 92.0));
        assert!(exchange.was_stop_triggered_today().unwrap());

        exchange.advance(&bar(25, 92.0, 93.0, 91.0, 92.0));
        assert!(!exchange.was_stop_triggered_today().unwrap());
    }

    #[test]
    fn test_reduce_only_stop_needs_position() {
        let mut exchange = SimulatedExchange::new(10000.0);
        exchange.advance(&bar(0, 100.0, 101.0, 99.0, 100.0));

        let confirmation = exchange
            .submit_stop_order(OrderSide::Sell, 1.0, 95.0, true)
            .unwrap();
        assert_eq!(confirmation.status, OrderStatus::Canceled);
        assert!(exchange.resting_stops().is_empty());
    }

    #[test]
    fn test_reversal_fill_flips_position() {
        let mut exchange = SimulatedExchange::new(10000.0);
        exchange.advance(&bar(0, 100.0, 101.0, 99.0, 100.0));
        exchange.submit_market_order(OrderSide::Buy, 1.0).unwrap();

        exchange.advance(&bar(1, 100.0, 106.0, 99.0, 105.0));
        exchange.submit_market_order(OrderSide::Sell, 3.0).unwrap();

        assert_eq!(exchange.cash(), 10005.0);
        assert_eq!(
            exchange.fetch_position().unwrap(),
            Position::Short {
                entry_price: 105.0,
                size: 2.0,
                mark_price: 105.0
            }
        );
    }

    #[test]
    fn test_query_failures() {
        let mut exchange = SimulatedExchange::new(10000.0);
        exchange.set_fail_queries(true);

        assert!(matches!(
            exchange.fetch_balance(),
            Err(EngineError::Account(_))
        ));
        assert!(matches!(
            exchange.fetch_position(),
            Err(EngineError::Request(_))
        ));
        assert!(exchange.was_stop_triggered_today().is_err());
    }
}
