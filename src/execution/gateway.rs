use crate::models::{OrderConfirmation, OrderSide, Position};
use crate::Result;

/// Exchange account access used by the recalibration cycle
///
/// Calls block until the exchange answers. Transport retries and backoff
/// belong to the implementation; the cycle never retries a failed query.
pub trait OrderGateway {
    /// Total account balance in the settlement currency (`Account` error on failure)
    fn fetch_balance(&mut self) -> Result<f64>;

    /// Current position on the instrument (`Request` error on failure)
    fn fetch_position(&mut self) -> Result<Position>;

    /// Market order; the confirmation is either `Filled` or `Canceled`
    fn submit_market_order(&mut self, side: OrderSide, amount: f64) -> Result<OrderConfirmation>;

    /// Conditional stop order, `Accepted` while resting
    fn submit_stop_order(
        &mut self,
        side: OrderSide,
        amount: f64,
        trigger_price: f64,
        reduce_only: bool,
    ) -> Result<OrderConfirmation>;

    /// Cancel every resting order on the instrument
    fn cancel_all_orders(&mut self) -> Result<()>;

    /// Whether a stop order fired during the current trading day
    fn was_stop_triggered_today(&mut self) -> Result<bool>;
}

impl<G: OrderGateway + ?Sized> OrderGateway for Box<G> {
    fn fetch_balance(&mut self) -> Result<f64> {
        (**self).fetch_balance()
    }

    fn fetch_position(&mut self) -> Result<Position> {
        (**self).fetch_position()
    }

    fn submit_market_order(&mut self, side: OrderSide, amount: f64) -> Result<OrderConfirmation> {
        (**self).submit_market_order(side, amount)
    }

    fn submit_stop_order(
        &mut self,
        side: OrderSide,
        amount: f64,
        trigger_price: f64,
        reduce_only: bool,
    ) -> Result<OrderConfirmation> {
        (**self).submit_stop_order(side, amount, trigger_price, reduce_only)
    }

    fn cancel_all_orders(&mut self) -> Result<()> {
        (**self).cancel_all_orders()
    }

    fn was_stop_triggered_today(&mut self) -> Result<bool> {
        (**self).was_stop_triggered_today()
    }
}
