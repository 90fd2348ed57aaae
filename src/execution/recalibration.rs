use serde::{Deserialize, Serialize};

use crate::config::RiskParameters;
use crate::error::EngineError;
use crate::execution::gateway::OrderGateway;
use crate::execution::state_machine::{ClosedTrade, PositionStateMachine};
use crate::indicators::IndicatorSnapshot;
use crate::models::{Bar, ExitReason, OrderStatus, Position, Side, TradeEvent};
use crate::risk::RiskSizer;
use crate::Result;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SkipReason {
    /// Not enough bars for every indicator yet
    WarmingUp,
    /// A stop fired earlier today
    StopCooldown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CycleAction {
    Skipped(SkipReason),
    /// Existing position kept, or flat with no bias
    Hold,
    /// Exposure closed and/or opened this cycle
    Reposition {
        closed: Option<ExitReason>,
        opened: Option<Side>,
    },
}

/// What a single cycle did
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CycleOutcome {
    pub action: CycleAction,
    pub events: Vec<TradeEvent>,
    pub orders_submitted: usize,
    /// Position as the engine tracks it once every confirmation has been applied
    ///
    /// A cooldown skip does not query the exchange, so a stop that filled earlier
    /// today still shows here until the next cycle that reconciles.
    pub position: Position,
}

impl CycleOutcome {
    fn new(action: CycleAction) -> Self {
        Self {
            action,
            events: Vec::new(),
            orders_submitted: 0,
            position: Position::Flat,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.action, CycleAction::Skipped(_))
    }
}

fn exit_event(trade: &ClosedTrade, reason: ExitReason) -> TradeEvent {
    TradeEvent::Exited {
        side: trade.side,
        entry_price: trade.entry_price,
        price: trade.exit_price,
        size: trade.size,
        pnl_pct: trade.pnl_pct,
        reason,
    }
}

/// Per-tick decision loop: indicators -> bias -> reconcile -> size -> orders
///
/// The only writer of position state. Every order placed during a cycle is
/// confirmed or canceled before the cycle returns.
pub struct RecalibrationCycle<'a, G: OrderGateway> {
    params: &'a RiskParameters,
    gateway: G,
    machine: PositionStateMachine,
}

impl<'a, G: OrderGateway> RecalibrationCycle<'a, G> {
    pub fn new(params: &'a RiskParameters, gateway: G) -> Self {
        Self {
            params,
            gateway,
            machine: PositionStateMachine::new(),
        }
    }

    pub fn params(&self) -> &RiskParameters {
        self.params
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut G {
        &mut self.gateway
    }

    pub fn state_machine(&self) -> &PositionStateMachine {
        &self.machine
    }

    pub fn position(&self) -> Position {
        self.machine.position()
    }

    /// Run a cycle on the latest bar window
    ///
    /// Too little history is not an error: the cycle is skipped as warming up.
    pub fn on_bars(&mut self, bars: &[Bar]) -> Result<CycleOutcome> {
        match IndicatorSnapshot::from_bars(bars, self.params) {
            Ok(snapshot) => self.run(&snapshot),
            Err(e) if e.is_recoverable() => {
                tracing::debug!("Skipping cycle: {}", e);
                let mut outcome = CycleOutcome::new(CycleAction::Skipped(SkipReason::WarmingUp));
                outcome.position = self.machine.position();
                Ok(outcome)
            }
            Err(e) => Err(e),
        }
    }

    /// Run one decision cycle for the given indicator snapshot
    pub fn run(&mut self, snapshot: &IndicatorSnapshot) -> Result<CycleOutcome> {
        if self.machine.is_pending() {
            return Err(EngineError::InvariantViolation {
                state: self.machine.state().name().to_string(),
                event: "start cycle with unresolved order",
            });
        }

        if self.params.stop_cooldown && self.gateway.was_stop_triggered_today()? {
            tracing::info!("Stop loss triggered today, waiting before repositioning");
            let mut outcome = CycleOutcome::new(CycleAction::Skipped(SkipReason::StopCooldown));
            outcome.position = self.machine.position();
            return Ok(outcome);
        }

        tracing::debug!(
            "Cycle: price {:.2}, MA {:.2}, EMA {:.2}, ATR {:.2}",
            snapshot.price,
            snapshot.ma,
            snapshot.ema,
            snapshot.atr
        );

        let mut outcome = CycleOutcome::new(CycleAction::Hold);
        self.sync_position(snapshot.price, &mut outcome)?;

        let bias = snapshot.bias();
        let mut closed = None;

        if let Some(side) = self.machine.position().side() {
            match self.exit_reason(side, snapshot) {
                Some(reason) => {
                    // Fail before touching the exchange if a re-entry could not be sized
                    if bias.is_some() {
                        RiskSizer::new(self.params).check_inputs(snapshot.price, snapshot.atr)?;
                    }
                    self.close_position(reason, &mut outcome)?;
                    closed = Some(reason);
                }
                None => {
                    outcome.position = self.machine.position();
                    return Ok(outcome);
                }
            }
        }

        self.gateway.cancel_all_orders()?;
        let opened = match bias {
            Some(side) => self.open_position(side, snapshot, &mut outcome)?,
            None => None,
        };

        if closed.is_some() || opened.is_some() {
            outcome.action = CycleAction::Reposition { closed, opened };
        }
        outcome.position = self.machine.position();
        Ok(outcome)
    }

    /// Close whatever is open at the end of a run
    pub fn close_out(&mut self, price: f64) -> Result<CycleOutcome> {
        let mut outcome = CycleOutcome::new(CycleAction::Hold);
        self.sync_position(price, &mut outcome)?;

        if self.machine.position().side().is_some() {
            self.close_position(ExitReason::EndOfData, &mut outcome)?;
            outcome.action = CycleAction::Reposition {
                closed: Some(ExitReason::EndOfData),
                opened: None,
            };
        }
        self.gateway.cancel_all_orders()?;

        outcome.position = self.machine.position();
        Ok(outcome)
    }

    /// Align the state machine with the position the exchange reports
    fn sync_position(&mut self, price: f64, outcome: &mut CycleOutcome) -> Result<()> {
        let exchange = self.gateway.fetch_position()?;
        let ours = self.machine.position();

        match (ours.side(), exchange.side()) {
            (None, None) => {}
            (Some(_), None) => {
                // Protective stop filled on the exchange since the last cycle
                let exit_price = self.machine.stop_price().unwrap_or(price);
                tracing::info!("Position closed by stop order at ${:.2}", exit_price);
                self.machine.submit_exit()?;
                let trade = self.machine.confirm_exit(exit_price)?;
                outcome.events.push(exit_event(&trade, ExitReason::StopOrder));
            }
            (None, Some(side)) => {
                let entry_price = exchange.entry_price().unwrap_or(price);
                let mark_price = exchange.mark_price().unwrap_or(price);
                tracing::info!(
                    "Adopting existing {} position of {:.6} from the exchange",
                    side,
                    exchange.size()
                );
                self.machine.submit_entry(side, exchange.size())?;
                self.machine.confirm_entry(entry_price, exchange.size())?;
                self.machine.mark(mark_price)?;
                outcome.events.push(TradeEvent::Entered {
                    side,
                    price: entry_price,
                    size: exchange.size(),
                });
            }
            (Some(ours_side), Some(theirs_side)) => {
                if ours_side != theirs_side {
                    return Err(EngineError::InvariantViolation {
                        state: self.machine.state().name().to_string(),
                        event: "exchange reports opposite position",
                    });
                }
                self.machine.mark(exchange.mark_price().unwrap_or(price))?;
            }
        }

        Ok(())
    }

    /// Reversal on a bias flip, stop-loss on an adverse move of `atr * stop_multiplier`
    fn exit_reason(&self, side: Side, snapshot: &IndicatorSnapshot) -> Option<ExitReason> {
        if snapshot.bias() == Some(side.opposite()) {
            return Some(ExitReason::Reversal);
        }

        let excursion = self.machine.position().adverse_excursion();
        if excursion >= self.params.stop_distance(snapshot.atr) {
            return Some(ExitReason::StopLoss);
        }

        None
    }

    /// Market-exit the whole position, resubmitting on every cancellation
    fn close_position(&mut self, reason: ExitReason, outcome: &mut CycleOutcome) -> Result<()> {
        let mut order = self.machine.submit_exit()?;
        let mut cancellations = 0u32;

        loop {
            let confirmation = self.gateway.submit_market_order(order.side, order.amount)?;
            outcome.orders_submitted += 1;

            match confirmation.status {
                OrderStatus::Filled { price, .. } => {
                    let trade = self.machine.confirm_exit(price)?;
                    outcome.events.push(exit_event(&trade, reason));
                    return Ok(());
                }
                OrderStatus::Canceled => {
                    cancellations += 1;
                    if let Some(limit) = self.params.exit_retry_limit {
                        if cancellations >= limit {
                            return Err(EngineError::ExitRetriesExhausted {
                                attempts: cancellations,
                            });
                        }
                    }
                    order = self.machine.cancel_exit()?;
                }
                OrderStatus::Accepted => {
                    return Err(EngineError::InvariantViolation {
                        state: self.machine.state().name().to_string(),
                        event: "market exit accepted without a fill",
                    });
                }
            }
        }
    }

    /// Size and enter a new position, protected by a reduce-only stop
    fn open_position(
        &mut self,
        side: Side,
        snapshot: &IndicatorSnapshot,
        outcome: &mut CycleOutcome,
    ) -> Result<Option<Side>> {
        let balance = self.gateway.fetch_balance()?;
        tracing::debug!("Balance: {:.2} {}", balance, self.params.currency);
        let size = RiskSizer::new(self.params).size(balance, snapshot.price, snapshot.atr)?;

        let order = self.machine.submit_entry(side, size.amount)?;
        let confirmation = self.gateway.submit_market_order(order.side, order.amount)?;
        outcome.orders_submitted += 1;

        match confirmation.status {
            OrderStatus::Filled { price, amount } => {
                self.machine.confirm_entry(price, amount)?;
                outcome.events.push(TradeEvent::Entered {
                    side,
                    price,
                    size: amount,
                });
            }
            OrderStatus::Canceled => {
                self.machine.cancel_entry()?;
                return Ok(None);
            }
            OrderStatus::Accepted => {
                return Err(EngineError::InvariantViolation {
                    state: self.machine.state().name().to_string(),
                    event: "market entry accepted without a fill",
                });
            }
        }

        if self.params.place_stop_orders {
            let distance = self.params.stop_distance(snapshot.atr);
            let trigger_price = match side {
                Side::Long => snapshot.price - distance,
                Side::Short => snapshot.price + distance,
            };
            let stop = self.machine.protective_stop(trigger_price)?;

            let confirmation =
                self.gateway
                    .submit_stop_order(stop.side, stop.amount, trigger_price, true)?;
            outcome.orders_submitted += 1;

            match confirmation.status {
                OrderStatus::Canceled => {
                    tracing::warn!("Stop order at ${:.2} was rejected", trigger_price);
                }
                OrderStatus::Accepted | OrderStatus::Filled { .. } => {
                    self.machine.attach_stop(trigger_price)?;
                }
            }
        }

        Ok(Some(side))
    }
}
