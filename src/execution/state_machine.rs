use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::models::{OrderKind, PendingOrder, Position, Side};
use crate::Result;

/// Lifecycle state of the single position slot
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PositionState {
    Flat,
    Entering {
        side: Side,
        order: PendingOrder,
    },
    Open {
        side: Side,
        entry_price: f64,
        size: f64,
        mark_price: f64,
        stop_price: Option<f64>,
    },
    Exiting {
        side: Side,
        entry_price: f64,
        size: f64,
        mark_price: f64,
        order: PendingOrder,
    },
}

impl PositionState {
    pub fn name(&self) -> &'static str {
        match self {
            PositionState::Flat => "Flat",
            PositionState::Entering { side: Side::Long, .. } => "EnteringLong",
            PositionState::Entering { side: Side::Short, .. } => "EnteringShort",
            PositionState::Open { side: Side::Long, .. } => "Long",
            PositionState::Open { side: Side::Short, .. } => "Short",
            PositionState::Exiting { side: Side::Long, .. } => "ExitingLong",
            PositionState::Exiting { side: Side::Short, .. } => "ExitingShort",
        }
    }
}

impl std::fmt::Display for PositionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A completed round trip
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ClosedTrade {
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    /// Return on the entry price, signed by side
    pub pnl_pct: f64,
}

impl ClosedTrade {
    pub fn pnl(&self) -> f64 {
        (self.exit_price - self.entry_price) * self.size * self.side.sign()
    }

    pub fn is_win(&self) -> bool {
        self.pnl() > 0.0
    }
}

/// Tracks the position slot and applies order confirmations to it
///
/// Every transition either succeeds or returns `InvariantViolation` and leaves
/// the state untouched. Long and short exposure can never coexist since the
/// slot holds exactly one `PositionState`.
#[derive(Debug, Clone)]
pub struct PositionStateMachine {
    state: PositionState,
    trades: Vec<ClosedTrade>,
}

impl Default for PositionStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl PositionStateMachine {
    pub fn new() -> Self {
        Self {
            state: PositionState::Flat,
            trades: Vec::new(),
        }
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    /// Completed round trips, oldest first
    pub fn trades(&self) -> &[ClosedTrade] {
        &self.trades
    }

    /// Confirmed exposure; pending entries count as flat
    pub fn position(&self) -> Position {
        match self.state {
            PositionState::Flat | PositionState::Entering { .. } => Position::Flat,
            PositionState::Open {
                side,
                entry_price,
                size,
                mark_price,
                ..
            }
            | PositionState::Exiting {
                side,
                entry_price,
                size,
                mark_price,
                ..
            } => Position::open(side, entry_price, size, mark_price),
        }
    }

    pub fn pending_order(&self) -> Option<&PendingOrder> {
        match &self.state {
            PositionState::Entering { order, .. } | PositionState::Exiting { order, .. } => {
                Some(order)
            }
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending_order().is_some()
    }

    pub fn stop_price(&self) -> Option<f64> {
        match self.state {
            PositionState::Open { stop_price, .. } => stop_price,
            _ => None,
        }
    }

    fn violation(&self, event: &'static str) -> EngineError {
        EngineError::InvariantViolation {
            state: self.state.name().to_string(),
            event,
        }
    }

    /// Flat -> Entering
    pub fn submit_entry(&mut self, side: Side, amount: f64) -> Result<PendingOrder> {
        if !matches!(self.state, PositionState::Flat) {
            return Err(self.violation("submit_entry"));
        }
        if !(amount.is_finite() && amount > 0.0) {
            return Err(EngineError::Sizing(format!(
                "entry amount must be positive, got {}",
                amount
            )));
        }

        let order = PendingOrder {
            kind: OrderKind::Entry,
            side: side.entry_order(),
            amount,
            trigger_price: None,
        };
        self.state = PositionState::Entering { side, order };
        Ok(order)
    }

    /// Entering -> Open
    pub fn confirm_entry(&mut self, price: f64, size: f64) -> Result<()> {
        let side = match self.state {
            PositionState::Entering { side, .. } => side,
            _ => return Err(self.violation("confirm_entry")),
        };
        if !(size.is_finite() && size > 0.0) {
            return Err(self.violation("confirm_entry with non-positive size"));
        }

        tracing::info!("ENTER {} at ${:.2} (size {:.6})", side, price, size);
        self.state = PositionState::Open {
            side,
            entry_price: price,
            size,
            mark_price: price,
            stop_price: None,
        };
        Ok(())
    }

    /// Entering -> Flat
    pub fn cancel_entry(&mut self) -> Result<()> {
        match self.state {
            PositionState::Entering { side, .. } => {
                tracing::warn!("Entry {} canceled, staying flat", side);
                self.state = PositionState::Flat;
                Ok(())
            }
            _ => Err(self.violation("cancel_entry")),
        }
    }

    /// Open -> Exiting
    pub fn submit_exit(&mut self) -> Result<PendingOrder> {
        match self.state {
            PositionState::Open {
                side,
                entry_price,
                size,
                mark_price,
                ..
            } => {
                let order = PendingOrder {
                    kind: OrderKind::Exit,
                    side: side.exit_order(),
                    amount: size,
                    trigger_price: None,
                };
                self.state = PositionState::Exiting {
                    side,
                    entry_price,
                    size,
                    mark_price,
                    order,
                };
                Ok(order)
            }
            _ => Err(self.violation("submit_exit")),
        }
    }

    /// Exiting -> Flat, recording the round trip
    pub fn confirm_exit(&mut self, price: f64) -> Result<ClosedTrade> {
        match self.state {
            PositionState::Exiting {
                side,
                entry_price,
                size,
                ..
            } => {
                let pnl_pct = (price - entry_price) / entry_price * 100.0 * side.sign();
                let trade = ClosedTrade {
                    side,
                    entry_price,
                    exit_price: price,
                    size,
                    pnl_pct,
                };

                tracing::info!("EXIT {} at ${:.2} ({:+.2}%)", side, price, pnl_pct);
                self.trades.push(trade);
                self.state = PositionState::Flat;
                Ok(trade)
            }
            _ => Err(self.violation("confirm_exit")),
        }
    }

    /// Exiting -> Exiting, handing back the identical exit order to resubmit
    pub fn cancel_exit(&mut self) -> Result<PendingOrder> {
        match self.state {
            PositionState::Exiting { side, order, .. } => {
                tracing::warn!("Exit {} canceled, resubmitting", side);
                Ok(order)
            }
            _ => Err(self.violation("cancel_exit")),
        }
    }

    /// Update the mark price of an open (or closing) position
    pub fn mark(&mut self, price: f64) -> Result<()> {
        if let PositionState::Open { mark_price, .. } | PositionState::Exiting { mark_price, .. } =
            &mut self.state
        {
            *mark_price = price;
            return Ok(());
        }
        Err(self.violation("mark"))
    }

    /// Reduce-only stop order closing the whole open position at `trigger_price`
    ///
    /// Leaves the state untouched: the stop rests on the exchange instead of
    /// occupying the pending-order slot.
    pub fn protective_stop(&self, trigger_price: f64) -> Result<PendingOrder> {
        match self.state {
            PositionState::Open { side, size, .. } => Ok(PendingOrder {
                kind: OrderKind::Exit,
                side: side.exit_order(),
                amount: size,
                trigger_price: Some(trigger_price),
            }),
            _ => Err(self.violation("protective_stop")),
        }
    }

    /// Remember the trigger of the protective stop resting for this position
    pub fn attach_stop(&mut self, trigger_price: f64) -> Result<()> {
        if let PositionState::Open { stop_price, .. } = &mut self.state {
            *stop_price = Some(trigger_price);
            return Ok(());
        }
        Err(self.violation("attach_stop"))
    }
}
