use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// OHLCV price bar
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Direction of a position (and of the order that opens it)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    pub fn opposite(self) -> Self {
        match self {
            Side::Long => Side::Short,
            Side::Short => Side::Long,
        }
    }

    /// +1 for long, -1 for short
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }

    /// Order side that opens exposure in this direction
    pub fn entry_order(self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Buy,
            Side::Short => OrderSide::Sell,
        }
    }

    /// Order side that closes exposure in this direction
    pub fn exit_order(self) -> OrderSide {
        self.opposite().entry_order()
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Long => write!(f, "LONG"),
            Side::Short => write!(f, "SHORT"),
        }
    }
}

/// Exchange order side
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn sign(self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }
}

/// Current exposure on the instrument
///
/// `size` is always positive when not `Flat`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum Position {
    Flat,
    Long {
        entry_price: f64,
        size: f64,
        mark_price: f64,
    },
    Short {
        entry_price: f64,
        size: f64,
        mark_price: f64,
    },
}

impl Position {
    pub fn open(side: Side, entry_price: f64, size: f64, mark_price: f64) -> Self {
        match side {
            Side::Long => Position::Long {
                entry_price,
                size,
                mark_price,
            },
            Side::Short => Position::Short {
                entry_price,
                size,
                mark_price,
            },
        }
    }

    pub fn is_flat(&self) -> bool {
        matches!(self, Position::Flat)
    }

    pub fn side(&self) -> Option<Side> {
        match self {
            Position::Flat => None,
            Position::Long { .. } => Some(Side::Long),
            Position::Short { .. } => Some(Side::Short),
        }
    }

    pub fn size(&self) -> f64 {
        match self {
            Position::Flat => 0.0,
            Position::Long { size, .. } | Position::Short { size, .. } => *size,
        }
    }

    pub fn entry_price(&self) -> Option<f64> {
        match self {
            Position::Flat => None,
            Position::Long { entry_price, .. } | Position::Short { entry_price, .. } => {
                Some(*entry_price)
            }
        }
    }

    pub fn mark_price(&self) -> Option<f64> {
        match self {
            Position::Flat => None,
            Position::Long { mark_price, .. } | Position::Short { mark_price, .. } => {
                Some(*mark_price)
            }
        }
    }

    /// Price move against the position, positive when losing
    pub fn adverse_excursion(&self) -> f64 {
        match self {
            Position::Flat => 0.0,
            Position::Long {
                entry_price,
                mark_price,
                ..
            } => entry_price - mark_price,
            Position::Short {
                entry_price,
                mark_price,
                ..
            } => mark_price - entry_price,
        }
    }

    /// Unrealized P&L in quote currency
    pub fn unrealized_pnl(&self) -> f64 {
        -self.adverse_excursion() * self.size()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OrderKind {
    Entry,
    Exit,
}

/// An order submitted but not yet confirmed or canceled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PendingOrder {
    pub kind: OrderKind,
    pub side: OrderSide,
    pub amount: f64,
    pub trigger_price: Option<f64>,
}

/// Outcome reported by the gateway for a submitted order
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum OrderStatus {
    /// Market order executed
    Filled { price: f64, amount: f64 },
    /// Order rejected or canceled before execution
    Canceled,
    /// Conditional order resting on the book
    Accepted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderConfirmation {
    pub order_id: Uuid,
    pub status: OrderStatus,
}

/// Why an open position was closed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExitReason {
    /// MA/EMA bias turned against the position
    Reversal,
    /// Adverse excursion reached the ATR stop distance
    StopLoss,
    /// Protective stop order filled on the exchange
    StopOrder,
    /// Closed at the end of a backtest
    EndOfData,
}

/// Entry/exit notification for the reporting sink
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum TradeEvent {
    Entered {
        side: Side,
        price: f64,
        size: f64,
    },
    Exited {
        side: Side,
        entry_price: f64,
        price: f64,
        size: f64,
        pnl_pct: f64,
        reason: ExitReason,
    },
}

impl TradeEvent {
    pub fn is_exit(&self) -> bool {
        matches!(self, TradeEvent::Exited { .. })
    }
}
