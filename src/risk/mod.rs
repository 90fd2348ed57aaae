// Risk management module
pub mod sizing;

pub use sizing::{PositionSize, RiskSizer, SizingConstraint};
