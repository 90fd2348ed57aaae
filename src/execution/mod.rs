// Order gateway, position state machine and the per-bar decision cycle
pub mod bar_window;
pub mod gateway;
pub mod recalibration;
pub mod state_machine;

pub use bar_window::BarWindow;
pub use gateway::OrderGateway;
pub use recalibration::{CycleAction, CycleOutcome, RecalibrationCycle, SkipReason};
pub use state_machine::{ClosedTrade, PositionState, PositionStateMachine};
