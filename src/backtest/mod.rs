pub mod csv_feed;
pub mod metrics;
pub mod runner;
pub mod simulated;
pub mod synthetic;

pub use csv_feed::{load_bars, read_bars};
pub use metrics::{BacktestReport, EquityPoint, TradeRecord};
pub use runner::BacktestRunner;
pub use simulated::{OrderRecord, OrderType, RestingStop, SimulatedExchange};
pub use synthetic::{MarketScenario, SyntheticDataGenerator};
