use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::models::Bar;

/// Market scenario types for synthetic data generation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MarketScenario {
    /// Steady uptrend with noise (+1% daily average)
    Uptrend,
    /// Steady downtrend with noise (-1% daily average)
    Downtrend,
    /// Choppy market oscillating around its starting price
    Sideways,
    /// Large daily swings (±5%) with no drift
    Volatile,
    /// Uptrend for the first half, downtrend for the second
    Reversal,
}

/// Generates seeded daily bars for backtesting
pub struct SyntheticDataGenerator {
    rng: StdRng,
    base_price: f64,
    base_volume: f64,
    start_time: DateTime<Utc>,
}

impl SyntheticDataGenerator {
    /// Create a new generator with a seed for reproducibility
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            base_price: 30_000.0,
            base_volume: 1_000.0,
            // 2021-01-01T00:00:00Z
            start_time: DateTime::from_timestamp(1_609_459_200, 0).unwrap_or_default(),
        }
    }

    pub fn with_base_price(mut self, base_price: f64) -> Self {
        self.base_price = base_price;
        self
    }

    /// Generate one bar per day for the given scenario
    pub fn generate(&mut self, scenario: MarketScenario, num_bars: usize) -> Vec<Bar> {
        let mut bars = Vec::with_capacity(num_bars);
        let mut close = self.base_price;

        for i in 0..num_bars {
            let (drift, noise) = match scenario {
                MarketScenario::Uptrend => (0.01, 0.01),
                MarketScenario::Downtrend => (-0.01, 0.01),
                MarketScenario::Sideways => {
                    // Pull back toward the starting price
                    let pull = (self.base_price - close) / self.base_price * 0.2;
                    (pull, 0.01)
                }
                MarketScenario::Volatile => (0.0, 0.05),
                MarketScenario::Reversal if i < num_bars / 2 => (0.015, 0.01),
                MarketScenario::Reversal => (-0.015, 0.01),
            };

            let open = close;
            let change = drift + self.rng.gen_range(-noise..noise);
            close = (open * (1.0 + change)).max(0.01);

            let timestamp = self.start_time + Duration::days(i as i64);
            bars.push(self.create_bar(timestamp, open, close));
        }

        bars
    }

    /// Wrap open/close in a bar with a random intrabar range
    fn create_bar(&mut self, timestamp: DateTime<Utc>, open: f64, close: f64) -> Bar {
        let high = open.max(close) * (1.0 + self.rng.gen_range(0.001..0.01));
        let low = open.min(close) * (1.0 - self.rng.gen_range(0.001..0.01));
        let volume = self.base_volume * self.rng.gen_range(0.5..1.5);

        Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bars_are_well_formed() {
        let mut generator = SyntheticDataGenerator::new(42);
        let bars = generator.generate(MarketScenario::Volatile, 200);

        assert_eq!(bars.len(), 200);
        for bar in &bars {
            assert!(bar.high >= bar.open.max(bar.close));
            assert!(bar.low <= bar.open.min(bar.close));
            assert!(bar.low > 0.0);
            assert!(bar.volume > 0.0);
        }
        for pair in bars.windows(2) {
            assert!(pair[1].timestamp > pair[0].timestamp);
            assert_eq!(pair[1].open, pair[0].close);
        }
    }

    #[test]
    fn test_same_seed_same_bars() {
        let a = SyntheticDataGenerator::new(9).generate(MarketScenario::Sideways, 50);
        let b = SyntheticDataGenerator::new(9).generate(MarketScenario::Sideways, 50);
        assert_eq!(a, b);
    }

    #[test]
    fn test_trend_scenarios() {
        let up = SyntheticDataGenerator::new(1).generate(MarketScenario::Uptrend, 100);
        assert!(up.last().unwrap().close > up[0].open);

        let down = SyntheticDataGenerator::new(1).generate(MarketScenario::Downtrend, 100);
        assert!(down.last().unwrap().close < down[0].open);

        let reversal = SyntheticDataGenerator::new(1)
            .with_base_price(100.0)
            .generate(MarketScenario::Reversal, 100);
        let peak = reversal[49].close;
        assert!(peak > reversal[0].open);
        assert!(reversal.last().unwrap().close < peak);
    }
}
