use std::collections::VecDeque;

use crate::error::EngineError;
use crate::models::Bar;
use crate::Result;

/// Rolling window of the most recent bars for one instrument
///
/// Bars must arrive with strictly increasing timestamps; the oldest bar is
/// dropped once the window is full.
#[derive(Debug, Clone)]
pub struct BarWindow {
    bars: VecDeque<Bar>,
    max_bars: usize,
}

impl BarWindow {
    /// Create a new window holding at most `max_bars` bars
    pub fn new(max_bars: usize) -> Self {
        Self {
            bars: VecDeque::with_capacity(max_bars),
            max_bars: max_bars.max(1),
        }
    }

    /// Append a bar, evicting the oldest if the window is full
    pub fn push(&mut self, bar: Bar) -> Result<()> {
        if let Some(last) = self.bars.back() {
            if bar.timestamp <= last.timestamp {
                return Err(EngineError::OutOfOrderBar {
                    previous: last.timestamp.to_rfc3339(),
                    current: bar.timestamp.to_rfc3339(),
                });
            }
        }

        self.bars.push_back(bar);
        while self.bars.len() > self.max_bars {
            self.bars.pop_front();
        }

        Ok(())
    }

    /// Bars in the window, oldest first
    pub fn bars(&mut self) -> &[Bar] {
        self.bars.make_contiguous()
    }

    pub fn latest(&self) -> Option<&Bar> {
        self.bars.back()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.bars.len() == self.max_bars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn create_test_bar(day: u32, price: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 1000.0,
        }
    }

    #[test]
    fn test_push_bars() {
        let mut window = BarWindow::new(10);
        assert!(window.is_empty());

        window.push(create_test_bar(1, 100.0)).unwrap();
        window.push(create_test_bar(2, 101.0)).unwrap();

        assert_eq!(window.len(), 2);
        assert_eq!(window.latest().unwrap().close, 101.0);
        assert!(!window.is_full());
    }

    #[test]
    fn test_max_bars_limit() {
        let mut window = BarWindow::new(5);

        for day in 1..=10 {
            window.push(create_test_bar(day, 100.0 + day as f64)).unwrap();
        }

        assert!(window.is_full());
        let bars = window.bars();
        assert_eq!(bars.len(), 5);
        assert_eq!(bars[0].close, 106.0);
        assert_eq!(bars[4].close, 110.0);
    }

    #[test]
    fn test_rejects_out_of_order_bars() {
        let mut window = BarWindow::new(5);
        window.push(create_test_bar(2, 100.0)).unwrap();

        let duplicate = window.push(create_test_bar(2, 101.0));
        assert!(matches!(duplicate, Err(EngineError::OutOfOrderBar { .. })));

        let earlier = window.push(create_test_bar(1, 99.0));
        assert!(earlier.is_err());
        assert_eq!(window.len(), 1);
    }
}
