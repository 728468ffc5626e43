//! Trend-count filter.

use super::CandleFilter;
use crate::types::{Candle, CandleColor, Direction};

/// Counts green against red candles in the lookback series.
pub struct TrendFilter {
    period: usize,
    name: String,
}

impl TrendFilter {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            name: format!("Trend ({})", period),
        }
    }
}

impl CandleFilter for TrendFilter {
    fn id(&self) -> &str {
        "trend"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn period(&self) -> usize {
        self.period
    }

    fn votes(&self, series: &[&Candle]) -> Vec<Option<Direction>> {
        series
            .iter()
            .map(|candle| match candle.color {
                CandleColor::Green => Some(Direction::Call),
                CandleColor::Red => Some(Direction::Put),
                CandleColor::Doji => None,
            })
            .collect()
    }
}
