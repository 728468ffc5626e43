//! MACD-like filter.

use super::CandleFilter;
use crate::types::{Candle, Direction};

/// MACD line against its signal line, per row of closes.
///
/// EMAs are recursive and seeded with the first value, so every row has a
/// value and no warm-up is discarded. The period only sets how much history
/// is read.
pub struct MacdFilter {
    period: usize,
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
    name: String,
}

impl MacdFilter {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
            name: format!("MACD ({})", period),
        }
    }

    /// Recursive EMA with `alpha = 2 / (span + 1)`.
    fn ema_series(values: &[f64], span: usize) -> Vec<f64> {
        let alpha = 2.0 / (span as f64 + 1.0);
        let mut result = Vec::with_capacity(values.len());
        let mut previous: Option<f64> = None;
        for value in values {
            let ema = match previous {
                Some(prev) => alpha * value + (1.0 - alpha) * prev,
                None => *value,
            };
            result.push(ema);
            previous = Some(ema);
        }
        result
    }
}

impl CandleFilter for MacdFilter {
    fn id(&self) -> &str {
        "macd"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn period(&self) -> usize {
        self.period
    }

    fn votes(&self, series: &[&Candle]) -> Vec<Option<Direction>> {
        let closes: Vec<f64> = series.iter().map(|c| c.close).collect();
        let fast = Self::ema_series(&closes, self.fast_period);
        let slow = Self::ema_series(&closes, self.slow_period);
        let macd: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = Self::ema_series(&macd, self.signal_period);

        macd.iter()
            .zip(&signal)
            .map(|(macd, signal)| {
                if macd > signal {
                    Some(Direction::Call)
                } else if macd < signal {
                    Some(Direction::Put)
                } else {
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::filters::test_support::*;
    use crate::services::filters::Tally;

    #[test]
    fn test_macd_id_and_name() {
        let macd = MacdFilter::new(26);
        assert_eq!(macd.id(), "macd");
        assert_eq!(macd.name(), "MACD (26)");
    }

    #[test]
    fn test_ema_seeded_with_first_value() {
        let ema = MacdFilter::ema_series(&[10.0, 13.0], 2);
        // alpha = 2/3
        assert_eq!(ema[0], 10.0);
        assert!((ema[1] - 12.0).abs() < 1e-12);
    }

    #[test]
    fn test_macd_first_row_is_neutral() {
        let rows = create_uptrend_candles(3);
        let series: Vec<&Candle> = rows.iter().collect();
        assert_eq!(MacdFilter::new(3).votes(&series)[0], None);
    }

    #[test]
    fn test_macd_trend_direction() {
        let up = create_uptrend_candles(30);
        let series: Vec<&Candle> = up.iter().collect();
        let votes = MacdFilter::new(30).votes(&series);
        assert_eq!(Tally::count(&votes).majority(), Some(Direction::Call));

        let down = create_downtrend_candles(30);
        let series: Vec<&Candle> = down.iter().collect();
        let votes = MacdFilter::new(30).votes(&series);
        assert_eq!(Tally::count(&votes).majority(), Some(Direction::Put));
    }
}
