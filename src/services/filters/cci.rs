//! Commodity Channel Index (CCI-like) filter.

use super::{rolling_sum, CandleFilter};
use crate::types::{Candle, Direction};

/// CCI = (TP - SMA) / (0.015 * MD), TP = (high + low + close) / 3.
///
/// Rows above +100 vote CALL, below -100 vote PUT. The mean deviation is a
/// rolling mean of |TP - SMA|, so a row needs two full windows behind it.
pub struct CciFilter {
    period: usize,
    name: String,
}

const CCI_CONSTANT: f64 = 0.015;
const CCI_BAND: f64 = 100.0;

impl CciFilter {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            name: format!("CCI ({})", period),
        }
    }

    fn typical_price(candle: &Candle) -> f64 {
        (candle.high + candle.low + candle.close) / 3.0
    }

    fn rolling_mean(values: &[f64], period: usize) -> Vec<Option<f64>> {
        rolling_sum(values, period)
            .into_iter()
            .map(|sum| sum.map(|s| s / period as f64))
            .collect()
    }
}

impl CandleFilter for CciFilter {
    fn id(&self) -> &str {
        "cci"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn period(&self) -> usize {
        self.period
    }

    fn votes(&self, series: &[&Candle]) -> Vec<Option<Direction>> {
        let tp: Vec<f64> = series.iter().map(|c| Self::typical_price(c)).collect();
        let sma = Self::rolling_mean(&tp, self.period);

        let deviation: Vec<Option<f64>> = tp
            .iter()
            .zip(&sma)
            .map(|(tp, sma)| sma.map(|sma| (tp - sma).abs()))
            .collect();

        // Mean deviation is defined only where the whole window has a deviation.
        let mean_deviation: Vec<Option<f64>> = (0..series.len())
            .map(|i| {
                if i + 1 < self.period {
                    return None;
                }
                let window = &deviation[i + 1 - self.period..=i];
                let total = window.iter().try_fold(0.0, |acc, d| d.map(|d| acc + d))?;
                Some(total / self.period as f64)
            })
            .collect();

        (0..series.len())
            .map(|i| {
                let (sma, md) = (sma[i]?, mean_deviation[i]?);
                if md <= 0.0 {
                    return None;
                }
                let cci = (tp[i] - sma) / (CCI_CONSTANT * md);
                if cci > CCI_BAND {
                    Some(Direction::Call)
                } else if cci < -CCI_BAND {
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
    fn test_cci_id_and_name() {
        let cci = CciFilter::new(20);
        assert_eq!(cci.id(), "cci");
        assert_eq!(cci.name(), "CCI (20)");
    }

    #[test]
    fn test_cci_needs_two_windows() {
        let rows = create_uptrend_candles(5);
        let series: Vec<&Candle> = rows.iter().collect();
        let votes = CciFilter::new(3).votes(&series);
        // First defined mean deviation is at row 2 * 3 - 2 = 4.
        assert!(votes[..4].iter().all(Option::is_none));
    }

    #[test]
    fn test_cci_breakout_votes_call() {
        let mut rows: Vec<Candle> = (0..6)
            .map(|i| {
                let wobble = if i % 2 == 0 { 0.1 } else { -0.1 };
                candle(i, 100.0, 100.5 + wobble, 99.5 + wobble, 100.0 + wobble)
            })
            .collect();
        rows.push(candle(6, 100.0, 110.0, 100.0, 109.0));
        let series: Vec<&Candle> = rows.iter().collect();
        let votes = CciFilter::new(3).votes(&series);
        assert_eq!(votes.last(), Some(&Some(Direction::Call)));
        assert_eq!(Tally::count(&votes).majority(), Some(Direction::Call));
    }

    #[test]
    fn test_cci_constant_prices_are_neutral() {
        let rows: Vec<Candle> = (0..8).map(|i| candle(i, 1.0, 1.0, 1.0, 1.0)).collect();
        let series: Vec<&Candle> = rows.iter().collect();
        assert!(CciFilter::new(3).votes(&series).iter().all(Option::is_none));
    }
}
