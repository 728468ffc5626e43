//! Directional-movement (ADX-like) filter.

use super::{rolling_sum, CandleFilter};
use crate::types::{Candle, Direction};

/// Votes with the dominant directional indicator when the trend is strong.
///
/// Per row:
/// - TR = max(high - low, |high - close|, |low - close|) of the same candle
/// - +DM = rise of the high since the previous row, -DM = fall of the low
/// - +DI / -DI = 100 * rolling ΣDM / rolling ΣTR
/// - ADX = 100 * |+DI - -DI| / (+DI + -DI)
///
/// Rows with ADX at or below 25 are neutral.
pub struct AdxFilter {
    period: usize,
    name: String,
}

/// Minimum ADX for a row to vote.
const TREND_STRENGTH: f64 = 25.0;

impl AdxFilter {
    pub fn new(period: usize) -> Self {
        Self {
            period,
            name: format!("ADX ({})", period),
        }
    }

    fn true_range(candle: &Candle) -> f64 {
        let hl = candle.high - candle.low;
        let hc = (candle.high - candle.close).abs();
        let lc = (candle.low - candle.close).abs();
        hl.max(hc).max(lc)
    }

    /// +DM and -DM per row; the first row has no predecessor and scores 0.
    fn directional_movement(series: &[&Candle]) -> (Vec<f64>, Vec<f64>) {
        let mut plus_dm = Vec::with_capacity(series.len());
        let mut minus_dm = Vec::with_capacity(series.len());
        for (i, candle) in series.iter().enumerate() {
            if i == 0 {
                plus_dm.push(0.0);
                minus_dm.push(0.0);
                continue;
            }
            let previous = series[i - 1];
            let high_change = candle.high - previous.high;
            let low_change = candle.low - previous.low;
            plus_dm.push(high_change.max(0.0));
            minus_dm.push(if low_change < 0.0 { -low_change } else { 0.0 });
        }
        (plus_dm, minus_dm)
    }
}

impl CandleFilter for AdxFilter {
    fn id(&self) -> &str {
        "adx"
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn period(&self) -> usize {
        self.period
    }

    fn votes(&self, series: &[&Candle]) -> Vec<Option<Direction>> {
        let tr: Vec<f64> = series.iter().map(|c| Self::true_range(c)).collect();
        let (plus_dm, minus_dm) = Self::directional_movement(series);

        let tr_sum = rolling_sum(&tr, self.period);
        let plus_sum = rolling_sum(&plus_dm, self.period);
        let minus_sum = rolling_sum(&minus_dm, self.period);

        (0..series.len())
            .map(|i| {
                let (tr, plus, minus) = (tr_sum[i]?, plus_sum[i]?, minus_sum[i]?);
                if tr <= 0.0 {
                    return None;
                }
                let plus_di = 100.0 * plus / tr;
                let minus_di = 100.0 * minus / tr;
                let di_sum = plus_di + minus_di;
                if di_sum <= 0.0 {
                    return None;
                }

                let adx = 100.0 * (plus_di - minus_di).abs() / di_sum;
                if adx <= TREND_STRENGTH {
                    return None;
                }
                if plus_di > minus_di {
                    Some(Direction::Call)
                } else if plus_di < minus_di {
                    Some(Direction::Put)
                } else {
                    None
                }
            })
            .collect()
    }
}
