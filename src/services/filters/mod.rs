//! Indicator veto filters.
//!
//! Each filter reads the lookback series of a candidate's time bucket, votes
//! per row, and vetoes the candidate when the majority vote points the other
//! way. Filters never add candidates and never flip a direction.

pub mod adx;
pub mod cci;
pub mod macd;
pub mod trend;

pub use adx::AdxFilter;
pub use cci::CciFilter;
pub use macd::MacdFilter;
pub use trend::TrendFilter;

use crate::config::FilterPeriods;
use crate::services::history::HistoryIndex;
use crate::types::{Candle, Direction, SignalCandidate};
use tracing::debug;

/// Trait for all veto filters.
pub trait CandleFilter: Send + Sync {
    /// Unique identifier for this filter.
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    /// Lookback length in timeframe steps.
    fn period(&self) -> usize;

    /// One vote per row of `series`; `None` is a neutral row.
    fn votes(&self, series: &[&Candle]) -> Vec<Option<Direction>>;
}

/// CALL/PUT vote counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub calls: usize,
    pub puts: usize,
}

impl Tally {
    pub fn count(votes: &[Option<Direction>]) -> Self {
        votes.iter().fold(Self::default(), |mut tally, vote| {
            match vote {
                Some(Direction::Call) => tally.calls += 1,
                Some(Direction::Put) => tally.puts += 1,
                None => {}
            }
            tally
        })
    }

    /// Winning direction; a tie has none.
    pub fn majority(&self) -> Option<Direction> {
        match self.calls.cmp(&self.puts) {
            std::cmp::Ordering::Greater => Some(Direction::Call),
            std::cmp::Ordering::Less => Some(Direction::Put),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// Rolling sums over `period` rows; rows before a full window are `None`.
pub(crate) fn rolling_sum(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }
    let mut sums = Vec::with_capacity(values.len());
    let mut running = 0.0;
    for (i, value) in values.iter().enumerate() {
        running += value;
        if i >= period {
            running -= values[i - period];
        }
        sums.push((i + 1 >= period).then_some(running));
    }
    sums
}

/// The enabled filters, in the order they are checked.
pub struct FilterBank {
    filters: Vec<Box<dyn CandleFilter>>,
}

impl FilterBank {
    /// Trend count, ADX, CCI, then MACD. Period 0 leaves a filter out.
    pub fn from_periods(periods: FilterPeriods) -> Self {
        let mut filters: Vec<Box<dyn CandleFilter>> = Vec::new();
        if periods.trend > 0 {
            filters.push(Box::new(TrendFilter::new(periods.trend)));
        }
        if periods.adx > 0 {
            filters.push(Box::new(AdxFilter::new(periods.adx)));
        }
        if periods.cci > 0 {
            filters.push(Box::new(CciFilter::new(periods.cci)));
        }
        if periods.macd > 0 {
            filters.push(Box::new(MacdFilter::new(periods.macd)));
        }
        Self { filters }
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Whether every enabled filter lets the candidate through.
    ///
    /// A filter with no history for the bucket, or without a majority,
    /// does not veto.
    pub fn passes(&self, history: &HistoryIndex, candidate: &SignalCandidate) -> bool {
        self.filters.iter().all(|filter| {
            let series = history.window(
                &candidate.asset,
                candidate.time,
                filter.period(),
                candidate.timeframe,
            );
            if series.is_empty() {
                return true;
            }

            let tally = Tally::count(&filter.votes(&series));
            match tally.majority() {
                Some(direction) if direction != candidate.direction => {
                    debug!(
                        "{} vetoed {} ({} calls / {} puts)",
                        filter.name(),
                        candidate,
                        tally.calls,
                        tally.puts
                    );
                    false
                }
                _ => true,
            }
        })
    }

    /// Keep the candidates that pass, preserving order.
    pub fn apply(
        &self,
        history: &HistoryIndex,
        candidates: Vec<SignalCandidate>,
    ) -> Vec<SignalCandidate> {
        if self.is_empty() {
            return candidates;
        }
        candidates
            .into_iter()
            .filter(|candidate| self.passes(history, candidate))
            .collect()
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::types::{Candle, CandleColor};
    use chrono::{NaiveDate, TimeZone, Utc};

    /// Candle at 10:00 on day `i` of January with the given prices.
    pub fn candle(i: usize, open: f64, high: f64, low: f64, close: f64) -> Candle {
        let day = (i % 28) as u32 + 1;
        Candle {
            asset: "EURUSD".to_string(),
            open,
            high,
            low,
            close,
            time: Utc.with_ymd_and_hms(2024, 1, day, 4, 0, 0).unwrap(),
            local_date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            local_time: "10:00".parse().unwrap(),
            color: CandleColor::from_prices(open, close),
        }
    }

    pub fn create_uptrend_candles(count: usize) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let base = 100.0 + i as f64 * 1.5;
                candle(i, base, base + 2.0, base - 1.0, base + 1.0)
            })
            .collect()
    }

    pub fn create_downtrend_candles(count: usize) -> Vec<Candle> {
        (0..count)
            .map(|i| {
                let base = 200.0 - i as f64 * 1.5;
                candle(i, base, base + 1.0, base - 2.0, base - 1.0)
            })
            .collect()
    }
}
