//! Raw candle history indexed by asset and time-of-day.
//!
//! Built once per run and shared by every veto filter.

use crate::types::{Candle, Timeframe, TimeOfDay};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
pub struct HistoryIndex {
    series: HashMap<String, BTreeMap<TimeOfDay, Vec<Candle>>>,
    len: usize,
}

impl HistoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a candle under its asset and local time. Candles are expected in
    /// chronological order per asset.
    pub fn insert(&mut self, candle: Candle) {
        self.series
            .entry(candle.asset.clone())
            .or_default()
            .entry(candle.local_time)
            .or_default()
            .push(candle);
        self.len += 1;
    }

    pub fn extend(&mut self, candles: impl IntoIterator<Item = Candle>) {
        for candle in candles {
            self.insert(candle);
        }
    }

    /// Candles of one asset at exactly `time`, oldest first.
    pub fn at(&self, asset: &str, time: TimeOfDay) -> &[Candle] {
        self.series
            .get(asset)
            .and_then(|by_time| by_time.get(&time))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Lookback series for a filter.
    ///
    /// Walks back `period` timeframe steps from `time` (the first step being
    /// `time` itself) and concatenates every candle found at each step.
    pub fn window(
        &self,
        asset: &str,
        time: TimeOfDay,
        period: usize,
        timeframe: Timeframe,
    ) -> Vec<&Candle> {
        let step = i64::from(timeframe.minutes());
        (0..period as i64)
            .flat_map(|k| self.at(asset, time.add_minutes(-k * step)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CandleColor;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn candle(asset: &str, time: &str, day: u32, close: f64) -> Candle {
        Candle {
            asset: asset.to_string(),
            open: 1.0,
            high: close.max(1.0),
            low: close.min(1.0),
            close,
            time: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            local_date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            local_time: time.parse().unwrap(),
            color: CandleColor::from_prices(1.0, close),
        }
    }

    #[test]
    fn test_window_walks_back_by_timeframe() {
        let mut index = HistoryIndex::new();
        index.extend(vec![
            candle("EURUSD", "10:00", 1, 1.1),
            candle("EURUSD", "10:00", 2, 0.9),
            candle("EURUSD", "09:55", 1, 1.2),
            candle("EURUSD", "09:50", 1, 1.3),
            candle("GBPUSD", "10:00", 1, 0.8),
        ]);

        let window = index.window("EURUSD", "10:00".parse().unwrap(), 2, Timeframe::M5);
        let closes: Vec<f64> = window.iter().map(|c| c.close).collect();
        assert_eq!(closes, vec![1.1, 0.9, 1.2]);
        assert_eq!(index.len(), 5);
    }

    #[test]
    fn test_window_wraps_before_midnight() {
        let mut index = HistoryIndex::new();
        index.insert(candle("EURUSD", "23:59", 1, 1.1));
        let window = index.window("EURUSD", "00:00".parse().unwrap(), 2, Timeframe::M1);
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_unknown_asset_yields_empty_window() {
        let index = HistoryIndex::new();
        assert!(index.is_empty());
        assert!(index
            .window("EURUSD", "10:00".parse().unwrap(), 14, Timeframe::M1)
            .is_empty());
    }
}
