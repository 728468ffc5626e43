//! Time-of-day bucket statistics.
//!
//! Every on-grid candle of an asset is folded into the bucket for its local
//! HH:MM. Buckets mix all historical days, so a bucket's counts are a
//! frequency estimate of how that minute of the day tends to close.

use crate::types::{Candle, CandleColor, Direction, SignalCandidate, Timeframe, TimeOfDay};
use std::collections::BTreeMap;

/// Green/red/doji tallies of a bucket or martingale pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketCounts {
    pub green: u32,
    pub red: u32,
    pub doji: u32,
}

impl BucketCounts {
    pub fn new(green: u32, red: u32, doji: u32) -> Self {
        Self { green, red, doji }
    }

    pub fn record(&mut self, color: CandleColor) {
        match color {
            CandleColor::Green => self.green += 1,
            CandleColor::Red => self.red += 1,
            CandleColor::Doji => self.doji += 1,
        }
    }

    /// Add another tally into this one.
    pub fn absorb(&mut self, other: &BucketCounts) {
        self.green += other.green;
        self.red += other.red;
        self.doji += other.doji;
    }

    /// Candles with a direction (green + red).
    pub fn directional(&self) -> u32 {
        self.green + self.red
    }

    /// Share of directional candles; dojis pull confidence down.
    fn doji_penalty(&self) -> f64 {
        let total = self.directional() + self.doji;
        if total == 0 {
            1.0
        } else {
            f64::from(self.directional()) / f64::from(total)
        }
    }

    /// Add-one smoothed probability of `direction`.
    fn smoothed(&self, direction: Direction) -> f64 {
        let hits = match direction {
            Direction::Call => self.green,
            Direction::Put => self.red,
        };
        f64::from(hits + 1) / f64::from(self.directional() + 2)
    }

    /// Doji-penalised confidence in a fixed direction, as a percentage.
    ///
    /// None when there are no directional candles.
    pub fn confidence_for(&self, direction: Direction) -> Option<u8> {
        if self.directional() == 0 {
            return None;
        }
        Some(to_percent(self.smoothed(direction) * self.doji_penalty()))
    }

    /// Majority direction and its confidence. Ties favour CALL.
    pub fn estimate(&self) -> Option<(Direction, u8)> {
        if self.directional() == 0 {
            return None;
        }
        let direction = if self.smoothed(Direction::Call) >= self.smoothed(Direction::Put) {
            Direction::Call
        } else {
            Direction::Put
        };
        self.confidence_for(direction).map(|c| (direction, c))
    }
}

/// Probability to a whole percentage, rounding halves to even.
fn to_percent(probability: f64) -> u8 {
    (100.0 * probability).round_ties_even().clamp(0.0, 100.0) as u8
}

/// Confidence of one martingale level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LevelConfidence {
    /// The chained bucket does not exist in the catalog.
    Absent,
    /// The pool has no directional candles, or the base has no direction.
    Indeterminate,
    Computed(u8),
}

impl LevelConfidence {
    pub fn value(&self) -> Option<u8> {
        match self {
            LevelConfidence::Computed(v) => Some(*v),
            _ => None,
        }
    }
}

/// Statistics for one `(asset, HH:MM)` key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeBucket {
    pub counts: BucketCounts,
    pub direction: Option<Direction>,
    pub confidence: u8,
    /// Levels 1..=N, empty until martingale chaining runs.
    pub martingale: Vec<LevelConfidence>,
}

impl TimeBucket {
    /// Fold one candle in and refresh direction and confidence.
    pub fn fold(&mut self, color: CandleColor) {
        self.counts.record(color);
        match self.counts.estimate() {
            Some((direction, confidence)) => {
                self.direction = Some(direction);
                self.confidence = confidence;
            }
            None => {
                self.direction = None;
                self.confidence = 0;
            }
        }
    }

    /// Highest confidence over the base and every computed level.
    pub fn best_confidence(&self) -> u8 {
        self.martingale
            .iter()
            .filter_map(LevelConfidence::value)
            .fold(self.confidence, u8::max)
    }
}

/// All buckets of one asset.
#[derive(Debug, Clone)]
pub struct AssetCatalog {
    asset: String,
    timeframe: Timeframe,
    buckets: BTreeMap<TimeOfDay, TimeBucket>,
}

impl AssetCatalog {
    pub fn new(asset: impl Into<String>, timeframe: Timeframe) -> Self {
        Self {
            asset: asset.into(),
            timeframe,
            buckets: BTreeMap::new(),
        }
    }

    /// Build a catalog from classified candles and chain martingale levels.
    pub fn build(
        asset: impl Into<String>,
        timeframe: Timeframe,
        candles: &[Candle],
        martingale: u8,
    ) -> Self {
        let mut catalog = Self::new(asset, timeframe);
        for candle in candles {
            catalog.fold(candle);
        }
        catalog.apply_martingale(martingale);
        catalog
    }

    /// Fold a candle into its bucket. Off-grid candles are skipped.
    pub fn fold(&mut self, candle: &Candle) -> bool {
        if !self.timeframe.accepts_minute(candle.local_time.minute()) {
            return false;
        }
        self.buckets
            .entry(candle.local_time)
            .or_default()
            .fold(candle.color);
        true
    }

    /// Compute martingale levels 1..=`levels` for every bucket.
    ///
    /// Level i pools the base counts with the buckets 1..=i timeframe steps
    /// later. A missing chained bucket leaves the level `Absent` and adds
    /// nothing to the pool of the levels after it.
    pub fn apply_martingale(&mut self, levels: u8) {
        let step = i64::from(self.timeframe.minutes());

        let chains: Vec<(TimeOfDay, Vec<LevelConfidence>)> = self
            .buckets
            .iter()
            .map(|(time, bucket)| {
                let mut pool = bucket.counts;
                let mut chained_time = *time;
                let chain = (0..levels)
                    .map(|_| {
                        chained_time = chained_time.add_minutes(step);
                        let Some(chained) = self.buckets.get(&chained_time) else {
                            return LevelConfidence::Absent;
                        };

                        let mut level = chained.counts;
                        level.absorb(&pool);
                        pool.absorb(&chained.counts);

                        bucket
                            .direction
                            .and_then(|direction| level.confidence_for(direction))
                            .map_or(LevelConfidence::Indeterminate, LevelConfidence::Computed)
                    })
                    .collect();
                (*time, chain)
            })
            .collect();

        for (time, chain) in chains {
            if let Some(bucket) = self.buckets.get_mut(&time) {
                bucket.martingale = chain;
            }
        }
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn bucket(&self, time: TimeOfDay) -> Option<&TimeBucket> {
        self.buckets.get(&time)
    }

    /// Buckets in clock order.
    pub fn buckets(&self) -> impl Iterator<Item = (&TimeOfDay, &TimeBucket)> {
        self.buckets.iter()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Every bucket with a direction, in clock order.
    pub fn candidates(&self) -> Vec<SignalCandidate> {
        self.buckets
            .iter()
            .filter_map(|(time, bucket)| {
                bucket.direction.map(|direction| SignalCandidate {
                    asset: self.asset.clone(),
                    timeframe: self.timeframe,
                    time: *time,
                    direction,
                    confidence: bucket.best_confidence(),
                })
            })
            .collect()
    }
}
