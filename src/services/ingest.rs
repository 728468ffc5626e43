//! Candle ingestion: fetch, flat-feed fallback, classification.

use crate::config::{CatalogParams, Config};
use crate::error::Result;
use crate::sources::CandleSource;
use crate::types::{Candle, RawCandle};
use tracing::{debug, info, warn};

/// Smallest candle count ever requested.
pub const MIN_REQUEST_CANDLES: i64 = 100;

/// Flat-candle share at which a feed is considered dead.
const FLAT_FEED_RATIO: f64 = 0.9;

/// Doji share that is worth a warning.
const DOJI_WARN_RATIO: f64 = 0.9;

const OTC_SUFFIX: &str = "_otc";

/// Canonical asset symbol: uppercase, with an OTC suffix spelled `_otc`.
pub fn normalize_asset(raw: &str) -> String {
    let upper = raw.trim().to_uppercase();
    match upper
        .strip_suffix("-OTC")
        .or_else(|| upper.strip_suffix("_OTC"))
    {
        Some(base) => format!("{}{}", base, OTC_SUFFIX),
        None => upper,
    }
}

/// The OTC variant of a regular symbol, or the regular variant of an OTC one.
pub fn counterpart_asset(asset: &str) -> String {
    match asset.strip_suffix(OTC_SUFFIX) {
        Some(base) => base.to_string(),
        None => format!("{}{}", asset, OTC_SUFFIX),
    }
}

/// Candles to request for the given history depth and martingale level.
pub fn required_candle_count(days: u32, martingale: u8) -> i64 {
    let levels = i64::from(martingale.max(1));
    let count = 4000 + 500 * levels - 110 * i64::from(days);
    count.max(MIN_REQUEST_CANDLES)
}

/// Share of flat candles (O = H = L = C). An empty feed counts as fully flat.
pub fn flat_ratio(candles: &[RawCandle]) -> f64 {
    if candles.is_empty() {
        return 1.0;
    }
    let flat = candles.iter().filter(|c| c.is_flat()).count();
    flat as f64 / candles.len() as f64
}

/// Classified candles of one asset.
#[derive(Debug, Clone)]
pub struct IngestedFeed {
    /// Asset the candles actually belong to (the counterpart after a fallback).
    pub asset: String,
    /// Sorted by time, oldest first.
    pub candles: Vec<Candle>,
    pub flat_ratio: f64,
}

impl IngestedFeed {
    pub fn doji_ratio(&self) -> f64 {
        if self.candles.is_empty() {
            return 0.0;
        }
        let dojis = self.candles.iter().filter(|c| c.is_doji()).count();
        dojis as f64 / self.candles.len() as f64
    }

    /// Enough dojis that bucket statistics say little.
    pub fn is_doji_heavy(&self) -> bool {
        !self.candles.is_empty() && self.doji_ratio() >= DOJI_WARN_RATIO
    }
}

/// Fetches and classifies candles for one asset at a time.
pub struct Ingestor<'a, S: CandleSource> {
    source: &'a S,
    config: &'a Config,
    params: &'a CatalogParams,
}

impl<'a, S: CandleSource> Ingestor<'a, S> {
    pub fn new(source: &'a S, config: &'a Config, params: &'a CatalogParams) -> Self {
        Self {
            source,
            config,
            params,
        }
    }

    async fn fetch(&self, asset: &str) -> Result<Vec<RawCandle>> {
        let period = self.params.timeframe.period_seconds();
        let count = required_candle_count(self.params.days, self.params.martingale);
        let lookback = count as u64 * u64::from(period);
        debug!(
            "Fetching {} candles of {}s for {} from {}",
            count,
            period,
            asset,
            self.source.name()
        );
        self.source.get_candles(asset, period, lookback).await
    }

    /// Fetch, fall back to the counterpart on a flat feed, classify.
    pub async fn ingest(&self, asset: &str) -> Result<IngestedFeed> {
        let mut feed_asset = asset.to_string();
        let mut raw = self.fetch(asset).await?;
        let mut ratio = flat_ratio(&raw);

        if ratio >= FLAT_FEED_RATIO {
            let counterpart = counterpart_asset(asset);
            let alternative = self.fetch(&counterpart).await?;
            let alternative_ratio = flat_ratio(&alternative);
            if alternative_ratio < ratio {
                info!(
                    "{} feed is {:.0}% flat, using {} ({:.0}% flat)",
                    asset,
                    ratio * 100.0,
                    counterpart,
                    alternative_ratio * 100.0
                );
                feed_asset = counterpart;
                raw = alternative;
                ratio = alternative_ratio;
            }
        }

        let mut candles = raw
            .iter()
            .map(|candle| Candle::classify(&feed_asset, candle, self.config.timezone))
            .collect::<Result<Vec<_>>>()?;
        candles.sort_by_key(|candle| candle.time);

        if self.config.debug_candles {
            for candle in &candles {
                debug!(
                    "{} {} {} o={} h={} l={} c={} {:?}",
                    feed_asset,
                    candle.local_date,
                    candle.local_time,
                    candle.open,
                    candle.high,
                    candle.low,
                    candle.close,
                    candle.color
                );
            }
        }

        let feed = IngestedFeed {
            asset: feed_asset,
            candles,
            flat_ratio: ratio,
        };
        if feed.is_doji_heavy() {
            warn!(
                "{}: {:.0}% of {} candles are doji, statistics will be weak",
                feed.asset,
                feed.doji_ratio() * 100.0,
                feed.candles.len()
            );
        }
        Ok(feed)
    }
}
