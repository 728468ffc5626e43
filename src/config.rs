use crate::error::{CatalogError, Result};
use crate::types::{window_ladder, Timeframe};
use chrono_tz::Tz;
use std::env;
use std::path::PathBuf;

/// Zone the broker's clock times are read in.
pub const DEFAULT_TIMEZONE: &str = "Asia/Dhaka";

/// Lookback periods of the veto filters (0 disables a filter).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterPeriods {
    /// Trend-count filter, driven by `--rsi`.
    pub trend: usize,
    pub adx: usize,
    pub cci: usize,
    pub macd: usize,
}

impl FilterPeriods {
    pub fn any_enabled(&self) -> bool {
        self.trend > 0 || self.adx > 0 || self.cci > 0 || self.macd > 0
    }
}

/// Per-run cataloging parameters, normally taken from the command line.
#[derive(Debug, Clone)]
pub struct CatalogParams {
    pub timeframe: Timeframe,
    /// Martingale levels to chain (0..=3).
    pub martingale: u8,
    /// Starting confidence threshold (50..=100).
    pub percentage: f64,
    /// Days of history to analyze (1..=50).
    pub days: u32,
    pub filters: FilterPeriods,
}

impl Default for CatalogParams {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::M5,
            martingale: 0,
            percentage: 70.0,
            days: 10,
            filters: FilterPeriods::default(),
        }
    }
}

impl CatalogParams {
    /// Check the documented ranges.
    pub fn validate(&self) -> Result<()> {
        if self.martingale > 3 {
            return Err(CatalogError::InvalidArgument(format!(
                "martingale must be between 0 and 3 (got {})",
                self.martingale
            )));
        }
        if !(50.0..=100.0).contains(&self.percentage) {
            return Err(CatalogError::InvalidArgument(format!(
                "percentage must be between 50 and 100 (got {})",
                self.percentage
            )));
        }
        if !(1..=50).contains(&self.days) {
            return Err(CatalogError::InvalidArgument(format!(
                "days must be between 1 and 50 (got {})",
                self.days
            )));
        }
        let periods = [
            self.filters.trend,
            self.filters.adx,
            self.filters.cci,
            self.filters.macd,
        ];
        if periods.iter().any(|p| *p > 100) {
            return Err(CatalogError::InvalidArgument(
                "filter periods must be between 0 and 100".to_string(),
            ));
        }
        Ok(())
    }
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Signals each asset should contribute before fallbacks stop.
    pub min_signals: usize,
    /// Threshold relaxation step in percentage points.
    pub relax_step: f64,
    /// First scheduling window in hours.
    pub base_window_hours: i64,
    /// Chance of keeping a second signal with an already used HH:MM.
    /// Zero makes the output one signal per time slot.
    pub duplicate_retain_probability: f64,
    /// Seed for the thinning RNG (entropy when absent).
    pub thinning_seed: Option<u64>,
    /// Local time zone for bucketing and scheduling.
    pub timezone: Tz,
    /// Pause between assets (ms).
    pub asset_pause_ms: u64,
    /// Log every raw candle.
    pub debug_candles: bool,
    /// Base URL of the HTTP candle bridge.
    pub candle_source_url: Option<String>,
    /// Bearer token for the candle bridge.
    pub candle_source_token: Option<String>,
    /// Directory of `<ASSET>.json` candle dumps.
    pub candle_dir: Option<PathBuf>,
    /// HTTP request timeout (seconds).
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            min_signals: 10,
            relax_step: 5.0,
            base_window_hours: 5,
            duplicate_retain_probability: 0.01,
            thinning_seed: None,
            timezone: chrono_tz::Asia::Dhaka,
            asset_pause_ms: 2000,
            debug_candles: false,
            candle_source_url: None,
            candle_source_token: None,
            candle_dir: None,
            http_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let timezone = timezone_or(env::var("CATALOG_TZ").ok(), defaults.timezone)?;

        let duplicate_retain_probability: f64 = env::var("DUPLICATE_RETAIN_PROBABILITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.duplicate_retain_probability);
        if !(0.0..=1.0).contains(&duplicate_retain_probability) {
            return Err(CatalogError::Config(format!(
                "DUPLICATE_RETAIN_PROBABILITY must be within 0..1 (got {})",
                duplicate_retain_probability
            )));
        }

        Ok(Self {
            min_signals: env::var("MIN_SIGNALS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.min_signals),
            relax_step: env::var("RELAX_STEP")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|step: &f64| *step > 0.0)
                .unwrap_or(defaults.relax_step),
            base_window_hours: env::var("SIGNAL_WINDOW_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|hours: &i64| *hours >= 1)
                .unwrap_or(defaults.base_window_hours),
            duplicate_retain_probability,
            thinning_seed: env::var("THINNING_SEED").ok().and_then(|v| v.parse().ok()),
            timezone,
            asset_pause_ms: env::var("ASSET_PAUSE_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.asset_pause_ms),
            debug_candles: env::var("DEBUG_CANDLES")
                .ok()
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            candle_source_url: env::var("CANDLE_SOURCE_URL").ok().filter(|v| !v.is_empty()),
            candle_source_token: env::var("CANDLE_SOURCE_TOKEN").ok().filter(|v| !v.is_empty()),
            candle_dir: env::var("CANDLE_DIR")
                .ok()
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.http_timeout_secs),
        })
    }

    /// Scheduling windows tried in order.
    pub fn window_ladder(&self) -> Vec<i64> {
        window_ladder(self.base_window_hours)
    }
}

/// Parse an IANA zone name such as `Asia/Dhaka`.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|e| CatalogError::Config(format!("unknown time zone {:?}: {}", name, e)))
}

/// A set, non-blank zone name parsed; otherwise `default`.
fn timezone_or(name: Option<String>, default: Tz) -> Result<Tz> {
    match name.filter(|v| !v.trim().is_empty()) {
        Some(name) => parse_timezone(&name),
        None => Ok(default),
    }
}
