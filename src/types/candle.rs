//! Raw broker candles and their time-of-day classification.

use crate::error::{CatalogError, Result};
use crate::types::TimeOfDay;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{de, Deserialize, Deserializer, Serialize};

/// Epoch values above this are milliseconds rather than seconds.
const EPOCH_MILLIS_THRESHOLD: f64 = 1_000_000_000_000.0;

/// Prices closer than this are treated as equal when detecting flat bars.
const FLAT_EPSILON: f64 = 1e-12;

/// Naive ISO-8601 layouts accepted after the strict and RFC 3339 forms fail.
const NAIVE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// OHLC candle as delivered by the candle source.
///
/// The feed carries either an ISO-8601 `time` or an epoch `timestamp`
/// (seconds, or milliseconds for large values). Some bridges send the
/// epoch as a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCandle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(
        default,
        deserialize_with = "epoch_number_or_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub timestamp: Option<f64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EpochValue {
    Number(f64),
    Text(String),
}

fn epoch_number_or_string<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<EpochValue>::deserialize(deserializer)? {
        None => Ok(None),
        Some(EpochValue::Number(value)) => Ok(Some(value)),
        Some(EpochValue::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(EpochValue::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| de::Error::custom(format!("invalid epoch timestamp {:?}", text))),
    }
}

impl RawCandle {
    /// Candle stamped with epoch seconds.
    pub fn at_epoch(timestamp: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            open,
            high,
            low,
            close,
            time: None,
            timestamp: Some(timestamp as f64),
        }
    }

    /// Open, high, low and close are all equal.
    pub fn is_flat(&self) -> bool {
        (self.open - self.close).abs() < FLAT_EPSILON
            && (self.open - self.high).abs() < FLAT_EPSILON
            && (self.open - self.low).abs() < FLAT_EPSILON
    }

    /// Candle open time in UTC.
    pub fn parse_time(&self) -> Result<DateTime<Utc>> {
        if let Some(raw) = self.time.as_deref().filter(|s| !s.is_empty()) {
            return parse_iso_time(raw);
        }

        match self.timestamp {
            Some(ts) => parse_epoch(ts),
            None => Err(CatalogError::MalformedTimestamp(
                "candle has neither 'time' nor 'timestamp'".to_string(),
            )),
        }
    }
}

fn parse_iso_time(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%SZ") {
        return Ok(Utc.from_utc_datetime(&naive));
    }
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(raw) {
        return Ok(with_offset.with_timezone(&Utc));
    }

    let trimmed = raw.strip_suffix('Z').unwrap_or(raw);
    NAIVE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
        .ok_or_else(|| CatalogError::MalformedTimestamp(raw.to_string()))
}

fn parse_epoch(ts: f64) -> Result<DateTime<Utc>> {
    if !ts.is_finite() {
        return Err(CatalogError::MalformedTimestamp(ts.to_string()));
    }
    let seconds = if ts > EPOCH_MILLIS_THRESHOLD { ts / 1000.0 } else { ts };
    let whole = seconds.floor();
    let nanos = (((seconds - whole) * 1e9).round() as u32).min(999_999_999);
    Utc.timestamp_opt(whole as i64, nanos)
        .single()
        .ok_or_else(|| CatalogError::MalformedTimestamp(ts.to_string()))
}

/// Candle body color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandleColor {
    Green,
    Red,
    Doji,
}

impl CandleColor {
    /// Green when the close is above the open, red when below.
    pub fn from_prices(open: f64, close: f64) -> Self {
        if open < close {
            CandleColor::Green
        } else if open > close {
            CandleColor::Red
        } else {
            CandleColor::Doji
        }
    }
}

/// Candle converted to local time and classified.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub asset: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub time: DateTime<Utc>,
    pub local_date: NaiveDate,
    pub local_time: TimeOfDay,
    pub color: CandleColor,
}

impl Candle {
    /// Classify a raw candle in the given local time zone.
    pub fn classify(asset: &str, raw: &RawCandle, tz: Tz) -> Result<Self> {
        let time = raw.parse_time()?;
        let local = time.with_timezone(&tz);

        Ok(Self {
            asset: asset.to_string(),
            open: raw.open,
            high: raw.high,
            low: raw.low,
            close: raw.close,
            time,
            local_date: local.date_naive(),
            local_time: TimeOfDay::of(&local),
            color: CandleColor::from_prices(raw.open, raw.close),
        })
    }

    pub fn is_doji(&self) -> bool {
        self.color == CandleColor::Doji
    }
}
