//! Clock arithmetic for time-of-day buckets and future signal slots.
//!
//! Bucket keys are minutes since local midnight. All arithmetic wraps within
//! the day, so chaining a 23:55 bucket forward by one M5 step lands on 00:00.

use crate::error::CatalogError;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Minutes in a day.
pub const MINUTES_PER_DAY: i64 = 24 * 60;

/// Local clock time with minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(u16);

impl TimeOfDay {
    /// Create from hour and minute. Returns None when out of range.
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self((hour * 60 + minute) as u16))
        } else {
            None
        }
    }

    /// Create from a minute count, wrapping into a single day.
    pub fn from_minutes(minutes: i64) -> Self {
        Self(minutes.rem_euclid(MINUTES_PER_DAY) as u16)
    }

    /// Time-of-day of any clock value, seconds discarded.
    pub fn of<T: Timelike>(time: &T) -> Self {
        Self((time.hour() * 60 + time.minute()) as u16)
    }

    pub fn hour(self) -> u32 {
        u32::from(self.0 / 60)
    }

    pub fn minute(self) -> u32 {
        u32::from(self.0 % 60)
    }

    /// Minutes since midnight.
    pub fn minutes(self) -> i64 {
        i64::from(self.0)
    }

    /// Shift by a signed number of minutes, wrapping within the day.
    pub fn add_minutes(self, delta: i64) -> Self {
        Self::from_minutes(self.minutes() + delta)
    }

    /// Next local occurrence of this time at or after `reference`.
    ///
    /// Today's occurrence is used unless it is already earlier than the
    /// reference, in which case tomorrow's is returned.
    pub fn next_occurrence(self, reference: &DateTime<Tz>) -> DateTime<Tz> {
        let tz = reference.timezone();
        let at = |date: NaiveDate| {
            date.and_hms_opt(self.hour(), self.minute(), 0)
                .and_then(|naive| tz.from_local_datetime(&naive).earliest())
        };

        let today = reference.date_naive();
        match at(today) {
            Some(candidate) if candidate >= *reference => candidate,
            _ => today
                .succ_opt()
                .and_then(at)
                .unwrap_or_else(|| reference.clone() + Duration::days(1)),
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = CatalogError;

    /// Parse `HH:MM` (a single-digit hour is accepted).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CatalogError::InvalidArgument(format!("invalid time of day: {:?}", s));
        let (hour, minute) = s.trim().split_once(':').ok_or_else(invalid)?;
        if minute.len() != 2 {
            return Err(invalid());
        }
        let hour: u32 = hour.parse().map_err(|_| invalid())?;
        let minute: u32 = minute.parse().map_err(|_| invalid())?;
        Self::new(hour, minute).ok_or_else(invalid)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Candle timeframe supported by the broker feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M2,
    M5,
    M15,
    M30,
    M60,
}

impl Timeframe {
    /// Parse from a minute count.
    pub fn from_minutes(minutes: u32) -> Option<Self> {
        match minutes {
            1 => Some(Self::M1),
            2 => Some(Self::M2),
            5 => Some(Self::M5),
            15 => Some(Self::M15),
            30 => Some(Self::M30),
            60 => Some(Self::M60),
            _ => None,
        }
    }

    /// Length of one candle in minutes.
    pub fn minutes(&self) -> u32 {
        match self {
            Self::M1 => 1,
            Self::M2 => 2,
            Self::M5 => 5,
            Self::M15 => 15,
            Self::M30 => 30,
            Self::M60 => 60,
        }
    }

    /// Length of one candle in seconds, as the candle source expects it.
    pub fn period_seconds(&self) -> u32 {
        self.minutes() * 60
    }

    /// Whether a minute-of-hour lies on this timeframe's sampling grid.
    pub fn accepts_minute(&self, minute: u32) -> bool {
        minute % self.minutes() == 0
    }

    /// All supported timeframes, shortest first.
    pub fn all() -> &'static [Timeframe] {
        &[
            Timeframe::M1,
            Timeframe::M2,
            Timeframe::M5,
            Timeframe::M15,
            Timeframe::M30,
            Timeframe::M60,
        ]
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "M{}", self.minutes())
    }
}

impl FromStr for Timeframe {
    type Err = CatalogError;

    /// Accepts `5` as well as `M5`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix('M')
            .or_else(|| trimmed.strip_prefix('m'))
            .unwrap_or(trimmed);
        digits
            .parse::<u32>()
            .ok()
            .and_then(Self::from_minutes)
            .ok_or_else(|| {
                CatalogError::InvalidArgument(format!(
                    "timeframe must be one of 1, 2, 5, 15, 30, 60 (got {:?})",
                    s
                ))
            })
    }
}

/// Scheduling windows tried in order, starting from `base_hours`.
///
/// Only windows at least as wide as the base are kept, without repeats.
pub fn window_ladder(base_hours: i64) -> Vec<i64> {
    let base = base_hours.max(1);
    let mut ladder = vec![base];
    for hours in [8, 12, 24] {
        if hours >= base && !ladder.contains(&hours) {
            ladder.push(hours);
        }
    }
    ladder
}

/// Timeframe-aligned slots strictly after `reference`, up to `hours_ahead`.
///
/// Example: reference 07:33 on M5 gives 07:35, 07:40, ...
pub fn future_slots(
    timeframe: Timeframe,
    hours_ahead: i64,
    reference: &DateTime<Tz>,
) -> Vec<DateTime<Tz>> {
    let step = Duration::minutes(i64::from(timeframe.minutes()));
    let mut slot = reference
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or_else(|| reference.clone());
    while slot <= *reference || !timeframe.accepts_minute(slot.minute()) {
        slot = slot + Duration::minutes(1);
    }

    let end = reference.clone() + Duration::hours(hours_ahead.max(1));
    let mut slots = Vec::new();
    while slot <= end {
        slots.push(slot.clone());
        slot = slot + step;
    }
    slots
}
