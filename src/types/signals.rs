use crate::types::{Timeframe, TimeOfDay};
use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a binary-option signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    /// Price expected to close above the open.
    Call,
    /// Price expected to close below the open.
    Put,
}

impl Direction {
    /// Parse from string (case-insensitive).
    pub fn from_label(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CALL" => Some(Self::Call),
            "PUT" => Some(Self::Put),
            _ => None,
        }
    }

    /// Get display label for this direction.
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Call => "CALL",
            Direction::Put => "PUT",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lookup key for a candidate's recorded confidence.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SignalKey {
    pub asset: String,
    pub timeframe: Timeframe,
    pub time: TimeOfDay,
    pub direction: Direction,
}

/// A time bucket selected as a signal, still keyed by its historical HH:MM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalCandidate {
    /// Asset the statistics were computed for (after any OTC fallback).
    pub asset: String,
    pub timeframe: Timeframe,
    /// Local time-of-day of the bucket.
    pub time: TimeOfDay,
    pub direction: Direction,
    /// Best confidence across the base bucket and computed martingale levels.
    pub confidence: u8,
}

impl SignalCandidate {
    pub fn key(&self) -> SignalKey {
        SignalKey {
            asset: self.asset.clone(),
            timeframe: self.timeframe,
            time: self.time,
            direction: self.direction,
        }
    }

    /// Next local occurrence of this candidate's time-of-day.
    pub fn next_occurrence(&self, reference: &DateTime<Tz>) -> DateTime<Tz> {
        self.time.next_occurrence(reference)
    }
}

impl fmt::Display for SignalCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.asset, self.timeframe, self.time, self.direction
        )
    }
}

/// Final output unit: a candidate pinned to a concrete future slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledSignal {
    pub asset: String,
    pub timeframe: Timeframe,
    /// Time-of-day of the assigned slot.
    pub time: TimeOfDay,
    pub direction: Direction,
    pub confidence: u8,
    /// Bucket time the statistics came from.
    pub source_time: TimeOfDay,
    /// Assigned slot in the local time zone.
    pub scheduled_at: DateTime<Tz>,
}

impl ScheduledSignal {
    /// Pin a candidate to a slot.
    pub fn from_candidate(candidate: SignalCandidate, slot: DateTime<Tz>) -> Self {
        Self {
            asset: candidate.asset,
            timeframe: candidate.timeframe,
            time: TimeOfDay::of(&slot),
            direction: candidate.direction,
            confidence: candidate.confidence,
            source_time: candidate.time,
            scheduled_at: slot,
        }
    }
}

impl fmt::Display for ScheduledSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.asset, self.timeframe, self.time, self.direction
        )
    }
}
