//! Per-asset candidate selection.

use crate::config::Config;
use crate::types::SignalCandidate;
use chrono::{DateTime, Duration};
use chrono_tz::Tz;

/// Lowest threshold the relaxation loop goes down to.
pub const THRESHOLD_FLOOR: f64 = 50.0;

/// How many candidates each asset should contribute and how hard to try.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionPolicy {
    pub min_signals: usize,
    pub relax_step: f64,
    /// Windows in hours, narrowest first.
    pub window_ladder: Vec<i64>,
}

impl SelectionPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_signals: config.min_signals,
            relax_step: config.relax_step,
            window_ladder: config.window_ladder(),
        }
    }

    /// Candidates whose next occurrence falls in the first non-empty window.
    ///
    /// With nothing in any window, every candidate is kept.
    pub fn restrict_to_window(
        &self,
        candidates: &[SignalCandidate],
        reference: &DateTime<Tz>,
    ) -> Vec<SignalCandidate> {
        for hours in &self.window_ladder {
            let horizon = reference.clone() + Duration::hours(*hours);
            let windowed: Vec<SignalCandidate> = candidates
                .iter()
                .filter(|c| c.next_occurrence(reference) <= horizon)
                .cloned()
                .collect();
            if !windowed.is_empty() {
                return windowed;
            }
        }
        candidates.to_vec()
    }

    /// Threshold reached after relaxing, and the candidates passing it.
    pub fn relax(&self, candidates: &[SignalCandidate], start: f64) -> (f64, Vec<SignalCandidate>) {
        let passing = |threshold: f64| -> Vec<SignalCandidate> {
            candidates
                .iter()
                .filter(|c| f64::from(c.confidence) >= threshold)
                .cloned()
                .collect()
        };

        let mut threshold = start;
        let mut selected = passing(threshold);
        while selected.len() < self.min_signals && threshold > THRESHOLD_FLOOR {
            threshold = (threshold - self.relax_step).max(THRESHOLD_FLOOR);
            selected = passing(threshold);
        }
        (threshold, selected)
    }

    /// Select an asset's candidates, ordered by next occurrence.
    pub fn select(
        &self,
        candidates: &[SignalCandidate],
        percentage: f64,
        reference: &DateTime<Tz>,
    ) -> Vec<SignalCandidate> {
        if candidates.is_empty() {
            return Vec::new();
        }

        let windowed = self.restrict_to_window(candidates, reference);
        let (_, mut selected) = self.relax(&windowed, percentage);

        if selected.len() < self.min_signals {
            selected = windowed;
            // Stable: equal confidences stay in clock order.
            selected.sort_by(|a, b| b.confidence.cmp(&a.confidence));
            selected.truncate(self.min_signals);
        }

        selected.sort_by_key(|c| c.next_occurrence(reference));
        selected
    }
}
