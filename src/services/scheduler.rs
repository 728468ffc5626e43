//! Post-selection pipeline: thinning, window restriction, backfill and
//! future slot assignment.

use crate::config::Config;
use crate::types::{
    future_slots, window_ladder, ScheduledSignal, SignalCandidate, SignalKey, Timeframe,
    TimeOfDay,
};
use chrono::{DateTime, Duration};
use chrono_tz::Tz;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Result of scheduling a pooled candidate list.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    /// Ordered by assigned slot.
    pub signals: Vec<ScheduledSignal>,
    /// Window the slots were drawn from, in hours.
    pub window_hours: i64,
}

/// Next occurrence strictly after `reference` and no later than `hours` ahead.
pub fn in_future_window(
    candidate: &SignalCandidate,
    hours: i64,
    reference: &DateTime<Tz>,
) -> bool {
    let next = candidate.next_occurrence(reference);
    next > *reference && next <= reference.clone() + Duration::hours(hours.max(1))
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    pub min_signals: usize,
    pub window_ladder: Vec<i64>,
    pub duplicate_retain_probability: f64,
}

impl Scheduler {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_signals: config.min_signals,
            window_ladder: config.window_ladder(),
            duplicate_retain_probability: config.duplicate_retain_probability,
        }
    }

    fn base_window(&self) -> i64 {
        self.window_ladder.first().copied().unwrap_or(5)
    }

    /// One draw deciding whether a repeated HH:MM survives.
    fn retain_duplicate<R: Rng>(&self, rng: &mut R) -> bool {
        let probability = self.duplicate_retain_probability.clamp(0.0, 1.0);
        probability > 0.0 && rng.gen_bool(probability)
    }

    /// Drop signals whose HH:MM was already seen, each kept with the
    /// configured probability. Input must be sorted by HH:MM.
    pub fn thin<R: Rng>(&self, sorted: Vec<SignalCandidate>, rng: &mut R) -> Vec<SignalCandidate> {
        let mut seen: HashSet<TimeOfDay> = HashSet::new();
        sorted
            .into_iter()
            .filter(|candidate| {
                if seen.insert(candidate.time) {
                    return true;
                }
                let keep = self.retain_duplicate(rng);
                if !keep {
                    debug!("Thinned duplicate slot {}", candidate);
                }
                keep
            })
            .collect()
    }

    /// Pick the scheduling window and keep the signals inside it.
    ///
    /// The window is the first that holds any filtered signal. When none
    /// does, it is the first that holds anything from `pool`, so backfill
    /// still has material to work with.
    pub fn restrict_to_window(
        &self,
        filtered: &[SignalCandidate],
        pool: &[SignalCandidate],
        reference: &DateTime<Tz>,
    ) -> (i64, Vec<SignalCandidate>) {
        for hours in &self.window_ladder {
            let windowed: Vec<SignalCandidate> = filtered
                .iter()
                .filter(|c| in_future_window(c, *hours, reference))
                .cloned()
                .collect();
            if !windowed.is_empty() {
                return (*hours, windowed);
            }
        }

        let hours = self
            .window_ladder
            .iter()
            .copied()
            .find(|hours| pool.iter().any(|c| in_future_window(c, *hours, reference)))
            .unwrap_or_else(|| self.base_window());
        (hours, Vec::new())
    }

    /// Top up `selected` to `min_signals` from the thinned pre-filter pool.
    ///
    /// In-window pool entries not already present are taken by recorded
    /// confidence, highest first, then in pool order. An entry whose HH:MM
    /// is already taken passes the same retention draw as thinning.
    pub fn backfill<R: Rng>(
        &self,
        mut selected: Vec<SignalCandidate>,
        pool: &[SignalCandidate],
        confidence: &HashMap<SignalKey, u8>,
        window_hours: i64,
        reference: &DateTime<Tz>,
        rng: &mut R,
    ) -> Vec<SignalCandidate> {
        if selected.len() >= self.min_signals {
            return selected;
        }

        let mut existing: HashSet<SignalKey> = selected.iter().map(SignalCandidate::key).collect();
        let eligible: Vec<&SignalCandidate> = pool
            .iter()
            .filter(|c| in_future_window(c, window_hours, reference))
            .collect();

        let mut scored: Vec<(u8, &SignalCandidate)> = eligible
            .iter()
            .filter(|c| !existing.contains(&c.key()))
            .map(|c| (confidence.get(&c.key()).copied().unwrap_or(0), *c))
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        let before = selected.len();
        let mut taken: HashSet<TimeOfDay> = selected.iter().map(|c| c.time).collect();
        let ranked = scored.into_iter().map(|(_, c)| c);
        for candidate in ranked.chain(eligible.iter().copied()) {
            if selected.len() >= self.min_signals {
                break;
            }
            if !existing.insert(candidate.key()) {
                continue;
            }
            if !taken.insert(candidate.time) && !self.retain_duplicate(rng) {
                debug!("Skipped backfill of taken slot {}", candidate);
                continue;
            }
            selected.push(candidate.clone());
        }

        if selected.len() > before {
            debug!("Backfilled {} signals", selected.len() - before);
        }
        selected
    }

    /// Move every survivor onto its own timeframe-aligned future slot.
    ///
    /// Survivors keep their next-occurrence order. The slot window grows
    /// along the ladder starting at `window_hours` until there are enough
    /// slots; anything beyond the widest window is dropped.
    pub fn assign_slots(
        &self,
        mut survivors: Vec<SignalCandidate>,
        timeframe: Timeframe,
        window_hours: i64,
        reference: &DateTime<Tz>,
    ) -> Schedule {
        survivors.sort_by_key(|c| c.next_occurrence(reference));

        let mut window_used = window_hours;
        let mut slots = Vec::new();
        for hours in window_ladder(window_hours) {
            window_used = hours;
            slots = future_slots(timeframe, hours, reference);
            if slots.len() >= survivors.len() {
                break;
            }
        }

        let mut used: HashSet<TimeOfDay> = HashSet::new();
        let mut free = slots.into_iter();
        let mut signals = Vec::with_capacity(survivors.len());
        let total = survivors.len();

        for candidate in survivors {
            let Some(slot) = free.by_ref().find(|slot| used.insert(TimeOfDay::of(slot))) else {
                warn!(
                    "Only {} of {} signals fit into {}h of {} slots",
                    signals.len(),
                    total,
                    window_used,
                    timeframe
                );
                break;
            };
            signals.push(ScheduledSignal::from_candidate(candidate, slot));
        }

        signals.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at));
        Schedule {
            signals,
            window_hours: window_used,
        }
    }

    /// Run the whole post-selection pipeline.
    ///
    /// `filtered` is the pool after the filter bank, in pool order; `pool`
    /// is the pool before it. Both are thinned, so a duplicate dropped from
    /// one cannot come back through backfill.
    pub fn schedule<R: Rng>(
        &self,
        mut filtered: Vec<SignalCandidate>,
        pool: &[SignalCandidate],
        confidence: &HashMap<SignalKey, u8>,
        timeframe: Timeframe,
        reference: &DateTime<Tz>,
        rng: &mut R,
    ) -> Schedule {
        filtered.sort_by_key(|c| c.time);
        let thinned = self.thin(filtered, rng);

        let mut sorted_pool = pool.to_vec();
        sorted_pool.sort_by_key(|c| c.time);
        let thinned_pool = self.thin(sorted_pool, rng);

        let (window_hours, windowed) = self.restrict_to_window(&thinned, &thinned_pool, reference);
        let survivors = self.backfill(
            windowed,
            &thinned_pool,
            confidence,
            window_hours,
            reference,
            rng,
        );
        self.assign_slots(survivors, timeframe, window_hours, reference)
    }
}
