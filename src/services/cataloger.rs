//! Run orchestration.
//!
//! One [`Cataloger::run`] call catalogs every requested asset in turn, pools
//! the selected candidates and schedules the pool. All state lives in a
//! [`CatalogContext`] that is dropped when the run ends.

use crate::config::{CatalogParams, Config};
use crate::error::Result;
use crate::services::catalog::AssetCatalog;
use crate::services::filters::FilterBank;
use crate::services::history::HistoryIndex;
use crate::services::ingest::Ingestor;
use crate::services::scheduler::Scheduler;
use crate::services::selector::SelectionPolicy;
use crate::sources::CandleSource;
use crate::types::{ScheduledSignal, SignalCandidate, SignalKey};
use chrono::DateTime;
use chrono_tz::Tz;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

/// Per-run state.
#[derive(Debug, Default)]
pub struct CatalogContext {
    pub history: HistoryIndex,
    /// Selected candidates of every asset, in selection order.
    pub pool: Vec<SignalCandidate>,
    /// Best confidence recorded per selected signal.
    pub confidence: HashMap<SignalKey, u8>,
}

impl CatalogContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append selected candidates to the pool and record their confidence.
    pub fn record_selection(&mut self, selected: Vec<SignalCandidate>) {
        for candidate in selected {
            self.confidence
                .entry(candidate.key())
                .and_modify(|best| *best = (*best).max(candidate.confidence))
                .or_insert(candidate.confidence);
            self.pool.push(candidate);
        }
    }
}

/// Outcome of a run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Ordered by scheduled time.
    pub signals: Vec<ScheduledSignal>,
    /// Scheduling window the signals were placed in.
    pub window_hours: i64,
    /// Whether any asset produced a candidate at all.
    pub had_candidates: bool,
}

impl RunReport {
    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }
}

/// Catalogs assets from a candle source.
pub struct Cataloger<S: CandleSource> {
    source: S,
    config: Config,
    params: CatalogParams,
}

impl<S: CandleSource> Cataloger<S> {
    pub fn new(source: S, config: Config, params: CatalogParams) -> Self {
        Self {
            source,
            config,
            params,
        }
    }

    fn rng(&self) -> StdRng {
        match self.config.thinning_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// Fetch, catalog and select one asset into the context.
    async fn catalog_asset(
        &self,
        asset: &str,
        context: &mut CatalogContext,
        policy: &SelectionPolicy,
        reference: &DateTime<Tz>,
    ) -> Result<()> {
        let feed = Ingestor::new(&self.source, &self.config, &self.params)
            .ingest(asset)
            .await?;
        let timeframe = self.params.timeframe;

        let catalog = AssetCatalog::build(
            feed.asset.clone(),
            timeframe,
            &feed.candles,
            self.params.martingale,
        );
        context.history.extend(
            feed.candles
                .into_iter()
                .filter(|c| timeframe.accepts_minute(c.local_time.minute())),
        );

        let candidates = catalog.candidates();
        let selected = policy.select(&candidates, self.params.percentage, reference);
        info!(
            "{}: {} buckets, {} candidates, {} selected",
            catalog.asset(),
            catalog.len(),
            candidates.len(),
            selected.len()
        );

        context.record_selection(selected);
        Ok(())
    }

    /// Catalog `assets` in order and schedule the pooled signals after
    /// `reference`.
    pub async fn run(&self, assets: &[String], reference: DateTime<Tz>) -> Result<RunReport> {
        self.params.validate()?;
        let policy = SelectionPolicy::from_config(&self.config);
        let scheduler = Scheduler::from_config(&self.config);
        let mut context = CatalogContext::new();

        for (i, asset) in assets.iter().enumerate() {
            self.catalog_asset(asset, &mut context, &policy, &reference)
                .await?;
            if i + 1 < assets.len() && self.config.asset_pause_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.asset_pause_ms)).await;
            }
        }

        let bank = FilterBank::from_periods(self.params.filters);
        let filtered = bank.apply(&context.history, context.pool.clone());
        debug!(
            "{} of {} pooled signals passed {} filters",
            filtered.len(),
            context.pool.len(),
            bank.len()
        );

        let mut rng = self.rng();
        let schedule = scheduler.schedule(
            filtered,
            &context.pool,
            &context.confidence,
            self.params.timeframe,
            &reference,
            &mut rng,
        );

        Ok(RunReport {
            signals: schedule.signals,
            window_hours: schedule.window_hours,
            had_candidates: !context.pool.is_empty(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::StaticCandleSource;
    use crate::types::{Direction, RawCandle, Timeframe};
    use chrono::TimeZone;
    use chrono_tz::Asia::Dhaka;

    fn candidate(time: &str, confidence: u8) -> SignalCandidate {
        SignalCandidate {
            asset: "EURUSD".to_string(),
            timeframe: Timeframe::M1,
            time: time.parse().unwrap(),
            direction: Direction::Call,
            confidence,
        }
    }

    /// Candles at a Dhaka local time on consecutive days.
    fn history_at(hour: u32, minute: u32, greens: usize, reds: usize) -> Vec<RawCandle> {
        (0..greens + reds)
            .map(|day| {
                let local = Dhaka
                    .with_ymd_and_hms(2024, 2, 1 + day as u32, hour, minute, 0)
                    .unwrap();
                let (open, close) = if day < greens { (1.0, 1.1) } else { (1.1, 1.0) };
                RawCandle::at_epoch(local.timestamp(), open, 1.2, 0.9, close)
            })
            .collect()
    }

    fn quiet_config() -> Config {
        Config {
            asset_pause_ms: 0,
            duplicate_retain_probability: 0.0,
            thinning_seed: Some(1),
            ..Config::default()
        }
    }

    #[test]
    fn test_record_selection_keeps_best_confidence() {
        let mut context = CatalogContext::new();
        context.record_selection(vec![candidate("08:00", 60), candidate("08:00", 75)]);
        context.record_selection(vec![candidate("08:00", 70)]);
        assert_eq!(context.pool.len(), 3);
        assert_eq!(context.confidence.get(&candidate("08:00", 0).key()), Some(&75));
    }

    #[tokio::test]
    async fn test_run_schedules_green_heavy_bucket() {
        let source = StaticCandleSource::new().with_feed("EURUSD", history_at(7, 35, 9, 1));
        let params = CatalogParams {
            timeframe: Timeframe::M1,
            ..CatalogParams::default()
        };
        let cataloger = Cataloger::new(source, quiet_config(), params);
        let reference = Dhaka.with_ymd_and_hms(2024, 3, 10, 7, 34, 0).unwrap();

        let report = cataloger.run(&["EURUSD".to_string()], reference).await.unwrap();
        assert!(report.had_candidates);
        assert_eq!(report.signals.len(), 1);
        assert_eq!(report.signals[0].to_string(), "EURUSD M1 07:35 CALL");
        assert_eq!(report.window_hours, 5);
    }

    #[tokio::test]
    async fn test_run_without_candles_is_empty() {
        let cataloger = Cataloger::new(
            StaticCandleSource::new(),
            quiet_config(),
            CatalogParams::default(),
        );
        let reference = Dhaka.with_ymd_and_hms(2024, 3, 10, 7, 34, 0).unwrap();
        let report = cataloger.run(&["EURUSD".to_string()], reference).await.unwrap();
        assert!(report.is_empty());
        assert!(!report.had_candidates);
    }

    #[tokio::test]
    async fn test_run_rejects_invalid_params() {
        let params = CatalogParams {
            percentage: 40.0,
            ..CatalogParams::default()
        };
        let cataloger = Cataloger::new(StaticCandleSource::new(), quiet_config(), params);
        let reference = Dhaka.with_ymd_and_hms(2024, 3, 10, 7, 34, 0).unwrap();
        assert!(cataloger.run(&["EURUSD".to_string()], reference).await.is_err());
    }
}
