//! End-to-end runs of the cataloger against in-memory candle feeds

use chrono::{DateTime, TimeZone, Timelike};
use chrono_tz::Asia::Dhaka;
use chrono_tz::Tz;
use signal_cataloger::config::{CatalogParams, Config, FilterPeriods};
use signal_cataloger::error::CatalogError;
use signal_cataloger::services::Cataloger;
use signal_cataloger::sources::StaticCandleSource;
use signal_cataloger::types::*;
use std::collections::HashSet;

fn reference(hour: u32, minute: u32) -> DateTime<Tz> {
    Dhaka.with_ymd_and_hms(2024, 3, 10, hour, minute, 0).unwrap()
}

/// `greens` green then `reds` red candles at a Dhaka local time, one per day.
fn bucket(hour: u32, minute: u32, greens: usize, reds: usize) -> Vec<RawCandle> {
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

/// A day of M5 buckets from `start_hour` with alternating bias.
fn busy_feed(start_hour: u32, hours: u32) -> Vec<RawCandle> {
    let mut candles = Vec::new();
    for hour in start_hour..start_hour + hours {
        for minute in (0..60).step_by(5) {
            let (greens, reds) = if (hour + minute) % 2 == 0 { (8, 2) } else { (3, 7) };
            candles.extend(bucket(hour % 24, minute, greens, reds));
        }
    }
    candles
}

fn config() -> Config {
    Config {
        asset_pause_ms: 0,
        duplicate_retain_probability: 0.0,
        ..Config::default()
    }
}

fn params(timeframe: Timeframe) -> CatalogParams {
    CatalogParams {
        timeframe,
        ..CatalogParams::default()
    }
}

fn assets(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_green_heavy_bucket_becomes_call() {
    let source = StaticCandleSource::new().with_feed("EURUSD", bucket(7, 35, 9, 1));
    let cataloger = Cataloger::new(source, config(), params(Timeframe::M1));

    let report = cataloger
        .run(&assets(&["EURUSD"]), reference(7, 34))
        .await
        .unwrap();

    let lines: Vec<String> = report.signals.iter().map(|s| s.to_string()).collect();
    assert_eq!(lines, vec!["EURUSD M1 07:35 CALL"]);
    assert_eq!(report.signals[0].confidence, 83);
}

#[tokio::test]
async fn test_slots_are_unique_future_and_aligned() {
    let source = StaticCandleSource::new()
        .with_feed("EURUSD", busy_feed(8, 3))
        .with_feed("GBPUSD", busy_feed(8, 3))
        .with_feed("AUDCAD", busy_feed(9, 2));
    let cataloger = Cataloger::new(source, config(), params(Timeframe::M5));
    let now = Dhaka.with_ymd_and_hms(2024, 3, 10, 7, 31, 45).unwrap();

    let report = cataloger
        .run(&assets(&["EURUSD", "GBPUSD", "AUDCAD"]), now)
        .await
        .unwrap();

    assert!(!report.signals.is_empty());
    let mut seen = HashSet::new();
    for signal in &report.signals {
        assert!(signal.scheduled_at > now, "{} is not in the future", signal);
        assert_eq!(signal.scheduled_at.minute() % 5, 0);
        assert_eq!(signal.scheduled_at.second(), 0);
        assert!(seen.insert(signal.time), "{} reuses a slot", signal);
    }
    assert!(report
        .signals
        .windows(2)
        .all(|w| w[0].scheduled_at < w[1].scheduled_at));
}

#[tokio::test]
async fn test_runs_are_repeatable_without_duplicate_retention() {
    let build = || {
        let source = StaticCandleSource::new()
            .with_feed("EURUSD", busy_feed(8, 2))
            .with_feed("GBPUSD", busy_feed(8, 2));
        Cataloger::new(source, config(), params(Timeframe::M5))
    };
    let names = assets(&["EURUSD", "GBPUSD"]);

    let first = build().run(&names, reference(7, 30)).await.unwrap();
    let second = build().run(&names, reference(7, 30)).await.unwrap();
    assert_eq!(first.signals, second.signals);
}

#[tokio::test]
async fn test_window_escalates_to_eight_hours() {
    // 14:00 is 6.5 hours after the reference.
    let source = StaticCandleSource::new().with_feed("EURUSD", bucket(14, 0, 8, 1));
    let cataloger = Cataloger::new(source, config(), params(Timeframe::M5));

    let report = cataloger
        .run(&assets(&["EURUSD"]), reference(7, 30))
        .await
        .unwrap();

    assert_eq!(report.window_hours, 8);
    assert_eq!(report.signals.len(), 1);
    assert_eq!(report.signals[0].source_time.to_string(), "14:00");
    assert_eq!(report.signals[0].time.to_string(), "07:35");
}

#[tokio::test]
async fn test_flat_otc_feed_falls_back_to_regular_market() {
    let flat: Vec<RawCandle> = (0..20)
        .map(|i| RawCandle::at_epoch(1_706_745_600 + 60 * i, 1.0, 1.0, 1.0, 1.0))
        .collect();
    let source = StaticCandleSource::new()
        .with_feed("EURUSD_otc", flat)
        .with_feed("EURUSD", bucket(7, 35, 9, 1));
    let cataloger = Cataloger::new(source, config(), params(Timeframe::M1));

    let report = cataloger
        .run(&assets(&["EURUSD_otc"]), reference(7, 34))
        .await
        .unwrap();

    assert_eq!(report.signals.len(), 1);
    assert_eq!(report.signals[0].asset, "EURUSD");
}

#[tokio::test]
async fn test_trend_filter_vetoes_against_history() {
    let mut candles = bucket(7, 35, 9, 1);
    candles.extend(bucket(7, 34, 0, 20));
    let source = StaticCandleSource::new().with_feed("EURUSD", candles);
    let config = Config {
        min_signals: 0,
        ..config()
    };
    let params = CatalogParams {
        filters: FilterPeriods {
            trend: 2,
            ..FilterPeriods::default()
        },
        ..params(Timeframe::M1)
    };
    let cataloger = Cataloger::new(source, config, params);

    let report = cataloger
        .run(&assets(&["EURUSD"]), reference(7, 30))
        .await
        .unwrap();

    // 07:35 CALL reads 07:35 and 07:34 together, which are mostly red.
    assert_eq!(report.signals.len(), 1);
    assert_eq!(report.signals[0].direction, Direction::Put);
    assert_eq!(report.signals[0].source_time.to_string(), "07:34");
    assert_eq!(report.signals[0].time.to_string(), "07:31");
}

#[tokio::test]
async fn test_unknown_assets_produce_no_signals() {
    let cataloger = Cataloger::new(StaticCandleSource::new(), config(), params(Timeframe::M5));
    let report = cataloger
        .run(&assets(&["NOPE"]), reference(7, 30))
        .await
        .unwrap();
    assert!(report.is_empty());
    assert!(!report.had_candidates);
}

#[tokio::test]
async fn test_same_time_on_two_assets_schedules_once() {
    let source = StaticCandleSource::new()
        .with_feed("EURUSD", bucket(8, 0, 9, 0))
        .with_feed("GBPUSD", bucket(8, 0, 9, 0));
    let cataloger = Cataloger::new(source, config(), params(Timeframe::M5));

    let report = cataloger
        .run(&assets(&["EURUSD", "GBPUSD"]), reference(7, 30))
        .await
        .unwrap();

    assert_eq!(report.signals.len(), 1);
    assert_eq!(report.signals[0].asset, "EURUSD");
    assert_eq!(report.signals[0].source_time.to_string(), "08:00");
}

#[tokio::test]
async fn test_source_error_aborts_run() {
    let source = StaticCandleSource::new()
        .with_feed("EURUSD", bucket(7, 35, 9, 1))
        .with_failure("GBPUSD", "session expired");
    let cataloger = Cataloger::new(source, config(), params(Timeframe::M1));

    let err = cataloger
        .run(&assets(&["EURUSD", "GBPUSD"]), reference(7, 34))
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::Source(ref m) if m == "session expired"));
    assert!(err.is_source_failure());
}

#[tokio::test]
async fn test_malformed_candle_time_aborts_run() {
    let mut candles = bucket(7, 35, 9, 1);
    candles.push(RawCandle {
        open: 1.0,
        high: 1.2,
        low: 0.9,
        close: 1.1,
        time: Some("last tuesday".to_string()),
        timestamp: None,
    });
    let source = StaticCandleSource::new().with_feed("EURUSD", candles);
    let cataloger = Cataloger::new(source, config(), params(Timeframe::M1));

    let err = cataloger
        .run(&assets(&["EURUSD"]), reference(7, 34))
        .await
        .unwrap_err();

    assert!(matches!(err, CatalogError::MalformedTimestamp(ref raw) if raw == "last tuesday"));
}
