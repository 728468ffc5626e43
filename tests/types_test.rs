//! Unit tests for types module

use chrono::TimeZone;
use chrono_tz::Asia::Dhaka;
use signal_cataloger::types::*;

#[test]
fn test_time_of_day_ordering_and_wrap() {
    let a: TimeOfDay = "00:05".parse().unwrap();
    let b: TimeOfDay = "23:55".parse().unwrap();
    assert!(a < b);
    assert_eq!(b.add_minutes(10), a);
    assert_eq!(TimeOfDay::from_minutes(-1).to_string(), "23:59");
    assert_eq!(TimeOfDay::from_minutes(MINUTES_PER_DAY).to_string(), "00:00");
}

#[test]
fn test_time_of_day_serializes_as_clock_string() {
    let t = TimeOfDay::new(7, 5).unwrap();
    assert_eq!(serde_json::to_string(&t).unwrap(), "\"07:05\"");
}

#[test]
fn test_timeframe_round_trip_through_minutes() {
    for tf in Timeframe::all() {
        assert_eq!(Timeframe::from_minutes(tf.minutes()), Some(*tf));
        assert_eq!(tf.to_string().parse::<Timeframe>().unwrap(), *tf);
    }
    assert_eq!(Timeframe::from_minutes(10), None);
}

#[test]
fn test_direction_serialization() {
    assert_eq!(serde_json::to_string(&Direction::Call).unwrap(), "\"CALL\"");
    let parsed: Direction = serde_json::from_str("\"PUT\"").unwrap();
    assert_eq!(parsed, Direction::Put);
}

#[test]
fn test_raw_candle_deserialization() {
    let json = r#"{"open":1.1,"high":1.3,"low":1.0,"close":1.2,"time":"2024-01-01T00:00:00Z"}"#;
    let candle: RawCandle = serde_json::from_str(json).unwrap();
    assert_eq!(candle.timestamp, None);
    assert_eq!(candle.parse_time().unwrap().timestamp(), 1_704_067_200);
}

#[test]
fn test_scheduled_signal_json() {
    let candidate = SignalCandidate {
        asset: "EURUSD".to_string(),
        timeframe: Timeframe::M5,
        time: "09:00".parse().unwrap(),
        direction: Direction::Call,
        confidence: 77,
    };
    let slot = Dhaka.with_ymd_and_hms(2024, 3, 10, 7, 35, 0).unwrap();
    let signal = ScheduledSignal::from_candidate(candidate, slot);

    let value = serde_json::to_value(&signal).unwrap();
    assert_eq!(value["asset"], "EURUSD");
    assert_eq!(value["timeframe"], "M5");
    assert_eq!(value["time"], "07:35");
    assert_eq!(value["sourceTime"], "09:00");
    assert_eq!(value["direction"], "CALL");
    assert_eq!(value["confidence"], 77);
}

#[test]
fn test_future_slots_cross_midnight() {
    let reference = Dhaka.with_ymd_and_hms(2024, 3, 10, 23, 50, 0).unwrap();
    let slots = future_slots(Timeframe::M15, 1, &reference);
    let labels: Vec<String> = slots.iter().map(|s| TimeOfDay::of(s).to_string()).collect();
    assert_eq!(labels, vec!["00:00", "00:15", "00:30", "00:45"]);
}
