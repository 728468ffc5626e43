//! Plain-text signal report.
//!
//! Output grammar, one signal per line:
//!
//! ```text
//! EURUSD M5 07:35 CALL
//! GBPUSD_otc M5 07:40 PUT
//!
//! Total signals: 2
//! ```
//!
//! An empty run prints `No signals found` instead.

use crate::types::{Direction, ScheduledSignal, TimeOfDay};
use serde::Serialize;

pub const NO_SIGNALS: &str = "No signals found";
const TOTAL_PREFIX: &str = "Total signals";

/// Render signals in the report grammar.
pub fn render(signals: &[ScheduledSignal]) -> String {
    if signals.is_empty() {
        return format!("{}\n", NO_SIGNALS);
    }
    let mut out = String::new();
    for signal in signals {
        out.push_str(&signal.to_string());
        out.push('\n');
    }
    out.push_str(&format!("\n{}: {}\n", TOTAL_PREFIX, signals.len()));
    out
}

/// A signal row recovered from report text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedSignal {
    pub asset: String,
    /// Timeframe in minutes, as printed after the `M`.
    pub timeframe: u32,
    pub time: TimeOfDay,
    pub direction: Direction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedReport {
    pub signals: Vec<ParsedSignal>,
    /// Total announced by the report, if any.
    pub total: Option<usize>,
    pub no_signals: bool,
}

/// Longest suffix of `token` that is a valid asset symbol.
fn asset_suffix(token: &str) -> Option<&str> {
    let start = token
        .char_indices()
        .rev()
        .take_while(|(_, c)| c.is_ascii_alphanumeric() || *c == '_')
        .last()
        .map(|(i, _)| i)?;
    let tail = &token[start..];
    // The symbol must start with a letter; skip leading digits/underscores.
    let offset = tail.find(|c: char| c.is_ascii_alphabetic())?;
    Some(&tail[offset..])
}

fn parse_timeframe(token: &str) -> Option<u32> {
    let digits = token.strip_prefix('M').or_else(|| token.strip_prefix('m'))?;
    if digits.is_empty() || digits.len() > 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn parse_clock(token: &str) -> Option<TimeOfDay> {
    let bytes = token.as_bytes();
    let shaped = bytes.len() == 5
        && (b'0'..=b'2').contains(&bytes[0])
        && bytes[1].is_ascii_digit()
        && bytes[2] == b':'
        && (b'0'..=b'5').contains(&bytes[3])
        && bytes[4].is_ascii_digit();
    if !shaped {
        return None;
    }
    token.parse().ok()
}

/// CALL/PUT, allowing trailing punctuation but not more word characters.
fn parse_direction(token: &str) -> Option<Direction> {
    let word: String = token
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    Direction::from_label(&word)
}

fn parse_signal_line(line: &str) -> Option<ParsedSignal> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    tokens.windows(4).find_map(|w| {
        Some(ParsedSignal {
            asset: asset_suffix(w[0])?.to_string(),
            timeframe: parse_timeframe(w[1])?,
            time: parse_clock(w[2])?,
            direction: parse_direction(w[3])?,
        })
    })
}

fn parse_total(line: &str) -> Option<usize> {
    let lower = line.to_ascii_lowercase();
    let at = lower.find("total")?;
    let rest = lower[at + "total".len()..].trim_start();
    let rest = rest.strip_prefix("signals")?.trim_start();
    let rest = rest.strip_prefix(':')?.trim_start();
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Extract signal rows, the total and the empty marker from report text.
///
/// Signal rows may appear anywhere in a line; lines matching nothing are
/// ignored.
pub fn parse_report(text: &str) -> ParsedReport {
    let mut report = ParsedReport::default();
    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if let Some(signal) = parse_signal_line(line) {
            report.signals.push(signal);
        } else if let Some(total) = parse_total(line) {
            report.total = Some(total);
        } else if line.contains(NO_SIGNALS) {
            report.no_signals = true;
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SignalCandidate, Timeframe};
    use chrono::TimeZone;
    use chrono_tz::Asia::Dhaka;

    fn scheduled(asset: &str, hour: u32, minute: u32, direction: Direction) -> ScheduledSignal {
        let candidate = SignalCandidate {
            asset: asset.to_string(),
            timeframe: Timeframe::M5,
            time: TimeOfDay::new(6, 0).unwrap(),
            direction,
            confidence: 80,
        };
        let slot = Dhaka.with_ymd_and_hms(2024, 3, 10, hour, minute, 0).unwrap();
        ScheduledSignal::from_candidate(candidate, slot)
    }

    #[test]
    fn test_render_signals() {
        let text = render(&[
            scheduled("EURUSD", 7, 35, Direction::Call),
            scheduled("GBPUSD_otc", 7, 40, Direction::Put),
        ]);
        assert_eq!(
            text,
            "EURUSD M5 07:35 CALL\nGBPUSD_otc M5 07:40 PUT\n\nTotal signals: 2\n"
        );
    }

    #[test]
    fn test_render_empty() {
        assert_eq!(render(&[]), "No signals found\n");
    }

    #[test]
    fn test_parse_round_trip() {
        let signals = vec![
            scheduled("EURUSD", 7, 35, Direction::Call),
            scheduled("AUDCAD_otc", 8, 0, Direction::Put),
        ];
        let parsed = parse_report(&render(&signals));
        assert_eq!(parsed.total, Some(2));
        assert!(!parsed.no_signals);
        assert_eq!(parsed.signals.len(), 2);
        assert_eq!(parsed.signals[1].asset, "AUDCAD_otc");
        assert_eq!(parsed.signals[1].time.to_string(), "08:00");
        assert_eq!(parsed.signals[1].direction, Direction::Put);
    }

    #[test]
    fn test_parse_ignores_noise_and_prefixes() {
        let text = "list created successfully\n\
                    garbage >>EURUSD M5 07:35 call, trailing\n\
                    EURUSD M5 7:35 CALL\n\
                    EURUSD X5 07:35 CALL\n\
                    EURUSD M5 07:35 CALLS\n\
                    total signals : 1";
        let parsed = parse_report(text);
        assert_eq!(parsed.signals.len(), 1);
        assert_eq!(parsed.signals[0].asset, "EURUSD");
        assert_eq!(parsed.signals[0].timeframe, 5);
        assert_eq!(parsed.signals[0].direction, Direction::Call);
        assert_eq!(parsed.total, Some(1));
    }

    #[test]
    fn test_parse_no_signals_marker() {
        let parsed = parse_report("No signals found\n");
        assert!(parsed.no_signals);
        assert!(parsed.signals.is_empty());
        assert_eq!(parsed.total, None);
    }

    #[test]
    fn test_asset_suffix() {
        assert_eq!(asset_suffix(">>EURUSD"), Some("EURUSD"));
        assert_eq!(asset_suffix("9_EUR_otc"), Some("EUR_otc"));
        assert_eq!(asset_suffix("123"), None);
        assert_eq!(asset_suffix("->"), None);
    }
}
