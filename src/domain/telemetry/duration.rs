//! Duration parsing for telemetry payloads.
//!
//! Accepts the encodings seen on the bus:
//!
//! | Input | Meaning |
//! |-------|---------|
//! | `90`, `12.5` | seconds |
//! | `1h 2m 3s`, `1m30s`, `250ms`, `5 min` | unit-suffixed parts, summed |
//! | `1:30` | minutes:seconds |
//! | `01:02:03` | hours:minutes:seconds |

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::foundation::ParseError;

/// Unit alternation, longest spelling first so `min` wins over `m`.
const UNITS: &str = "ms|millis|milliseconds|hours|hour|hrs|hr|h|minutes|minute|mins|min|m|seconds|second|secs|sec|s";

/// A duration expression as it appears inside free text.
pub(crate) static DURATION_EXPR: Lazy<String> = Lazy::new(|| {
    format!(
        r"(?:(?:\d+(?:\.\d+)?\s*(?:{UNITS})\s*)+|\d+:\d{{1,2}}(?::\d{{1,2}})?|\d+(?:\.\d+)?)"
    )
});

static UNIT_PART: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)(\d+(?:\.\d+)?)\s*({UNITS})")).expect("unit part pattern is valid")
});

static CLOCK_FORM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+):(\d{1,2})(?::(\d{1,2}))?$").expect("clock pattern is valid")
});

/// Parse a duration string in any of the supported encodings.
pub fn parse_duration(raw: &str) -> Result<Duration, ParseError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ParseError::Duration(raw.to_string()));
    }

    if let Ok(secs) = text.parse::<f64>() {
        return seconds(secs).ok_or_else(|| ParseError::Duration(raw.to_string()));
    }

    if let Some(caps) = CLOCK_FORM.captures(text) {
        let first: u64 = caps[1].parse().map_err(|_| ParseError::Duration(raw.to_string()))?;
        let second: u64 = caps[2].parse().map_err(|_| ParseError::Duration(raw.to_string()))?;
        let total = match caps.get(3) {
            Some(third) => {
                let third: u64 = third
                    .as_str()
                    .parse()
                    .map_err(|_| ParseError::Duration(raw.to_string()))?;
                first
                    .checked_mul(3600)
                    .and_then(|t| t.checked_add(second * 60))
                    .and_then(|t| t.checked_add(third))
            }
            None => first.checked_mul(60).and_then(|t| t.checked_add(second)),
        };
        return total
            .map(Duration::from_secs)
            .ok_or_else(|| ParseError::Duration(raw.to_string()));
    }

    let leftover = UNIT_PART.replace_all(text, "");
    if !leftover.trim_matches(|c: char| c.is_whitespace() || c == ',').is_empty() {
        return Err(ParseError::Duration(raw.to_string()));
    }

    let mut total = 0.0_f64;
    let mut matched = false;
    for caps in UNIT_PART.captures_iter(text) {
        let value: f64 = caps[1]
            .parse()
            .map_err(|_| ParseError::Duration(raw.to_string()))?;
        total += value * unit_seconds(&caps[2].to_ascii_lowercase());
        matched = true;
    }

    if !matched {
        return Err(ParseError::Duration(raw.to_string()));
    }
    seconds(total).ok_or_else(|| ParseError::Duration(raw.to_string()))
}

fn unit_seconds(unit: &str) -> f64 {
    match unit {
        "ms" | "millis" | "milliseconds" => 0.001,
        "h" | "hr" | "hrs" | "hour" | "hours" => 3600.0,
        "m" | "min" | "mins" | "minute" | "minutes" => 60.0,
        _ => 1.0,
    }
}

/// Non-negative fractional seconds that fit in a `Duration`.
pub(crate) fn seconds(value: f64) -> Option<Duration> {
    if value < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(value).ok()
}

/// Serde adapter storing a `Duration` as fractional seconds.
pub mod as_secs_f64 {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        super::seconds(secs).ok_or_else(|| {
            serde::de::Error::custom("duration must be a representable non-negative number of seconds")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_numbers_are_seconds() {
        assert_eq!(parse_duration("90").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("1.5").unwrap(), Duration::from_millis(1500));
    }

    #[test]
    fn unit_parts_are_summed() {
        assert_eq!(parse_duration("1h 2m 3s").unwrap(), Duration::from_secs(3723));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("5 min").unwrap(), Duration::from_secs(300));
    }

    #[test]
    fn clock_forms() {
        assert_eq!(parse_duration("1:30").unwrap(), Duration::from_secs(90));
        assert_eq!(parse_duration("01:02:03").unwrap(), Duration::from_secs(3723));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("soon").is_err());
        assert!(parse_duration("3 mistakes").is_err());
        assert!(parse_duration("-4").is_err());
    }

    #[test]
    fn oversized_values_are_rejected() {
        assert!(matches!(parse_duration("1e30"), Err(ParseError::Duration(_))));
        assert!(matches!(
            parse_duration("99999999999999999999h"),
            Err(ParseError::Duration(_))
        ));
        assert!(matches!(
            parse_duration("9999999999999999:00:00"),
            Err(ParseError::Duration(_))
        ));
        assert!(matches!(
            parse_duration("99999999999999999999:00"),
            Err(ParseError::Duration(_))
        ));
    }

    #[test]
    fn serde_rejects_unrepresentable_seconds() {
        #[derive(Debug, serde::Deserialize)]
        struct Wrapper {
            #[serde(with = "as_secs_f64")]
            _value: Duration,
        }
        assert!(serde_json::from_str::<Wrapper>(r#"{"_value": 1e30}"#).is_err());
        assert!(serde_json::from_str::<Wrapper>(r#"{"_value": -1}"#).is_err());
        assert!(serde_json::from_str::<Wrapper>(r#"{"_value": 2.5}"#).is_ok());
    }
}
