//! Process progress normalization.
//!
//! A progress sample arrives either as a structured document with named
//! duration fields or as free text such as
//! `Elapsed: 1m 30s, Remaining: 4m 30s  fill(2/5)`. Both reduce to one
//! [`ProgressState`] per actor, which replaces the previous sample whole.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::duration::{self, parse_duration, DURATION_EXPR};
use crate::domain::foundation::ParseError;

/// Lowest percentage shown for an active process, so a run that has just
/// started still renders a visible indicator.
pub const PROGRESS_FLOOR: f64 = 2.0;

static ELAPSED_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\belapsed(?:\s+time)?\s*[:=]?\s*({})", *DURATION_EXPR))
        .expect("elapsed pattern is valid")
});

static REMAINING_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(?:remaining|left)(?:\s+time)?\s*[:=]?\s*({})",
        *DURATION_EXPR
    ))
    .expect("remaining pattern is valid")
});

static REPEAT_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\w+\(\s*(\d+)\s*/\s*(\d+)\s*\)").expect("repeat token pattern is valid")
});

static REPEAT_FRACTION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\d+)\s*/\s*(\d+)\s*$").expect("repeat fraction pattern is valid"));

/// Normalized progress of one actor (e.g. one pump).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressState {
    #[serde(with = "duration::as_secs_f64")]
    pub elapsed: Duration,
    #[serde(with = "duration::as_secs_f64")]
    pub remaining: Duration,
    #[serde(default)]
    pub repeat_current: u32,
    #[serde(default)]
    pub repeat_total: u32,
}

impl ProgressState {
    /// Percentage complete, clamped to `[PROGRESS_FLOOR, 100]`.
    pub fn percent(&self) -> f64 {
        let elapsed = self.elapsed.as_secs_f64();
        let total = elapsed + self.remaining.as_secs_f64();
        if total <= 0.0 {
            return PROGRESS_FLOOR;
        }
        (elapsed / total * 100.0).clamp(PROGRESS_FLOOR, 100.0)
    }

    /// Normalize an already-decoded structured document.
    pub fn from_document(doc: &Value) -> Result<Self, ParseError> {
        let elapsed = duration_field(doc, &["elapsed", "elapsedTime", "elapsed_time"])?;
        let remaining = duration_field(doc, &["remaining", "remainingTime", "remaining_time"])?;
        if elapsed.is_none() && remaining.is_none() {
            return Err(ParseError::Progress(doc.to_string()));
        }

        let (repeat_current, repeat_total) = match doc.get("repeat") {
            Some(Value::String(s)) => parse_repeat_fraction(s).unwrap_or((0, 0)),
            _ => (
                count_field(doc, &["repeatCurrent", "repeat_current"]),
                count_field(doc, &["repeatTotal", "repeat_total"]),
            ),
        };

        Ok(Self {
            elapsed: elapsed.unwrap_or_default(),
            remaining: remaining.unwrap_or_default(),
            repeat_current,
            repeat_total,
        })
    }

    /// Normalize free text carrying labelled durations and a repeat token.
    pub fn from_text(text: &str) -> Result<Self, ParseError> {
        let labelled = |re: &Regex| -> Result<Option<Duration>, ParseError> {
            match re.captures(text) {
                Some(caps) => parse_duration(&caps[1]).map(Some),
                None => Ok(None),
            }
        };
        let elapsed = labelled(&ELAPSED_TEXT)?;
        let remaining = labelled(&REMAINING_TEXT)?;
        if elapsed.is_none() && remaining.is_none() {
            return Err(ParseError::Progress(text.to_string()));
        }

        let (repeat_current, repeat_total) = REPEAT_TOKEN
            .captures(text)
            .and_then(|caps| Some((caps[1].parse().ok()?, caps[2].parse().ok()?)))
            .unwrap_or((0, 0));

        Ok(Self {
            elapsed: elapsed.unwrap_or_default(),
            remaining: remaining.unwrap_or_default(),
            repeat_current,
            repeat_total,
        })
    }
}

/// Normalize a raw progress payload in either encoding.
pub fn parse_progress(raw: &str) -> Result<ProgressState, ParseError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }
    if trimmed.starts_with('{') {
        let doc: Value =
            serde_json::from_str(trimmed).map_err(|e| ParseError::Malformed(e.to_string()))?;
        return ProgressState::from_document(&doc);
    }
    ProgressState::from_text(trimmed)
}

/// Fraction for a raw sample, or `previous` when the sample is unusable.
pub fn progress_fraction(raw: &str, previous: f64) -> f64 {
    match parse_progress(raw) {
        Ok(state) => state.percent(),
        Err(e) => {
            tracing::debug!(error = %e, "Discarding unparseable progress sample");
            previous
        }
    }
}

fn duration_field(doc: &Value, names: &[&str]) -> Result<Option<Duration>, ParseError> {
    for name in names {
        match doc.get(*name) {
            Some(Value::Number(n)) => {
                let secs = n.as_f64().unwrap_or(-1.0);
                return duration::seconds(secs)
                    .map(Some)
                    .ok_or_else(|| ParseError::Duration(n.to_string()));
            }
            Some(Value::String(s)) => return parse_duration(s).map(Some),
            _ => continue,
        }
    }
    Ok(None)
}

fn count_field(doc: &Value, names: &[&str]) -> u32 {
    names
        .iter()
        .find_map(|name| doc.get(*name).and_then(Value::as_u64))
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

fn parse_repeat_fraction(s: &str) -> Option<(u32, u32)> {
    let caps = REPEAT_FRACTION.captures(s)?;
    Some((caps[1].parse().ok()?, caps[2].parse().ok()?))
}
