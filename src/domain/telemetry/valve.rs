//! Valve status normalization.
//!
//! Hardware reports the same two-position valve in different encodings.
//! Resolution order when several are present in one update:
//!
//! 1. Flag-description status line, e.g. `A=1 (Open to drain), B=0 (Closed)`
//! 2. Fixed-width positional code, e.g. `10` (position 0 = A, position 1 = B)
//! 3. The previously derived state, only when no live source is usable
//!
//! Descriptions come verbatim from the status line when it carries them,
//! otherwise from [`describe`].

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::foundation::ParseError;

static STATUS_FLAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:position\s*)?([ab])\s*[:=]\s*(true|false|1|0|on|off|open|closed)\b\s*(?:\(([^)]*)\))?",
    )
    .expect("status flag pattern is valid")
});

static POSITION_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[01]{2}$").expect("position code pattern is valid"));

/// Canonical valve state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValveState {
    pub position_a: bool,
    pub position_b: bool,
    pub description_a: String,
    pub description_b: String,
}

impl ValveState {
    /// Builds a state with synthesized descriptions.
    pub fn from_flags(position_a: bool, position_b: bool) -> Self {
        Self {
            position_a,
            position_b,
            description_a: describe(ValveFlag::A, position_a).to_string(),
            description_b: describe(ValveFlag::B, position_b).to_string(),
        }
    }
}

/// Named flag positions of a valve report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveFlag {
    A,
    B,
}

/// Fixed description table used when the live source carries no text.
pub fn describe(flag: ValveFlag, open: bool) -> &'static str {
    match (flag, open) {
        (ValveFlag::A, true) => "Position A open",
        (ValveFlag::A, false) => "Position A closed",
        (ValveFlag::B, true) => "Position B open",
        (ValveFlag::B, false) => "Position B closed",
    }
}

/// Which source won precedence for a normalized update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValveSource {
    StatusLine,
    PositionCode,
    Previous,
}

/// The raw encodings present in one valve update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValveTelemetry {
    pub status_line: Option<String>,
    pub position_code: Option<String>,
}

impl ValveTelemetry {
    /// Classify a raw bus payload.
    ///
    /// JSON objects may carry `statusLine`/`status` and `code`/`statusCode`.
    /// Plain strings are a positional code when they look like one and a
    /// status line otherwise.
    pub fn from_payload(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with('{') {
            if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(trimmed) {
                return Self::from_fields(&Value::Object(map));
            }
        }
        if trimmed.is_empty() {
            return Self::default();
        }
        if POSITION_CODE.is_match(trimmed) {
            Self {
                status_line: None,
                position_code: Some(trimmed.to_string()),
            }
        } else {
            Self {
                status_line: Some(trimmed.to_string()),
                position_code: None,
            }
        }
    }

    /// Extract the encodings from an already-decoded document.
    pub fn from_fields(doc: &Value) -> Self {
        let text_field = |names: &[&str]| {
            names.iter().find_map(|name| match doc.get(*name) {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
        };
        let code = text_field(&["code", "statusCode", "status_code"]).or_else(|| {
            ["code", "statusCode", "status_code"]
                .iter()
                .find_map(|name| doc.get(*name).and_then(Value::as_u64))
                .map(|n| format!("{:02}", n))
        });
        Self {
            status_line: text_field(&["statusLine", "status_line", "status"]),
            position_code: code,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status_line.is_none() && self.position_code.is_none()
    }
}

/// Parse an authoritative flag-description status line.
///
/// Both flags must be present; a line naming only one of them is not
/// authoritative and is rejected.
pub fn parse_status_line(line: &str) -> Result<ValveState, ParseError> {
    let mut a: Option<(bool, Option<String>)> = None;
    let mut b: Option<(bool, Option<String>)> = None;

    for caps in STATUS_FLAG.captures_iter(line) {
        let open = matches!(
            caps[2].to_ascii_lowercase().as_str(),
            "true" | "1" | "on" | "open"
        );
        let text = caps
            .get(3)
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty());
        match caps[1].to_ascii_lowercase().as_str() {
            "a" => a = Some((open, text)),
            _ => b = Some((open, text)),
        }
    }

    match (a, b) {
        (Some((position_a, text_a)), Some((position_b, text_b))) => Ok(ValveState {
            position_a,
            position_b,
            description_a: text_a
                .unwrap_or_else(|| describe(ValveFlag::A, position_a).to_string()),
            description_b: text_b
                .unwrap_or_else(|| describe(ValveFlag::B, position_b).to_string()),
        }),
        _ => Err(ParseError::ValveStatus(line.to_string())),
    }
}

/// Parse a fixed-width positional code.
pub fn parse_position_code(code: &str) -> Result<ValveState, ParseError> {
    let code = code.trim();
    if !POSITION_CODE.is_match(code) {
        return Err(ParseError::ValveStatus(code.to_string()));
    }
    let mut flags = code.chars().map(|c| c == '1');
    match (flags.next(), flags.next()) {
        (Some(a), Some(b)) => Ok(ValveState::from_flags(a, b)),
        _ => Err(ParseError::ValveStatus(code.to_string())),
    }
}

/// Resolve one valve update to canonical state under the precedence rule.
pub fn normalize_valve(
    telemetry: &ValveTelemetry,
    previous: Option<&ValveState>,
) -> Result<(ValveState, ValveSource), ParseError> {
    if let Some(line) = &telemetry.status_line {
        match parse_status_line(line) {
            Ok(state) => return Ok((state, ValveSource::StatusLine)),
            Err(e) => tracing::debug!(error = %e, "Status line unusable, trying position code"),
        }
    }

    if let Some(code) = &telemetry.position_code {
        match parse_position_code(code) {
            Ok(state) => return Ok((state, ValveSource::PositionCode)),
            Err(e) => tracing::debug!(error = %e, "Position code unusable"),
        }
    }

    match previous {
        Some(state) => Ok((state.clone(), ValveSource::Previous)),
        None => Err(ParseError::ValveStatus(format!("{:?}", telemetry))),
    }
}
