//! Canonical rig state document.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::foundation::{ParseError, Timestamp};
use crate::domain::telemetry::{ProgressState, ValveState};

/// Storage key of the shared rig document.
pub const RIG_STATE_KEY: &str = "rig_state";

/// Top-level fields owned by typed members; a generic merge never touches them.
const RESERVED_FIELDS: &[&str] = &["tanks", "pumps", "valves", "progress", "updatedAt"];

/// Pump run status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE", try_from = "Value")]
pub enum PumpStatus {
    On,
    Off,
}

impl TryFrom<Value> for PumpStatus {
    type Error = ParseError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        let on = match &value {
            Value::Bool(b) => Some(*b),
            Value::Number(n) => match n.as_u64() {
                Some(1) => Some(true),
                Some(0) => Some(false),
                _ => None,
            },
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "on" | "true" | "1" | "running" => Some(true),
                "off" | "false" | "0" | "stopped" => Some(false),
                _ => None,
            },
            _ => None,
        };
        match on {
            Some(true) => Ok(PumpStatus::On),
            Some(false) => Ok(PumpStatus::Off),
            None => Err(ParseError::Malformed(format!("invalid pump status {}", value))),
        }
    }
}

/// A pump as listed under its tank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PumpEntry {
    pub id: String,
    pub status: PumpStatus,
}

/// One tank of the rig.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tank {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<f64>,
    #[serde(default)]
    pub pumps: Vec<PumpEntry>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The shared operational document every session observes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RigState {
    #[serde(default)]
    pub tanks: Vec<Tank>,
    #[serde(default)]
    pub pumps: BTreeMap<String, PumpStatus>,
    #[serde(default)]
    pub valves: BTreeMap<String, ValveState>,
    #[serde(default)]
    pub progress: BTreeMap<String, ProgressState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RigState {
    /// Set one pump, keeping the tank listing in step with the pump map.
    pub fn set_pump(&mut self, pump_id: &str, status: PumpStatus) {
        self.pumps.insert(pump_id.to_string(), status);
        for entry in self.tanks.iter_mut().flat_map(|t| t.pumps.iter_mut()) {
            if entry.id == pump_id {
                entry.status = status;
            }
        }
    }

    /// Replace every tank and rebuild the derived pump map from them.
    pub fn replace_tanks(&mut self, tanks: Vec<Tank>) {
        self.tanks = tanks;
        self.pumps = self
            .tanks
            .iter()
            .flat_map(|t| t.pumps.iter())
            .map(|p| (p.id.clone(), p.status))
            .collect();
    }

    pub fn set_valve(&mut self, valve_id: &str, state: ValveState) {
        self.valves.insert(valve_id.to_string(), state);
    }

    /// Replace one actor's progress sample whole.
    pub fn set_progress(&mut self, actor_id: &str, sample: ProgressState) {
        self.progress.insert(actor_id.to_string(), sample);
    }

    /// Shallow merge of untyped top-level fields.
    pub fn merge_fields(&mut self, fields: Map<String, Value>) {
        for (key, value) in fields {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            self.extra.insert(key, value);
        }
    }

    pub fn touch(&mut self, now: Timestamp) {
        self.updated_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tank(id: &str, pumps: &[(&str, PumpStatus)]) -> Tank {
        Tank {
            id: id.to_string(),
            name: format!("Tank {}", id),
            level: Some(0.5),
            pumps: pumps
                .iter()
                .map(|(id, status)| PumpEntry {
                    id: id.to_string(),
                    status: *status,
                })
                .collect(),
            extra: Map::new(),
        }
    }

    #[test]
    fn pump_status_accepts_loose_encodings() {
        for raw in [json!("ON"), json!("on"), json!(true), json!(1), json!("running")] {
            assert_eq!(PumpStatus::try_from(raw).unwrap(), PumpStatus::On);
        }
        for raw in [json!("OFF"), json!(false), json!(0)] {
            assert_eq!(PumpStatus::try_from(raw).unwrap(), PumpStatus::Off);
        }
        assert!(PumpStatus::try_from(json!("maybe")).is_err());
        assert_eq!(serde_json::to_value(PumpStatus::On).unwrap(), json!("ON"));
    }

    #[test]
    fn replace_tanks_resyncs_pump_map() {
        let mut state = RigState::default();
        state.set_pump("stale", PumpStatus::On);

        state.replace_tanks(vec![
            tank("t1", &[("p1", PumpStatus::On)]),
            tank("t2", &[("p2", PumpStatus::Off), ("p3", PumpStatus::On)]),
        ]);

        assert_eq!(state.pumps.len(), 3);
        assert_eq!(state.pumps["p2"], PumpStatus::Off);
        assert!(!state.pumps.contains_key("stale"));
    }

    #[test]
    fn set_pump_updates_tank_listing() {
        let mut state = RigState::default();
        state.replace_tanks(vec![tank("t1", &[("p3", PumpStatus::Off)])]);

        state.set_pump("p3", PumpStatus::On);

        assert_eq!(state.pumps["p3"], PumpStatus::On);
        assert_eq!(state.tanks[0].pumps[0].status, PumpStatus::On);
    }

    #[test]
    fn merge_skips_typed_fields() {
        let mut state = RigState::default();
        let fields = json!({"mode": "auto", "tanks": "nope", "operator": "night shift"});
        if let Value::Object(map) = fields {
            state.merge_fields(map);
        }
        assert_eq!(state.extra["mode"], json!("auto"));
        assert_eq!(state.extra["operator"], json!("night shift"));
        assert!(state.tanks.is_empty());
        assert!(!state.extra.contains_key("tanks"));
    }

    #[test]
    fn document_roundtrip_keeps_unknown_fields() {
        let doc = json!({
            "tanks": [{"id": "t1", "name": "Feed", "pumps": [{"id": "p1", "status": "on"}]}],
            "pumps": {"p1": "ON"},
            "mode": "manual"
        });
        let state: RigState = serde_json::from_value(doc).unwrap();
        assert_eq!(state.tanks[0].pumps[0].status, PumpStatus::On);
        assert_eq!(state.extra["mode"], json!("manual"));

        let back = serde_json::to_value(&state).unwrap();
        assert_eq!(back["mode"], json!("manual"));
        assert_eq!(back["pumps"]["p1"], json!("ON"));
    }
}
