//! Partial updates to the rig document.
//!
//! The shared-state endpoint and the event channel both accept loosely
//! shaped partial documents. They are normalized once, here, into
//! [`RigStateUpdate`] and nothing downstream sees the raw shape.

use serde_json::{Map, Value};

use super::state::{PumpStatus, RigState, Tank};
use crate::domain::foundation::{ParseError, Timestamp};
use crate::domain::telemetry::{normalize_valve, ValveState, ValveTelemetry};

/// A valve change as submitted: canonical flags or raw hardware encodings.
#[derive(Debug, Clone, PartialEq)]
pub enum ValveInput {
    Canonical {
        position_a: bool,
        position_b: bool,
        description_a: Option<String>,
        description_b: Option<String>,
    },
    Raw(ValveTelemetry),
}

/// A recognized partial update, in dispatch priority order.
#[derive(Debug, Clone, PartialEq)]
pub enum RigStateUpdate {
    /// `{"pumpId": "p3", "status": "ON"}`
    Pump { pump_id: String, status: PumpStatus },
    /// `{"valveId": "v1", "valve": {...}}`
    Valve { valve_id: String, input: ValveInput },
    /// `{"tanks": [...]}`
    Tanks(Vec<Tank>),
    /// Anything else: shallow merge of top-level fields.
    Merge(Map<String, Value>),
}

impl RigStateUpdate {
    /// Classify a partial document.
    pub fn from_document(doc: Value) -> Result<Self, ParseError> {
        let mut map = match doc {
            Value::Object(map) => map,
            other => {
                return Err(ParseError::Malformed(format!(
                    "state update must be an object, got {}",
                    type_name(&other)
                )))
            }
        };

        if let (Some(pump_id), Some(status)) = (id_field(&map, "pumpId"), map.get("status")) {
            let status = PumpStatus::try_from(status.clone())?;
            return Ok(RigStateUpdate::Pump { pump_id, status });
        }

        if let Some(valve_id) = id_field(&map, "valveId") {
            let body = match map.remove("valve") {
                Some(Value::Object(inner)) => Value::Object(inner),
                Some(Value::String(raw)) => {
                    return Ok(RigStateUpdate::Valve {
                        valve_id,
                        input: ValveInput::Raw(ValveTelemetry::from_payload(&raw)),
                    })
                }
                _ => Value::Object(map),
            };
            return Ok(RigStateUpdate::Valve {
                valve_id,
                input: valve_input(&body),
            });
        }

        if let Some(tanks) = map.remove("tanks") {
            if tanks.is_array() {
                let tanks: Vec<Tank> = serde_json::from_value(tanks)
                    .map_err(|e| ParseError::Malformed(format!("tanks: {}", e)))?;
                return Ok(RigStateUpdate::Tanks(tanks));
            }
            map.insert("tanks".to_string(), tanks);
        }

        Ok(RigStateUpdate::Merge(map))
    }

    /// Apply this update to `state`, refreshing its timestamp.
    ///
    /// Only a valve update in raw encoding can fail, when no live source
    /// is usable and no previous state exists.
    pub fn apply(&self, state: &mut RigState, now: Timestamp) -> Result<(), ParseError> {
        match self {
            RigStateUpdate::Pump { pump_id, status } => state.set_pump(pump_id, *status),
            RigStateUpdate::Valve { valve_id, input } => {
                let resolved = match input {
                    ValveInput::Canonical {
                        position_a,
                        position_b,
                        description_a,
                        description_b,
                    } => {
                        let mut valve = ValveState::from_flags(*position_a, *position_b);
                        if let Some(text) = description_a {
                            valve.description_a = text.clone();
                        }
                        if let Some(text) = description_b {
                            valve.description_b = text.clone();
                        }
                        valve
                    }
                    ValveInput::Raw(telemetry) => {
                        normalize_valve(telemetry, state.valves.get(valve_id))?.0
                    }
                };
                state.set_valve(valve_id, resolved);
            }
            RigStateUpdate::Tanks(tanks) => state.replace_tanks(tanks.clone()),
            RigStateUpdate::Merge(fields) => state.merge_fields(fields.clone()),
        }
        state.touch(now);
        Ok(())
    }
}

fn valve_input(body: &Value) -> ValveInput {
    let flag = |name: &str| body.get(name).and_then(Value::as_bool);
    let text = |name: &str| body.get(name).and_then(Value::as_str).map(str::to_string);
    match (flag("positionA"), flag("positionB")) {
        (Some(position_a), Some(position_b)) => ValveInput::Canonical {
            position_a,
            position_b,
            description_a: text("descriptionA"),
            description_b: text("descriptionB"),
        },
        _ => ValveInput::Raw(ValveTelemetry::from_fields(body)),
    }
}

fn id_field(map: &Map<String, Value>, name: &str) -> Option<String> {
    match map.get(name) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
