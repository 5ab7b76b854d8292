//! Process, sequence and step definitions.
//!
//! Ids are plain strings. An empty id means "not assigned yet"; ids are
//! filled in exactly once, when the entity is first persisted.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::foundation::{ParseError, Timestamp};

/// Entity levels that carry ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Process,
    Sequence,
    Step,
}

impl EntityKind {
    /// Prefix used for generated ids.
    pub fn prefix(&self) -> &'static str {
        match self {
            EntityKind::Process => "proc",
            EntityKind::Sequence => "seq",
            EntityKind::Step => "step",
        }
    }
}

/// One step of a sequence; fields beyond `id` and `kind` are opaque.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceDefinition {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub steps: Vec<StepDefinition>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDefinition {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sequences: Vec<SequenceDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<Timestamp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<Timestamp>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ProcessDefinition {
    /// Same definition ignoring bookkeeping timestamps.
    pub fn same_content(&self, other: &ProcessDefinition) -> bool {
        self.id == other.id
            && self.name == other.name
            && self.sequences == other.sequences
            && self.extra == other.extra
    }
}

/// Whether an id slot still needs to be filled.
pub fn is_unassigned(id: &str) -> bool {
    id.trim().is_empty()
}

/// The accepted body shapes of a process write.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessSubmission {
    One(ProcessDefinition),
    Many(Vec<ProcessDefinition>),
    /// `{ "sequences": [...] }` with nothing else: wrapped into one entry.
    Sequences(Vec<SequenceDefinition>),
}

impl ProcessSubmission {
    pub fn from_value(body: Value) -> Result<Self, ParseError> {
        match body {
            Value::Array(items) => {
                let defs = items
                    .into_iter()
                    .map(|item| match item {
                        Value::Object(_) => serde_json::from_value(item)
                            .map_err(|e| ParseError::Malformed(e.to_string())),
                        other => Err(ParseError::Malformed(format!(
                            "process entries must be objects, got {}",
                            other
                        ))),
                    })
                    .collect::<Result<Vec<ProcessDefinition>, _>>()?;
                Ok(ProcessSubmission::Many(defs))
            }
            Value::Object(map) if map.len() == 1 && map.contains_key("sequences") => {
                let sequences = map.get("sequences").cloned().unwrap_or(Value::Null);
                let sequences: Vec<SequenceDefinition> = serde_json::from_value(sequences)
                    .map_err(|e| ParseError::Malformed(format!("sequences: {}", e)))?;
                Ok(ProcessSubmission::Sequences(sequences))
            }
            Value::Object(map) => serde_json::from_value(Value::Object(map))
                .map(ProcessSubmission::One)
                .map_err(|e| ParseError::Malformed(e.to_string())),
            other => Err(ParseError::Malformed(format!(
                "process body must be an object or array, got {}",
                other
            ))),
        }
    }

    /// Flatten into the list the reconciler consumes.
    pub fn into_definitions(self) -> Vec<ProcessDefinition> {
        match self {
            ProcessSubmission::One(def) => vec![def],
            ProcessSubmission::Many(defs) => defs,
            ProcessSubmission::Sequences(sequences) => vec![ProcessDefinition {
                name: "Untitled process".to_string(),
                sequences,
                ..Default::default()
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn step_keeps_opaque_fields() {
        let step: StepDefinition =
            serde_json::from_value(json!({"kind": "fill", "target": 0.8, "pump": "p1"})).unwrap();
        assert!(is_unassigned(&step.id));
        assert_eq!(step.kind.as_deref(), Some("fill"));
        assert_eq!(step.fields["target"], json!(0.8));

        let back = serde_json::to_value(&step).unwrap();
        assert_eq!(back["pump"], json!("p1"));
    }

    #[test]
    fn submission_shapes() {
        assert!(matches!(
            ProcessSubmission::from_value(json!({"id": "a", "name": "Flush"})).unwrap(),
            ProcessSubmission::One(_)
        ));
        assert!(matches!(
            ProcessSubmission::from_value(json!([{"id": "a"}, {"id": "b"}])).unwrap(),
            ProcessSubmission::Many(ref v) if v.len() == 2
        ));
        assert!(matches!(
            ProcessSubmission::from_value(json!({"sequences": [{"steps": [{}]}]})).unwrap(),
            ProcessSubmission::Sequences(ref v) if v.len() == 1
        ));
    }

    #[test]
    fn sequences_shorthand_wraps_into_one_entry() {
        let defs = ProcessSubmission::from_value(json!({"sequences": [{"steps": [{}]}]}))
            .unwrap()
            .into_definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].sequences[0].steps.len(), 1);
        assert!(is_unassigned(&defs[0].id));
    }

    #[test]
    fn malformed_bodies_are_rejected() {
        assert!(ProcessSubmission::from_value(json!("flush")).is_err());
        assert!(ProcessSubmission::from_value(json!([1, 2])).is_err());
        assert!(ProcessSubmission::from_value(json!({"sequences": "none"})).is_err());
    }

    #[test]
    fn same_content_ignores_timestamps() {
        let a = ProcessDefinition {
            id: "p".to_string(),
            created_at: Some(Timestamp::from_unix_millis(1)),
            ..Default::default()
        };
        let b = ProcessDefinition {
            id: "p".to_string(),
            updated_at: Some(Timestamp::from_unix_millis(2)),
            ..Default::default()
        };
        assert!(a.same_content(&b));
    }
}
