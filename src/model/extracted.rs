//! Oracle-facing models for phase extraction
//!
//! These mirror the JSON shapes the prompts ask for, but every field is
//! optional and tolerant of the usual drift in model output: lists given as a
//! single string, numbers where text was expected, key/value objects given as
//! lists of pairs. Conversion to the strict domain entities happens in
//! `service::extraction::converters`.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Extracted operational actor
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractedActor {
    #[serde(deserialize_with = "lenient::optional_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(deserialize_with = "lenient::text", alias = "role")]
    pub role_definition: String,
    #[serde(deserialize_with = "lenient::list")]
    pub responsibilities: Vec<String>,
    #[serde(deserialize_with = "lenient::list")]
    pub capabilities: Vec<String>,
}

/// Extracted operational capability
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractedCapability {
    #[serde(deserialize_with = "lenient::optional_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(deserialize_with = "lenient::text", alias = "mission")]
    pub mission_statement: String,
    #[serde(deserialize_with = "lenient::list")]
    pub involved_actors: Vec<String>,
    #[serde(deserialize_with = "lenient::list")]
    pub performance_constraints: Vec<String>,
}

/// Extracted component (system, logical or physical)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractedComponent {
    #[serde(deserialize_with = "lenient::optional_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(deserialize_with = "lenient::text", alias = "type")]
    pub component_type: String,
    #[serde(deserialize_with = "lenient::list")]
    pub responsibilities: Vec<String>,
    #[serde(deserialize_with = "lenient::optional_text")]
    pub parent_component: Option<String>,
    #[serde(deserialize_with = "lenient::list")]
    pub sub_components: Vec<String>,
    #[serde(deserialize_with = "lenient::list")]
    pub allocated_functions: Vec<String>,
    #[serde(deserialize_with = "lenient::optional_text", alias = "technology")]
    pub technology_platform: Option<String>,
    #[serde(
        deserialize_with = "lenient::list",
        alias = "implements_logical_components"
    )]
    pub implements_components: Vec<String>,
}

/// Extracted function
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractedFunction {
    #[serde(deserialize_with = "lenient::optional_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(deserialize_with = "lenient::optional_text")]
    pub parent_function: Option<String>,
    #[serde(deserialize_with = "lenient::list")]
    pub sub_functions: Vec<String>,
    #[serde(deserialize_with = "lenient::list", alias = "input_specifications")]
    pub inputs: Vec<String>,
    #[serde(deserialize_with = "lenient::list", alias = "output_specifications")]
    pub outputs: Vec<String>,
    #[serde(deserialize_with = "lenient::list")]
    pub behavioral_specifications: Vec<String>,
    #[serde(deserialize_with = "lenient::list", alias = "allocated_component")]
    pub allocated_components: Vec<String>,
    #[serde(deserialize_with = "lenient::list", alias = "parent_system_function")]
    pub realizes_functions: Vec<String>,
    #[serde(deserialize_with = "lenient::list")]
    pub realizes_capabilities: Vec<String>,
}

/// Extracted interface
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractedInterface {
    #[serde(deserialize_with = "lenient::optional_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(deserialize_with = "lenient::text", alias = "type")]
    pub interface_type: String,
    #[serde(deserialize_with = "lenient::optional_text", alias = "provider")]
    pub provider_component: Option<String>,
    #[serde(deserialize_with = "lenient::list", alias = "consumers")]
    pub consumer_components: Vec<String>,
    #[serde(deserialize_with = "lenient::list")]
    pub data_specifications: Vec<String>,
    #[serde(deserialize_with = "lenient::list")]
    pub protocol_specifications: Vec<String>,
    #[serde(deserialize_with = "lenient::map")]
    pub quality_attributes: BTreeMap<String, String>,
    #[serde(deserialize_with = "lenient::list", alias = "supports_system_interfaces")]
    pub refines_interfaces: Vec<String>,
}

/// Extracted scenario step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedStep {
    pub ordinal: Option<u32>,
    pub performer: String,
    pub action: String,
}

/// Extracted data flow
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedFlow {
    pub source: String,
    pub target: String,
    pub interface: Option<String>,
    pub payload: String,
}

/// Extracted scenario
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractedScenario {
    #[serde(deserialize_with = "lenient::optional_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(deserialize_with = "lenient::text", alias = "type")]
    pub scenario_type: String,
    #[serde(deserialize_with = "lenient::list", alias = "involved_actors")]
    pub involved_components: Vec<String>,
    #[serde(deserialize_with = "lenient::list")]
    pub involved_functions: Vec<String>,
    #[serde(deserialize_with = "lenient::steps", alias = "interaction_sequence")]
    pub steps: Vec<ExtractedStep>,
    #[serde(deserialize_with = "lenient::flows")]
    pub data_flows: Vec<ExtractedFlow>,
    #[serde(deserialize_with = "lenient::map")]
    pub performance_characteristics: BTreeMap<String, String>,
    #[serde(
        deserialize_with = "lenient::list",
        alias = "realizes_operational_scenarios"
    )]
    pub realizes_scenarios: Vec<String>,
}

/// Extracted physical implementation constraint
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractedConstraint {
    #[serde(deserialize_with = "lenient::optional_text")]
    pub name: Option<String>,
    #[serde(deserialize_with = "lenient::text")]
    pub description: String,
    #[serde(deserialize_with = "lenient::text", alias = "type")]
    pub constraint_type: String,
    #[serde(deserialize_with = "lenient::list")]
    pub affected_components: Vec<String>,
    #[serde(deserialize_with = "lenient::map")]
    pub specifications: BTreeMap<String, String>,
}

mod lenient {
    use super::*;

    const PAIR_KEYS: &[&str] = &["name", "attribute", "metric", "parameter", "key"];
    const PAIR_VALUES: &[&str] = &["value", "target", "measure", "requirement"];

    /// Render any JSON value as trimmed text
    pub(super) fn value_text(value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::String(s) => s.trim().to_string(),
            Value::Bool(_) | Value::Number(_) => value.to_string(),
            Value::Array(items) => items
                .iter()
                .map(value_text)
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(", "),
            Value::Object(map) => match map.get("name") {
                Some(name) => value_text(name),
                None => value.to_string(),
            },
        }
    }

    fn field_text(map: &serde_json::Map<String, Value>, keys: &[&str]) -> String {
        keys.iter()
            .filter_map(|k| map.get(*k))
            .map(value_text)
            .find(|s| !s.is_empty())
            .unwrap_or_default()
    }

    pub fn text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(value_text(&value))
    }

    pub fn optional_text<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        let text = text(deserializer)?;
        Ok(if text.is_empty() { None } else { Some(text) })
    }

    pub fn list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let items = match value {
            Value::Array(items) => items.iter().map(value_text).collect(),
            other => vec![value_text(&other)],
        };
        Ok(items.into_iter().filter(|s| !s.is_empty()).collect())
    }

    pub fn map<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<BTreeMap<String, String>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let mut out = BTreeMap::new();
        match value {
            Value::Object(map) => {
                for (key, value) in &map {
                    out.insert(key.clone(), value_text(value));
                }
            }
            Value::Array(items) => {
                for item in &items {
                    match item {
                        Value::Object(pair) => {
                            let key = field_text(pair, PAIR_KEYS);
                            if !key.is_empty() {
                                out.insert(key, field_text(pair, PAIR_VALUES));
                            }
                        }
                        other => {
                            let key = value_text(other);
                            if !key.is_empty() {
                                out.insert(key, String::new());
                            }
                        }
                    }
                }
            }
            Value::Null => {}
            other => {
                out.insert("description".to_string(), value_text(&other));
            }
        }
        Ok(out)
    }

    pub fn steps<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<ExtractedStep>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let Value::Array(items) = value else {
            return Ok(Vec::new());
        };

        let steps = items
            .iter()
            .map(|item| match item {
                Value::Object(map) => ExtractedStep {
                    ordinal: ["step", "order", "sequence"]
                        .iter()
                        .filter_map(|k| map.get(*k))
                        .find_map(|v| match v {
                            Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
                            Value::String(s) => s.trim().parse().ok(),
                            _ => None,
                        }),
                    performer: field_text(map, &["component", "actor", "performer", "from"]),
                    action: field_text(map, &["action", "description", "function", "activity"]),
                },
                other => ExtractedStep {
                    ordinal: None,
                    performer: String::new(),
                    action: value_text(other),
                },
            })
            .filter(|s| !s.performer.is_empty() || !s.action.is_empty())
            .collect();

        Ok(steps)
    }

    pub fn flows<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<ExtractedFlow>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let Value::Array(items) = value else {
            return Ok(Vec::new());
        };

        let flows = items
            .iter()
            .filter_map(|item| item.as_object())
            .map(|map| {
                let interface = field_text(map, &["interface", "via"]);
                ExtractedFlow {
                    source: field_text(map, &["from_component", "from", "source"]),
                    target: field_text(map, &["to_component", "to", "target"]),
                    interface: if interface.is_empty() {
                        None
                    } else {
                        Some(interface)
                    },
                    payload: field_text(map, &["data", "payload", "content"]),
                }
            })
            .filter(|f| !f.source.is_empty() || !f.target.is_empty())
            .collect();

        Ok(flows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_component_tolerates_loose_shapes() {
        let component: ExtractedComponent = serde_json::from_value(json!({
            "name": "  Signal Controller ",
            "description": null,
            "type": "Service",
            "responsibilities": "Switch lights",
            "sub_components": [{"name": "Timer"}, "", 42],
            "allocated_functions": null
        }))
        .unwrap();

        assert_eq!(component.name.as_deref(), Some("Signal Controller"));
        assert_eq!(component.description, "");
        assert_eq!(component.component_type, "Service");
        assert_eq!(component.responsibilities, vec!["Switch lights"]);
        assert_eq!(component.sub_components, vec!["Timer", "42"]);
        assert!(component.allocated_functions.is_empty());
    }

    #[test]
    fn test_missing_name_is_none() {
        let actor: ExtractedActor =
            serde_json::from_value(json!({"name": "", "description": "anonymous"})).unwrap();
        assert!(actor.name.is_none());
    }

    #[test]
    fn test_quality_attributes_from_pair_list() {
        let interface: ExtractedInterface = serde_json::from_value(json!({
            "name": "Sensor Bus",
            "quality_attributes": [
                {"attribute": "latency", "value": "10ms"},
                {"metric": "throughput", "target": 500}
            ]
        }))
        .unwrap();

        assert_eq!(interface.quality_attributes.get("latency").unwrap(), "10ms");
        assert_eq!(interface.quality_attributes.get("throughput").unwrap(), "500");
    }

    #[test]
    fn test_scenario_steps_and_flows() {
        let scenario: ExtractedScenario = serde_json::from_value(json!({
            "name": "Emergency Preemption",
            "interaction_sequence": [
                {"step": 2, "component": "Controller", "action": "switch to green"},
                {"step": "1", "component": "Detector", "action": "detect vehicle"},
                "log the event",
                {}
            ],
            "data_flows": [
                {"from_component": "Detector", "to_component": "Controller", "interface": "Sensor Bus", "data": "presence"},
                {"note": "ignored"}
            ]
        }))
        .unwrap();

        assert_eq!(scenario.steps.len(), 3);
        assert_eq!(scenario.steps[0].ordinal, Some(2));
        assert_eq!(scenario.steps[1].ordinal, Some(1));
        assert_eq!(scenario.steps[2].action, "log the event");
        assert_eq!(scenario.data_flows.len(), 1);
        assert_eq!(scenario.data_flows[0].interface.as_deref(), Some("Sensor Bus"));
    }
}
