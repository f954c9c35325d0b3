use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Identifier assigned by the backend to a created entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct EntityId(pub i64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<EntityId> for FieldValue {
    fn from(id: EntityId) -> Self {
        FieldValue::Int(id.0)
    }
}

/// Scalar value sent to (or read from) the entity backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(value) => Some(*value),
            FieldValue::Text(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    /// Convert a YAML scalar. Mappings, sequences and tagged values yield `None`.
    pub fn from_yaml(value: &serde_yaml::Value) -> Option<Self> {
        match value {
            serde_yaml::Value::Null => Some(FieldValue::Null),
            serde_yaml::Value::Bool(value) => Some(FieldValue::Bool(*value)),
            serde_yaml::Value::Number(number) => {
                if let Some(value) = number.as_i64() {
                    Some(FieldValue::Int(value))
                } else {
                    number.as_f64().map(FieldValue::Float)
                }
            }
            serde_yaml::Value::String(value) => Some(FieldValue::Text(value.clone())),
            _ => None,
        }
    }

    pub fn to_yaml(&self) -> serde_yaml::Value {
        match self {
            FieldValue::Null => serde_yaml::Value::Null,
            FieldValue::Bool(value) => serde_yaml::Value::Bool(*value),
            FieldValue::Int(value) => serde_yaml::Value::Number((*value).into()),
            FieldValue::Float(value) => serde_yaml::Value::Number((*value).into()),
            FieldValue::Text(value) => serde_yaml::Value::String(value.clone()),
        }
    }

    /// Interpret loosely typed text such as a filter term (`5`, `true`, `Individual`).
    pub fn parse_scalar(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed {
            "" | "null" => return FieldValue::Null,
            "true" => return FieldValue::Bool(true),
            "false" => return FieldValue::Bool(false),
            _ => {}
        }
        if let Ok(value) = trimmed.parse::<i64>() {
            return FieldValue::Int(value);
        }
        if let Ok(value) = trimmed.parse::<f64>() {
            return FieldValue::Float(value);
        }
        FieldValue::Text(trimmed.to_string())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Null => f.write_str("null"),
            FieldValue::Bool(value) => write!(f, "{value}"),
            FieldValue::Int(value) => write!(f, "{value}"),
            FieldValue::Float(value) => write!(f, "{value}"),
            FieldValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

/// Concrete field values for one create call.
pub type FieldValues = BTreeMap<String, FieldValue>;

/// Equality filter for bulk fetches. Keys are kept sorted.
pub type Filter = BTreeMap<String, FieldValue>;

/// Cache key for an (entity type, filter) pair.
///
/// Filters are serialized in key order, so two filters with the same terms
/// always map to the same key regardless of how they were assembled.
pub fn filter_key(entity: &str, filter: Option<&Filter>) -> String {
    match filter {
        Some(filter) if !filter.is_empty() => {
            let terms = filter
                .iter()
                .map(|(key, value)| {
                    let value = serde_json::to_string(value).unwrap_or_else(|_| value.to_string());
                    format!("{key:?}:{value}")
                })
                .collect::<Vec<_>>()
                .join(",");
            format!("{entity}{{{terms}}}")
        }
        _ => entity.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_key_ignores_insertion_order() {
        let mut left = Filter::new();
        left.insert("b".to_string(), FieldValue::Int(1));
        left.insert("a".to_string(), FieldValue::Int(2));

        let mut right = Filter::new();
        right.insert("a".to_string(), FieldValue::Int(2));
        right.insert("b".to_string(), FieldValue::Int(1));

        assert_eq!(
            filter_key("Contact", Some(&left)),
            filter_key("Contact", Some(&right))
        );
        assert_eq!(filter_key("Contact", Some(&left)), r#"Contact{"a":2,"b":1}"#);
    }

    #[test]
    fn empty_filter_uses_bare_entity_key() {
        assert_eq!(filter_key("Event", None), "Event");
        assert_eq!(filter_key("Event", Some(&Filter::new())), "Event");
    }

    #[test]
    fn parse_scalar_detects_types() {
        assert_eq!(FieldValue::parse_scalar("5"), FieldValue::Int(5));
        assert_eq!(FieldValue::parse_scalar("false"), FieldValue::Bool(false));
        assert_eq!(FieldValue::parse_scalar("1.5"), FieldValue::Float(1.5));
        assert_eq!(
            FieldValue::parse_scalar("Individual"),
            FieldValue::Text("Individual".to_string())
        );
    }

    #[test]
    fn yaml_scalars_convert() {
        let value: serde_yaml::Value = serde_yaml::from_str("42").expect("yaml");
        assert_eq!(FieldValue::from_yaml(&value), Some(FieldValue::Int(42)));
        let value: serde_yaml::Value = serde_yaml::from_str("[1, 2]").expect("yaml");
        assert_eq!(FieldValue::from_yaml(&value), None);
    }
}
