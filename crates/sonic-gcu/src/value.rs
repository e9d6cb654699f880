//! Tagged-union configuration values.
//!
//! CONFIG_DB content is handled as a [`ConfigValue`] tree: objects keyed by
//! string (table → key → field), arrays, and scalars. Object key order never
//! affects equality or hashing; the map is kept sorted so that two trees with
//! the same content always hash to the same value.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Object payload of a [`ConfigValue`].
pub type ConfigObject = BTreeMap<String, ConfigValue>;

/// Leaf value of a configuration tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
}

impl Scalar {
    /// Renders the scalar the way CONFIG_DB stores it (every field is a string).
    pub fn to_db_string(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Number(n) => n.to_string(),
            Scalar::String(s) => s.clone(),
        }
    }
}

/// A node of a configuration tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum ConfigValue {
    Object(ConfigObject),
    Array(Vec<ConfigValue>),
    Scalar(Scalar),
}

/// A whole configuration: an object of named tables.
pub type ConfigTree = ConfigValue;

impl ConfigValue {
    /// Returns an empty object.
    pub fn empty_object() -> Self {
        ConfigValue::Object(ConfigObject::new())
    }

    /// Builds a string scalar.
    pub fn string(s: impl Into<String>) -> Self {
        ConfigValue::Scalar(Scalar::String(s.into()))
    }

    /// Builds a null scalar.
    pub fn null() -> Self {
        ConfigValue::Scalar(Scalar::Null)
    }

    pub fn is_object(&self) -> bool {
        matches!(self, ConfigValue::Object(_))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, ConfigValue::Array(_))
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, ConfigValue::Scalar(_))
    }

    pub fn as_object(&self) -> Option<&ConfigObject> {
        match self {
            ConfigValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_object_mut(&mut self) -> Option<&mut ConfigObject> {
        match self {
            ConfigValue::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<ConfigValue>> {
        match self {
            ConfigValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the string payload of a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Renders a scalar as its CONFIG_DB string form.
    ///
    /// Returns `None` for objects and arrays.
    pub fn scalar_string(&self) -> Option<String> {
        match self {
            ConfigValue::Scalar(s) => Some(s.to_db_string()),
            _ => None,
        }
    }

    /// Looks up a direct child of an object.
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Short name of the node kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            ConfigValue::Object(_) => "object",
            ConfigValue::Array(_) => "array",
            ConfigValue::Scalar(Scalar::Null) => "null",
            ConfigValue::Scalar(Scalar::Bool(_)) => "bool",
            ConfigValue::Scalar(Scalar::Number(_)) => "number",
            ConfigValue::Scalar(Scalar::String(_)) => "string",
        }
    }

    /// Converts into a `serde_json::Value`.
    pub fn to_json(&self) -> Value {
        Value::from(self.clone())
    }
}

impl Default for ConfigValue {
    fn default() -> Self {
        ConfigValue::empty_object()
    }
}

impl From<Value> for ConfigValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ConfigValue::Scalar(Scalar::Null),
            Value::Bool(b) => ConfigValue::Scalar(Scalar::Bool(b)),
            Value::Number(n) => ConfigValue::Scalar(Scalar::Number(n)),
            Value::String(s) => ConfigValue::Scalar(Scalar::String(s)),
            Value::Array(items) => {
                ConfigValue::Array(items.into_iter().map(ConfigValue::from).collect())
            }
            Value::Object(map) => ConfigValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, ConfigValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<ConfigValue> for Value {
    fn from(value: ConfigValue) -> Self {
        match value {
            ConfigValue::Scalar(Scalar::Null) => Value::Null,
            ConfigValue::Scalar(Scalar::Bool(b)) => Value::Bool(b),
            ConfigValue::Scalar(Scalar::Number(n)) => Value::Number(n),
            ConfigValue::Scalar(Scalar::String(s)) => Value::String(s),
            ConfigValue::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            ConfigValue::Object(map) => {
                let mut out = Map::new();
                for (k, v) in map {
                    out.insert(k, Value::from(v));
                }
                Value::Object(out)
            }
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::string(s)
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::string(s)
    }
}

impl From<ConfigObject> for ConfigValue {
    fn from(map: ConfigObject) -> Self {
        ConfigValue::Object(map)
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_key_order_is_irrelevant() {
        let a = ConfigValue::from(json!({"b": "1", "a": "2"}));
        let b = ConfigValue::from(json!({"a": "2", "b": "1"}));
        assert_eq!(a, b);
    }

    #[test]
    fn test_json_round_trip_preserves_content() {
        let raw = json!({"PORT": {"Ethernet0": {"speed": 100000, "lanes": ["0", "1"], "up": true}}});
        let value = ConfigValue::from(raw.clone());
        assert_eq!(value.to_json(), raw);
    }

    #[test]
    fn test_serde_uses_plain_json() {
        let value: ConfigValue = serde_json::from_str(r#"{"VLAN": {"Vlan10": {"vlanid": "10"}}}"#).unwrap();
        assert_eq!(
            value.get("VLAN").and_then(|t| t.get("Vlan10")).and_then(|e| e.get("vlanid")),
            Some(&ConfigValue::string("10"))
        );
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"{"VLAN":{"Vlan10":{"vlanid":"10"}}}"#);
    }

    #[test]
    fn test_scalar_string() {
        assert_eq!(ConfigValue::from(json!(235)).scalar_string(), Some("235".to_string()));
        assert_eq!(ConfigValue::from(json!("rs")).scalar_string(), Some("rs".to_string()));
        assert_eq!(ConfigValue::from(json!(true)).scalar_string(), Some("true".to_string()));
        assert_eq!(ConfigValue::from(json!({})).scalar_string(), None);
    }

    #[test]
    fn test_kind() {
        assert_eq!(ConfigValue::empty_object().kind(), "object");
        assert_eq!(ConfigValue::from(json!([])).kind(), "array");
        assert_eq!(ConfigValue::null().kind(), "null");
    }
}
