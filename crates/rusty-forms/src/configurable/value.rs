//! Declarative configuration payloads

use crate::handler::{Callback, ComposeHandler};
use indexmap::IndexMap;
use serde_json::Value;

/// A configuration payload: JSON data plus handler callbacks
///
/// JSON arrays and objects are normalized into `List`/`Map`, so `Value`
/// only ever holds scalars. Callbacks compare by identity, which lets an
/// exported configuration compare equal to the one it was built from.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Value(Value),
    List(Vec<ConfigValue>),
    Map(IndexMap<String, ConfigValue>),
    Handler(Callback),
    Compose(ComposeHandler),
}

impl ConfigValue {
    /// Empty configuration object
    pub fn map() -> Self {
        ConfigValue::Map(IndexMap::new())
    }

    /// Add a key to a configuration object, builder style
    ///
    /// Non-object payloads are returned unchanged.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        if let ConfigValue::Map(map) = &mut self {
            map.insert(key.into(), value.into());
        }
        self
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Value(Value::Null))
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, ConfigValue>> {
        match self {
            ConfigValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Plain JSON view; `None` when a callback is embedded
    pub fn to_json(&self) -> Option<Value> {
        match self {
            ConfigValue::Value(v) => Some(v.clone()),
            ConfigValue::List(items) => items
                .iter()
                .map(ConfigValue::to_json)
                .collect::<Option<Vec<_>>>()
                .map(Value::Array),
            ConfigValue::Map(map) => map
                .iter()
                .map(|(k, v)| v.to_json().map(|v| (k.clone(), v)))
                .collect::<Option<serde_json::Map<_, _>>>()
                .map(Value::Object),
            ConfigValue::Handler(_) | ConfigValue::Compose(_) => None,
        }
    }
}

impl Default for ConfigValue {
    fn default() -> Self {
        ConfigValue::Value(Value::Null)
    }
}

impl From<Value> for ConfigValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => ConfigValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                ConfigValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
            scalar => ConfigValue::Value(scalar),
        }
    }
}

impl From<Callback> for ConfigValue {
    fn from(cb: Callback) -> Self {
        ConfigValue::Handler(cb)
    }
}

impl From<ComposeHandler> for ConfigValue {
    fn from(cb: ComposeHandler) -> Self {
        ConfigValue::Compose(cb)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(items: Vec<ConfigValue>) -> Self {
        ConfigValue::List(items)
    }
}

impl From<&str> for ConfigValue {
    fn from(s: &str) -> Self {
        ConfigValue::Value(Value::String(s.to_string()))
    }
}

impl From<String> for ConfigValue {
    fn from(s: String) -> Self {
        ConfigValue::Value(Value::String(s))
    }
}

impl From<bool> for ConfigValue {
    fn from(b: bool) -> Self {
        ConfigValue::Value(Value::Bool(b))
    }
}

impl From<i64> for ConfigValue {
    fn from(n: i64) -> Self {
        ConfigValue::Value(Value::from(n))
    }
}

impl From<f64> for ConfigValue {
    fn from(n: f64) -> Self {
        ConfigValue::Value(Value::from(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_normalizes_collections() {
        let config = ConfigValue::from(json!({"name": "email", "group": ["a", "b"]}));
        let map = config.as_map().unwrap();
        assert_eq!(map["name"], ConfigValue::from("email"));
        assert!(matches!(map["group"], ConfigValue::List(ref items) if items.len() == 2));
    }

    #[test]
    fn test_to_json_round_trip() {
        let value = json!({"a": [1, 2, {"b": null}], "c": true});
        assert_eq!(ConfigValue::from(value.clone()).to_json(), Some(value));
    }

    #[test]
    fn test_to_json_rejects_callbacks() {
        let config = ConfigValue::map().with("validate", Callback::sync(Ok));
        assert_eq!(config.to_json(), None);
    }

    #[test]
    fn test_map_equality_ignores_key_order() {
        let a = ConfigValue::map().with("x", 1i64).with("y", 2i64);
        let b = ConfigValue::map().with("y", 2i64).with("x", 1i64);
        assert_eq!(a, b);
    }
}
