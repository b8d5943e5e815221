// File: src/element/rules.rs
// Purpose: Registered handlers and the built-in process/validate rules

use crate::configurable::{ConfigValue, OrderedEntry};
use crate::handler::{Callback, Phase};
use crate::value::to_text;
use serde::Serialize;
use serde_json::{Map, Value};

/// Type coercion applied by a `convert` process handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    Bool,
    Int,
    Float,
    String,
}

impl Conversion {
    pub fn name(&self) -> &'static str {
        match self {
            Conversion::Bool => "bool",
            Conversion::Int => "int",
            Conversion::Float => "float",
            Conversion::String => "string",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "bool" | "boolean" => Some(Conversion::Bool),
            "int" | "integer" => Some(Conversion::Int),
            "float" | "number" => Some(Conversion::Float),
            "string" | "text" => Some(Conversion::String),
            _ => None,
        }
    }
}

/// One allowed value of an input, with its display label
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputOption {
    pub value: Value,
    pub label: String,
}

impl InputOption {
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            label: label.into(),
        }
    }

    /// `"a"`, `3` or `{"value": .., "label": ..}`
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(mut map) => {
                let value = map.remove("value").unwrap_or(Value::Null);
                let label = map
                    .remove("label")
                    .map(|l| to_text(&l))
                    .unwrap_or_else(|| to_text(&value));
                Self { value, label }
            }
            other => Self {
                label: to_text(&other),
                value: other,
            },
        }
    }

    pub(crate) fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("value".to_string(), self.value.clone());
        map.insert("label".to_string(), Value::String(self.label.clone()));
        Value::Object(map)
    }
}

impl From<&str> for InputOption {
    fn from(value: &str) -> Self {
        Self::new(value, value)
    }
}

impl From<(&str, &str)> for InputOption {
    fn from((value, label): (&str, &str)) -> Self {
        Self::new(value, label)
    }
}

impl From<Value> for InputOption {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

/// What a registered handler does
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    Required,
    Size { min: Option<usize>, max: Option<usize> },
    Min(f64),
    Max(f64),
    Options(Vec<InputOption>),
    Blacklist(Vec<String>),
    Match(String),
    Is(String),
    Convert(Conversion),
    Handler(Callback),
}

/// A handler registered on an element, stamped with its registration order
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteHandler {
    pub(crate) order: u64,
    pub(crate) phase: Phase,
    pub(crate) rule: Rule,
    pub(crate) error: Option<String>,
}

impl ExecuteHandler {
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The configuration call that recreates this handler
    pub(crate) fn export(&self) -> OrderedEntry {
        let error = self.error.clone().map(ConfigValue::from);
        let (method, args): (&'static str, Vec<Option<ConfigValue>>) = match (&self.phase, &self.rule) {
            (_, Rule::Required) => ("required", vec![Some(true.into()), error]),
            (_, Rule::Size { min, max }) => (
                "size",
                vec![
                    min.map(|m| ConfigValue::from(m as i64)),
                    max.map(|m| ConfigValue::from(m as i64)),
                    error,
                ],
            ),
            (_, Rule::Min(n)) => ("min", vec![Some((*n).into()), error]),
            (_, Rule::Max(n)) => ("max", vec![Some((*n).into()), error]),
            (_, Rule::Options(options)) => (
                "options",
                vec![
                    Some(ConfigValue::List(
                        options.iter().map(|o| ConfigValue::from(o.to_json())).collect(),
                    )),
                    error,
                ],
            ),
            (_, Rule::Blacklist(values)) => (
                "blacklist",
                vec![
                    Some(ConfigValue::List(values.iter().map(|v| v.as_str().into()).collect())),
                    error,
                ],
            ),
            (_, Rule::Match(path)) => ("match", vec![Some(path.as_str().into()), error]),
            (_, Rule::Is(kind)) => ("is", vec![Some(kind.as_str().into()), error]),
            (_, Rule::Convert(conversion)) => ("convert", vec![Some(conversion.name().into()), error]),
            (Phase::Action(name), Rule::Handler(cb)) => (
                "action",
                vec![Some(name.as_str().into()), Some(cb.clone().into()), error],
            ),
            (phase, Rule::Handler(cb)) => (phase.method_name(), vec![Some(cb.clone().into()), error]),
        };
        OrderedEntry::new(self.order, method, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_conversion_names() {
        for conversion in [Conversion::Bool, Conversion::Int, Conversion::Float, Conversion::String] {
            assert_eq!(Conversion::parse(conversion.name()), Some(conversion));
        }
        assert_eq!(Conversion::parse("date"), None);
    }

    #[test]
    fn test_option_from_value() {
        assert_eq!(InputOption::from_value(json!("red")), InputOption::new("red", "red"));
        assert_eq!(
            InputOption::from_value(json!({"value": 1, "label": "One"})),
            InputOption::new(1, "One")
        );
        assert_eq!(InputOption::from_value(json!({"value": 2})), InputOption::new(2, "2"));
    }

    #[test]
    fn test_export_size_keeps_gap_as_null() {
        let handler = ExecuteHandler {
            order: 4,
            phase: Phase::Validate,
            rule: Rule::Size { min: None, max: Some(10) },
            error: None,
        };
        let entry = handler.export();
        assert_eq!(entry.method, "size");
        assert_eq!(entry.args, vec![ConfigValue::default(), ConfigValue::from(10i64)]);
    }

    #[test]
    fn test_export_action_handler() {
        let cb = Callback::sync(Ok);
        let handler = ExecuteHandler {
            order: 0,
            phase: Phase::Action("save".into()),
            rule: Rule::Handler(cb.clone()),
            error: None,
        };
        let entry = handler.export();
        assert_eq!(entry.method, "action");
        assert_eq!(entry.args, vec![ConfigValue::from("save"), ConfigValue::Handler(cb)]);
    }
}
