//! Typed parameter descriptors and the converted argument list

use super::value::ConfigValue;
use crate::error::ConfigError;
use crate::handler::{Callback, ComposeHandler};
use serde_json::{Map, Value};

/// What a parameter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Bool,
    Int,
    Float,
    String,
    Object,
    Array,
    Strings,
    Any,
    Callback,
    Callbacks,
    Compose,
    Configs,
}

impl ParamKind {
    pub fn expected(&self) -> &'static str {
        match self {
            ParamKind::Bool => "a boolean",
            ParamKind::Int => "an integer",
            ParamKind::Float => "a number",
            ParamKind::String => "a string",
            ParamKind::Object => "an object",
            ParamKind::Array => "an array",
            ParamKind::Strings => "a string or list of strings",
            ParamKind::Any => "a plain value",
            ParamKind::Callback => "a callback",
            ParamKind::Callbacks => "a callback or list of callbacks",
            ParamKind::Compose => "a compose hook or list of compose hooks",
            ParamKind::Configs => "a configuration object or list of them",
        }
    }

    /// Kinds whose value is itself a list
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            ParamKind::Array
                | ParamKind::Strings
                | ParamKind::Callbacks
                | ParamKind::Compose
                | ParamKind::Configs
        )
    }
}

/// One parameter of an override
#[derive(Debug, Clone)]
pub struct Param {
    /// Accepted names; the first is canonical
    pub names: &'static [&'static str],
    pub kind: ParamKind,
    pub required: bool,
    pub default: Option<ConfigValue>,
}

impl Param {
    pub fn required(names: &'static [&'static str], kind: ParamKind) -> Self {
        Self {
            names,
            kind,
            required: true,
            default: None,
        }
    }

    pub fn optional(names: &'static [&'static str], kind: ParamKind) -> Self {
        Self {
            names,
            kind,
            required: false,
            default: None,
        }
    }

    /// Optional with a default used when the parameter is missing
    pub fn default(mut self, value: impl Into<ConfigValue>) -> Self {
        self.required = false;
        self.default = Some(value.into());
        self
    }

    pub fn name(&self) -> &'static str {
        self.names.first().copied().unwrap_or("value")
    }

    pub(crate) fn accepts_key(&self, key: &str) -> bool {
        self.names.contains(&key)
    }

    /// Validate and convert one payload slot
    pub(crate) fn convert(&self, method: &str, value: ConfigValue) -> Result<Arg, ConfigError> {
        let invalid = || ConfigError::InvalidParam {
            method: method.to_string(),
            param: self.name(),
            expected: self.kind.expected(),
        };

        let arg = match (self.kind, value) {
            (ParamKind::Bool, ConfigValue::Value(Value::Bool(b))) => Arg::Bool(b),
            (ParamKind::Bool, ConfigValue::Value(Value::String(s))) => match s.as_str() {
                "true" => Arg::Bool(true),
                "false" => Arg::Bool(false),
                _ => return Err(invalid()),
            },

            (ParamKind::Int, ConfigValue::Value(v @ (Value::Number(_) | Value::String(_)))) => {
                Arg::Int(crate::value::to_whole(&v).ok_or_else(invalid)?)
            }

            (ParamKind::Float, ConfigValue::Value(Value::Number(n))) => {
                Arg::Float(n.as_f64().ok_or_else(invalid)?)
            }
            (ParamKind::Float, ConfigValue::Value(Value::String(s))) => {
                Arg::Float(s.trim().parse().map_err(|_| invalid())?)
            }

            (ParamKind::String, ConfigValue::Value(Value::String(s))) => Arg::Str(s),
            (ParamKind::String, ConfigValue::Value(v @ (Value::Number(_) | Value::Bool(_)))) => {
                Arg::Str(crate::value::to_text(&v))
            }

            (ParamKind::Object, v @ ConfigValue::Map(_)) => match v.to_json() {
                Some(Value::Object(map)) => Arg::Object(map),
                _ => return Err(invalid()),
            },

            (ParamKind::Array, v @ ConfigValue::List(_)) => match v.to_json() {
                Some(Value::Array(items)) => Arg::Array(items),
                _ => return Err(invalid()),
            },

            (ParamKind::Strings, ConfigValue::Value(Value::String(s))) => Arg::Strings(vec![s]),
            (ParamKind::Strings, ConfigValue::List(items)) => Arg::Strings(
                items
                    .into_iter()
                    .map(|item| match item {
                        ConfigValue::Value(v @ (Value::String(_) | Value::Number(_))) => {
                            Ok(crate::value::to_text(&v))
                        }
                        _ => Err(invalid()),
                    })
                    .collect::<Result<_, _>>()?,
            ),

            (ParamKind::Any, v) => Arg::Any(v.to_json().ok_or_else(invalid)?),

            (ParamKind::Callback, ConfigValue::Handler(cb)) => Arg::Callback(cb),

            (ParamKind::Callbacks, ConfigValue::Handler(cb)) => Arg::Callbacks(vec![cb]),
            (ParamKind::Callbacks, ConfigValue::List(items)) => Arg::Callbacks(
                items
                    .into_iter()
                    .map(|item| match item {
                        ConfigValue::Handler(cb) => Ok(cb),
                        _ => Err(invalid()),
                    })
                    .collect::<Result<_, _>>()?,
            ),

            (ParamKind::Compose, ConfigValue::Compose(cb)) => Arg::Compose(vec![cb]),
            (ParamKind::Compose, ConfigValue::List(items)) => Arg::Compose(
                items
                    .into_iter()
                    .map(|item| match item {
                        ConfigValue::Compose(cb) => Ok(cb),
                        _ => Err(invalid()),
                    })
                    .collect::<Result<_, _>>()?,
            ),

            (ParamKind::Configs, v @ ConfigValue::Map(_)) => Arg::Configs(vec![v]),
            (ParamKind::Configs, ConfigValue::List(items)) => {
                if items.iter().any(|item| item.as_map().is_none()) {
                    return Err(invalid());
                }
                Arg::Configs(items)
            }

            _ => return Err(invalid()),
        };

        Ok(arg)
    }
}

/// A validated, converted argument
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Missing,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Strings(Vec<String>),
    Object(Map<String, Value>),
    Array(Vec<Value>),
    Any(Value),
    Callback(Callback),
    Callbacks(Vec<Callback>),
    Compose(Vec<ComposeHandler>),
    Configs(Vec<ConfigValue>),
}

/// Positional argument list handed to a method's apply function
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args(Vec<Arg>);

impl Args {
    pub fn new(args: Vec<Arg>) -> Self {
        Self(args)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Take the argument at `index`, leaving `Missing` behind
    pub fn take(&mut self, index: usize) -> Arg {
        self.0
            .get_mut(index)
            .map(|slot| std::mem::replace(slot, Arg::Missing))
            .unwrap_or(Arg::Missing)
    }

    pub fn bool(&mut self, index: usize) -> Option<bool> {
        match self.take(index) {
            Arg::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn int(&mut self, index: usize) -> Option<i64> {
        match self.take(index) {
            Arg::Int(i) => Some(i),
            _ => None,
        }
    }

    pub fn float(&mut self, index: usize) -> Option<f64> {
        match self.take(index) {
            Arg::Float(f) => Some(f),
            Arg::Int(i) => Some(i as f64),
            _ => None,
        }
    }

    pub fn string(&mut self, index: usize) -> Option<String> {
        match self.take(index) {
            Arg::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn strings(&mut self, index: usize) -> Option<Vec<String>> {
        match self.take(index) {
            Arg::Strings(s) => Some(s),
            _ => None,
        }
    }

    pub fn object(&mut self, index: usize) -> Option<Map<String, Value>> {
        match self.take(index) {
            Arg::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn array(&mut self, index: usize) -> Option<Vec<Value>> {
        match self.take(index) {
            Arg::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn any(&mut self, index: usize) -> Option<Value> {
        match self.take(index) {
            Arg::Any(v) => Some(v),
            _ => None,
        }
    }

    pub fn callback(&mut self, index: usize) -> Option<Callback> {
        match self.take(index) {
            Arg::Callback(cb) => Some(cb),
            _ => None,
        }
    }

    pub fn callbacks(&mut self, index: usize) -> Option<Vec<Callback>> {
        match self.take(index) {
            Arg::Callbacks(cbs) => Some(cbs),
            Arg::Callback(cb) => Some(vec![cb]),
            _ => None,
        }
    }

    pub fn compose(&mut self, index: usize) -> Option<Vec<ComposeHandler>> {
        match self.take(index) {
            Arg::Compose(cbs) => Some(cbs),
            _ => None,
        }
    }

    pub fn configs(&mut self, index: usize) -> Option<Vec<ConfigValue>> {
        match self.take(index) {
            Arg::Configs(configs) => Some(configs),
            _ => None,
        }
    }
}
