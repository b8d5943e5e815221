//! Overload resolution and per-element method tables

use super::param::{Arg, Args, Param, ParamKind};
use super::value::ConfigValue;
use crate::error::ConfigError;
use indexmap::IndexMap;

/// Key carrying handler registrations in their original order
pub const ORDERED_KEY: &str = "ordered";

pub type Apply<T> = fn(&mut T, Args) -> Result<(), ConfigError>;
pub type Export<T> = fn(&T) -> Option<ConfigValue>;

/// One accepted calling convention of a configurable method
#[derive(Debug, Clone)]
pub struct Override {
    pub params: Vec<Param>,
    /// Accept the whole payload as the value of the first parameter
    pub single: bool,
}

impl Override {
    pub fn new(params: Vec<Param>) -> Self {
        Self {
            params,
            single: false,
        }
    }

    pub fn single(param: Param) -> Self {
        Self {
            params: vec![param],
            single: true,
        }
    }

    fn names_any_key<'a>(&self, mut keys: impl Iterator<Item = &'a String>) -> bool {
        keys.any(|key| self.params.iter().any(|p| p.accepts_key(key)))
    }

    /// Map a payload onto this override's positional argument list
    pub(crate) fn resolve(&self, method: &str, payload: &ConfigValue) -> Result<Args, ConfigError> {
        let first_takes_list = self
            .params
            .first()
            .map(|p| p.kind.is_list() || p.kind == ParamKind::Any)
            .unwrap_or(false);

        let slots: Vec<Option<ConfigValue>> = match payload {
            ConfigValue::Map(map) if self.single && !self.names_any_key(map.keys()) => {
                vec![Some(payload.clone())]
            }
            ConfigValue::Map(map) => {
                if let Some(unknown) = map
                    .keys()
                    .find(|key| !self.params.iter().any(|p| p.accepts_key(key)))
                {
                    return Err(ConfigError::UnexpectedParam {
                        method: method.to_string(),
                        param: unknown.clone(),
                    });
                }
                self.params
                    .iter()
                    .map(|p| p.names.iter().find_map(|name| map.get(*name)).cloned())
                    .collect()
            }
            ConfigValue::List(_) if self.single && first_takes_list => vec![Some(payload.clone())],
            ConfigValue::List(items) => {
                if items.len() > self.params.len() {
                    return Err(ConfigError::UnexpectedParam {
                        method: method.to_string(),
                        param: format!("#{}", self.params.len()),
                    });
                }
                items.iter().cloned().map(Some).collect()
            }
            other => vec![Some(other.clone())],
        };

        // Positional pass: required parameters must be present; optional ones
        // take their default until one without a default is hit, after which
        // later missing slots stay empty.
        let mut filled = Vec::with_capacity(self.params.len());
        let mut stopped = false;
        for (index, param) in self.params.iter().enumerate() {
            let slot = slots.get(index).cloned().flatten().filter(|v| !v.is_null());
            match slot {
                Some(value) => filled.push(Some(value)),
                None if param.required => {
                    return Err(ConfigError::MissingParam {
                        method: method.to_string(),
                        param: param.name(),
                    })
                }
                None => match (&param.default, stopped) {
                    (Some(default), false) => filled.push(Some(default.clone())),
                    (None, _) => {
                        stopped = true;
                        filled.push(None);
                    }
                    (Some(_), true) => filled.push(None),
                },
            }
        }

        // Conversion pass, slot by slot in place
        let mut args = Vec::with_capacity(filled.len());
        for (param, slot) in self.params.iter().zip(filled) {
            args.push(match slot {
                Some(value) => param.convert(method, value)?,
                None => Arg::Missing,
            });
        }

        Ok(Args::new(args))
    }
}

/// A named configuration entry point with one or more overrides
pub struct ConfigurableMethod<T> {
    pub name: &'static str,
    pub overrides: Vec<Override>,
    apply: Apply<T>,
    export: Option<Export<T>>,
}

impl<T> ConfigurableMethod<T> {
    /// A method backed by a plain property, exported under its own key
    pub fn property(name: &'static str, apply: Apply<T>, export: Export<T>) -> Self {
        Self {
            name,
            overrides: Vec::new(),
            apply,
            export: Some(export),
        }
    }

    /// A method that registers a handler; exported through the ordered list
    pub fn ordered(name: &'static str, apply: Apply<T>) -> Self {
        Self {
            name,
            overrides: Vec::new(),
            apply,
            export: None,
        }
    }

    pub fn overload(mut self, o: Override) -> Self {
        self.overrides.push(o);
        self
    }

    /// Try each override in declaration order; the first that resolves wins.
    /// When none does, the first resolution error is reported.
    pub fn call(&self, target: &mut T, payload: &ConfigValue) -> Result<(), ConfigError> {
        let mut first_error = None;
        for o in &self.overrides {
            match o.resolve(self.name, payload) {
                Ok(args) => return (self.apply)(target, args),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        Err(first_error.unwrap_or_else(|| ConfigError::MissingParam {
            method: self.name.to_string(),
            param: "value",
        }))
    }

    pub fn export(&self, target: &T) -> Option<ConfigValue> {
        self.export.and_then(|export| export(target))
    }
}

/// A handler registration exported for round-tripping
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedEntry {
    pub order: u64,
    pub method: &'static str,
    pub args: Vec<ConfigValue>,
}

impl OrderedEntry {
    /// Trailing empty arguments are dropped; inner gaps become `null`
    pub fn new(order: u64, method: &'static str, mut args: Vec<Option<ConfigValue>>) -> Self {
        while matches!(args.last(), Some(None)) {
            args.pop();
        }
        Self {
            order,
            method,
            args: args.into_iter().map(Option::unwrap_or_default).collect(),
        }
    }

    fn into_config(self) -> ConfigValue {
        ConfigValue::map().with(self.method, ConfigValue::List(self.args))
    }
}

/// Closed registry of configuration keys for one element variant
pub struct MethodTable<T> {
    element: &'static str,
    methods: IndexMap<&'static str, ConfigurableMethod<T>>,
    aliases: IndexMap<&'static str, &'static str>,
}

impl<T: Configurable> MethodTable<T> {
    pub fn new(element: &'static str) -> Self {
        Self {
            element,
            methods: IndexMap::new(),
            aliases: IndexMap::new(),
        }
    }

    pub fn with(mut self, method: ConfigurableMethod<T>) -> Self {
        self.methods.insert(method.name, method);
        self
    }

    pub fn with_all(self, methods: Vec<ConfigurableMethod<T>>) -> Self {
        methods.into_iter().fold(self, MethodTable::with)
    }

    /// Accept `alias` as another key for `name`
    pub fn alias(mut self, alias: &'static str, name: &'static str) -> Self {
        self.aliases.insert(alias, name);
        self
    }

    pub fn get(&self, key: &str) -> Option<&ConfigurableMethod<T>> {
        let key = self.aliases.get(key).copied().unwrap_or(key);
        self.methods.get(key)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.methods.keys().copied()
    }

    /// Invoke one method by key
    pub fn call(&self, target: &mut T, key: &str, payload: &ConfigValue) -> Result<(), ConfigError> {
        let method = self.get(key).ok_or_else(|| ConfigError::UnknownMethod {
            element: self.element,
            method: key.to_string(),
        })?;
        method.call(target, payload)
    }

    /// Apply a configuration object: plain keys in order, then the `ordered` replay list
    pub fn configure(&self, target: &mut T, config: &ConfigValue) -> Result<(), ConfigError> {
        let map = config.as_map().ok_or(ConfigError::NotAnObject {
            method: self.element.to_string(),
        })?;

        for (key, payload) in map.iter().filter(|(key, _)| key.as_str() != ORDERED_KEY) {
            self.call(target, key, payload)?;
        }

        match map.get(ORDERED_KEY) {
            None => {}
            Some(ConfigValue::List(entries)) => {
                for entry in entries {
                    let entry = entry.as_map().ok_or(ConfigError::NotAnObject {
                        method: ORDERED_KEY.to_string(),
                    })?;
                    for (key, payload) in entry {
                        self.call(target, key, payload)?;
                    }
                }
            }
            Some(_) => {
                return Err(ConfigError::InvalidParam {
                    method: ORDERED_KEY.to_string(),
                    param: ORDERED_KEY,
                    expected: "a list of single-key objects",
                })
            }
        }

        Ok(())
    }

    /// Serialize live state back into a configuration object
    pub fn export(&self, target: &T) -> ConfigValue {
        let mut map = IndexMap::new();
        for method in self.methods.values() {
            if let Some(value) = method.export(target) {
                map.insert(method.name.to_string(), value);
            }
        }

        let mut ordered = target.ordered_entries();
        if !ordered.is_empty() {
            ordered.sort_by_key(|entry| entry.order);
            map.insert(
                ORDERED_KEY.to_string(),
                ConfigValue::List(ordered.into_iter().map(OrderedEntry::into_config).collect()),
            );
        }

        ConfigValue::Map(map)
    }
}

/// An element variant that can be built from, and exported to, configuration
pub trait Configurable: Sized + 'static {
    fn methods() -> &'static MethodTable<Self>;

    /// Handler registrations, in any order; export sorts them
    fn ordered_entries(&self) -> Vec<OrderedEntry>;

    /// Invariant checks run after every `configure`
    fn check(&self) -> Result<(), ConfigError> {
        Ok(())
    }

    fn configure(&mut self, config: &ConfigValue) -> Result<(), ConfigError> {
        Self::methods().configure(self, config)?;
        self.check()
    }

    fn configuration(&self) -> ConfigValue {
        Self::methods().export(self)
    }
}
