// File: src/element/input.rs
// Purpose: Leaf element holding one submitted value

use super::page::SpecialAction;
use super::rules::{Conversion, InputOption, Rule};
use super::{element_methods, ElementBase, HasBase};
use crate::configurable::{
    Arg, ConfigValue, Configurable, ConfigurableMethod, MethodTable, OrderedEntry, Override, Param, ParamKind,
};
use crate::error::ConfigError;
use crate::handler::{Callback, ElementKind, Phase};
use crate::value::{is_empty, same_text};
use once_cell::sync::Lazy;
use serde_json::Value;

/// A value→action binding armed from the submitted raw value
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub(crate) order: u64,
    pub action: String,
    /// `None` arms on any non-empty value
    pub value: Option<Value>,
    pub context: Value,
}

impl Trigger {
    pub fn special(&self) -> Option<SpecialAction> {
        SpecialAction::from_name(&self.action)
    }

    pub(crate) fn matches(&self, raw: &Value) -> bool {
        if is_empty(raw) {
            return false;
        }
        match (&self.value, raw) {
            (None, _) => true,
            (Some(expected), Value::Array(items)) => items.iter().any(|item| same_text(item, expected)),
            (Some(expected), raw) => same_text(raw, expected),
        }
    }

    fn export(&self) -> OrderedEntry {
        OrderedEntry::new(
            self.order,
            "trigger",
            vec![
                Some(self.action.as_str().into()),
                self.value.clone().map(ConfigValue::from),
                (!self.context.is_null()).then(|| self.context.clone().into()),
            ],
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct Input {
    pub(crate) base: ElementBase,
    pub(crate) input_type: Option<String>,
    pub(crate) default_value: Option<Value>,
    pub(crate) permanent_value: Option<Value>,
    pub(crate) override_value: Option<Value>,
    pub(crate) secure: bool,
    pub(crate) keep: bool,
    pub(crate) triggers: Vec<Trigger>,
}

impl HasBase for Input {
    const KIND: ElementKind = ElementKind::Input;

    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }
}

impl Input {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: ElementBase::named(name),
            ..Self::default()
        }
    }

    /// Build from a declarative configuration object
    pub fn from_config(config: &ConfigValue) -> Result<Self, ConfigError> {
        let mut input = Self::default();
        input.configure(config)?;
        Ok(input)
    }

    fn rule(mut self, phase: Phase, rule: Rule) -> Self {
        self.base.push_handler(phase, rule, None);
        self
    }

    pub fn required(self) -> Self {
        self.rule(Phase::Validate, Rule::Required)
    }

    /// Length bounds, in characters for text and items for lists
    pub fn size(self, min: impl Into<Option<usize>>, max: impl Into<Option<usize>>) -> Self {
        self.rule(
            Phase::Validate,
            Rule::Size {
                min: min.into(),
                max: max.into(),
            },
        )
    }

    pub fn min_length(self, min: usize) -> Self {
        self.size(min, None)
    }

    pub fn max_length(self, max: usize) -> Self {
        self.size(None, max)
    }

    pub fn min(self, min: f64) -> Self {
        self.rule(Phase::Validate, Rule::Min(min))
    }

    pub fn max(self, max: f64) -> Self {
        self.rule(Phase::Validate, Rule::Max(max))
    }

    /// Restrict the value to a set of allowed options
    pub fn options<I, O>(self, options: I) -> Self
    where
        I: IntoIterator<Item = O>,
        O: Into<InputOption>,
    {
        let options = options.into_iter().map(Into::into).collect();
        self.rule(Phase::Validate, Rule::Options(options))
    }

    pub fn blacklist<I, S>(self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.rule(Phase::Validate, Rule::Blacklist(values))
    }

    /// Require the value to equal another element's value
    pub fn matches(self, path: impl Into<String>) -> Self {
        self.rule(Phase::Validate, Rule::Match(path.into()))
    }

    /// Check the value against a named predicate (`email`, `url`, ...)
    pub fn is(self, kind: impl Into<String>) -> Self {
        self.rule(Phase::Validate, Rule::Is(kind.into()))
    }

    pub fn convert(self, conversion: Conversion) -> Self {
        self.rule(Phase::Process, Rule::Convert(conversion))
    }

    pub fn process(self, cb: Callback) -> Self {
        self.rule(Phase::Process, Rule::Handler(cb))
    }

    pub fn validate(self, cb: Callback) -> Self {
        self.rule(Phase::Validate, Rule::Handler(cb))
    }

    pub fn input_type(mut self, kind: impl Into<String>) -> Self {
        self.input_type = Some(kind.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// A value that always wins over submitted and stored ones
    pub fn permanent_value(mut self, value: impl Into<Value>) -> Self {
        self.permanent_value = Some(value.into());
        self
    }

    /// Shown instead of the submitted value when the form is viewed
    pub fn override_value(mut self, value: impl Into<Value>) -> Self {
        self.override_value = Some(value.into());
        self
    }

    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    pub fn keep(mut self) -> Self {
        self.keep = true;
        self
    }

    /// Arm `action` whenever a value is submitted
    pub fn trigger(self, action: impl Into<String>) -> Self {
        self.push_trigger(action.into(), None, Value::Null)
    }

    /// Arm `action` when the submitted value equals `value`
    pub fn trigger_on(self, action: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push_trigger(action.into(), Some(value.into()), Value::Null)
    }

    pub fn trigger_with(
        self,
        action: impl Into<String>,
        value: impl Into<Value>,
        context: impl Into<Value>,
    ) -> Self {
        self.push_trigger(action.into(), Some(value.into()), context.into())
    }

    fn push_trigger(mut self, action: String, value: Option<Value>, context: Value) -> Self {
        let order = self.base.next_order();
        self.triggers.push(Trigger {
            order,
            action,
            value,
            context,
        });
        self
    }

    pub fn is_required(&self) -> bool {
        self.base.handlers.iter().any(|h| h.rule == Rule::Required)
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn keeps_value(&self) -> bool {
        self.keep
    }

    pub fn declared_type(&self) -> Option<&str> {
        self.input_type.as_deref()
    }

    /// Options of the first `options` rule
    pub fn allowed_options(&self) -> &[InputOption] {
        self.base
            .handlers
            .iter()
            .find_map(|h| match &h.rule {
                Rule::Options(options) => Some(options.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }
}

fn push_rule(input: &mut Input, phase: Phase, rule: Rule, error: Option<String>) -> Result<(), ConfigError> {
    input.base.push_handler(phase, rule, error);
    Ok(())
}

fn error_param() -> Param {
    Param::optional(&["error"], ParamKind::String)
}

static INPUT_METHODS: Lazy<MethodTable<Input>> = Lazy::new(|| {
    MethodTable::new("input")
        .with_all(element_methods())
        .with(
            ConfigurableMethod::property(
                "type",
                |i: &mut Input, mut args| {
                    i.input_type = args.string(0);
                    Ok(())
                },
                |i| i.input_type.clone().map(ConfigValue::from),
            )
            .overload(Override::single(Param::optional(&["type"], ParamKind::String))),
        )
        .with(
            ConfigurableMethod::property(
                "defaultValue",
                |i: &mut Input, mut args| {
                    i.default_value = args.any(0);
                    Ok(())
                },
                |i| i.default_value.clone().map(ConfigValue::from),
            )
            .overload(Override::single(Param::optional(&["defaultValue"], ParamKind::Any))),
        )
        .with(
            ConfigurableMethod::property(
                "permanentValue",
                |i: &mut Input, mut args| {
                    i.permanent_value = args.any(0);
                    Ok(())
                },
                |i| i.permanent_value.clone().map(ConfigValue::from),
            )
            .overload(Override::single(Param::optional(&["permanentValue"], ParamKind::Any))),
        )
        .with(
            ConfigurableMethod::property(
                "overrideValue",
                |i: &mut Input, mut args| {
                    i.override_value = args.any(0);
                    Ok(())
                },
                |i| i.override_value.clone().map(ConfigValue::from),
            )
            .overload(Override::single(Param::optional(&["overrideValue"], ParamKind::Any))),
        )
        .with(
            ConfigurableMethod::property(
                "secure",
                |i: &mut Input, mut args| {
                    i.secure = args.bool(0).unwrap_or(true);
                    Ok(())
                },
                |i| i.secure.then(|| true.into()),
            )
            .overload(Override::single(Param::optional(&["secure"], ParamKind::Bool).default(true))),
        )
        .with(
            ConfigurableMethod::property(
                "keep",
                |i: &mut Input, mut args| {
                    i.keep = args.bool(0).unwrap_or(true);
                    Ok(())
                },
                |i| i.keep.then(|| true.into()),
            )
            .overload(Override::single(Param::optional(&["keep"], ParamKind::Bool).default(true))),
        )
        .with(
            ConfigurableMethod::ordered("required", |i: &mut Input, mut args| {
                let (required, error) = match args.take(0) {
                    Arg::Bool(flag) => (flag, args.string(1)),
                    Arg::Str(error) => (true, Some(error)),
                    _ => (true, args.string(1)),
                };
                // `required: false` registers nothing
                if !required {
                    return Ok(());
                }
                push_rule(i, Phase::Validate, Rule::Required, error)
            })
            .overload(Override::new(vec![
                Param::optional(&["required"], ParamKind::Bool).default(true),
                error_param(),
            ]))
            .overload(Override::new(vec![Param::required(&["error"], ParamKind::String)])),
        )
        .with(
            ConfigurableMethod::ordered("size", |i: &mut Input, mut args| {
                let bound = |n: Option<i64>| n.map(|n| n.max(0) as usize);
                let rule = Rule::Size {
                    min: bound(args.int(0)),
                    max: bound(args.int(1)),
                };
                push_rule(i, Phase::Validate, rule, args.string(2))
            })
            .overload(Override::new(vec![
                Param::optional(&["min"], ParamKind::Int),
                Param::optional(&["max"], ParamKind::Int),
                error_param(),
            ])),
        )
        .with(
            ConfigurableMethod::ordered("min", |i: &mut Input, mut args| {
                let min = args.float(0).unwrap_or_default();
                push_rule(i, Phase::Validate, Rule::Min(min), args.string(1))
            })
            .overload(Override::new(vec![
                Param::required(&["min"], ParamKind::Float),
                error_param(),
            ])),
        )
        .with(
            ConfigurableMethod::ordered("max", |i: &mut Input, mut args| {
                let max = args.float(0).unwrap_or_default();
                push_rule(i, Phase::Validate, Rule::Max(max), args.string(1))
            })
            .overload(Override::new(vec![
                Param::required(&["max"], ParamKind::Float),
                error_param(),
            ])),
        )
        .with(
            ConfigurableMethod::ordered("options", |i: &mut Input, mut args| {
                let options = args
                    .array(0)
                    .unwrap_or_default()
                    .into_iter()
                    .map(InputOption::from_value)
                    .collect();
                push_rule(i, Phase::Validate, Rule::Options(options), args.string(1))
            })
            .overload(Override::new(vec![
                Param::required(&["options"], ParamKind::Array),
                error_param(),
            ]))
            .overload(Override::single(Param::required(&["options"], ParamKind::Array))),
        )
        .with(
            ConfigurableMethod::ordered("blacklist", |i: &mut Input, mut args| {
                let values = args.strings(0).unwrap_or_default();
                push_rule(i, Phase::Validate, Rule::Blacklist(values), args.string(1))
            })
            .overload(Override::single(Param::required(&["blacklist"], ParamKind::Strings)))
            .overload(Override::new(vec![
                Param::required(&["blacklist"], ParamKind::Strings),
                error_param(),
            ])),
        )
        .with(
            ConfigurableMethod::ordered("match", |i: &mut Input, mut args| {
                let target = args.string(0).unwrap_or_default();
                push_rule(i, Phase::Validate, Rule::Match(target), args.string(1))
            })
            .overload(Override::new(vec![
                Param::required(&["match", "target"], ParamKind::String),
                error_param(),
            ])),
        )
        .with(
            ConfigurableMethod::ordered("is", |i: &mut Input, mut args| {
                let kind = args.string(0).unwrap_or_default();
                push_rule(i, Phase::Validate, Rule::Is(kind), args.string(1))
            })
            .overload(Override::new(vec![
                Param::required(&["is", "type"], ParamKind::String),
                error_param(),
            ])),
        )
        .with(
            ConfigurableMethod::ordered("convert", |i: &mut Input, mut args| {
                let name = args.string(0).unwrap_or_default();
                let conversion = Conversion::parse(&name).ok_or(ConfigError::InvalidParam {
                    method: "convert".to_string(),
                    param: "type",
                    expected: "one of bool, int, float, string",
                })?;
                push_rule(i, Phase::Process, Rule::Convert(conversion), args.string(1))
            })
            .overload(Override::new(vec![
                Param::required(&["convert", "type"], ParamKind::String),
                error_param(),
            ])),
        )
        .with(
            ConfigurableMethod::ordered("process", |i: &mut Input, mut args| {
                let cb = args.callback(0);
                match cb {
                    Some(cb) => push_rule(i, Phase::Process, Rule::Handler(cb), args.string(1)),
                    None => Ok(()),
                }
            })
            .overload(Override::new(vec![
                Param::required(&["callback", "handler"], ParamKind::Callback),
                error_param(),
            ])),
        )
        .with(
            ConfigurableMethod::ordered("validate", |i: &mut Input, mut args| {
                let cb = args.callback(0);
                match cb {
                    Some(cb) => push_rule(i, Phase::Validate, Rule::Handler(cb), args.string(1)),
                    None => Ok(()),
                }
            })
            .overload(Override::new(vec![
                Param::required(&["callback", "handler"], ParamKind::Callback),
                error_param(),
            ])),
        )
        .with(
            ConfigurableMethod::ordered("trigger", |i: &mut Input, mut args| {
                let action = args.string(0).unwrap_or_default();
                let value = args.any(1);
                let context = args.any(2).unwrap_or(Value::Null);
                let order = i.base.next_order();
                i.triggers.push(Trigger {
                    order,
                    action,
                    value,
                    context,
                });
                Ok(())
            })
            .overload(Override::new(vec![
                Param::required(&["action"], ParamKind::String),
                Param::optional(&["value"], ParamKind::Any),
                Param::optional(&["context"], ParamKind::Any),
            ])),
        )
        .alias("inputType", "type")
        .alias("default", "defaultValue")
});

impl Configurable for Input {
    fn methods() -> &'static MethodTable<Self> {
        &INPUT_METHODS
    }

    fn ordered_entries(&self) -> Vec<OrderedEntry> {
        let mut entries = self.base.ordered_entries();
        entries.extend(self.triggers.iter().map(Trigger::export));
        entries
    }

    fn check(&self) -> Result<(), ConfigError> {
        self.base.check("input")?;
        if self.secure && self.keep {
            return Err(ConfigError::SecureKeep(self.base.name.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{ElementBuilder, Nameable, PhaseExecutable};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_from_config_basic() {
        let input = Input::from_config(
            &json!({
                "name": "email",
                "label": "E-mail",
                "required": "Enter your {label}",
                "is": "email"
            })
            .into(),
        )
        .unwrap();
        assert_eq!(input.element_name(), "email");
        assert!(input.is_required());
        let handlers = input.handlers();
        assert_eq!(handlers.len(), 2);
        assert_eq!(handlers[0].error(), Some("Enter your {label}"));
        assert_eq!(handlers[1].rule(), &Rule::Is("email".into()));
    }

    #[test]
    fn test_required_false_registers_nothing() {
        let input = Input::from_config(&json!({"name": "a", "required": false}).into()).unwrap();
        assert!(!input.is_required());
    }

    #[test]
    fn test_secure_and_keep_conflict() {
        let err = Input::from_config(&json!({"name": "pw", "secure": true, "keep": true}).into())
            .unwrap_err();
        assert!(matches!(err, ConfigError::SecureKeep(name) if name == "pw"));
    }

    #[test]
    fn test_unnamed_input_rejected() {
        let err = Input::from_config(&json!({"label": "Nameless"}).into()).unwrap_err();
        assert!(matches!(err, ConfigError::Unnamed("input")));
    }

    #[test]
    fn test_convert_rejects_unknown_type() {
        let err = Input::from_config(&json!({"name": "a", "convert": "date"}).into()).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidParam { param: "type", .. }));
    }

    #[test]
    fn test_options_accepts_bare_list_and_error() {
        let a = Input::from_config(&json!({"name": "c", "options": ["red", "blue"]}).into()).unwrap();
        assert_eq!(a.allowed_options().len(), 2);

        let b = Input::from_config(
            &json!({"name": "c", "options": {"options": [{"value": 1, "label": "One"}], "error": "pick one"}})
                .into(),
        )
        .unwrap();
        assert_eq!(b.allowed_options(), [InputOption::new(1, "One")]);
        assert_eq!(b.handlers()[0].error(), Some("pick one"));
    }

    #[test]
    fn test_trigger_matching() {
        let input = Input::new("go").trigger_on("next", "continue").trigger("save");
        let [on_value, on_any] = input.triggers() else {
            panic!("expected two triggers");
        };
        assert!(on_value.matches(&json!("continue")));
        assert!(!on_value.matches(&json!("back")));
        assert!(on_value.matches(&json!(["x", "continue"])));
        assert!(on_any.matches(&json!("anything")));
        assert!(!on_any.matches(&json!("  ")));
        assert_eq!(on_value.special(), Some(SpecialAction::Next));
        assert_eq!(on_any.special(), None);
    }

    #[test]
    fn test_list_and_object_values_survive_round_trip() {
        let input = Input::new("tags")
            .default_value(json!(["a", "b"]))
            .permanent_value(json!({"lang": "en"}))
            .trigger_with("store", json!(["x", "y"]), json!({"slot": 1}));
        let exported = input.configuration();
        let rebuilt = Input::from_config(&exported).unwrap();
        assert_eq!(rebuilt.default_value, Some(json!(["a", "b"])));
        assert_eq!(rebuilt.permanent_value, Some(json!({"lang": "en"})));
        assert_eq!(rebuilt.triggers()[0].value, Some(json!(["x", "y"])));
        assert_eq!(rebuilt.configuration(), exported);

        let single = Input::from_config(&json!({"name": "tags", "defaultValue": ["a"]}).into()).unwrap();
        assert_eq!(single.default_value, Some(json!(["a"])));
        assert_eq!(single.configuration().get("defaultValue"), Some(&ConfigValue::from(json!(["a"]))));
    }

    #[test]
    fn test_configuration_round_trip() {
        let cb = Callback::sync(Ok);
        let input = Input::new("age")
            .label("Age")
            .group(["person"])
            .pipe("->parent")
            .input_type("number")
            .default_value(18)
            .keep()
            .required()
            .error("{label} please")
            .convert(Conversion::Int)
            .min(18.0)
            .max(120.0)
            .size(None, 3)
            .blacklist(["13"])
            .options(["18", "21"])
            .validate(cb)
            .trigger_with("next", "go", json!({"from": "age"}));

        let exported = input.configuration();
        let rebuilt = Input::from_config(&exported).unwrap();
        assert_eq!(rebuilt.configuration(), exported);

        let ordered = exported.get("ordered").and_then(|o| match o {
            ConfigValue::List(items) => Some(items.len()),
            _ => None,
        });
        assert_eq!(ordered, Some(9));
    }
}
