//! Components: placeholders expanded into inputs by compose hooks.
//!
//! A component's `type` is opaque to the engine. When the tree is built,
//! the page's hooks, then the form's hooks, then the driver are asked to
//! compose it; the first one that halts supplies the generated elements.

use super::input::Input;
use super::{element_methods, ElementBase, HasBase};
use crate::configurable::{
    ConfigValue, Configurable, ConfigurableMethod, MethodTable, OrderedEntry, Override, Param, ParamKind,
};
use crate::error::ConfigError;
use crate::handler::ElementKind;
use once_cell::sync::Lazy;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Default)]
pub struct Component {
    pub(crate) base: ElementBase,
    pub(crate) kind: String,
    pub(crate) template: Option<String>,
    pub(crate) default_value: Option<Value>,
    pub(crate) params: Vec<(String, Value)>,
}

impl HasBase for Component {
    const KIND: ElementKind = ElementKind::Component;

    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }
}

impl Component {
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            base: ElementBase::named(name),
            kind: kind.into(),
            ..Self::default()
        }
    }

    pub fn from_config(config: &ConfigValue) -> Result<Self, ConfigError> {
        let mut component = Self::default();
        component.configure(config)?;
        Ok(component)
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Default applied to every generated input that declares none
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    pub fn param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn component_type(&self) -> &str {
        &self.kind
    }

    pub fn template_name(&self) -> Option<&str> {
        self.template.as_deref()
    }

    pub fn params(&self) -> &[(String, Value)] {
        &self.params
    }
}

/// What a compose hook is asked to expand
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeDetails {
    /// The component's opaque `type`
    pub kind: String,
    /// External dotted path of the component
    pub id: String,
    pub name: String,
    pub params: Vec<(String, Value)>,
    pub template: Option<String>,
    pub default_value: Option<Value>,
    pub form: String,
    pub page: Option<String>,
}

impl ComposeDetails {
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// An element produced by composing a component
#[derive(Debug, Clone)]
pub enum Composed {
    Input(Input),
    Component(Component),
}

impl From<Input> for Composed {
    fn from(input: Input) -> Self {
        Composed::Input(input)
    }
}

impl From<Component> for Composed {
    fn from(component: Component) -> Self {
        Composed::Component(component)
    }
}

/// Answer of a compose hook
#[derive(Debug, Clone)]
pub enum ComposeOutcome {
    /// Claim the component and supply its children
    Halt(Vec<Composed>),
    /// Claim the component without generating anything
    Handled,
    /// Let the next hook try
    Pass,
}

impl ComposeOutcome {
    pub fn inputs<I>(inputs: I) -> Self
    where
        I: IntoIterator<Item = Input>,
    {
        ComposeOutcome::Halt(inputs.into_iter().map(Composed::Input).collect())
    }
}

static COMPONENT_METHODS: Lazy<MethodTable<Component>> = Lazy::new(|| {
    MethodTable::new("component")
        .with_all(element_methods())
        .with(
            ConfigurableMethod::property(
                "type",
                |c: &mut Component, mut args| {
                    c.kind = args.string(0).unwrap_or_default();
                    Ok(())
                },
                |c| (!c.kind.is_empty()).then(|| c.kind.as_str().into()),
            )
            .overload(Override::single(Param::required(&["type"], ParamKind::String))),
        )
        .with(
            ConfigurableMethod::property(
                "template",
                |c: &mut Component, mut args| {
                    c.template = args.string(0);
                    Ok(())
                },
                |c| c.template.clone().map(ConfigValue::from),
            )
            .overload(Override::single(Param::optional(&["template"], ParamKind::String))),
        )
        .with(
            ConfigurableMethod::property(
                "defaultValue",
                |c: &mut Component, mut args| {
                    c.default_value = args.any(0);
                    Ok(())
                },
                |c| c.default_value.clone().map(ConfigValue::from),
            )
            .overload(Override::single(Param::optional(&["defaultValue"], ParamKind::Any))),
        )
        .with(
            ConfigurableMethod::property(
                "params",
                |c: &mut Component, mut args| {
                    if let Some(map) = args.object(0) {
                        c.params.extend(map);
                        return Ok(());
                    }
                    for pair in args.array(0).unwrap_or_default() {
                        match pair {
                            Value::Array(mut pair) if pair.len() == 2 => {
                                let value = pair.pop().unwrap_or(Value::Null);
                                let name = crate::value::to_text(&pair[0]);
                                c.params.push((name, value));
                            }
                            _ => {
                                return Err(ConfigError::InvalidParam {
                                    method: "params".to_string(),
                                    param: "params",
                                    expected: "an object or a list of [name, value] pairs",
                                })
                            }
                        }
                    }
                    Ok(())
                },
                |c| {
                    (!c.params.is_empty()).then(|| {
                        let map: Map<String, Value> = c.params.iter().cloned().collect();
                        Value::Object(map).into()
                    })
                },
            )
            .overload(Override::single(Param::required(&["params"], ParamKind::Object)))
            .overload(Override::single(Param::required(&["params"], ParamKind::Array))),
        )
        .alias("default", "defaultValue")
});

impl Configurable for Component {
    fn methods() -> &'static MethodTable<Self> {
        &COMPONENT_METHODS
    }

    fn ordered_entries(&self) -> Vec<OrderedEntry> {
        self.base.ordered_entries()
    }

    fn check(&self) -> Result<(), ConfigError> {
        self.base.check("component")?;
        if self.kind.trim().is_empty() {
            return Err(ConfigError::MissingParam {
                method: self.base.name.clone(),
                param: "type",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_params_from_object_keep_order() {
        let c = Component::from_config(
            &json!({"name": "profile", "type": "card", "params": {"rows": 3, "title": "Me"}}).into(),
        )
        .unwrap();
        assert_eq!(
            c.params(),
            [("rows".to_string(), json!(3)), ("title".to_string(), json!("Me"))]
        );
    }

    #[test]
    fn test_params_from_pairs() {
        let c = Component::from_config(
            &json!({"name": "profile", "type": "card", "params": [["rows", 3]]}).into(),
        )
        .unwrap();
        assert_eq!(c.params(), [("rows".to_string(), json!(3))]);
    }

    #[test]
    fn test_missing_type_rejected() {
        let err = Component::from_config(&json!({"name": "profile"}).into()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingParam { param: "type", .. }));
    }

    #[test]
    fn test_round_trip() {
        let c = Component::new("profile", "componentWithTwoInputs")
            .template("cards/profile")
            .default_value("n/a")
            .param("rows", 2);
        let exported = c.configuration();
        assert_eq!(Component::from_config(&exported).unwrap().configuration(), exported);
    }

    #[test]
    fn test_list_default_value_round_trip() {
        let c = Component::new("profile", "componentWithTwoInputs").default_value(json!(["a", "b"]));
        let exported = c.configuration();
        let rebuilt = Component::from_config(&exported).unwrap();
        assert_eq!(rebuilt.default_value, Some(json!(["a", "b"])));
        assert_eq!(rebuilt.configuration(), exported);
    }

    #[test]
    fn test_details_param_lookup() {
        let details = ComposeDetails {
            kind: "card".into(),
            id: "profile".into(),
            name: "profile".into(),
            params: vec![("rows".into(), json!(2))],
            template: None,
            default_value: None,
            form: "signup".into(),
            page: None,
        };
        assert_eq!(details.param("rows"), Some(&json!(2)));
        assert_eq!(details.param("cols"), None);
    }
}
