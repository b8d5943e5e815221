//! Element definitions: the declarative tree a form is built from.
//!
//! Every variant (input, component, page, form) embeds an [`ElementBase`]
//! holding identity, grouping, error routing and registered handlers. The
//! shared behavior is expressed as small capability traits implemented for
//! anything that exposes its base through [`HasBase`], and the fluent
//! [`ElementBuilder`] methods come for free the same way.

pub mod component;
pub mod container;
pub mod form;
pub mod input;
pub mod page;
pub mod rules;

use crate::configurable::{
    Args, ConfigValue, Configurable, ConfigurableMethod, OrderedEntry, Override, Param, ParamKind,
};
use crate::error::ConfigError;
use crate::handler::{Callback, ElementKind, Phase};
use rules::{ExecuteHandler, Rule};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Prefix of pipe directives; element names may not start with it
pub const PIPE_PREFIX: &str = "->";

/// Prefix of generated storage names; element names may not start with it
pub const SYNTHETIC_PREFIX: &str = "__";

pub fn is_reserved_name(name: &str) -> bool {
    name.starts_with(PIPE_PREFIX) || name.starts_with(SYNTHETIC_PREFIX)
}

/// Where an element's validation errors are delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipeTarget {
    Form,
    Page,
    /// Nearest page or form ancestor
    Container,
    /// Same owner as `Container`
    Parent,
    /// Another element, by dotted path
    Path(String),
}

impl PipeTarget {
    pub fn as_str(&self) -> &str {
        match self {
            PipeTarget::Form => "->form",
            PipeTarget::Page => "->page",
            PipeTarget::Container => "->container",
            PipeTarget::Parent => "->parent",
            PipeTarget::Path(path) => path,
        }
    }

    fn is_valid(&self) -> bool {
        match self {
            PipeTarget::Path(path) => !path.trim().is_empty() && !path.starts_with(PIPE_PREFIX),
            _ => true,
        }
    }
}

impl FromStr for PipeTarget {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let target = match s {
            "->form" => PipeTarget::Form,
            "->page" => PipeTarget::Page,
            "->container" => PipeTarget::Container,
            "->parent" => PipeTarget::Parent,
            other => PipeTarget::Path(other.to_string()),
        };
        if target.is_valid() {
            Ok(target)
        } else {
            Err(ConfigError::InvalidPipe(s.to_string()))
        }
    }
}

impl fmt::Display for PipeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity, routing and handlers shared by every element variant
#[derive(Debug, Clone, Default)]
pub struct ElementBase {
    pub(crate) name: String,
    pub(crate) label: Option<String>,
    pub(crate) group: Option<Vec<String>>,
    pub(crate) alias: Option<String>,
    pub(crate) pipe: Option<PipeTarget>,
    pub(crate) context: Map<String, Value>,
    pub(crate) handlers: Vec<ExecuteHandler>,
    next_order: u64,
}

impl ElementBase {
    pub(crate) fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Stamp the next registration order on a new handler
    pub(crate) fn next_order(&mut self) -> u64 {
        let order = self.next_order;
        self.next_order += 1;
        order
    }

    pub(crate) fn push_handler(&mut self, phase: Phase, rule: Rule, error: Option<String>) {
        let order = self.next_order();
        self.handlers.push(ExecuteHandler {
            order,
            phase,
            rule,
            error,
        });
    }

    /// Name and pipe invariants shared by all variants
    pub(crate) fn check(&self, kind: &'static str) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Unnamed(kind));
        }
        if is_reserved_name(&self.name) {
            return Err(ConfigError::ReservedName(self.name.clone()));
        }
        match &self.pipe {
            Some(pipe) if !pipe.is_valid() => Err(ConfigError::InvalidPipe(pipe.to_string())),
            _ => Ok(()),
        }
    }

    pub(crate) fn ordered_entries(&self) -> Vec<OrderedEntry> {
        self.handlers.iter().map(ExecuteHandler::export).collect()
    }

    /// Handlers bound to `phase`, in registration order. Process and
    /// validate handlers share one list.
    pub(crate) fn handlers_for(&self, phase: &Phase) -> Vec<&ExecuteHandler> {
        self.handlers
            .iter()
            .filter(|h| {
                if phase.is_execute() {
                    h.phase.is_execute()
                } else {
                    &h.phase == phase
                }
            })
            .collect()
    }
}

/// Access to the embedded [`ElementBase`]
pub trait HasBase {
    const KIND: ElementKind;

    fn base(&self) -> &ElementBase;
    fn base_mut(&mut self) -> &mut ElementBase;
}

pub trait Nameable {
    fn element_name(&self) -> &str;
    /// Label, falling back to the name
    fn element_label(&self) -> &str;
    fn element_alias(&self) -> Option<&str>;
}

pub trait Groupable {
    /// Declared group segments; empty when ungrouped
    fn element_group(&self) -> &[String];
}

pub trait ErrorPipeable {
    fn pipe_target(&self) -> Option<&PipeTarget>;
}

pub trait PhaseExecutable {
    fn handlers(&self) -> &[ExecuteHandler];
    fn handlers_for(&self, phase: &Phase) -> Vec<&ExecuteHandler>;
}

impl<T: HasBase> Nameable for T {
    fn element_name(&self) -> &str {
        &self.base().name
    }

    fn element_label(&self) -> &str {
        self.base().label.as_deref().unwrap_or(&self.base().name)
    }

    fn element_alias(&self) -> Option<&str> {
        self.base().alias.as_deref()
    }
}

impl<T: HasBase> Groupable for T {
    fn element_group(&self) -> &[String] {
        self.base().group.as_deref().unwrap_or(&[])
    }
}

impl<T: HasBase> ErrorPipeable for T {
    fn pipe_target(&self) -> Option<&PipeTarget> {
        self.base().pipe.as_ref()
    }
}

impl<T: HasBase> PhaseExecutable for T {
    fn handlers(&self) -> &[ExecuteHandler] {
        &self.base().handlers
    }

    fn handlers_for(&self, phase: &Phase) -> Vec<&ExecuteHandler> {
        self.base().handlers_for(phase)
    }
}

fn split_group<I, S>(segments: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    segments
        .into_iter()
        .flat_map(|s| {
            s.as_ref()
                .split('.')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Fluent configuration shared by every element variant
pub trait ElementBuilder: HasBase + Sized {
    fn label(mut self, label: impl Into<String>) -> Self {
        self.base_mut().label = Some(label.into());
        self
    }

    fn alias(mut self, alias: impl Into<String>) -> Self {
        self.base_mut().alias = Some(alias.into());
        self
    }

    /// Group segments; dotted segments are split
    fn group<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let group = split_group(segments);
        self.base_mut().group = (!group.is_empty()).then_some(group);
        self
    }

    /// `->form`, `->page`, `->container`, `->parent` or an element path.
    /// Malformed targets are reported by `check`.
    fn pipe(mut self, target: &str) -> Self {
        let pipe = target
            .parse()
            .unwrap_or_else(|_| PipeTarget::Path(target.to_string()));
        self.base_mut().pipe = Some(pipe);
        self
    }

    fn context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.base_mut().context.insert(key.into(), value.into());
        self
    }

    fn on_build(self, cb: Callback) -> Self {
        self.on(Phase::Build, cb)
    }

    fn on_valid(self, cb: Callback) -> Self {
        self.on(Phase::Valid, cb)
    }

    fn on_invalid(self, cb: Callback) -> Self {
        self.on(Phase::Invalid, cb)
    }

    fn on_success(self, cb: Callback) -> Self {
        self.on(Phase::Success, cb)
    }

    fn on_fail(self, cb: Callback) -> Self {
        self.on(Phase::Fail, cb)
    }

    fn on_submit(self, cb: Callback) -> Self {
        self.on(Phase::Submit, cb)
    }

    fn on_done(self, cb: Callback) -> Self {
        self.on(Phase::Done, cb)
    }

    fn on_action(self, action: impl Into<String>, cb: Callback) -> Self {
        self.on(Phase::Action(action.into()), cb)
    }

    fn on(mut self, phase: Phase, cb: Callback) -> Self {
        self.base_mut().push_handler(phase, Rule::Handler(cb), None);
        self
    }

    /// Error template for the most recently registered handler
    fn error(mut self, message: impl Into<String>) -> Self {
        if let Some(last) = self.base_mut().handlers.last_mut() {
            last.error = Some(message.into());
        }
        self
    }
}

impl<T: HasBase> ElementBuilder for T {}

fn register_handler<T: HasBase>(target: &mut T, phase: Phase, mut args: Args) -> Result<(), ConfigError> {
    let cb = args.callback(0).ok_or_else(|| ConfigError::MissingParam {
        method: phase.method_name().to_string(),
        param: "callback",
    })?;
    target.base_mut().push_handler(phase, Rule::Handler(cb), args.string(1));
    Ok(())
}

fn handler_override() -> Override {
    Override::new(vec![
        Param::required(&["callback", "handler"], ParamKind::Callback),
        Param::optional(&["error"], ParamKind::String),
    ])
}

macro_rules! phase_method {
    ($name:literal, $phase:expr) => {
        ConfigurableMethod::ordered($name, |t: &mut T, args| register_handler(t, $phase, args))
            .overload(handler_override())
    };
}

/// Configuration keys every element variant understands
pub(crate) fn element_methods<T: HasBase + Configurable>() -> Vec<ConfigurableMethod<T>> {
    vec![
        ConfigurableMethod::property(
            "name",
            |t: &mut T, mut args| {
                t.base_mut().name = args.string(0).unwrap_or_default();
                Ok(())
            },
            |t| (!t.base().name.is_empty()).then(|| t.base().name.as_str().into()),
        )
        .overload(Override::single(Param::required(&["name"], ParamKind::String))),
        ConfigurableMethod::property(
            "label",
            |t: &mut T, mut args| {
                t.base_mut().label = args.string(0);
                Ok(())
            },
            |t| t.base().label.clone().map(ConfigValue::from),
        )
        .overload(Override::single(Param::optional(&["label"], ParamKind::String))),
        ConfigurableMethod::property(
            "alias",
            |t: &mut T, mut args| {
                t.base_mut().alias = args.string(0);
                Ok(())
            },
            |t| t.base().alias.clone().map(ConfigValue::from),
        )
        .overload(Override::single(Param::optional(&["alias"], ParamKind::String))),
        ConfigurableMethod::property(
            "group",
            |t: &mut T, mut args| {
                let group = split_group(args.strings(0).unwrap_or_default());
                t.base_mut().group = (!group.is_empty()).then_some(group);
                Ok(())
            },
            |t| {
                t.base()
                    .group
                    .as_ref()
                    .map(|g| ConfigValue::List(g.iter().map(|s| s.as_str().into()).collect()))
            },
        )
        .overload(Override::single(Param::optional(&["group"], ParamKind::Strings))),
        ConfigurableMethod::property(
            "pipe",
            |t: &mut T, mut args| {
                t.base_mut().pipe = args.string(0).map(|s| s.parse()).transpose()?;
                Ok(())
            },
            |t| t.base().pipe.as_ref().map(|p| p.as_str().into()),
        )
        .overload(Override::single(Param::optional(&["pipe"], ParamKind::String))),
        ConfigurableMethod::property(
            "context",
            |t: &mut T, mut args| {
                t.base_mut().context = args.object(0).unwrap_or_default();
                Ok(())
            },
            |t| {
                let context = &t.base().context;
                (!context.is_empty()).then(|| Value::Object(context.clone()).into())
            },
        )
        .overload(Override::single(Param::optional(&["context"], ParamKind::Object))),
        phase_method!("build", Phase::Build),
        phase_method!("valid", Phase::Valid),
        phase_method!("invalid", Phase::Invalid),
        phase_method!("success", Phase::Success),
        phase_method!("fail", Phase::Fail),
        phase_method!("submit", Phase::Submit),
        phase_method!("done", Phase::Done),
        ConfigurableMethod::ordered("action", |t: &mut T, mut args| {
            let name = args.string(0).unwrap_or_default();
            register_handler(t, Phase::Action(name), Args::new(vec![args.take(1), args.take(2)]))
        })
        .overload(Override::new(vec![
            Param::required(&["action", "name"], ParamKind::String),
            Param::required(&["callback", "handler"], ParamKind::Callback),
            Param::optional(&["error"], ParamKind::String),
        ])),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::input::Input;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_pipe_parse() {
        assert_eq!("->parent".parse::<PipeTarget>().unwrap(), PipeTarget::Parent);
        assert_eq!(
            "account.password".parse::<PipeTarget>().unwrap(),
            PipeTarget::Path("account.password".into())
        );
        assert!(matches!("->nowhere".parse::<PipeTarget>(), Err(ConfigError::InvalidPipe(_))));
        assert!("".parse::<PipeTarget>().is_err());
    }

    #[test]
    fn test_reserved_names() {
        assert!(is_reserved_name("->form"));
        assert!(is_reserved_name("__profile__input1"));
        assert!(!is_reserved_name("email"));
    }

    #[test]
    fn test_label_falls_back_to_name() {
        let input = Input::new("email");
        assert_eq!(input.element_label(), "email");
        let input = input.label("E-mail");
        assert_eq!(input.element_label(), "E-mail");
    }

    #[test]
    fn test_group_splits_dotted_segments() {
        let input = Input::new("street").group(["address.home"]);
        assert_eq!(input.element_group(), ["address".to_string(), "home".to_string()]);
    }

    #[test]
    fn test_error_applies_to_last_handler() {
        let input = Input::new("age").on_valid(Callback::sync(Ok)).error("bad age");
        assert_eq!(input.handlers()[0].error(), Some("bad age"));
    }

    #[test]
    fn test_execute_handlers_share_one_list() {
        let input = Input::new("age")
            .convert(rules::Conversion::Int)
            .on_done(Callback::sync(Ok))
            .validate(Callback::sync(Ok));
        let phases: Vec<_> = input
            .handlers_for(&Phase::Validate)
            .iter()
            .map(|h| h.phase().clone())
            .collect();
        assert_eq!(phases, vec![Phase::Process, Phase::Validate]);
    }

    #[test]
    fn test_invalid_pipe_is_configuration_error() {
        let mut input = Input::default();
        let err = input
            .configure(&json!({"name": "a", "pipe": "->sideways"}).into())
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPipe(_)));
    }

    #[test]
    fn test_reserved_name_rejected() {
        let mut input = Input::default();
        let err = input.configure(&json!({"name": "__x"}).into()).unwrap_err();
        assert!(matches!(err, ConfigError::ReservedName(_)));
    }

    #[test]
    fn test_action_registration_round_trip() {
        let cb = Callback::sync(Ok);
        let input = Input::new("save").on_action("store", cb.clone());
        let config = input.configuration();
        let mut copy = Input::default();
        copy.configure(&config).unwrap();
        assert_eq!(copy.configuration(), config);
        assert_eq!(copy.handlers_for(&Phase::Action("store".into())).len(), 1);
    }
}
