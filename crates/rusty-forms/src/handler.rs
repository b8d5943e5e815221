//! Handler callbacks and the state they receive.
//!
//! Every handler is an owned-in, owned-out async function: it gets a
//! [`State`] snapshot and hands back the (possibly modified) state. This keeps
//! handler futures `'static` so the phase runner can await them while it owns
//! the request's runtime tree.

use crate::element::component::{ComposeDetails, ComposeOutcome};
use crate::error::HandlerError;
use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type HandlerFn = dyn Fn(State) -> BoxFuture<'static, Result<State, HandlerError>> + Send + Sync;
type ComposeFn =
    dyn Fn(ComposeDetails) -> BoxFuture<'static, anyhow::Result<ComposeOutcome>> + Send + Sync;

/// Lifecycle phase a handler is bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Phase {
    Build,
    Process,
    Validate,
    Valid,
    Invalid,
    Success,
    Fail,
    Submit,
    Action(String),
    Done,
}

impl Phase {
    /// Configuration key that registers a handler for this phase
    pub fn method_name(&self) -> &'static str {
        match self {
            Phase::Build => "build",
            Phase::Process => "process",
            Phase::Validate => "validate",
            Phase::Valid => "valid",
            Phase::Invalid => "invalid",
            Phase::Success => "success",
            Phase::Fail => "fail",
            Phase::Submit => "submit",
            Phase::Action(_) => "action",
            Phase::Done => "done",
        }
    }

    /// Process and validate handlers share the execute pass
    pub fn is_execute(&self) -> bool {
        matches!(self, Phase::Process | Phase::Validate)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Action(name) => write!(f, "action:{}", name),
            other => f.write_str(other.method_name()),
        }
    }
}

/// Which variant of the element tree a node is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementKind {
    Input,
    Component,
    Page,
    Form,
}

/// Read-only description of the element a handler runs for
#[derive(Debug, Clone, PartialEq)]
pub struct ElementInfo {
    pub kind: ElementKind,
    /// Storage name (synthetic for composed inputs)
    pub name: String,
    /// External dotted path; `None` for the form itself
    pub path: Option<String>,
    pub label: String,
    pub context: Map<String, Value>,
}

/// An action armed from a submitted value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArmedAction {
    pub action: String,
    pub context: Value,
    pub special: bool,
}

/// Snapshot handed to every handler
#[derive(Debug, Clone)]
pub struct State {
    /// Current value of the element; handlers may replace it
    pub value: Value,
    /// Set once a `required` handler ran for this element
    pub require: bool,
    pub element: ElementInfo,
    /// Values of every built input keyed by external path, secure ones included
    pub values: Map<String, Value>,
    /// The action being fired, for action handlers
    pub action: Option<ArmedAction>,
    pub token: String,
    pub page: usize,
}

impl State {
    /// Value of another element by external path
    pub fn value_of(&self, path: &str) -> Option<&Value> {
        self.values.get(path)
    }

    /// Replace the value, builder style
    pub fn with_value(mut self, value: impl Into<Value>) -> Self {
        self.value = value.into();
        self
    }
}

/// A process/validate/phase/action handler
#[derive(Clone)]
pub struct Callback(Arc<HandlerFn>);

impl Callback {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(State) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<State, HandlerError>> + Send + 'static,
    {
        Callback(Arc::new(move |state| f(state).boxed()))
    }

    /// Wrap a synchronous handler
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(State) -> Result<State, HandlerError> + Send + Sync + 'static,
    {
        Callback(Arc::new(move |state| futures::future::ready(f(state)).boxed()))
    }

    pub(crate) async fn call(&self, state: State) -> Result<State, HandlerError> {
        (self.0)(state).await
    }

    pub fn ptr_eq(&self, other: &Callback) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Callback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Callback(..)")
    }
}

impl PartialEq for Callback {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

/// Shorthand for [`Callback::new`]
pub fn handler<F, Fut>(f: F) -> Callback
where
    F: Fn(State) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<State, HandlerError>> + Send + 'static,
{
    Callback::new(f)
}

/// A compose hook that may expand a component's opaque type
#[derive(Clone)]
pub struct ComposeHandler(Arc<ComposeFn>);

impl ComposeHandler {
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(ComposeDetails) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ComposeOutcome>> + Send + 'static,
    {
        ComposeHandler(Arc::new(move |details| f(details).boxed()))
    }

    pub(crate) async fn call(&self, details: ComposeDetails) -> anyhow::Result<ComposeOutcome> {
        (self.0)(details).await
    }

    pub fn ptr_eq(&self, other: &ComposeHandler) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for ComposeHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ComposeHandler(..)")
    }
}

impl PartialEq for ComposeHandler {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}
