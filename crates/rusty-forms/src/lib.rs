//! # rusty-forms
//!
//! Declarative form definitions with a phased validation lifecycle.
//!
//! A [`Form`] is a tree of pages, inputs and components, declared either
//! with the fluent builders or from a configuration object. Each request is
//! run against a fresh runtime instantiation of the tree: values are
//! resolved, processed and validated children first, errors are piped to
//! the element that should display them, and multi-page wizards carry their
//! state between requests through a [`SessionStore`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use rusty_forms::prelude::*;
//! use std::sync::Arc;
//!
//! let form = Form::new("signup")
//!     .input(Input::new("email").required().is("email"))
//!     .input(Input::new("password").secure().min_length(8));
//!
//! let store = Arc::new(MemorySessionStore::new());
//! let driver = RequestDriver::new("/signup", store)
//!     .with_form(FormData::from_json(serde_json::json!({"email": "a@b.com"})));
//!
//! let outcome = form.execute(&driver).await?;
//! for error in &outcome.errors {
//!     println!("{:?}: {}", error.path, error.message);
//! }
//! ```

pub mod config;
pub mod configurable;
pub mod driver;
pub mod element;
pub mod error;
pub mod handler;
pub mod predicates;
pub mod request;
mod runtime;
pub mod session;
pub mod value;

pub use config::FormsConfig;
pub use configurable::{ConfigValue, Configurable};
pub use driver::{Driver, FormData, QueryParams, RequestDriver};
pub use element::component::{Component, ComposeDetails, ComposeOutcome, Composed};
pub use element::form::Form;
pub use element::input::{Input, Trigger};
pub use element::page::{Page, SpecialAction};
pub use element::rules::{Conversion, InputOption};
pub use error::{ConfigError, FormError, HandlerError, Result};
pub use handler::{handler, ArmedAction, Callback, ComposeHandler, ElementInfo, ElementKind, Phase, State};
pub use predicates::{PredicateSet, Predicates, StandardPredicates};
pub use request::{ErrorEntry, InputView, Outcome, Request, RequestPhase, ViewOutcome};
pub use session::{FilesystemSessionStore, MemorySessionStore, SessionRecord, SessionStore, StoredError};

/// Everything needed to declare and run a form
pub mod prelude {
    pub use crate::configurable::Configurable;
    pub use crate::driver::{Driver, FormData, QueryParams, RequestDriver};
    pub use crate::element::component::{Component, ComposeDetails, ComposeOutcome};
    pub use crate::element::container::ContainerBuilder;
    pub use crate::element::form::Form;
    pub use crate::element::input::Input;
    pub use crate::element::page::Page;
    pub use crate::element::rules::Conversion;
    pub use crate::element::ElementBuilder;
    pub use crate::error::{FormError, HandlerError};
    pub use crate::handler::{Callback, ComposeHandler, Phase, State};
    pub use crate::session::{MemorySessionStore, SessionStore};
}
