// File: src/element/form.rs
// Purpose: Root element and the entry points for viewing and submitting

use super::container::{container_methods, ContainerBase, HasContainer};
use super::page::Page;
use super::{element_methods, ElementBase, HasBase, Nameable};
use crate::config::FormsConfig;
use crate::configurable::{
    ConfigValue, Configurable, ConfigurableMethod, MethodTable, OrderedEntry, Override, Param, ParamKind,
};
use crate::driver::Driver;
use crate::error::{ConfigError, Result};
use crate::handler::ElementKind;
use crate::predicates::{Predicates, StandardPredicates};
use crate::request::{Outcome, Request, ViewOutcome};
use once_cell::sync::Lazy;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// The root of a form definition
///
/// A form is immutable once built and can serve any number of concurrent
/// requests; per-request state lives in the runtime tree each request
/// instantiates.
#[derive(Clone)]
pub struct Form {
    pub(crate) base: ElementBase,
    pub(crate) container: ContainerBase,
    pub(crate) pages: Vec<Arc<Page>>,
    pub(crate) token_name: Option<String>,
    pub(crate) page_name: Option<String>,
    pub(crate) settings: Arc<FormsConfig>,
    pub(crate) predicates: Arc<dyn Predicates>,
}

impl Default for Form {
    fn default() -> Self {
        Self {
            base: ElementBase::default(),
            container: ContainerBase::default(),
            pages: Vec::new(),
            token_name: None,
            page_name: None,
            settings: Arc::new(FormsConfig::default()),
            predicates: Arc::new(StandardPredicates),
        }
    }
}

impl fmt::Debug for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Form")
            .field("name", &self.base.name)
            .field("inputs", &self.container.inputs.len())
            .field("components", &self.container.components.len())
            .field("pages", &self.pages.len())
            .finish()
    }
}

impl HasBase for Form {
    const KIND: ElementKind = ElementKind::Form;

    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }
}

impl HasContainer for Form {
    fn container(&self) -> &ContainerBase {
        &self.container
    }

    fn container_mut(&mut self) -> &mut ContainerBase {
        &mut self.container
    }
}

impl Form {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: ElementBase::named(name),
            ..Self::default()
        }
    }

    pub fn from_config(config: &ConfigValue) -> std::result::Result<Self, ConfigError> {
        let mut form = Self::default();
        form.configure(config)?;
        Ok(form)
    }

    pub fn with_settings(mut self, settings: FormsConfig) -> Self {
        self.settings = Arc::new(settings);
        self
    }

    pub fn with_predicates(mut self, predicates: impl Predicates + 'static) -> Self {
        self.predicates = Arc::new(predicates);
        self
    }

    pub fn page(mut self, page: Page) -> Self {
        self.pages.push(Arc::new(page));
        self
    }

    /// Request field carrying the session token
    pub fn token_name(mut self, name: impl Into<String>) -> Self {
        self.token_name = Some(name.into());
        self
    }

    /// Request field carrying the page index
    pub fn page_name(mut self, name: impl Into<String>) -> Self {
        self.page_name = Some(name.into());
        self
    }

    pub fn settings(&self) -> &FormsConfig {
        &self.settings
    }

    pub fn predicates(&self) -> &dyn Predicates {
        self.predicates.as_ref()
    }

    pub fn token_field(&self) -> &str {
        self.token_name.as_deref().unwrap_or(&self.settings.fields.token)
    }

    pub fn page_field(&self) -> &str {
        self.page_name.as_deref().unwrap_or(&self.settings.fields.page)
    }

    pub fn pages(&self) -> &[Arc<Page>] {
        &self.pages
    }

    /// Number of steps; a form without pages has one
    pub fn page_count(&self) -> usize {
        self.pages.len().max(1)
    }

    pub fn is_multi_page(&self) -> bool {
        self.pages.len() > 1
    }

    /// Resolve the current page and describe its inputs
    pub async fn view(&self, driver: &dyn Driver) -> Result<ViewOutcome> {
        self.check()?;
        Request::new(self, driver).view().await
    }

    /// Run a submission through every phase and persist what is needed
    pub async fn execute(&self, driver: &dyn Driver) -> Result<Outcome> {
        self.check()?;
        Request::new(self, driver).execute().await
    }
}

static FORM_METHODS: Lazy<MethodTable<Form>> = Lazy::new(|| {
    MethodTable::new("form")
        .with_all(element_methods())
        .with_all(container_methods())
        .with(
            ConfigurableMethod::property(
                "pages",
                |f: &mut Form, mut args| {
                    for config in args.configs(0).unwrap_or_default() {
                        f.pages.push(Arc::new(Page::from_config(&config)?));
                    }
                    Ok(())
                },
                |f| {
                    (!f.pages.is_empty())
                        .then(|| ConfigValue::List(f.pages.iter().map(|p| p.configuration()).collect()))
                },
            )
            .overload(Override::single(Param::required(&["pages"], ParamKind::Configs))),
        )
        .with(
            ConfigurableMethod::property(
                "tokenName",
                |f: &mut Form, mut args| {
                    f.token_name = args.string(0);
                    Ok(())
                },
                |f| f.token_name.clone().map(ConfigValue::from),
            )
            .overload(Override::single(Param::optional(&["tokenName"], ParamKind::String))),
        )
        .with(
            ConfigurableMethod::property(
                "pageName",
                |f: &mut Form, mut args| {
                    f.page_name = args.string(0);
                    Ok(())
                },
                |f| f.page_name.clone().map(ConfigValue::from),
            )
            .overload(Override::single(Param::optional(&["pageName"], ParamKind::String))),
        )
});

impl Configurable for Form {
    fn methods() -> &'static MethodTable<Self> {
        &FORM_METHODS
    }

    fn ordered_entries(&self) -> Vec<OrderedEntry> {
        self.base.ordered_entries()
    }

    fn check(&self) -> std::result::Result<(), ConfigError> {
        self.base.check("form")?;
        self.container.check(&self.base)?;
        let mut seen = HashSet::new();
        for page in &self.pages {
            page.check()?;
            if !seen.insert(page.element_name()) {
                return Err(ConfigError::DuplicateName {
                    container: self.base.name.clone(),
                    name: page.element_name().to_string(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::container::ContainerBuilder;
    use crate::element::input::Input;
    use crate::element::ElementBuilder;
    use crate::handler::Callback;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_field_names_default_to_settings() {
        let form = Form::new("signup");
        assert_eq!(form.token_field(), "token");
        assert_eq!(form.page_field(), "page");

        let form = form.token_name("t").page_name("p");
        assert_eq!(form.token_field(), "t");
        assert_eq!(form.page_field(), "p");
    }

    #[test]
    fn test_page_count() {
        assert_eq!(Form::new("single").page_count(), 1);
        let form = Form::new("wizard").page(Page::new("one")).page(Page::new("two"));
        assert_eq!(form.page_count(), 2);
        assert!(form.is_multi_page());
    }

    #[test]
    fn test_duplicate_pages_rejected() {
        let form = Form::new("wizard").page(Page::new("one")).page(Page::new("one"));
        assert!(matches!(form.check(), Err(ConfigError::DuplicateName { .. })));
    }

    #[test]
    fn test_nested_configuration_round_trip() {
        let done = Callback::sync(Ok);
        let form = Form::new("wizard")
            .token_name("session")
            .on_done(done)
            .input(Input::new("agree").required())
            .page(Page::new("account").input(Input::new("email").required().is("email")))
            .page(Page::new("profile").input(Input::new("bio").max_length(200).keep()));

        let exported = form.configuration();
        let rebuilt = Form::from_config(&exported).unwrap();
        assert_eq!(rebuilt.configuration(), exported);
        assert_eq!(rebuilt.pages().len(), 2);
        assert_eq!(rebuilt.token_field(), "session");
    }

    #[test]
    fn test_unknown_form_key() {
        let err = Form::from_config(&json!({"name": "f", "colour": "red"}).into()).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownMethod { element: "form", .. }));
    }
}
