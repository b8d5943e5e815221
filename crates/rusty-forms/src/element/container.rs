// File: src/element/container.rs
// Purpose: Child ownership shared by pages and forms

use super::component::Component;
use super::input::Input;
use super::{ElementBase, HasBase, Nameable, Groupable};
use crate::configurable::{ConfigValue, Configurable, ConfigurableMethod, Override, Param, ParamKind};
use crate::error::ConfigError;
use crate::handler::ComposeHandler;
use std::collections::HashSet;
use std::sync::Arc;

/// Declared children plus the compose hooks offered to components below
#[derive(Debug, Clone, Default)]
pub struct ContainerBase {
    pub(crate) inputs: Vec<Arc<Input>>,
    pub(crate) components: Vec<Arc<Component>>,
    pub(crate) compose: Vec<ComposeHandler>,
}

impl ContainerBase {
    pub fn inputs(&self) -> &[Arc<Input>] {
        &self.inputs
    }

    pub fn components(&self) -> &[Arc<Component>] {
        &self.components
    }

    pub fn compose_hooks(&self) -> &[ComposeHandler] {
        &self.compose
    }

    /// Direct input child by name or alias
    pub fn input(&self, name: &str) -> Option<&Input> {
        self.inputs
            .iter()
            .map(Arc::as_ref)
            .find(|i| i.element_name() == name || i.element_alias() == Some(name))
    }

    /// Children must be valid and unique by group and name
    pub(crate) fn check(&self, owner: &ElementBase) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        let names = self
            .inputs
            .iter()
            .map(|i| (i.element_group(), i.element_name()))
            .chain(self.components.iter().map(|c| (c.element_group(), c.element_name())));
        for (group, name) in names {
            if !seen.insert((group.to_vec(), name.to_string())) {
                return Err(ConfigError::DuplicateName {
                    container: owner.name.clone(),
                    name: name.to_string(),
                });
            }
        }
        for input in &self.inputs {
            input.check()?;
        }
        for component in &self.components {
            component.check()?;
        }
        Ok(())
    }
}

pub trait HasContainer: HasBase {
    fn container(&self) -> &ContainerBase;
    fn container_mut(&mut self) -> &mut ContainerBase;
}

/// Fluent child registration for pages and forms
pub trait ContainerBuilder: HasContainer + Sized {
    fn input(mut self, input: Input) -> Self {
        self.container_mut().inputs.push(Arc::new(input));
        self
    }

    fn component(mut self, component: Component) -> Self {
        self.container_mut().components.push(Arc::new(component));
        self
    }

    /// Offer a compose hook to every component built below this container
    fn compose(mut self, hook: ComposeHandler) -> Self {
        self.container_mut().compose.push(hook);
        self
    }
}

impl<T: HasContainer> ContainerBuilder for T {}

fn export_all<C: Configurable>(children: &[Arc<C>]) -> Option<ConfigValue> {
    (!children.is_empty()).then(|| ConfigValue::List(children.iter().map(|c| c.configuration()).collect()))
}

pub(crate) fn container_methods<T: HasContainer + Configurable>() -> Vec<ConfigurableMethod<T>> {
    vec![
        ConfigurableMethod::property(
            "inputs",
            |t: &mut T, mut args| {
                for config in args.configs(0).unwrap_or_default() {
                    let input = Input::from_config(&config)?;
                    t.container_mut().inputs.push(Arc::new(input));
                }
                Ok(())
            },
            |t| export_all(&t.container().inputs),
        )
        .overload(Override::single(Param::required(&["inputs"], ParamKind::Configs))),
        ConfigurableMethod::property(
            "components",
            |t: &mut T, mut args| {
                for config in args.configs(0).unwrap_or_default() {
                    let component = Component::from_config(&config)?;
                    t.container_mut().components.push(Arc::new(component));
                }
                Ok(())
            },
            |t| export_all(&t.container().components),
        )
        .overload(Override::single(Param::required(&["components"], ParamKind::Configs))),
        ConfigurableMethod::property(
            "compose",
            |t: &mut T, mut args| {
                let hooks = args.compose(0).unwrap_or_default();
                t.container_mut().compose.extend(hooks);
                Ok(())
            },
            |t| {
                let hooks = &t.container().compose;
                (!hooks.is_empty())
                    .then(|| ConfigValue::List(hooks.iter().cloned().map(ConfigValue::from).collect()))
            },
        )
        .overload(Override::single(Param::required(&["compose"], ParamKind::Compose))),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::page::Page;
    use crate::element::ElementBuilder;
    use serde_json::json;

    #[test]
    fn test_duplicate_names_rejected() {
        let page = Page::new("one").input(Input::new("a")).input(Input::new("a"));
        let err = page.check().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateName { name, .. } if name == "a"));
    }

    #[test]
    fn test_same_name_in_different_groups_allowed() {
        let page = Page::new("one")
            .input(Input::new("street").group(["home"]))
            .input(Input::new("street").group(["work"]));
        assert!(page.check().is_ok());
    }

    #[test]
    fn test_lookup_by_alias() {
        let page = Page::new("one").input(Input::new("email_address").alias("email"));
        assert!(page.container().input("email").is_some());
        assert!(page.container().input("phone").is_none());
    }

    #[test]
    fn test_inputs_key_accepts_single_object() {
        let page = Page::from_config(&json!({"name": "p", "inputs": {"name": "only"}}).into()).unwrap();
        assert_eq!(page.container().inputs().len(), 1);
    }
}
