// File: src/element/page.rs
// Purpose: One step of a multi-page form, and the navigation actions

use super::container::{container_methods, ContainerBase, HasContainer};
use super::{element_methods, ElementBase, HasBase};
use crate::configurable::{ConfigValue, Configurable, MethodTable, OrderedEntry};
use crate::error::ConfigError;
use crate::handler::ElementKind;
use once_cell::sync::Lazy;
use std::fmt;

/// Reserved trigger actions that move between pages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialAction {
    Next,
    Prev,
    Reset,
    Rerun,
    Submit,
}

impl SpecialAction {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "next" => Some(SpecialAction::Next),
            "prev" => Some(SpecialAction::Prev),
            "reset" => Some(SpecialAction::Reset),
            "rerun" => Some(SpecialAction::Rerun),
            "submit" => Some(SpecialAction::Submit),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SpecialAction::Next => "next",
            SpecialAction::Prev => "prev",
            SpecialAction::Reset => "reset",
            SpecialAction::Rerun => "rerun",
            SpecialAction::Submit => "submit",
        }
    }
}

impl fmt::Display for SpecialAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub(crate) base: ElementBase,
    pub(crate) container: ContainerBase,
}

impl HasBase for Page {
    const KIND: ElementKind = ElementKind::Page;

    fn base(&self) -> &ElementBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ElementBase {
        &mut self.base
    }
}

impl HasContainer for Page {
    fn container(&self) -> &ContainerBase {
        &self.container
    }

    fn container_mut(&mut self) -> &mut ContainerBase {
        &mut self.container
    }
}

impl Page {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            base: ElementBase::named(name),
            container: ContainerBase::default(),
        }
    }

    pub fn from_config(config: &ConfigValue) -> Result<Self, ConfigError> {
        let mut page = Self::default();
        page.configure(config)?;
        Ok(page)
    }
}

static PAGE_METHODS: Lazy<MethodTable<Page>> = Lazy::new(|| {
    MethodTable::new("page")
        .with_all(element_methods())
        .with_all(container_methods())
});

impl Configurable for Page {
    fn methods() -> &'static MethodTable<Self> {
        &PAGE_METHODS
    }

    fn ordered_entries(&self) -> Vec<OrderedEntry> {
        self.base.ordered_entries()
    }

    fn check(&self) -> Result<(), ConfigError> {
        self.base.check("page")?;
        self.container.check(&self.base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::container::ContainerBuilder;
    use crate::element::input::Input;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_special_action_names() {
        for action in [
            SpecialAction::Next,
            SpecialAction::Prev,
            SpecialAction::Reset,
            SpecialAction::Rerun,
            SpecialAction::Submit,
        ] {
            assert_eq!(SpecialAction::from_name(action.name()), Some(action));
        }
        assert_eq!(SpecialAction::from_name("save"), None);
    }

    #[test]
    fn test_page_round_trip_with_children() {
        let page = Page::new("details")
            .input(Input::new("first").required())
            .input(Input::new("last"));
        let exported = page.configuration();
        let rebuilt = Page::from_config(&exported).unwrap();
        assert_eq!(rebuilt.configuration(), exported);
        assert_eq!(
            exported.get("inputs").and_then(|i| i.to_json()),
            Some(json!([
                {"name": "first", "ordered": [{"required": [true]}]},
                {"name": "last"}
            ]))
        );
    }
}
