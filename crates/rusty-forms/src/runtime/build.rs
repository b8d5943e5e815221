//! Tree instantiation: declared children, compose expansion, build handlers

use super::{Node, NodeDef, NodeId, RunContext, Tree, ROOT};
use crate::configurable::Configurable;
use crate::driver::Driver;
use crate::element::component::{ComposeDetails, ComposeOutcome, Composed};
use crate::element::container::ContainerBase;
use crate::element::form::Form;
use crate::element::{Groupable, Nameable, SYNTHETIC_PREFIX};
use crate::error::{ConfigError, FormError, Result};
use crate::handler::{ComposeHandler, Phase};
use serde_json::Value;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, error};

/// Components nested deeper than this abort the build
pub(crate) const MAX_COMPOSE_DEPTH: usize = 32;

impl<'a> Tree<'a> {
    /// Instantiate the form and the page at `page`, expand every component
    /// until none is left, then run build handlers children first.
    pub(crate) async fn build(
        form: &'a Form,
        page: usize,
        driver: &dyn Driver,
        ctx: &mut RunContext,
    ) -> Result<Tree<'a>> {
        let root = Node {
            def: NodeDef::Form,
            parent: None,
            children: Vec::new(),
            name: form.base.name.clone(),
            ext_name: form.base.name.clone(),
            alias: form.base.alias.clone(),
            group: Vec::new(),
            rel_path: Vec::new(),
            path: None,
            label: form.base.label.clone().unwrap_or_else(|| form.base.name.clone()),
            raw: Value::Null,
            value: Value::Null,
            require: false,
            valid: true,
        };
        let mut tree = Tree {
            form,
            nodes: vec![root],
            page: None,
        };

        let mut queue = VecDeque::new();
        tree.attach(ROOT, &form.container, &mut queue);
        if let Some(page_def) = form.pages.get(page) {
            let id = tree.push_node(ROOT, NodeDef::Page(page_def.clone()), None);
            tree.page = Some(id);
            tree.attach(id, &page_def.container, &mut queue);
        }

        while let Some(id) = queue.pop_front() {
            tree.compose(id, driver, &mut queue).await?;
        }

        for id in tree.post_order() {
            tree.run_phase(id, &Phase::Build, ctx, None).await;
        }

        debug!(form = %form.base.name, page, nodes = tree.nodes.len(), "Built request tree");
        Ok(tree)
    }

    fn attach(&mut self, parent: NodeId, container: &'a ContainerBase, queue: &mut VecDeque<NodeId>) {
        for input in &container.inputs {
            self.push_node(parent, NodeDef::Input(input.clone()), None);
        }
        for component in &container.components {
            let id = self.push_node(parent, NodeDef::Component(component.clone()), None);
            queue.push_back(id);
        }
    }

    /// Group prefix a node hands down to its children
    fn child_prefix(&self, id: NodeId) -> Vec<String> {
        let node = &self.nodes[id];
        match node.def {
            NodeDef::Component(_) => {
                let mut prefix = node.group.clone();
                prefix.push(node.ext_name.clone());
                prefix
            }
            _ => node.group.clone(),
        }
    }

    fn push_node(&mut self, parent: NodeId, def: NodeDef, storage_name: Option<String>) -> NodeId {
        let base = def.base(self.form);
        let declared = base.group.clone().unwrap_or_default();
        let ext_name = base.name.clone();
        let alias = base.alias.clone();
        let label = base.label.clone().unwrap_or_else(|| ext_name.clone());

        let mut group = self.child_prefix(parent);
        group.extend(declared.iter().cloned());

        let path = match def {
            NodeDef::Page(_) => ext_name.clone(),
            _ => group
                .iter()
                .chain(std::iter::once(&ext_name))
                .cloned()
                .collect::<Vec<_>>()
                .join("."),
        };
        let mut rel_path = declared;
        rel_path.push(ext_name.clone());

        let id = self.nodes.len();
        self.nodes.push(Node {
            def,
            parent: Some(parent),
            children: Vec::new(),
            name: storage_name.unwrap_or_else(|| ext_name.clone()),
            ext_name,
            alias,
            group,
            rel_path,
            path: Some(path),
            label,
            raw: Value::Null,
            value: Value::Null,
            require: false,
            valid: true,
        });
        self.nodes[parent].children.push(id);
        id
    }

    fn page_ancestor(&self, id: NodeId) -> Option<NodeId> {
        let mut current = self.nodes[id].parent;
        while let Some(parent) = current {
            if matches!(self.nodes[parent].def, NodeDef::Page(_)) {
                return Some(parent);
            }
            current = self.nodes[parent].parent;
        }
        None
    }

    /// Components from `id` up to the root, `id` included
    fn component_depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = Some(id);
        while let Some(node) = current {
            if matches!(self.nodes[node].def, NodeDef::Component(_)) {
                depth += 1;
            }
            current = self.nodes[node].parent;
        }
        depth
    }

    /// Ask the page's hooks, then the form's, then the driver to expand a
    /// component; the first that halts supplies its children.
    async fn compose(&mut self, id: NodeId, driver: &dyn Driver, queue: &mut VecDeque<NodeId>) -> Result<()> {
        let NodeDef::Component(component) = self.nodes[id].def.clone() else {
            return Ok(());
        };
        let node = &self.nodes[id];
        let depth = self.component_depth(id);
        if depth > MAX_COMPOSE_DEPTH {
            let path = node.path.clone().unwrap_or_default();
            error!(component = %path, depth, "Compose depth exceeded");
            return Err(FormError::ComposeDepth {
                component: path,
                limit: MAX_COMPOSE_DEPTH,
            });
        }
        let details = ComposeDetails {
            kind: component.kind.clone(),
            id: node.path.clone().unwrap_or_default(),
            name: node.ext_name.clone(),
            params: component.params.clone(),
            template: component.template.clone(),
            default_value: component.default_value.clone(),
            form: self.form.base.name.clone(),
            page: self.page.map(|p| self.nodes[p].name.clone()),
        };

        let page_hooks: &[ComposeHandler] = match self.page_ancestor(id).map(|p| &self.nodes[p].def) {
            Some(NodeDef::Page(page)) => &page.container.compose,
            _ => &[],
        };
        let hooks: Vec<ComposeHandler> = page_hooks
            .iter()
            .chain(self.form.container.compose.iter())
            .cloned()
            .collect();

        let compose_error = |source: anyhow::Error| FormError::Compose {
            component: details.id.clone(),
            source,
        };

        let mut outcome = ComposeOutcome::Pass;
        for hook in hooks {
            outcome = hook.call(details.clone()).await.map_err(compose_error)?;
            if !matches!(outcome, ComposeOutcome::Pass) {
                break;
            }
        }
        if matches!(outcome, ComposeOutcome::Pass) {
            outcome = driver.compose(&details).await.map_err(compose_error)?;
        }

        let elements = match outcome {
            ComposeOutcome::Halt(elements) => elements,
            ComposeOutcome::Handled => Vec::new(),
            ComposeOutcome::Pass => {
                return Err(FormError::UnknownComponent {
                    kind: component.kind.clone(),
                })
            }
        };
        debug!(component = %details.id, kind = %details.kind, generated = elements.len(), "Composed component");

        let mut seen = HashSet::new();
        for element in &elements {
            let (group, name) = match element {
                Composed::Input(input) => (input.element_group(), input.element_name()),
                Composed::Component(nested) => (nested.element_group(), nested.element_name()),
            };
            if !seen.insert((group.to_vec(), name.to_string())) {
                return Err(ConfigError::DuplicateName {
                    container: details.id.clone(),
                    name: name.to_string(),
                }
                .into());
            }
        }

        let prefix = self.child_prefix(id);
        for element in elements {
            match element {
                Composed::Input(mut input) => {
                    input.check()?;
                    if input.default_value.is_none() {
                        input.default_value = component.default_value.clone();
                    }
                    let path: Vec<String> = prefix
                        .iter()
                        .chain(input.base.group.iter().flatten())
                        .chain(std::iter::once(&input.base.name))
                        .cloned()
                        .collect();
                    let storage_name = format!("{}{}", SYNTHETIC_PREFIX, path.join(SYNTHETIC_PREFIX));
                    self.push_node(id, NodeDef::Input(Arc::new(input)), Some(storage_name));
                }
                Composed::Component(nested) => {
                    nested.check()?;
                    let child = self.push_node(id, NodeDef::Component(Arc::new(nested)), None);
                    queue.push_back(child);
                }
            }
        }
        Ok(())
    }
}
