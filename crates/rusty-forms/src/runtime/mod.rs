//! Per-request runtime tree.
//!
//! A form definition is shared and immutable; every request instantiates the
//! parts it needs (the form, the current page, and whatever components
//! compose into) as nodes of an arena. Nodes carry the request-scoped state
//! (raw and processed values, validity) and refer back to their definitions.

mod build;
mod phases;
mod pipe;
mod rules;

use crate::element::component::Component;
use crate::element::form::Form;
use crate::element::input::Input;
use crate::element::page::Page;
use crate::element::ElementBase;
use crate::handler::{ArmedAction, ElementInfo, ElementKind, State};
use crate::request::ErrorEntry;
use crate::value::insert_path;
use serde_json::{Map, Value};
use std::sync::Arc;

pub(crate) type NodeId = usize;

pub(crate) const ROOT: NodeId = 0;

/// Definition behind a runtime node
#[derive(Debug, Clone)]
pub(crate) enum NodeDef {
    Form,
    Page(Arc<Page>),
    Component(Arc<Component>),
    Input(Arc<Input>),
}

impl NodeDef {
    pub(crate) fn kind(&self) -> ElementKind {
        match self {
            NodeDef::Form => ElementKind::Form,
            NodeDef::Page(_) => ElementKind::Page,
            NodeDef::Component(_) => ElementKind::Component,
            NodeDef::Input(_) => ElementKind::Input,
        }
    }

    pub(crate) fn base<'b>(&'b self, form: &'b Form) -> &'b ElementBase {
        match self {
            NodeDef::Form => &form.base,
            NodeDef::Page(page) => &page.base,
            NodeDef::Component(component) => &component.base,
            NodeDef::Input(input) => &input.base,
        }
    }

    pub(crate) fn input(&self) -> Option<&Input> {
        match self {
            NodeDef::Input(input) => Some(input),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub def: NodeDef,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Storage name; synthetic for composed inputs
    pub name: String,
    /// Declared name, used in external paths
    pub ext_name: String,
    pub alias: Option<String>,
    /// Effective group: ancestor prefixes plus the declared group
    pub group: Vec<String>,
    /// Path relative to the parent's value object
    pub rel_path: Vec<String>,
    /// External dotted path; `None` for the form
    pub path: Option<String>,
    pub label: String,
    pub raw: Value,
    pub value: Value,
    pub require: bool,
    pub valid: bool,
}

/// Request-scoped bookkeeping shared by every phase
#[derive(Debug, Clone, Default)]
pub(crate) struct RunContext {
    pub token: String,
    pub page: usize,
    pub errors: Vec<ErrorEntry>,
    pub lost_errors: Vec<ErrorEntry>,
    pub actions: Vec<ArmedAction>,
    /// Values of `keep` inputs carried from earlier requests, by path
    pub carried: Map<String, Value>,
}

impl RunContext {
    pub(crate) fn new(token: impl Into<String>, page: usize) -> Self {
        Self {
            token: token.into(),
            page,
            ..Self::default()
        }
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.errors.is_empty() && self.lost_errors.is_empty()
    }
}

pub(crate) struct Tree<'a> {
    pub form: &'a Form,
    pub nodes: Vec<Node>,
    /// Node of the current page, for multi-page forms
    pub page: Option<NodeId>,
}

impl<'a> Tree<'a> {
    pub(crate) fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub(crate) fn base(&self, id: NodeId) -> &ElementBase {
        self.nodes[id].def.base(self.form)
    }

    /// Node ids, parents before children
    pub(crate) fn pre_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![ROOT];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id].children.iter().rev());
        }
        order
    }

    /// Node ids, children before parents
    pub(crate) fn post_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(ROOT, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            stack.push((id, true));
            stack.extend(self.nodes[id].children.iter().rev().map(|&c| (c, false)));
        }
        order
    }

    pub(crate) fn inputs(&self) -> impl Iterator<Item = (NodeId, &Node, &Input)> + '_ {
        self.pre_order()
            .into_iter()
            .filter_map(move |id| {
                let node = &self.nodes[id];
                node.def.input().map(|input| (id, node, input))
            })
    }

    /// Nearest page or form ancestor
    pub(crate) fn container_of(&self, id: NodeId) -> NodeId {
        let mut current = self.nodes[id].parent;
        while let Some(parent) = current {
            if matches!(self.nodes[parent].def, NodeDef::Page(_) | NodeDef::Form) {
                return parent;
            }
            current = self.nodes[parent].parent;
        }
        ROOT
    }

    /// Resolve a dotted path against every node of the request.
    ///
    /// The whole path is tried as a storage name or external path first;
    /// otherwise the trailing segment must match a name or alias and the
    /// leading segments the node's group.
    pub(crate) fn find(&self, path: &str) -> Option<NodeId> {
        let order = self.pre_order();
        if let Some(&id) = order.iter().find(|&&id| {
            let node = &self.nodes[id];
            let synthetic = node.name != node.ext_name;
            id != ROOT && (node.path.as_deref() == Some(path) || (synthetic && node.name == path))
        }) {
            return Some(id);
        }

        let segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();
        let (target, group) = segments.split_last()?;
        order.into_iter().find(|&id| {
            let node = &self.nodes[id];
            id != ROOT
                && (node.ext_name == *target || node.alias.as_deref() == Some(*target))
                && node.group.len() == group.len()
                && node.group.iter().zip(group).all(|(a, b)| a.as_str() == *b)
        })
    }

    /// Nested value of a container's children.
    ///
    /// With `strip_secure` the value is rebuilt from the inputs and secure
    /// inputs are left out; otherwise the children's current values are used.
    pub(crate) fn nested_value(&self, id: NodeId, strip_secure: bool) -> Value {
        let mut map = Map::new();
        for &child in &self.nodes[id].children {
            let node = &self.nodes[child];
            match &node.def {
                NodeDef::Input(input) => {
                    if strip_secure && input.secure {
                        continue;
                    }
                    insert_path(&mut map, &node.rel_path, node.value.clone());
                }
                NodeDef::Component(_) => {
                    let value = if strip_secure {
                        self.nested_value(child, true)
                    } else {
                        node.value.clone()
                    };
                    insert_path(&mut map, &node.rel_path, value);
                }
                NodeDef::Page(_) | NodeDef::Form => {
                    let value = if strip_secure {
                        self.nested_value(child, true)
                    } else {
                        node.value.clone()
                    };
                    if let Value::Object(inner) = value {
                        for (key, value) in inner {
                            insert_path(&mut map, &[key], value);
                        }
                    }
                }
            }
        }
        Value::Object(map)
    }

    /// Every input value by external path, secure ones included, over the
    /// values carried from earlier pages
    pub(crate) fn flat_values(&self, carried: &Map<String, Value>) -> Map<String, Value> {
        let mut values = carried.clone();
        for (_, node, _) in self.inputs() {
            if let Some(path) = &node.path {
                values.insert(path.clone(), node.value.clone());
            }
        }
        values
    }

    pub(crate) fn element_info(&self, id: NodeId) -> ElementInfo {
        let node = &self.nodes[id];
        ElementInfo {
            kind: node.def.kind(),
            name: node.name.clone(),
            path: node.path.clone(),
            label: node.label.clone(),
            context: self.base(id).context.clone(),
        }
    }

    pub(crate) fn state(&self, id: NodeId, ctx: &RunContext, action: Option<ArmedAction>) -> State {
        let node = &self.nodes[id];
        State {
            value: node.value.clone(),
            require: node.require,
            element: self.element_info(id),
            values: self.flat_values(&ctx.carried),
            action,
            token: ctx.token.clone(),
            page: ctx.page,
        }
    }
}
