//! Error routing between elements

use super::{NodeDef, NodeId, RunContext, Tree, ROOT};
use crate::element::PipeTarget;
use crate::request::ErrorEntry;
use std::collections::HashSet;
use tracing::{debug, warn};

impl<'a> Tree<'a> {
    /// Follow pipe directives from `from` to the element owning its errors.
    /// `None` when an explicit path leads nowhere.
    pub(crate) fn pipe_owner(&self, from: NodeId) -> Option<NodeId> {
        let mut current = from;
        let mut visited = HashSet::from([from]);

        loop {
            let next = match &self.base(current).pipe {
                None => return Some(current),
                Some(PipeTarget::Form) => ROOT,
                Some(PipeTarget::Page) => match self.nodes[current].def {
                    NodeDef::Page(_) => ROOT,
                    _ => self.page.unwrap_or(ROOT),
                },
                Some(PipeTarget::Container | PipeTarget::Parent) => self.container_of(current),
                Some(PipeTarget::Path(path)) => self.find(path)?,
            };
            if next == current || !visited.insert(next) {
                return Some(next);
            }
            current = next;
        }
    }

    /// Record a validation error raised on `from`, delivered to its pipe owner
    pub(crate) fn add_error(&self, from: NodeId, message: String, ctx: &mut RunContext) {
        match self.pipe_owner(from) {
            Some(owner) => {
                let path = if owner == ROOT {
                    None
                } else {
                    self.nodes[owner].path.clone()
                };
                debug!(element = %self.nodes[from].name, owner = ?path, message = %message, "Recorded error");
                ctx.errors.push(ErrorEntry { path, message });
            }
            None => {
                let path = self.nodes[from].path.clone();
                warn!(element = %self.nodes[from].name, message = %message, "Error pipe target not found");
                ctx.lost_errors.push(ErrorEntry { path, message });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::container::ContainerBuilder;
    use crate::element::form::Form;
    use crate::element::input::Input;
    use crate::element::page::Page;
    use crate::element::ElementBuilder;
    use crate::runtime::tests::driver;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    async fn tree_for(form: &Form) -> Tree<'_> {
        let mut ctx = RunContext::new("t", 0);
        Tree::build(form, 0, &driver(json!({})), &mut ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_pipe_targets() {
        let form = Form::new("f")
            .input(Input::new("plain"))
            .input(Input::new("to_form").pipe("->form"))
            .input(Input::new("confirm").pipe("password"))
            .input(Input::new("password"))
            .input(Input::new("lost").pipe("missing.field"))
            .page(
                Page::new("step")
                    .input(Input::new("to_page").pipe("->page"))
                    .input(Input::new("to_container").pipe("->container"))
                    .input(Input::new("to_parent").pipe("->parent")),
            );
        let tree = tree_for(&form).await;
        let id = |path: &str| tree.find(path).unwrap();
        let page = tree.page.unwrap();

        assert_eq!(tree.pipe_owner(id("plain")), Some(id("plain")));
        assert_eq!(tree.pipe_owner(id("to_form")), Some(ROOT));
        assert_eq!(tree.pipe_owner(id("confirm")), Some(id("password")));
        assert_eq!(tree.pipe_owner(id("lost")), None);
        assert_eq!(tree.pipe_owner(id("to_page")), Some(page));
        assert_eq!(tree.pipe_owner(id("to_container")), Some(page));
        assert_eq!(tree.pipe_owner(id("to_parent")), Some(page));
    }

    #[tokio::test]
    async fn test_pipe_cycle_stops() {
        let form = Form::new("f")
            .input(Input::new("a").pipe("b"))
            .input(Input::new("b").pipe("a"));
        let tree = tree_for(&form).await;
        let a = tree.find("a").unwrap();
        let b = tree.find("b").unwrap();
        assert_eq!(tree.pipe_owner(a), Some(a));
        assert_eq!(tree.pipe_owner(b), Some(b));
    }

    #[tokio::test]
    async fn test_add_error_records_owner_path() {
        let form = Form::new("f")
            .input(Input::new("to_form").pipe("->form"))
            .input(Input::new("lost").pipe("nope"));
        let tree = tree_for(&form).await;
        let mut ctx = RunContext::new("t", 0);

        tree.add_error(tree.find("to_form").unwrap(), "bad".into(), &mut ctx);
        tree.add_error(tree.find("lost").unwrap(), "gone".into(), &mut ctx);

        assert_eq!(ctx.errors, vec![ErrorEntry { path: None, message: "bad".into() }]);
        assert_eq!(ctx.lost_errors, vec![ErrorEntry { path: Some("lost".into()), message: "gone".into() }]);
        assert!(!ctx.is_valid());
    }
}
