//! The phase runner: value resolution, execute cascade and notification phases

use super::rules::Failure;
use super::{NodeDef, NodeId, RunContext, Tree};
use crate::config::render_template;
use crate::driver::Driver;
use crate::element::rules::{ExecuteHandler, Rule};
use crate::error::HandlerError;
use crate::handler::{ArmedAction, Phase};
use crate::session::SessionRecord;
use serde_json::Value;
use tracing::error;

impl<'a> Tree<'a> {
    /// Submitted values: permanent, else submitted, else carried, else null
    pub(crate) fn resolve_submitted(&mut self, driver: &dyn Driver, ctx: &RunContext) {
        for node in &mut self.nodes {
            let NodeDef::Input(input) = &node.def else {
                continue;
            };
            let raw = driver
                .post(&node.name)
                .or_else(|| node.path.as_deref().and_then(|path| driver.post(path)))
                .unwrap_or(Value::Null);
            let carried = node.path.as_ref().and_then(|path| ctx.carried.get(path));

            node.value = match (&input.permanent_value, &raw, carried) {
                (Some(permanent), _, _) => permanent.clone(),
                (None, raw, _) if !raw.is_null() => raw.clone(),
                (None, _, Some(carried)) => carried.clone(),
                _ => Value::Null,
            };
            node.raw = raw;
        }
    }

    /// Displayed values: permanent, override, redisplayed raw, carried, default
    pub(crate) fn resolve_view(&mut self, record: Option<&SessionRecord>, ctx: &RunContext) {
        let stored_raw = record.filter(|r| !r.first).map(|r| &r.raw);
        for node in &mut self.nodes {
            let NodeDef::Input(input) = &node.def else {
                continue;
            };
            let raw = stored_raw.and_then(|raw| raw.get(&node.name));
            let carried = node.path.as_ref().and_then(|path| ctx.carried.get(path));

            node.value = input
                .permanent_value
                .as_ref()
                .or(input.override_value.as_ref())
                .or(raw)
                .or(carried)
                .or(input.default_value.as_ref())
                .cloned()
                .unwrap_or(Value::Null);
            node.raw = raw.cloned().unwrap_or(Value::Null);
        }
    }

    fn failure_message(&self, id: NodeId, handler: &ExecuteHandler, failure: Failure) -> String {
        let node = &self.nodes[id];
        let messages = &self.form.settings.messages;
        let (template, vars) = match failure {
            Failure::Rule { template, vars } => (handler.error.clone().unwrap_or(template), vars),
            Failure::Handler(HandlerError::Invalid(Some(message))) => (message, Vec::new()),
            Failure::Handler(HandlerError::Invalid(None)) => (
                handler.error.clone().unwrap_or_else(|| messages.invalid.clone()),
                Vec::new(),
            ),
            Failure::Handler(HandlerError::Internal(e)) => {
                error!(element = %node.name, phase = %handler.phase, error = %e, "Handler failed");
                (messages.invalid.clone(), Vec::new())
            }
        };

        let mut all: Vec<(&str, &str)> = vec![("name", node.ext_name.as_str()), ("label", node.label.as_str())];
        all.extend(vars.iter().map(|(k, v)| (*k, v.as_str())));
        render_template(&template, &all)
    }

    /// Run the handlers one element registered for `phase`, in order.
    /// The first failure is recorded and ends the element's phase; returns
    /// whether every handler passed.
    pub(crate) async fn run_phase(
        &mut self,
        id: NodeId,
        phase: &Phase,
        ctx: &mut RunContext,
        action: Option<&ArmedAction>,
    ) -> bool {
        let def = self.nodes[id].def.clone();
        let form = self.form;
        let handlers = def.base(form).handlers_for(phase);

        for handler in handlers {
            let state = self.state(id, ctx, action.cloned());
            let result = match &handler.rule {
                Rule::Handler(cb) => cb.call(state).await.map_err(Failure::Handler),
                rule => self.apply_rule(id, rule, state),
            };
            match result {
                Ok(state) => {
                    let node = &mut self.nodes[id];
                    node.value = state.value;
                    node.require = state.require;
                }
                Err(failure) => {
                    let message = self.failure_message(id, handler, failure);
                    self.add_error(id, message, ctx);
                    return false;
                }
            }
        }
        true
    }

    /// Process and validate, children first. A container's value is the
    /// nested object of its children's values.
    pub(crate) async fn execute(&mut self, ctx: &mut RunContext) {
        for id in self.post_order() {
            if !matches!(self.nodes[id].def, NodeDef::Input(_)) {
                self.nodes[id].value = self.nested_value(id, false);
            }
            let passed = self.run_phase(id, &Phase::Validate, ctx, None).await;
            let node = &self.nodes[id];
            let children_valid = node.children.iter().all(|&child| self.nodes[child].valid);
            self.nodes[id].valid = passed && children_valid;
        }
    }

    /// `valid` or `invalid` handlers per element, self before children
    pub(crate) async fn notify_validity(&mut self, ctx: &mut RunContext) {
        for id in self.pre_order() {
            let phase = if self.nodes[id].valid {
                Phase::Valid
            } else {
                Phase::Invalid
            };
            self.run_phase(id, &phase, ctx, None).await;
        }
    }

    /// `success` or `fail` handlers, self before children
    pub(crate) async fn notify_outcome(&mut self, success: bool, ctx: &mut RunContext) {
        let phase = if success { Phase::Success } else { Phase::Fail };
        for id in self.pre_order() {
            self.run_phase(id, &phase, ctx, None).await;
        }
    }

    /// A post-order phase over the whole tree (`submit`, `done`)
    pub(crate) async fn run_post_order(&mut self, phase: Phase, ctx: &mut RunContext) {
        for id in self.post_order() {
            self.run_phase(id, &phase, ctx, None).await;
        }
    }

    /// Queue the actions whose triggers match the submitted raw values
    pub(crate) fn arm_triggers(&self, ctx: &mut RunContext) {
        for (_, node, input) in self.inputs() {
            let mut triggers: Vec<_> = input.triggers.iter().collect();
            triggers.sort_by_key(|t| t.order);
            for trigger in triggers.into_iter().filter(|t| t.matches(&node.raw)) {
                let armed = ArmedAction {
                    action: trigger.action.clone(),
                    context: trigger.context.clone(),
                    special: trigger.special().is_some(),
                };
                // One firing per (action, context)
                if !ctx.actions.contains(&armed) {
                    ctx.actions.push(armed);
                }
            }
        }
    }

    /// Run every handler bound to each armed custom action
    pub(crate) async fn fire_actions(&mut self, ctx: &mut RunContext) {
        let armed: Vec<ArmedAction> = ctx.actions.iter().filter(|a| !a.special).cloned().collect();
        for action in &armed {
            let phase = Phase::Action(action.action.clone());
            for id in self.pre_order() {
                self.run_phase(id, &phase, ctx, Some(action)).await;
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
    use crate::element::ElementBuilder;
    use crate::handler::Callback;
    use crate::runtime::tests::driver;
    use crate::runtime::ROOT;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_submitted_value_precedence() {
        let form = Form::new("f")
            .input(Input::new("fixed").permanent_value("P"))
            .input(Input::new("sent"))
            .input(Input::new("kept"))
            .input(Input::new("absent").default_value("D"));
        let submit = driver(json!({"fixed": "x", "sent": "y"}));
        let mut ctx = RunContext::new("t", 0);
        ctx.carried.insert("kept".into(), json!("K"));
        let mut tree = Tree::build(&form, 0, &submit, &mut ctx).await.unwrap();
        tree.resolve_submitted(&submit, &ctx);

        let values: Vec<_> = (1..=4).map(|id| tree.node(id).value.clone()).collect();
        assert_eq!(values, vec![json!("P"), json!("y"), json!("K"), Value::Null]);
        assert_eq!(tree.node(1).raw, json!("x"));
    }

    #[tokio::test]
    async fn test_view_value_precedence() {
        let form = Form::new("f")
            .input(Input::new("shown").override_value("O").default_value("D"))
            .input(Input::new("retyped").default_value("D"))
            .input(Input::new("fresh").default_value("D"));
        let mut record = SessionRecord::new(0);
        record.first = false;
        record.raw.insert("shown".into(), json!("R"));
        record.raw.insert("retyped".into(), json!("R"));

        let mut ctx = RunContext::new("t", 0);
        let mut tree = Tree::build(&form, 0, &driver(json!({})), &mut ctx).await.unwrap();
        tree.resolve_view(Some(&record), &ctx);
        let values: Vec<_> = (1..=3).map(|id| tree.node(id).value.clone()).collect();
        assert_eq!(values, vec![json!("O"), json!("R"), json!("D")]);

        record.first = true;
        tree.resolve_view(Some(&record), &ctx);
        assert_eq!(tree.node(2).value, json!("D"));
    }

    #[tokio::test]
    async fn test_first_failure_skips_remaining_handlers() {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let form = Form::new("f").input(
            Input::new("age")
                .required()
                .validate(Callback::sync(move |state| {
                    *counter.lock().unwrap() += 1;
                    Ok(state)
                })),
        );
        let submit = driver(json!({}));
        let mut ctx = RunContext::new("t", 0);
        let mut tree = Tree::build(&form, 0, &submit, &mut ctx).await.unwrap();
        tree.resolve_submitted(&submit, &ctx);
        tree.execute(&mut ctx).await;

        assert_eq!(*calls.lock().unwrap(), 0);
        assert_eq!(ctx.errors.len(), 1);
        assert_eq!(ctx.errors[0].message, "age is required");
        assert!(!tree.node(1).valid);
        assert!(!tree.node(ROOT).valid);
    }

    #[tokio::test]
    async fn test_process_value_visible_to_parent() {
        let form = Form::new("f")
            .input(Input::new("count").convert(crate::element::rules::Conversion::Int))
            .on(
                Phase::Validate,
                Callback::sync(|state| {
                    if state.value["count"] == json!(12) {
                        Ok(state)
                    } else {
                        Err(HandlerError::invalid("count was not converted"))
                    }
                }),
            );
        let submit = driver(json!({"count": "12"}));
        let mut ctx = RunContext::new("t", 0);
        let mut tree = Tree::build(&form, 0, &submit, &mut ctx).await.unwrap();
        tree.resolve_submitted(&submit, &ctx);
        tree.execute(&mut ctx).await;
        assert_eq!(tree.node(ROOT).value, json!({"count": 12}));
        assert!(ctx.is_valid());
    }

    #[tokio::test]
    async fn test_internal_error_becomes_generic_message() {
        let form = Form::new("f").input(
            Input::new("code")
                .validate(Callback::sync(|_| Err(anyhow::anyhow!("backend down").into())))
                .error("ignored for internal failures"),
        );
        let submit = driver(json!({"code": "x"}));
        let mut ctx = RunContext::new("t", 0);
        let mut tree = Tree::build(&form, 0, &submit, &mut ctx).await.unwrap();
        tree.resolve_submitted(&submit, &ctx);
        tree.execute(&mut ctx).await;
        assert_eq!(ctx.errors[0].message, "code is invalid");
    }

    #[tokio::test]
    async fn test_arm_triggers_in_tree_order() {
        let form = Form::new("f")
            .input(Input::new("go").trigger_on("next", "1").trigger("save"))
            .input(Input::new("other").trigger_with("log", "x", json!({"level": 2})));
        let submit = driver(json!({"go": "1", "other": "x"}));
        let mut ctx = RunContext::new("t", 0);
        let mut tree = Tree::build(&form, 0, &submit, &mut ctx).await.unwrap();
        tree.resolve_submitted(&submit, &ctx);
        tree.arm_triggers(&mut ctx);

        let armed: Vec<_> = ctx.actions.iter().map(|a| (a.action.as_str(), a.special)).collect();
        assert_eq!(armed, vec![("next", true), ("save", false), ("log", false)]);
        assert_eq!(ctx.actions[2].context, json!({"level": 2}));
    }

    #[tokio::test]
    async fn test_same_action_fires_once() {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let form = Form::new("f")
            .input(Input::new("top").trigger("save"))
            .input(Input::new("bottom").trigger("save"))
            .input(Input::new("other").trigger_with("save", "y", json!({"slot": 2})))
            .on_action(
                "save",
                Callback::sync(move |state| {
                    *counter.lock().unwrap() += 1;
                    Ok(state)
                }),
            );
        let submit = driver(json!({"top": "x", "bottom": "x", "other": "y"}));
        let mut ctx = RunContext::new("t", 0);
        let mut tree = Tree::build(&form, 0, &submit, &mut ctx).await.unwrap();
        tree.resolve_submitted(&submit, &ctx);
        tree.arm_triggers(&mut ctx);
        tree.fire_actions(&mut ctx).await;

        let contexts: Vec<_> = ctx.actions.iter().map(|a| a.context.clone()).collect();
        assert_eq!(contexts, vec![Value::Null, json!({"slot": 2})]);
        assert_eq!(*calls.lock().unwrap(), 2);
    }
}
