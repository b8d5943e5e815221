//! Request orchestration.
//!
//! A `Request` drives one `view` or `execute` call: it resolves the session
//! token, loads what earlier requests stored, instantiates the runtime tree
//! for the current page, runs the phases and decides where the wizard goes
//! next.

use crate::driver::Driver;
use crate::element::form::Form;
use crate::element::page::SpecialAction;
use crate::element::rules::InputOption;
use crate::error::{FormError, Result};
use crate::handler::{ArmedAction, Phase};
use crate::runtime::{RunContext, Tree, ROOT};
use crate::session::{SessionRecord, StoredError};
use crate::value::{insert_path, merge, to_text};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, info};
use uuid::Uuid;

/// An error reported against an element, or against the form when `path` is `None`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub path: Option<String>,
    pub message: String,
}

impl From<&ErrorEntry> for StoredError {
    fn from(entry: &ErrorEntry) -> Self {
        StoredError {
            name: entry.path.clone(),
            error: entry.message.clone(),
        }
    }
}

impl From<&StoredError> for ErrorEntry {
    fn from(stored: &StoredError) -> Self {
        ErrorEntry {
            path: stored.name.clone(),
            message: stored.error.clone(),
        }
    }
}

/// Lifecycle of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    New,
    Loading,
    Building,
    Executing,
    Valid,
    Invalid,
    Storing,
    Responding,
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RequestPhase::New => "new",
            RequestPhase::Loading => "loading",
            RequestPhase::Building => "building",
            RequestPhase::Executing => "executing",
            RequestPhase::Valid => "valid",
            RequestPhase::Invalid => "invalid",
            RequestPhase::Storing => "storing",
            RequestPhase::Responding => "responding",
        };
        f.write_str(name)
    }
}

/// Result of `Form::execute`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub token: String,
    /// Page the client should show next
    pub page: usize,
    pub valid: bool,
    /// The whole wizard finished and its session was cleared
    pub completed: bool,
    /// A session record was written for the next request
    pub saved: bool,
    /// The client should navigate to `destination`
    pub reload: bool,
    pub destination: Option<String>,
    /// Values by external path, nested; secure inputs are left out
    pub values: Value,
    pub errors: Vec<ErrorEntry>,
    /// Errors whose pipe target could not be resolved
    pub lost_errors: Vec<ErrorEntry>,
    pub actions: Vec<ArmedAction>,
}

/// Result of `Form::view`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewOutcome {
    pub token: String,
    pub page: usize,
    pub page_count: usize,
    /// The page is shown for the first time; no submission is redisplayed
    pub first: bool,
    pub values: Value,
    pub errors: Vec<ErrorEntry>,
    pub inputs: Vec<InputView>,
}

impl ViewOutcome {
    pub fn input(&self, path: &str) -> Option<&InputView> {
        self.inputs.iter().find(|i| i.path == path)
    }

    /// Errors reported against `path`
    pub fn errors_for<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.errors
            .iter()
            .filter(move |e| e.path.as_deref() == Some(path))
            .map(|e| e.message.as_str())
    }
}

/// What a renderer needs to draw one input
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InputView {
    /// Field name to submit under
    pub name: String,
    pub path: String,
    pub label: String,
    /// Display value; always null for secure inputs
    pub value: Value,
    pub required: bool,
    pub secure: bool,
    pub input_type: Option<String>,
    pub options: Vec<InputOption>,
}

/// Where a finished submission sends the wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Navigation {
    /// Redisplay the current page with its submission
    Stay,
    Goto(usize),
    Rerun,
    Reset,
    Complete,
}

pub struct Request<'a> {
    form: &'a Form,
    driver: &'a dyn Driver,
    phase: RequestPhase,
}

impl<'a> Request<'a> {
    pub fn new(form: &'a Form, driver: &'a dyn Driver) -> Self {
        Self {
            form,
            driver,
            phase: RequestPhase::New,
        }
    }

    pub fn phase(&self) -> RequestPhase {
        self.phase
    }

    fn transition(&mut self, next: RequestPhase) {
        debug!(form = %self.form.base.name, from = %self.phase, to = %next, "Request phase");
        self.phase = next;
    }

    /// Submitted token, or a fresh one
    fn token(&self) -> String {
        self.driver
            .request(self.form.token_field())
            .map(|value| to_text(&value).trim().to_string())
            .filter(|token| !token.is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string())
    }

    async fn load(&mut self, token: &str) -> Result<Option<SessionRecord>> {
        self.transition(RequestPhase::Loading);
        let record = self
            .driver
            .load(&self.form.base.name, token)
            .await
            .map_err(FormError::Session)?;
        debug!(form = %self.form.base.name, token, found = record.is_some(), "Session loaded");
        Ok(record)
    }

    fn clamp_page(&self, page: usize) -> usize {
        page.min(self.form.page_count() - 1)
    }

    /// Resolve the current page and describe its inputs
    pub async fn view(mut self) -> Result<ViewOutcome> {
        let token = self.token();
        let record = self.load(&token).await?;
        let page = self.clamp_page(record.as_ref().map_or(0, |r| r.page));

        let mut ctx = RunContext::new(token, page);
        if let Some(record) = &record {
            ctx.carried = record.values.clone();
        }

        self.transition(RequestPhase::Building);
        let mut tree = Tree::build(self.form, page, self.driver, &mut ctx).await?;
        tree.resolve_view(record.as_ref(), &ctx);

        let first = record.as_ref().map_or(true, |r| r.first);
        let mut errors: Vec<ErrorEntry> = match &record {
            Some(record) if !record.first => record.errors.iter().map(ErrorEntry::from).collect(),
            _ => Vec::new(),
        };
        errors.append(&mut ctx.errors);

        let inputs = tree
            .inputs()
            .filter_map(|(_, node, input)| {
                let path = node.path.clone()?;
                Some(InputView {
                    name: node.name.clone(),
                    path,
                    label: node.label.clone(),
                    value: if input.secure { Value::Null } else { node.value.clone() },
                    required: input.is_required(),
                    secure: input.secure,
                    input_type: input.input_type.clone(),
                    options: input.allowed_options().to_vec(),
                })
            })
            .collect();

        self.transition(RequestPhase::Responding);
        Ok(ViewOutcome {
            values: output_values(&tree, &ctx.carried),
            token: ctx.token,
            page,
            page_count: self.form.page_count(),
            first,
            errors,
            inputs,
        })
    }

    /// Run a submission through every phase, then navigate and persist
    pub async fn execute(mut self) -> Result<Outcome> {
        let token = self.token();
        let record = self.load(&token).await?;
        let page = self.clamp_page(record.as_ref().map_or(0, |r| r.page));

        let mut ctx = RunContext::new(token, page);
        if let Some(record) = record {
            ctx.carried = record.values;
        }

        self.transition(RequestPhase::Building);
        let mut tree = Tree::build(self.form, page, self.driver, &mut ctx).await?;
        tree.resolve_submitted(self.driver, &ctx);

        self.transition(RequestPhase::Executing);
        tree.execute(&mut ctx).await;
        tree.arm_triggers(&mut ctx);
        let intent = ctx
            .actions
            .iter()
            .find(|a| a.special)
            .and_then(|a| SpecialAction::from_name(&a.action));

        tree.notify_validity(&mut ctx).await;
        let valid = ctx.is_valid();
        self.transition(if valid { RequestPhase::Valid } else { RequestPhase::Invalid });

        let last_page = page + 1 >= self.form.page_count();
        let completes = valid
            && match intent {
                Some(SpecialAction::Submit) => true,
                Some(SpecialAction::Next) | None => last_page,
                _ => false,
            };

        tree.notify_outcome(valid, &mut ctx).await;
        if completes && ctx.is_valid() {
            tree.run_post_order(Phase::Submit, &mut ctx).await;
        }
        tree.fire_actions(&mut ctx).await;
        tree.run_post_order(Phase::Done, &mut ctx).await;

        let valid = ctx.is_valid();
        let navigation = if !valid {
            Navigation::Stay
        } else {
            match intent {
                Some(SpecialAction::Prev) => Navigation::Goto(page.saturating_sub(1)),
                Some(SpecialAction::Reset) => Navigation::Reset,
                Some(SpecialAction::Rerun) => Navigation::Rerun,
                Some(SpecialAction::Submit) => Navigation::Complete,
                Some(SpecialAction::Next) | None if last_page => Navigation::Complete,
                Some(SpecialAction::Next) | None => Navigation::Goto(page + 1),
            }
        };
        debug!(form = %self.form.base.name, token = %ctx.token, ?navigation, "Navigation decided");

        self.transition(RequestPhase::Storing);
        let form: &'a Form = self.form;
        let form_name = form.base.name.as_str();
        let kept = kept_values(&tree, &ctx.carried);
        let (next_page, saved, reload) = match navigation {
            Navigation::Stay | Navigation::Rerun => {
                let record = SessionRecord {
                    raw: raw_values(&tree),
                    values: kept.clone(),
                    errors: ctx.errors.iter().map(StoredError::from).collect(),
                    first: false,
                    page,
                    saved_at: Utc::now(),
                };
                self.save(&ctx.token, record).await?;
                (page, true, true)
            }
            Navigation::Goto(next) => {
                let mut record = SessionRecord::new(next);
                record.values = kept.clone();
                self.save(&ctx.token, record).await?;
                (next, true, true)
            }
            Navigation::Reset => {
                self.clear(&ctx.token).await?;
                (0, false, true)
            }
            Navigation::Complete => {
                self.clear(&ctx.token).await?;
                info!(form = form_name, token = %ctx.token, "Form completed");
                (page, false, false)
            }
        };

        self.transition(RequestPhase::Responding);
        let destination = reload.then(|| self.destination(&ctx.token, next_page));
        let values = if navigation == Navigation::Reset {
            output_values(&tree, &Map::new())
        } else {
            output_values(&tree, &kept)
        };

        Ok(Outcome {
            token: ctx.token,
            page: next_page,
            valid,
            completed: navigation == Navigation::Complete,
            saved,
            reload,
            destination,
            values,
            errors: ctx.errors,
            lost_errors: ctx.lost_errors,
            actions: ctx.actions,
        })
    }

    async fn save(&self, token: &str, record: SessionRecord) -> Result<()> {
        self.driver
            .save(&self.form.base.name, token, record)
            .await
            .map_err(FormError::Session)
    }

    async fn clear(&self, token: &str) -> Result<()> {
        self.driver
            .clear(&self.form.base.name, token)
            .await
            .map_err(FormError::Session)
    }

    /// Current URL with the token and page appended
    fn destination(&self, token: &str, page: usize) -> String {
        let url = self.driver.url();
        let separator = if url.contains('?') { '&' } else { '?' };
        format!(
            "{url}{separator}{}={}&{}={page}",
            urlencoding::encode(self.form.token_field()),
            urlencoding::encode(token),
            urlencoding::encode(self.form.page_field()),
        )
    }
}

/// Carried values overlaid with the fresh values of every `keep` input
fn kept_values(tree: &Tree<'_>, carried: &Map<String, Value>) -> Map<String, Value> {
    let mut values = carried.clone();
    for (_, node, input) in tree.inputs() {
        if let (true, Some(path)) = (input.keep, &node.path) {
            values.insert(path.clone(), node.value.clone());
        }
    }
    values
}

/// Submitted values of the page by storage name, secure inputs excluded
fn raw_values(tree: &Tree<'_>) -> Map<String, Value> {
    tree.inputs()
        .filter(|(_, node, input)| !input.secure && !node.raw.is_null())
        .map(|(_, node, _)| (node.name.clone(), node.raw.clone()))
        .collect()
}

/// Carried values nested by path, overlaid with the tree's own values
fn output_values(tree: &Tree<'_>, carried: &Map<String, Value>) -> Value {
    let mut nested = Map::new();
    for (path, value) in carried {
        let segments: Vec<String> = path.split('.').map(str::to_string).collect();
        insert_path(&mut nested, &segments, value.clone());
    }
    let mut values = Value::Object(nested);
    merge(&mut values, tree.nested_value(ROOT, true));
    values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{FormData, QueryParams, RequestDriver};
    use crate::element::container::ContainerBuilder;
    use crate::element::input::Input;
    use crate::element::page::Page;
    use crate::element::rules::Conversion;
    use crate::element::ElementBuilder;
    use crate::session::{MemorySessionStore, SessionStore};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn wizard() -> Form {
        Form::new("wizard")
            .page(Page::new("one").input(Input::new("name").required().keep()))
            .page(Page::new("two").input(Input::new("age").required().convert(Conversion::Int)))
    }

    fn submit(store: &Arc<MemorySessionStore>, body: Value) -> RequestDriver {
        RequestDriver::new("/wizard", store.clone()).with_form(FormData::from_json(body))
    }

    #[test]
    fn test_destination_appends_to_existing_query() {
        let form = wizard();
        let store = Arc::new(MemorySessionStore::new());
        let driver = RequestDriver::new("/wizard?lang=en", store);
        let request = Request::new(&form, &driver);
        assert_eq!(request.destination("a b", 1), "/wizard?lang=en&token=a%20b&page=1");
    }

    #[tokio::test]
    async fn test_invalid_submission_stays_and_redisplays() {
        let form = wizard();
        let store = Arc::new(MemorySessionStore::new());

        let outcome = form
            .execute(&submit(&store, json!({"token": "t1", "name": ""})))
            .await
            .unwrap();
        assert!(!outcome.valid);
        assert_eq!(outcome.page, 0);
        assert!(outcome.saved);
        assert_eq!(outcome.errors[0].path.as_deref(), Some("name"));

        let record = store.load("wizard", "t1").await.unwrap().unwrap();
        assert!(!record.first);
        assert_eq!(record.errors.len(), 1);

        let view = form.view(&submit(&store, json!({"token": "t1"}))).await.unwrap();
        assert!(!view.first);
        assert_eq!(view.errors_for("name").count(), 1);
    }

    #[tokio::test]
    async fn test_next_then_complete_clears_session() {
        let form = wizard();
        let store = Arc::new(MemorySessionStore::new());

        let outcome = form
            .execute(&submit(&store, json!({"token": "t2", "name": "Ada"})))
            .await
            .unwrap();
        assert!(outcome.valid);
        assert_eq!(outcome.page, 1);
        assert_eq!(outcome.destination.as_deref(), Some("/wizard?token=t2&page=1"));

        let outcome = form
            .execute(&submit(&store, json!({"token": "t2", "age": "36"})))
            .await
            .unwrap();
        assert!(outcome.completed);
        assert!(!outcome.reload);
        assert_eq!(outcome.values, json!({"name": "Ada", "age": 36}));
        assert!(store.load("wizard", "t2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_token_from_query_string() {
        let form = wizard();
        let store = Arc::new(MemorySessionStore::new());
        let driver = submit(&store, json!({"name": "Ada"})).with_query(QueryParams::parse("token=q1"));
        let outcome = form.execute(&driver).await.unwrap();
        assert_eq!(outcome.token, "q1");
    }

    #[tokio::test]
    async fn test_fresh_token_generated() {
        let form = wizard();
        let store = Arc::new(MemorySessionStore::new());
        let view = form.view(&submit(&store, json!({}))).await.unwrap();
        assert!(Uuid::parse_str(&view.token).is_ok());
        assert!(view.first);
        assert_eq!(view.page_count, 2);
    }
}
