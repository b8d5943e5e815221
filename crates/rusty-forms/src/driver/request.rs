// File: src/driver/request.rs
// Purpose: Ready-made driver over parsed query and body values

use super::Driver;
use crate::element::component::{ComposeDetails, ComposeOutcome};
use crate::handler::ComposeHandler;
use crate::session::{SessionRecord, SessionStore};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Query parameters from URL
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    params: HashMap<String, String>,
}

impl QueryParams {
    pub fn new(params: HashMap<String, String>) -> Self {
        Self { params }
    }

    /// Parse a raw `a=1&b=2` query string
    pub fn parse(query: &str) -> Self {
        let params = query
            .trim_start_matches('?')
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode(key), decode(value))
            })
            .collect();
        Self { params }
    }

    pub fn get(&self, key: &str) -> Option<&String> {
        self.params.get(key)
    }

    /// Get a query parameter as a specific type
    pub fn get_as<T: std::str::FromStr>(&self, key: &str) -> Option<T> {
        self.params.get(key)?.parse().ok()
    }

    pub fn has(&self, key: &str) -> bool {
        self.params.contains_key(key)
    }
}

fn decode(s: &str) -> String {
    let s = s.replace('+', " ");
    urlencoding::decode(&s)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(s)
}

/// Submitted body: url-encoded fields or a JSON document
#[derive(Debug, Clone, Default)]
pub struct FormData {
    fields: HashMap<String, String>,
    raw_json: Option<JsonValue>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create from form fields with automatic trimming
    pub fn from_fields(fields: HashMap<String, String>) -> Self {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (k, v.trim().to_string()))
            .collect();

        Self {
            fields,
            raw_json: None,
        }
    }

    /// Create from JSON; top-level strings are trimmed
    pub fn from_json(json: JsonValue) -> Self {
        let json = match json {
            JsonValue::Object(map) => JsonValue::Object(
                map.into_iter()
                    .map(|(k, v)| match v {
                        JsonValue::String(s) => (k, JsonValue::String(s.trim().to_string())),
                        other => (k, other),
                    })
                    .collect(),
            ),
            other => other,
        };

        Self {
            fields: HashMap::new(),
            raw_json: Some(json),
        }
    }

    pub fn json(&self) -> Option<&JsonValue> {
        self.raw_json.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.raw_json.is_none()
    }

    /// Field by exact name, then by dotted path into a JSON body
    pub fn value(&self, name: &str) -> Option<JsonValue> {
        if let Some(field) = self.fields.get(name) {
            return Some(JsonValue::String(field.clone()));
        }

        let json = self.raw_json.as_ref()?;
        if let Some(value) = json.get(name) {
            return Some(value.clone());
        }
        name.split('.')
            .try_fold(json, |value, segment| value.get(segment))
            .cloned()
    }
}

/// A [`Driver`] over already-parsed request parts
#[derive(Clone)]
pub struct RequestDriver {
    query: QueryParams,
    form: FormData,
    url: String,
    store: Arc<dyn SessionStore>,
    compose: Option<ComposeHandler>,
}

impl RequestDriver {
    pub fn new(url: impl Into<String>, store: Arc<dyn SessionStore>) -> Self {
        Self {
            query: QueryParams::default(),
            form: FormData::default(),
            url: url.into(),
            store,
            compose: None,
        }
    }

    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    pub fn with_form(mut self, form: FormData) -> Self {
        self.form = form;
        self
    }

    pub fn with_compose(mut self, hook: ComposeHandler) -> Self {
        self.compose = Some(hook);
        self
    }
}

impl fmt::Debug for RequestDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDriver")
            .field("url", &self.url)
            .field("query", &self.query)
            .field("form", &self.form)
            .field("store", &self.store.name())
            .finish()
    }
}

#[async_trait]
impl Driver for RequestDriver {
    fn get(&self, name: &str) -> Option<JsonValue> {
        self.query.get(name).cloned().map(JsonValue::String)
    }

    fn post(&self, name: &str) -> Option<JsonValue> {
        self.form.value(name)
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    async fn load(&self, form: &str, token: &str) -> Result<Option<SessionRecord>> {
        self.store.load(form, token).await
    }

    async fn save(&self, form: &str, token: &str, record: SessionRecord) -> Result<()> {
        self.store.save(form, token, record).await
    }

    async fn clear(&self, form: &str, token: &str) -> Result<()> {
        self.store.clear(form, token).await
    }

    async fn compose(&self, details: &ComposeDetails) -> Result<ComposeOutcome> {
        match &self.compose {
            Some(hook) => hook.call(details.clone()).await,
            None => Ok(ComposeOutcome::Pass),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;
    use serde_json::json;

    #[test]
    fn test_query_parse_decodes() {
        let query = QueryParams::parse("?token=a%20b&page=2&flag");
        assert_eq!(query.get("token").map(String::as_str), Some("a b"));
        assert_eq!(query.get_as::<usize>("page"), Some(2));
        assert!(query.has("flag"));
    }

    #[test]
    fn test_form_fields_are_trimmed() {
        let mut fields = HashMap::new();
        fields.insert("name".to_string(), "  Ada ".to_string());
        let form = FormData::from_fields(fields);
        assert_eq!(form.value("name"), Some(json!("Ada")));
        assert_eq!(form.value("missing"), None);
    }

    #[test]
    fn test_json_body_dotted_lookup() {
        let form = FormData::from_json(json!({
            "email": " a@b.com ",
            "profile": {"input1": "x"},
            "flat.key": 3
        }));
        assert_eq!(form.value("email"), Some(json!("a@b.com")));
        assert_eq!(form.value("profile.input1"), Some(json!("x")));
        assert_eq!(form.value("flat.key"), Some(json!(3)));
        assert_eq!(form.value("profile.input2"), None);
    }

    #[tokio::test]
    async fn test_request_prefers_body_over_query() {
        let driver = RequestDriver::new("/signup", Arc::new(MemorySessionStore::new()))
            .with_query(QueryParams::parse("token=q&page=1"))
            .with_form(FormData::from_json(json!({"token": "b"})));
        assert_eq!(driver.request("token"), Some(json!("b")));
        assert_eq!(driver.request("page"), Some(json!("1")));
        assert!(matches!(
            driver.compose(&ComposeDetails {
                kind: "x".into(),
                id: "x".into(),
                name: "x".into(),
                params: vec![],
                template: None,
                default_value: None,
                form: "f".into(),
                page: None,
            })
            .await
            .unwrap(),
            ComposeOutcome::Pass
        ));
    }
}
