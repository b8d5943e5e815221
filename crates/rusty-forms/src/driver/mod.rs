//! The contract between the engine and the embedding web layer

use crate::element::component::{ComposeDetails, ComposeOutcome};
use crate::session::SessionRecord;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

pub mod request;

pub use request::{FormData, QueryParams, RequestDriver};

/// Adapter supplying request values, session storage and component expansion
#[async_trait]
pub trait Driver: Send + Sync {
    /// Value from the query string
    fn get(&self, name: &str) -> Option<Value>;

    /// Value from the request body
    fn post(&self, name: &str) -> Option<Value>;

    /// Body value, falling back to the query string
    fn request(&self, name: &str) -> Option<Value> {
        self.post(name).or_else(|| self.get(name))
    }

    /// Current request URL, used to build redirect destinations
    fn url(&self) -> String;

    async fn load(&self, form: &str, token: &str) -> Result<Option<SessionRecord>>;

    async fn save(&self, form: &str, token: &str, record: SessionRecord) -> Result<()>;

    async fn clear(&self, form: &str, token: &str) -> Result<()>;

    /// Last compose hook consulted for a component; passes by default
    async fn compose(&self, _details: &ComposeDetails) -> Result<ComposeOutcome> {
        Ok(ComposeOutcome::Pass)
    }
}
