//! Session persistence for multi-page requests

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod filesystem;
pub mod memory;

pub use filesystem::FilesystemSessionStore;
pub use memory::MemorySessionStore;

/// An error carried between requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredError {
    /// External path of the owning element; `None` for form-level errors
    pub name: Option<String>,
    pub error: String,
}

/// What a request leaves behind for the next one with the same token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Submitted values of the stored page, by storage name
    #[serde(default)]
    pub raw: Map<String, Value>,

    /// Values of `keep` inputs carried across pages, by external path
    #[serde(default)]
    pub values: Map<String, Value>,

    #[serde(default)]
    pub errors: Vec<StoredError>,

    /// Set when the page is shown for the first time, so `raw` is not redisplayed
    #[serde(default)]
    pub first: bool,

    #[serde(default)]
    pub page: usize,

    #[serde(default = "Utc::now")]
    pub saved_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn new(page: usize) -> Self {
        Self {
            raw: Map::new(),
            values: Map::new(),
            errors: Vec::new(),
            first: true,
            page,
            saved_at: Utc::now(),
        }
    }
}

/// Backend keeping session records keyed by form name, then token
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, form: &str, token: &str) -> Result<Option<SessionRecord>>;

    async fn save(&self, form: &str, token: &str, record: SessionRecord) -> Result<()>;

    async fn clear(&self, form: &str, token: &str) -> Result<()>;

    /// Backend name, for logs
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_tolerates_missing_fields() {
        let record: SessionRecord = serde_json::from_value(json!({"raw": {"a": 1}})).unwrap();
        assert_eq!(record.raw.get("a"), Some(&json!(1)));
        assert!(record.values.is_empty());
        assert!(!record.first);
        assert_eq!(record.page, 0);
    }

    #[test]
    fn test_record_serializes_null_error_name() {
        let mut record = SessionRecord::new(1);
        record.errors.push(StoredError {
            name: None,
            error: "Something went wrong".to_string(),
        });
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["errors"][0]["name"], Value::Null);
        assert_eq!(value["page"], json!(1));
        assert_eq!(value["first"], json!(true));
    }
}
