//! In-memory session store

use super::{SessionRecord, SessionStore};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Session records held in a `HashMap`, lost on restart
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    records: Arc<RwLock<HashMap<String, HashMap<String, SessionRecord>>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records across all forms
    pub async fn len(&self) -> usize {
        self.records.read().await.values().map(HashMap::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, form: &str, token: &str) -> Result<Option<SessionRecord>> {
        let records = self.records.read().await;
        Ok(records.get(form).and_then(|tokens| tokens.get(token)).cloned())
    }

    async fn save(&self, form: &str, token: &str, record: SessionRecord) -> Result<()> {
        let mut records = self.records.write().await;
        records
            .entry(form.to_string())
            .or_default()
            .insert(token.to_string(), record);
        Ok(())
    }

    async fn clear(&self, form: &str, token: &str) -> Result<()> {
        let mut records = self.records.write().await;
        if let Some(tokens) = records.get_mut(form) {
            tokens.remove(token);
            if tokens.is_empty() {
                records.remove(form);
            }
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
