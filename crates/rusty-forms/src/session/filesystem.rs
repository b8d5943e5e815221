//! Filesystem session store

use super::{SessionRecord, SessionStore};
use crate::config::FormsConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Session records stored as JSON files, one directory per form
///
/// Survives restarts; suitable for single-instance deployments.
#[derive(Debug, Clone)]
pub struct FilesystemSessionStore {
    root: PathBuf,
}

impl FilesystemSessionStore {
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)
            .await
            .with_context(|| format!("Failed to create session directory {}", root.display()))?;
        Ok(Self { root })
    }

    /// Store rooted at the configured `[session] directory`
    pub async fn from_config(config: &FormsConfig) -> Result<Self> {
        Self::new(&config.session.directory).await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Percent-encode a key into one path segment; `.` is escaped too so
    /// no segment can be `.` or `..`
    fn sanitize(key: &str) -> String {
        urlencoding::encode(key).replace('.', "%2E")
    }

    fn record_path(&self, form: &str, token: &str) -> PathBuf {
        self.root
            .join(Self::sanitize(form))
            .join(format!("{}.json", Self::sanitize(token)))
    }
}

#[async_trait]
impl SessionStore for FilesystemSessionStore {
    async fn load(&self, form: &str, token: &str) -> Result<Option<SessionRecord>> {
        let path = self.record_path(form, token);
        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .context("Failed to read session file")?;
        let record = serde_json::from_str(&content).context("Failed to deserialize session record")?;
        Ok(Some(record))
    }

    async fn save(&self, form: &str, token: &str, record: SessionRecord) -> Result<()> {
        let path = self.record_path(form, token);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .await
                .context("Failed to create form session directory")?;
        }

        let json = serde_json::to_string_pretty(&record).context("Failed to serialize session record")?;
        fs::write(&path, json)
            .await
            .context("Failed to write session file")?;
        Ok(())
    }

    async fn clear(&self, form: &str, token: &str) -> Result<()> {
        let path = self.record_path(form, token);
        if fs::try_exists(&path).await.unwrap_or(false) {
            fs::remove_file(&path)
                .await
                .context("Failed to delete session file")?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_filesystem_store_basic() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemSessionStore::new(temp_dir.path()).await.unwrap();

        let mut record = SessionRecord::new(1);
        record.raw.insert("email".into(), json!("a@b.com"));

        store.save("signup", "tok", record.clone()).await.unwrap();
        assert_eq!(store.load("signup", "tok").await.unwrap(), Some(record));

        store.clear("signup", "tok").await.unwrap();
        assert!(store.load("signup", "tok").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_filesystem_store_persistence() {
        let temp_dir = TempDir::new().unwrap();

        {
            let store = FilesystemSessionStore::new(temp_dir.path()).await.unwrap();
            store.save("wizard", "t1", SessionRecord::new(3)).await.unwrap();
        }

        // A new instance over the same directory sees the record
        {
            let store = FilesystemSessionStore::new(temp_dir.path()).await.unwrap();
            let record = store.load("wizard", "t1").await.unwrap().unwrap();
            assert_eq!(record.page, 3);
        }
    }

    #[tokio::test]
    async fn test_keys_are_sanitized() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemSessionStore::new(temp_dir.path()).await.unwrap();

        store.save("../escape", "a/b", SessionRecord::new(0)).await.unwrap();
        let path = store.record_path("../escape", "a/b");
        assert!(path.starts_with(temp_dir.path()));
        assert!(store.load("../escape", "a/b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_distinct_tokens_never_share_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = FilesystemSessionStore::new(temp_dir.path()).await.unwrap();

        for token in ["a.b", "a_b", "a/b", "a%2Eb"] {
            let mut record = SessionRecord::new(0);
            record.values.insert("token".to_string(), json!(token));
            store.save("signup", token, record).await.unwrap();
        }
        for token in ["a.b", "a_b", "a/b", "a%2Eb"] {
            let record = store.load("signup", token).await.unwrap().unwrap();
            assert_eq!(record.values.get("token"), Some(&json!(token)));
        }
        assert_eq!(
            store.record_path("signup", "a.b"),
            temp_dir.path().join("signup").join("a%2Eb.json")
        );
    }

    #[tokio::test]
    async fn test_from_config_uses_session_directory() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = FormsConfig::default();
        config.session.directory = temp_dir.path().join("sessions");

        let store = FilesystemSessionStore::from_config(&config).await.unwrap();
        assert_eq!(store.root(), temp_dir.path().join("sessions"));
        assert!(store.root().is_dir());
    }
}
