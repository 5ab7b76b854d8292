//! File-based State Backend Adapter
//!
//! Stores each document as `<key>.yaml` under a base directory. Writes go
//! to a sibling temp file first and are renamed into place, so a reader
//! never observes a half-written document.

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::domain::foundation::PersistenceError;
use crate::ports::StateBackend;

/// File-based backing store for shared documents
#[derive(Debug, Clone)]
pub struct FileStateBackend {
    base_path: PathBuf,
}

impl FileStateBackend {
    /// Create a new file backend rooted at `base_path`
    ///
    /// # Example
    /// ```ignore
    /// let backend = FileStateBackend::new("./data/state");
    /// ```
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    /// Keys map to file names; anything outside `[A-Za-z0-9_-]` becomes `_`.
    fn document_path(&self, key: &str) -> PathBuf {
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_path.join(format!("{}.yaml", safe))
    }

    async fn ensure_dir(&self) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.base_path)
            .await
            .map_err(PersistenceError::unavailable)
    }
}

#[async_trait]
impl StateBackend for FileStateBackend {
    async fn load(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        let path = self.document_path(key);

        let yaml = match fs::read_to_string(&path).await {
            Ok(yaml) => yaml,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistenceError::unavailable(e)),
        };

        let value = serde_yaml::from_str(&yaml).map_err(|e| PersistenceError::Corrupt {
            key: key.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(value))
    }

    async fn store(&self, key: &str, value: &Value) -> Result<(), PersistenceError> {
        self.ensure_dir().await?;

        let yaml = serde_yaml::to_string(value).map_err(|e| PersistenceError::Serialization {
            key: key.to_string(),
            reason: e.to_string(),
        })?;

        let path = self.document_path(key);
        let tmp = path.with_extension("yaml.tmp");
        fs::write(&tmp, yaml)
            .await
            .map_err(PersistenceError::unavailable)?;
        fs::rename(&tmp, &path)
            .await
            .map_err(PersistenceError::unavailable)?;

        tracing::debug!(key, path = %path.display(), "Stored document");
        Ok(())
    }
}
