//! Persistent session identity.
//!
//! The client id is created once and stored on disk so it survives
//! restarts and reconnects; echoes are matched against it.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::foundation::ClientId;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Failed to read client id from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to persist client id to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub struct ClientIdentity;

impl ClientIdentity {
    /// Load the id stored at `path`, or generate and store a new one.
    ///
    /// A blank file is treated like a missing one.
    pub async fn load_or_create(path: impl AsRef<Path>) -> Result<ClientId, IdentityError> {
        let path = path.as_ref();
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => {
                if let Ok(id) = contents.parse::<ClientId>() {
                    tracing::debug!(client_id = %id, "Loaded client id");
                    return Ok(id);
                }
                tracing::warn!(path = %path.display(), "Stored client id is blank, regenerating");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => {
                return Err(IdentityError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        }

        let id = ClientId::generate();
        let write_err = |source| IdentityError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        tokio::fs::write(path, id.as_str()).await.map_err(write_err)?;
        tracing::info!(client_id = %id, path = %path.display(), "Created client id");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn id_survives_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("client-id");

        let first = ClientIdentity::load_or_create(&path).await.unwrap();
        let second = ClientIdentity::load_or_create(&path).await.unwrap();

        assert_eq!(first, second);
        assert!(first.as_str().starts_with("client-"));
    }

    #[tokio::test]
    async fn blank_file_is_regenerated() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client-id");
        tokio::fs::write(&path, "  \n").await.unwrap();

        let id = ClientIdentity::load_or_create(&path).await.unwrap();

        let stored = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(stored, id.as_str());
    }

    #[tokio::test]
    async fn stored_id_is_trimmed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client-id");
        tokio::fs::write(&path, "tab-7\n").await.unwrap();

        assert_eq!(ClientIdentity::load_or_create(&path).await.unwrap().as_str(), "tab-7");
    }
}
