//! Authoritative storage configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::path::PathBuf;

use super::error::ValidationError;

/// Which `StateBackend` to run with.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    File,
    Postgres,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory holding one YAML document per key (`file` backend)
    pub path: Option<PathBuf>,

    /// PostgreSQL connection URL (`postgres` backend)
    pub database_url: Option<SecretString>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl StorageConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.backend {
            StorageBackend::Memory => Ok(()),
            StorageBackend::File => match &self.path {
                Some(path) if !path.as_os_str().is_empty() => Ok(()),
                _ => Err(ValidationError::MissingRequired("STORAGE__PATH")),
            },
            StorageBackend::Postgres => {
                let url = self
                    .database_url
                    .as_ref()
                    .map(|url| url.expose_secret().as_str())
                    .filter(|url| !url.is_empty())
                    .ok_or(ValidationError::MissingRequired("STORAGE__DATABASE_URL"))?;
                if !url.starts_with("postgres://") && !url.starts_with("postgresql://") {
                    return Err(ValidationError::InvalidDatabaseUrl);
                }
                if self.max_connections == 0 || self.max_connections > 100 {
                    return Err(ValidationError::InvalidPoolSize);
                }
                Ok(())
            }
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: None,
            database_url: None,
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    10
}
