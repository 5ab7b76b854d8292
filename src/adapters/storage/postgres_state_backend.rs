//! PostgreSQL implementation of StateBackend.
//!
//! One JSONB row per key in `shared_state`.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{PgPool, Row};

use crate::domain::foundation::PersistenceError;
use crate::ports::StateBackend;

/// PostgreSQL implementation of StateBackend.
#[derive(Clone)]
pub struct PostgresStateBackend {
    pool: PgPool,
}

impl PostgresStateBackend {
    /// Creates a new PostgresStateBackend.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded migrations.
    pub async fn migrate(&self) -> Result<(), PersistenceError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| PersistenceError::unavailable(format!("migration failed: {}", e)))
    }
}

#[async_trait]
impl StateBackend for PostgresStateBackend {
    async fn load(&self, key: &str) -> Result<Option<Value>, PersistenceError> {
        let row = sqlx::query(
            r#"
            SELECT value FROM shared_state WHERE key = $1
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PersistenceError::unavailable(format!("Failed to load '{}': {}", key, e)))?;

        match row {
            Some(row) => {
                let Json(value): Json<Value> =
                    row.try_get("value").map_err(|e| PersistenceError::Corrupt {
                        key: key.to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn store(&self, key: &str, value: &Value) -> Result<(), PersistenceError> {
        sqlx::query(
            r#"
            INSERT INTO shared_state (key, value, updated_at)
            VALUES ($1, $2, now())
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(key)
        .bind(Json(value))
        .execute(&self.pool)
        .await
        .map_err(|e| PersistenceError::unavailable(format!("Failed to store '{}': {}", key, e)))?;

        Ok(())
    }
}
