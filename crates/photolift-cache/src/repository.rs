//! SQLite implementation of IKeyValueStore
//!
//! ## Type Mapping
//!
//! | Value           | SQL Type | Strategy                          |
//! |-----------------|----------|-----------------------------------|
//! | key             | TEXT     | primary key                       |
//! | serde_json::Value | TEXT   | `serde_json::to_string` / `from_str` |
//! | DateTime<Utc>   | TEXT     | ISO 8601 via `to_rfc3339()`       |

use chrono::Utc;
use serde_json::Value;
use sqlx::{Row, SqlitePool};

use photolift_core::ports::IKeyValueStore;

use crate::CacheError;

/// SQLite-based key-value store of JSON documents
///
/// Each save replaces the whole value of its key in a single statement, so
/// a reader never sees a partially written document.
pub struct SqliteKeyValueStore {
    pool: SqlitePool,
}

impl SqliteKeyValueStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Removes `key`, returning whether it existed
    pub async fn delete_value(&self, key: &str) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        tracing::trace!(key, "Deleted value");
        Ok(result.rows_affected() > 0)
    }

    /// All stored keys, in ascending order
    pub async fn keys(&self) -> anyhow::Result<Vec<String>> {
        let rows = sqlx::query("SELECT key FROM kv_store ORDER BY key")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("key").map_err(Into::into))
            .collect()
    }
}

#[async_trait::async_trait]
impl IKeyValueStore for SqliteKeyValueStore {
    async fn read_value(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => {
                let text: String = r.try_get("value")?;
                let value = serde_json::from_str(&text).map_err(|e| {
                    CacheError::SerializationError(format!("Invalid JSON under '{}': {}", key, e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn save_value(&self, key: &str, value: &Value) -> anyhow::Result<()> {
        let text = serde_json::to_string(value)
            .map_err(|e| CacheError::SerializationError(e.to_string()))?;
        let updated_at = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(&text)
        .bind(&updated_at)
        .execute(&self.pool)
        .await?;

        tracing::trace!(key, bytes = text.len(), "Saved value");
        Ok(())
    }
}
