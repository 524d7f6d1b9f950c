use async_trait::async_trait;
use biggygains_core::{CoreError, Datastore, DatastoreError};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use std::str::FromStr;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info};

#[cfg(test)]
mod tests;

/// Process-local store; everything is lost on exit.
#[derive(Debug, Default)]
pub struct InMemoryDatastore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl Datastore for InMemoryDatastore {
    async fn initialize(&self) -> Result<(), CoreError> {
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), CoreError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn clear(&self) -> Result<(), CoreError> {
        self.entries.write().await.clear();
        Ok(())
    }
}

const CREATE_KV_TABLE: &str = "CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY NOT NULL,
    value BLOB NOT NULL,
    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
)";

/// Key-value rows in a single SQLite table. The pool is opened by
/// [`Datastore::initialize`]; every other call fails until then.
pub struct SqliteDatastore {
    url: String,
    pool: OnceCell<SqlitePool>,
}

impl SqliteDatastore {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool: OnceCell::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn pool(&self) -> Result<&SqlitePool, DatastoreError> {
        self.pool.get().ok_or(DatastoreError::NotInitialized)
    }

    async fn open(&self) -> Result<SqlitePool, DatastoreError> {
        let options = SqliteConnectOptions::from_str(&self.url)
            .map_err(|e| DatastoreError::ConnectionFailed {
                reason: e.to_string(),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .map_err(|e| DatastoreError::ConnectionFailed {
                reason: e.to_string(),
            })?;

        sqlx::query(CREATE_KV_TABLE)
            .execute(&pool)
            .await
            .map_err(|_| DatastoreError::MigrationFailed {
                migration: "create kv_store".to_string(),
            })?;

        info!("Opened SQLite datastore at {}", self.url);
        Ok(pool)
    }
}

#[async_trait]
impl Datastore for SqliteDatastore {
    async fn initialize(&self) -> Result<(), CoreError> {
        self.pool.get_or_try_init(|| self.open()).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
        let row = sqlx::query("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool()?)
            .await
            .map_err(DatastoreError::from)?;

        match row {
            Some(row) => Ok(Some(row.try_get("value").map_err(DatastoreError::from)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), CoreError> {
        sqlx::query(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value)
        .execute(self.pool()?)
        .await
        .map_err(DatastoreError::from)?;

        debug!("Stored {} bytes under '{}'", value.len(), key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CoreError> {
        let result = sqlx::query("DELETE FROM kv_store")
            .execute(self.pool()?)
            .await
            .map_err(DatastoreError::from)?;
        info!("Cleared {} datastore entries", result.rows_affected());
        Ok(())
    }
}
