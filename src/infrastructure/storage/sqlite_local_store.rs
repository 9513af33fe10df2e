use super::connection_pool::ConnectionPool;
use crate::application::ports::LocalStore;
use crate::shared::error::AppError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS local_store (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at INTEGER NOT NULL
)
"#;

const SELECT_VALUE: &str = "SELECT value FROM local_store WHERE key = ?1";

const UPSERT_VALUE: &str = r#"
INSERT INTO local_store (key, value, updated_at) VALUES (?1, ?2, ?3)
ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
"#;

const DELETE_VALUE: &str = "DELETE FROM local_store WHERE key = ?1";

const SELECT_KEYS: &str = "SELECT key FROM local_store ORDER BY key";

/// SQLite上のキー・バリューストア。値はJSON文字列として丸ごと保存する
pub struct SqliteLocalStore {
    pool: ConnectionPool,
}

impl SqliteLocalStore {
    pub async fn new(pool: ConnectionPool) -> Result<Self, AppError> {
        sqlx::query(CREATE_TABLE).execute(pool.get_pool()).await?;
        Ok(Self { pool })
    }

    pub async fn connect(database_url: &str) -> Result<Self, AppError> {
        let pool = ConnectionPool::new(database_url).await?;
        Self::new(pool).await
    }
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>, AppError> {
        let row = sqlx::query(SELECT_VALUE)
            .bind(key)
            .fetch_optional(self.pool.get_pool())
            .await?;

        match row {
            Some(row) => Ok(Some(row.try_get::<String, _>("value")?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), AppError> {
        sqlx::query(UPSERT_VALUE)
            .bind(key)
            .bind(value)
            .bind(Utc::now().timestamp_millis())
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), AppError> {
        sqlx::query(DELETE_VALUE)
            .bind(key)
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, AppError> {
        let rows = sqlx::query(SELECT_KEYS)
            .fetch_all(self.pool.get_pool())
            .await?;

        let mut keys = Vec::with_capacity(rows.len());
        for row in rows {
            keys.push(row.try_get::<String, _>("key")?);
        }
        Ok(keys)
    }
}
