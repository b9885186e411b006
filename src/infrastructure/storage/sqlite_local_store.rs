use crate::application::ports::LocalStore;
use crate::infrastructure::database::ConnectionPool;
use crate::shared::error::PersistError;
use async_trait::async_trait;
use chrono::Utc;

/// `local_entries` テーブルを使うローカルストア。
#[derive(Clone)]
pub struct SqliteLocalStore {
    pool: ConnectionPool,
}

impl SqliteLocalStore {
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// マイグレーション済みのストアを開く。
    pub async fn open(pool: ConnectionPool) -> Result<Self, PersistError> {
        pool.migrate().await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl LocalStore for SqliteLocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PersistError> {
        let value: Option<String> =
            sqlx::query_scalar("SELECT value FROM local_entries WHERE key = ?")
                .bind(key)
                .fetch_optional(self.pool.get_pool())
                .await?;
        Ok(value)
    }

    async fn set_many(&self, entries: &[(&str, String)]) -> Result<(), PersistError> {
        let now_ms = Utc::now().timestamp_millis();
        let mut tx = self.pool.get_pool().begin().await?;

        for (key, value) in entries {
            sqlx::query(
                r#"
                INSERT INTO local_entries (key, value, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(*key)
            .bind(value.as_str())
            .bind(now_ms)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PersistError> {
        sqlx::query("DELETE FROM local_entries WHERE key = ?")
            .bind(key)
            .execute(self.pool.get_pool())
            .await?;
        Ok(())
    }
}
