use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, ser};
use crate::repository::{CredentialRepository, StorageError};

#[async_trait]
impl CredentialRepository for SqliteRepository {
    async fn load_refresh_token(&self) -> Result<Option<String>, StorageError> {
        let row = sqlx::query("SELECT refresh_token FROM credentials WHERE id = 1")
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        row.map(|row| row.try_get::<String, _>("refresh_token").map_err(ser))
            .transpose()
    }

    async fn save_refresh_token(&self, token: &str) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO credentials (id, refresh_token, updated_at)
            VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET
                refresh_token = excluded.refresh_token,
                updated_at = excluded.updated_at
            ",
        )
        .bind(token)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn clear_refresh_token(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM credentials WHERE id = 1")
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
