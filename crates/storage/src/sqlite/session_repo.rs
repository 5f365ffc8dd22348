use async_trait::async_trait;
use chauffeur_core::model::{PersistedSession, User};
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, ser};
use crate::repository::{SessionRepository, StorageError};

#[async_trait]
impl SessionRepository for SqliteRepository {
    async fn load_session(&self) -> Result<Option<PersistedSession>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT user_json, session_started_at
            FROM auth_session
            WHERE id = 1
            ",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let user_json: String = row.try_get("user_json").map_err(ser)?;
        let user: User = serde_json::from_str(&user_json).map_err(ser)?;
        let session_started_at: DateTime<Utc> = row.try_get("session_started_at").map_err(ser)?;

        Ok(Some(PersistedSession {
            user,
            session_started_at,
        }))
    }

    async fn save_session(&self, session: &PersistedSession) -> Result<(), StorageError> {
        let user_json = serde_json::to_string(&session.user).map_err(ser)?;
        sqlx::query(
            r"
            INSERT INTO auth_session (id, user_json, session_started_at)
            VALUES (1, ?1, ?2)
            ON CONFLICT(id) DO UPDATE SET
                user_json = excluded.user_json,
                session_started_at = excluded.session_started_at
            ",
        )
        .bind(user_json)
        .bind(session.session_started_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }

    async fn clear_session(&self) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM auth_session WHERE id = 1")
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(())
    }
}
