use async_trait::async_trait;
use chauffeur_core::model::ConsentPreferences;
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, ser};
use crate::repository::{ConsentRepository, StorageError};

#[async_trait]
impl ConsentRepository for SqliteRepository {
    async fn get_consent(&self) -> Result<Option<ConsentPreferences>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT analytics, marketing, decided_at
            FROM consent_preferences
            WHERE id = 1
            ",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let analytics: bool = row.try_get("analytics").map_err(ser)?;
        let marketing: bool = row.try_get("marketing").map_err(ser)?;
        let decided_at: DateTime<Utc> = row.try_get("decided_at").map_err(ser)?;
        Ok(Some(ConsentPreferences::new(analytics, marketing, decided_at)))
    }

    async fn save_consent(&self, prefs: &ConsentPreferences) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO consent_preferences (id, analytics, marketing, decided_at)
            VALUES (1, ?1, ?2, ?3)
            ON CONFLICT(id) DO UPDATE SET
                analytics = excluded.analytics,
                marketing = excluded.marketing,
                decided_at = excluded.decided_at
            ",
        )
        .bind(prefs.analytics)
        .bind(prefs.marketing)
        .bind(prefs.decided_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }
}
