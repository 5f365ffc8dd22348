use async_trait::async_trait;
use chauffeur_core::model::UserId;
use chauffeur_core::training::CompletionSet;
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, id_i64, ser, user_id_to_i64, video_id_from_i64};
use crate::repository::{CompletionRepository, StorageError};

#[async_trait]
impl CompletionRepository for SqliteRepository {
    async fn get_completions(&self, user: UserId) -> Result<CompletionSet, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT video_id
            FROM training_completions
            WHERE user_id = ?1
            ORDER BY video_id
            ",
        )
        .bind(user_id_to_i64(user)?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter()
            .map(|row| video_id_from_i64(row.try_get::<i64, _>("video_id").map_err(ser)?))
            .collect()
    }

    async fn put_completions(&self, user: UserId, set: &CompletionSet) -> Result<(), StorageError> {
        let user_id = user_id_to_i64(user)?;
        let mut tx = self.pool.begin().await.map_err(conn)?;

        sqlx::query("DELETE FROM training_completions WHERE user_id = ?1")
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;

        for video in set.iter() {
            sqlx::query(
                r"
                INSERT INTO training_completions (user_id, video_id)
                VALUES (?1, ?2)
                ",
            )
            .bind(user_id)
            .bind(id_i64("video_id", video.value())?)
            .execute(&mut *tx)
            .await
            .map_err(conn)?;
        }

        tx.commit().await.map_err(conn)?;
        Ok(())
    }
}
