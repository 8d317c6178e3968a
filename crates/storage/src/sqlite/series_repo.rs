use arco_core::model::{SeriesId, SessionId};

use super::SqliteRepository;
use super::mapping::{db, id_i64};
use crate::repository::{SeriesRepository, StorageError, ser};

#[async_trait::async_trait]
impl SeriesRepository for SqliteRepository {
    async fn create_series(
        &self,
        session_id: SessionId,
        number: u32,
        score: u32,
    ) -> Result<SeriesId, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO series (session_id, number, score)
                VALUES (?1, ?2, ?3)
            ",
        )
        .bind(id_i64("session_id", session_id.value())?)
        .bind(i64::from(number))
        .bind(i64::from(score))
        .execute(&self.pool)
        .await
        .map_err(db)?;

        let id = u64::try_from(res.last_insert_rowid()).map_err(ser)?;
        Ok(SeriesId::new(id))
    }

    async fn update_series_score(&self, id: SeriesId, score: u32) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE series SET score = ?2 WHERE id = ?1")
            .bind(id_i64("series_id", id.value())?)
            .bind(i64::from(score))
            .execute(&self.pool)
            .await
            .map_err(db)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
