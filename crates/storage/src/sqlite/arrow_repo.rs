use arco_core::model::{Arrow, ArrowId, SeriesId};

use super::SqliteRepository;
use super::mapping::{db, id_i64};
use crate::repository::{ArrowRepository, StorageError, ser};

#[async_trait::async_trait]
impl ArrowRepository for SqliteRepository {
    async fn create_arrow(
        &self,
        series_id: SeriesId,
        order: u32,
        arrow: &Arrow,
    ) -> Result<ArrowId, StorageError> {
        let res = sqlx::query(
            r"
                INSERT INTO arrows (series_id, ord, score, x, y)
                VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(id_i64("series_id", series_id.value())?)
        .bind(i64::from(order))
        .bind(i64::from(arrow.score.value()))
        .bind(arrow.position.map(|p| p.x))
        .bind(arrow.position.map(|p| p.y))
        .execute(&self.pool)
        .await
        .map_err(db)?;

        let id = u64::try_from(res.last_insert_rowid()).map_err(ser)?;
        Ok(ArrowId::new(id))
    }

    async fn update_arrow(&self, id: ArrowId, arrow: &Arrow) -> Result<(), StorageError> {
        let res = sqlx::query("UPDATE arrows SET score = ?2, x = ?3, y = ?4 WHERE id = ?1")
            .bind(id_i64("arrow_id", id.value())?)
            .bind(i64::from(arrow.score.value()))
            .bind(arrow.position.map(|p| p.x))
            .bind(arrow.position.map(|p| p.y))
            .execute(&self.pool)
            .await
            .map_err(db)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_arrow(&self, id: ArrowId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM arrows WHERE id = ?1")
            .bind(id_i64("arrow_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
