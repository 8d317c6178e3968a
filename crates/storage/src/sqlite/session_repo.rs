use arco_core::model::{OwnerId, Session, SessionId};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    SESSION_COLUMNS, db, id_i64, map_arrow_row, map_assessment_row, map_series_row,
    map_session_row,
};
use crate::repository::{SessionRecord, SessionRepository, StorageError, assemble_session, ser};

impl SqliteRepository {
    async fn load_children(&self, header: SessionRecord) -> Result<Session, StorageError> {
        let session_id = id_i64("session_id", header.id.value())?;

        let series = sqlx::query(
            r"
                SELECT id, session_id, number, score
                FROM series
                WHERE session_id = ?1
                ORDER BY number ASC, id ASC
            ",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?
        .iter()
        .map(map_series_row)
        .collect::<Result<Vec<_>, _>>()?;

        let arrows = sqlx::query(
            r"
                SELECT a.id, a.series_id, a.ord, a.score, a.x, a.y
                FROM arrows a
                JOIN series s ON s.id = a.series_id
                WHERE s.session_id = ?1
                ORDER BY a.series_id ASC, a.ord ASC, a.id ASC
            ",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db)?
        .iter()
        .map(map_arrow_row)
        .collect::<Result<Vec<_>, _>>()?;

        let assessment = sqlx::query(
            r"
                SELECT posture, anchoring, alignment, breathing, aiming, release,
                       follow_through, consistency, rhythm, focus
                FROM self_assessments
                WHERE session_id = ?1
            ",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db)?
        .as_ref()
        .map(map_assessment_row)
        .transpose()?;

        assemble_session(header, series, arrows, assessment)
    }
}

#[async_trait::async_trait]
impl SessionRepository for SqliteRepository {
    async fn create_session(&self, session: &Session) -> Result<SessionId, StorageError> {
        let config = session.config();
        let res = sqlx::query(
            r"
                INSERT INTO sessions (
                    owner, session_date, series_count, arrows_per_series, distance, goal,
                    total_score, best_series, notes, completed, created_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ",
        )
        .bind(session.owner().to_string())
        .bind(config.date())
        .bind(i64::from(config.series_count()))
        .bind(i64::from(config.arrows_per_series()))
        .bind(i64::from(config.distance()))
        .bind(config.goal().map(i64::from))
        .bind(i64::from(session.total_score()))
        .bind(session.best_series().map(i64::from))
        .bind(session.notes())
        .bind(session.is_completed())
        .bind(session.created_at())
        .execute(&self.pool)
        .await
        .map_err(db)?;

        let id = u64::try_from(res.last_insert_rowid()).map_err(ser)?;
        Ok(SessionId::new(id))
    }

    async fn get_session(&self, id: SessionId) -> Result<Session, StorageError> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_i64("session_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(db)?
            .ok_or(StorageError::NotFound)?;

        self.load_children(map_session_row(&row)?).await
    }

    async fn list_sessions(&self, owner: OwnerId) -> Result<Vec<Session>, StorageError> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE owner = ?1 \
             ORDER BY session_date DESC, created_at DESC, id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(owner.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(db)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(self.load_children(map_session_row(&row)?).await?);
        }
        Ok(out)
    }

    async fn update_session(&self, session: &Session) -> Result<(), StorageError> {
        let id = session.id().ok_or(StorageError::NotFound)?;
        let config = session.config();
        let res = sqlx::query(
            r"
                UPDATE sessions SET
                    session_date = ?2,
                    series_count = ?3,
                    arrows_per_series = ?4,
                    distance = ?5,
                    goal = ?6,
                    total_score = ?7,
                    best_series = ?8,
                    notes = ?9,
                    completed = ?10
                WHERE id = ?1
            ",
        )
        .bind(id_i64("session_id", id.value())?)
        .bind(config.date())
        .bind(i64::from(config.series_count()))
        .bind(i64::from(config.arrows_per_series()))
        .bind(i64::from(config.distance()))
        .bind(config.goal().map(i64::from))
        .bind(i64::from(session.total_score()))
        .bind(session.best_series().map(i64::from))
        .bind(session.notes())
        .bind(session.is_completed())
        .execute(&self.pool)
        .await
        .map_err(db)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(id_i64("session_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(db)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arco_core::model::SessionConfigDraft;
    use arco_core::time::fixed_now;

    #[tokio::test]
    async fn header_round_trip() {
        let repo = SqliteRepository::connect("sqlite:file:memdb_session_header?mode=memory&cache=shared")
            .await
            .unwrap();
        repo.migrate().await.unwrap();

        let config = SessionConfigDraft::new(fixed_now().date_naive())
            .with_goal(Some(300))
            .validate()
            .unwrap();
        let owner = OwnerId::random();
        let id = repo
            .create_session(&Session::new(owner, config.clone(), fixed_now()))
            .await
            .unwrap();

        let loaded = repo.get_session(id).await.unwrap();
        assert_eq!(loaded.owner(), owner);
        assert_eq!(loaded.config(), &config);
        assert!(!loaded.is_completed());
        assert!(loaded.series().is_empty());

        let count: i64 = sqlx::query("SELECT COUNT(*) AS n FROM sessions")
            .fetch_one(repo.pool())
            .await
            .unwrap()
            .get("n");
        assert_eq!(count, 1);
    }
}
