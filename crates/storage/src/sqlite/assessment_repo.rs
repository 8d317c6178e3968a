use arco_core::model::{AssessmentCategory, SelfAssessment, SessionId};

use super::SqliteRepository;
use super::mapping::{db, id_i64};
use crate::repository::{AssessmentRepository, StorageError};

#[async_trait::async_trait]
impl AssessmentRepository for SqliteRepository {
    async fn save_assessment(
        &self,
        session_id: SessionId,
        assessment: &SelfAssessment,
    ) -> Result<(), StorageError> {
        let mut query = sqlx::query(
            r"
                INSERT INTO self_assessments (
                    session_id, posture, anchoring, alignment, breathing, aiming, release,
                    follow_through, consistency, rhythm, focus
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                ON CONFLICT(session_id) DO UPDATE SET
                    posture = excluded.posture,
                    anchoring = excluded.anchoring,
                    alignment = excluded.alignment,
                    breathing = excluded.breathing,
                    aiming = excluded.aiming,
                    release = excluded.release,
                    follow_through = excluded.follow_through,
                    consistency = excluded.consistency,
                    rhythm = excluded.rhythm,
                    focus = excluded.focus
            ",
        )
        .bind(id_i64("session_id", session_id.value())?);
        // Bind order follows the column list above.
        for category in AssessmentCategory::ALL {
            query = query.bind(i64::from(assessment.rating(category)));
        }

        query.execute(&self.pool).await.map_err(db)?;
        Ok(())
    }
}
