use arco_core::model::{
    ArrowId, AssessmentCategory, HitPoint, OwnerId, Score, SelfAssessment, SelfAssessmentDraft,
    SeriesId, SessionConfig, SessionId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::{ArrowRecord, SeriesRecord, SessionRecord, StorageError, ser};

/// Map a driver error, turning constraint failures into domain errors.
pub(crate) fn db(e: sqlx::Error) -> StorageError {
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_foreign_key_violation() {
            return StorageError::NotFound;
        }
        if db_err.is_unique_violation() {
            return StorageError::Conflict;
        }
    }
    StorageError::Connection(e.to_string())
}

pub(crate) fn id_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

fn u8_from_i64(field: &'static str, v: i64) -> Result<u8, StorageError> {
    u8::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn session_id_from_i64(v: i64) -> Result<SessionId, StorageError> {
    Ok(SessionId::new(i64_to_u64("session_id", v)?))
}

pub(crate) fn series_id_from_i64(v: i64) -> Result<SeriesId, StorageError> {
    Ok(SeriesId::new(i64_to_u64("series_id", v)?))
}

pub(crate) fn arrow_id_from_i64(v: i64) -> Result<ArrowId, StorageError> {
    Ok(ArrowId::new(i64_to_u64("arrow_id", v)?))
}

pub(crate) const SESSION_COLUMNS: &str = "id, owner, session_date, series_count, \
     arrows_per_series, distance, goal, total_score, best_series, notes, completed, created_at";

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<SessionRecord, StorageError> {
    let owner: String = row.try_get("owner").map_err(ser)?;
    let config = SessionConfig::from_persisted(
        row.try_get("session_date").map_err(ser)?,
        u32_from_i64("series_count", row.try_get("series_count").map_err(ser)?)?,
        u32_from_i64(
            "arrows_per_series",
            row.try_get("arrows_per_series").map_err(ser)?,
        )?,
        u32_from_i64("distance", row.try_get("distance").map_err(ser)?)?,
        row.try_get::<Option<i64>, _>("goal")
            .map_err(ser)?
            .map(|g| u32_from_i64("goal", g))
            .transpose()?,
    )
    .map_err(ser)?;

    Ok(SessionRecord {
        id: session_id_from_i64(row.try_get("id").map_err(ser)?)?,
        owner: owner.parse::<OwnerId>().map_err(ser)?,
        config,
        total_score: u32_from_i64("total_score", row.try_get("total_score").map_err(ser)?)?,
        best_series: row
            .try_get::<Option<i64>, _>("best_series")
            .map_err(ser)?
            .map(|b| u32_from_i64("best_series", b))
            .transpose()?,
        notes: row.try_get("notes").map_err(ser)?,
        completed: row.try_get("completed").map_err(ser)?,
        created_at: row.try_get("created_at").map_err(ser)?,
    })
}

pub(crate) fn map_series_row(row: &SqliteRow) -> Result<SeriesRecord, StorageError> {
    Ok(SeriesRecord {
        id: series_id_from_i64(row.try_get("id").map_err(ser)?)?,
        session_id: session_id_from_i64(row.try_get("session_id").map_err(ser)?)?,
        number: u32_from_i64("number", row.try_get("number").map_err(ser)?)?,
        score: u32_from_i64("score", row.try_get("score").map_err(ser)?)?,
    })
}

pub(crate) fn map_arrow_row(row: &SqliteRow) -> Result<ArrowRecord, StorageError> {
    let x: Option<f64> = row.try_get("x").map_err(ser)?;
    let y: Option<f64> = row.try_get("y").map_err(ser)?;
    Ok(ArrowRecord {
        id: arrow_id_from_i64(row.try_get("id").map_err(ser)?)?,
        series_id: series_id_from_i64(row.try_get("series_id").map_err(ser)?)?,
        order: u32_from_i64("ord", row.try_get("ord").map_err(ser)?)?,
        score: Score::from_i64(row.try_get("score").map_err(ser)?).map_err(ser)?,
        position: x.zip(y).map(|(x, y)| HitPoint::new(x, y)),
    })
}

pub(crate) fn map_assessment_row(row: &SqliteRow) -> Result<SelfAssessment, StorageError> {
    let mut draft = SelfAssessmentDraft::default();
    for category in AssessmentCategory::ALL {
        let value: i64 = row.try_get(category.key()).map_err(ser)?;
        draft = draft.with(category, u8_from_i64(category.key(), value)?);
    }
    draft.validate().map_err(ser)
}
