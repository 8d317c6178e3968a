use arco_core::model::{
    ArrowId, AssessmentCategory, HitPoint, OwnerId, Score, SelfAssessment, SelfAssessmentDraft,
    SeriesId, Session, SessionConfig, SessionId,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::repository::{ArrowRecord, SeriesRecord, SessionRecord, StorageError, ser};

/// Columns written for a session header.
#[derive(Debug, Serialize)]
pub(super) struct SessionBody<'a> {
    owner: OwnerId,
    session_date: NaiveDate,
    series_count: u32,
    arrows_per_series: u32,
    distance: u32,
    goal: Option<u32>,
    total_score: u32,
    best_series: Option<u32>,
    notes: Option<&'a str>,
    completed: bool,
    created_at: DateTime<Utc>,
}

impl<'a> SessionBody<'a> {
    pub(super) fn from_session(session: &'a Session) -> Self {
        let config = session.config();
        Self {
            owner: session.owner(),
            session_date: config.date(),
            series_count: config.series_count(),
            arrows_per_series: config.arrows_per_series(),
            distance: config.distance(),
            goal: config.goal(),
            total_score: session.total_score(),
            best_series: session.best_series(),
            notes: session.notes(),
            completed: session.is_completed(),
            created_at: session.created_at(),
        }
    }
}

/// A session row with its embedded children, as returned by
/// `select=*,series(*,arrows(*)),self_assessments(*)`.
#[derive(Debug, Deserialize)]
pub(super) struct SessionRow {
    id: u64,
    owner: OwnerId,
    session_date: NaiveDate,
    series_count: u32,
    arrows_per_series: u32,
    distance: u32,
    goal: Option<u32>,
    #[serde(default)]
    total_score: u32,
    best_series: Option<u32>,
    notes: Option<String>,
    #[serde(default)]
    completed: bool,
    created_at: DateTime<Utc>,
    #[serde(default)]
    series: Vec<SeriesRow>,
    #[serde(default)]
    self_assessments: Vec<AssessmentRow>,
}

pub(super) struct SessionParts {
    pub header: SessionRecord,
    pub series: Vec<SeriesRecord>,
    pub arrows: Vec<ArrowRecord>,
    pub assessment: Option<SelfAssessment>,
}

impl SessionRow {
    pub(super) fn into_parts(self) -> Result<SessionParts, StorageError> {
        let config = SessionConfig::from_persisted(
            self.session_date,
            self.series_count,
            self.arrows_per_series,
            self.distance,
            self.goal,
        )
        .map_err(ser)?;

        let session_id = SessionId::new(self.id);
        let mut series = Vec::with_capacity(self.series.len());
        let mut arrows = Vec::new();
        for row in self.series {
            let record = row.record();
            for arrow in row.arrows {
                arrows.push(arrow.into_record()?);
            }
            series.push(record);
        }
        let assessment = self
            .self_assessments
            .into_iter()
            .next()
            .map(AssessmentRow::into_assessment)
            .transpose()?;

        Ok(SessionParts {
            header: SessionRecord {
                id: session_id,
                owner: self.owner,
                config,
                total_score: self.total_score,
                best_series: self.best_series,
                notes: self.notes,
                completed: self.completed,
                created_at: self.created_at,
            },
            series,
            arrows,
            assessment,
        })
    }
}

#[derive(Debug, Serialize)]
pub(super) struct SeriesBody {
    pub session_id: u64,
    pub number: u32,
    pub score: u32,
}

#[derive(Debug, Deserialize)]
pub(super) struct SeriesRow {
    id: u64,
    session_id: u64,
    number: u32,
    #[serde(default)]
    score: u32,
    #[serde(default)]
    arrows: Vec<ArrowRow>,
}

impl SeriesRow {
    fn record(&self) -> SeriesRecord {
        SeriesRecord {
            id: SeriesId::new(self.id),
            session_id: SessionId::new(self.session_id),
            number: self.number,
            score: self.score,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct ArrowBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ord: Option<u32>,
    pub score: u8,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ArrowRow {
    id: u64,
    series_id: u64,
    ord: u32,
    score: i64,
    x: Option<f64>,
    y: Option<f64>,
}

impl ArrowRow {
    fn into_record(self) -> Result<ArrowRecord, StorageError> {
        Ok(ArrowRecord {
            id: ArrowId::new(self.id),
            series_id: SeriesId::new(self.series_id),
            order: self.ord,
            score: Score::from_i64(self.score).map_err(ser)?,
            position: self.x.zip(self.y).map(|(x, y)| HitPoint::new(x, y)),
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub(super) struct AssessmentRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    session_id: Option<u64>,
    #[serde(flatten)]
    ratings: SelfAssessmentDraft,
}

impl AssessmentRow {
    pub(super) fn from_assessment(session_id: SessionId, assessment: &SelfAssessment) -> Self {
        let ratings = AssessmentCategory::ALL
            .into_iter()
            .fold(SelfAssessmentDraft::default(), |draft, category| {
                draft.with(category, assessment.rating(category))
            });
        Self {
            session_id: Some(session_id.value()),
            ratings,
        }
    }

    fn into_assessment(self) -> Result<SelfAssessment, StorageError> {
        self.ratings.validate().map_err(ser)
    }
}

/// Rows returned by inserts only need their id.
#[derive(Debug, Deserialize)]
pub(super) struct IdRow {
    pub id: u64,
}
