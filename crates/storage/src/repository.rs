use async_trait::async_trait;
use chrono::{DateTime, Utc};
use arco_core::model::{
    Arrow, ArrowId, HitPoint, OwnerId, Score, SelfAssessment, Series, SeriesId, Session,
    SessionConfig, SessionId,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not authorized")]
    Unauthorized,
}

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

//
// ─── RECORDS ───────────────────────────────────────────────────────────────────
//

/// Persisted header row of a session.
///
/// Totals are stored for listing but the domain recomputes them from arrows.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub id: SessionId,
    pub owner: OwnerId,
    pub config: SessionConfig,
    pub total_score: u32,
    pub best_series: Option<u32>,
    pub notes: Option<String>,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    #[must_use]
    pub fn from_session(id: SessionId, session: &Session) -> Self {
        Self {
            id,
            owner: session.owner(),
            config: session.config().clone(),
            total_score: session.total_score(),
            best_series: session.best_series(),
            notes: session.notes().map(str::to_owned),
            completed: session.is_completed(),
            created_at: session.created_at(),
        }
    }
}

/// Persisted series row. `number` is 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesRecord {
    pub id: SeriesId,
    pub session_id: SessionId,
    pub number: u32,
    pub score: u32,
}

/// Persisted arrow row. `order` is 1-based within its series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrowRecord {
    pub id: ArrowId,
    pub series_id: SeriesId,
    pub order: u32,
    pub score: Score,
    pub position: Option<HitPoint>,
}

impl ArrowRecord {
    #[must_use]
    pub fn into_arrow(self) -> Arrow {
        Arrow {
            score: self.score,
            position: self.position,
            id: Some(self.id),
        }
    }
}

/// Rebuild a domain session from its rows.
///
/// Each series lands at index `number - 1`; numbers never written (series
/// skipped while shooting) become empty series. Arrows are ordered by
/// `order`; orphan arrows are dropped.
///
/// # Errors
///
/// Returns `StorageError::Serialization` for series numbers outside
/// `1..=series_count`, duplicate numbers, or rows that do not fit the
/// session configuration.
pub fn assemble_session(
    header: SessionRecord,
    series: Vec<SeriesRecord>,
    arrows: Vec<ArrowRecord>,
    assessment: Option<SelfAssessment>,
) -> Result<Session, StorageError> {
    let mut by_series: HashMap<SeriesId, Vec<ArrowRecord>> = HashMap::new();
    for arrow in arrows {
        by_series.entry(arrow.series_id).or_default().push(arrow);
    }

    let series_count = header.config.series_count();
    let mut slots: Vec<Option<Series>> = Vec::new();
    for record in series {
        if record.number == 0 || record.number > series_count {
            return Err(StorageError::Serialization(format!(
                "series number {} outside 1..={series_count}",
                record.number
            )));
        }
        let index = usize::try_from(record.number - 1).map_err(ser)?;
        if slots.len() <= index {
            slots.resize(index + 1, None);
        }
        if slots[index].is_some() {
            return Err(StorageError::Serialization(format!(
                "duplicate series number {}",
                record.number
            )));
        }
        let mut rows = by_series.remove(&record.id).unwrap_or_default();
        rows.sort_by_key(|a| (a.order, a.id));
        slots[index] = Some(Series::from_persisted(
            Some(record.id),
            rows.into_iter().map(ArrowRecord::into_arrow).collect(),
        ));
    }
    let series = slots.into_iter().map(Option::unwrap_or_default).collect();

    Session::from_persisted(
        header.id,
        header.owner,
        header.config,
        series,
        header.notes,
        assessment,
        header.completed,
        header.created_at,
    )
    .map_err(ser)
}

//
// ─── CONTRACTS ─────────────────────────────────────────────────────────────────
//

#[async_trait]
pub trait SessionRepository: Send + Sync {
    /// Insert the session header and return its new id.
    ///
    /// Series, arrows and the self-assessment are written through their own
    /// repositories.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn create_session(&self, session: &Session) -> Result<SessionId, StorageError>;

    /// Fetch a full session with series, arrows and self-assessment.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing, or other storage errors.
    async fn get_session(&self, id: SessionId) -> Result<Session, StorageError>;

    /// List every session of `owner`, newest date first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the rows cannot be read.
    async fn list_sessions(&self, owner: OwnerId) -> Result<Vec<Session>, StorageError>;

    /// Overwrite the header (config, totals, notes, completion).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session has no id or does not exist.
    async fn update_session(&self, session: &Session) -> Result<(), StorageError>;

    /// Hard delete, cascading to series, arrows and the self-assessment.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if missing.
    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait SeriesRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    async fn create_series(
        &self,
        session_id: SessionId,
        number: u32,
        score: u32,
    ) -> Result<SeriesId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the series does not exist.
    async fn update_series_score(&self, id: SeriesId, score: u32) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ArrowRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the series does not exist.
    async fn create_arrow(
        &self,
        series_id: SeriesId,
        order: u32,
        arrow: &Arrow,
    ) -> Result<ArrowId, StorageError>;

    /// Replace score and position together.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the arrow does not exist.
    async fn update_arrow(&self, id: ArrowId, arrow: &Arrow) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the arrow does not exist.
    async fn delete_arrow(&self, id: ArrowId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait AssessmentRepository: Send + Sync {
    /// Insert or replace the self-assessment of a session.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the session does not exist.
    async fn save_assessment(
        &self,
        session_id: SessionId,
        assessment: &SelfAssessment,
    ) -> Result<(), StorageError>;
}

//
// ─── IN MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct Tables {
    next_id: u64,
    sessions: HashMap<SessionId, SessionRecord>,
    series: HashMap<SeriesId, SeriesRecord>,
    arrows: HashMap<ArrowId, ArrowRecord>,
    assessments: HashMap<SessionId, SelfAssessment>,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn load(&self, id: SessionId) -> Result<Session, StorageError> {
        let header = self.sessions.get(&id).cloned().ok_or(StorageError::NotFound)?;
        let series: Vec<SeriesRecord> = self
            .series
            .values()
            .filter(|s| s.session_id == id)
            .copied()
            .collect();
        let arrows = self
            .arrows
            .values()
            .filter(|a| series.iter().any(|s| s.id == a.series_id))
            .copied()
            .collect();
        assemble_session(header, series, arrows, self.assessments.get(&id).copied())
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>, StorageError> {
        self.tables
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

#[async_trait]
impl SessionRepository for InMemoryRepository {
    async fn create_session(&self, session: &Session) -> Result<SessionId, StorageError> {
        let mut guard = self.lock()?;
        let id = SessionId::new(guard.next_id());
        guard
            .sessions
            .insert(id, SessionRecord::from_session(id, session));
        Ok(id)
    }

    async fn get_session(&self, id: SessionId) -> Result<Session, StorageError> {
        self.lock()?.load(id)
    }

    async fn list_sessions(&self, owner: OwnerId) -> Result<Vec<Session>, StorageError> {
        let guard = self.lock()?;
        let mut headers: Vec<&SessionRecord> =
            guard.sessions.values().filter(|s| s.owner == owner).collect();
        headers.sort_by(|a, b| {
            (b.config.date(), b.created_at, b.id).cmp(&(a.config.date(), a.created_at, a.id))
        });
        headers.iter().map(|h| guard.load(h.id)).collect()
    }

    async fn update_session(&self, session: &Session) -> Result<(), StorageError> {
        let id = session.id().ok_or(StorageError::NotFound)?;
        let mut guard = self.lock()?;
        let slot = guard.sessions.get_mut(&id).ok_or(StorageError::NotFound)?;
        *slot = SessionRecord::from_session(id, session);
        Ok(())
    }

    async fn delete_session(&self, id: SessionId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.sessions.remove(&id).ok_or(StorageError::NotFound)?;
        let series: Vec<SeriesId> = guard
            .series
            .values()
            .filter(|s| s.session_id == id)
            .map(|s| s.id)
            .collect();
        guard.series.retain(|_, s| s.session_id != id);
        guard.arrows.retain(|_, a| !series.contains(&a.series_id));
        guard.assessments.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl SeriesRepository for InMemoryRepository {
    async fn create_series(
        &self,
        session_id: SessionId,
        number: u32,
        score: u32,
    ) -> Result<SeriesId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.sessions.contains_key(&session_id) {
            return Err(StorageError::NotFound);
        }
        let id = SeriesId::new(guard.next_id());
        guard.series.insert(
            id,
            SeriesRecord {
                id,
                session_id,
                number,
                score,
            },
        );
        Ok(id)
    }

    async fn update_series_score(&self, id: SeriesId, score: u32) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let record = guard.series.get_mut(&id).ok_or(StorageError::NotFound)?;
        record.score = score;
        Ok(())
    }
}

#[async_trait]
impl ArrowRepository for InMemoryRepository {
    async fn create_arrow(
        &self,
        series_id: SeriesId,
        order: u32,
        arrow: &Arrow,
    ) -> Result<ArrowId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.series.contains_key(&series_id) {
            return Err(StorageError::NotFound);
        }
        let id = ArrowId::new(guard.next_id());
        guard.arrows.insert(
            id,
            ArrowRecord {
                id,
                series_id,
                order,
                score: arrow.score,
                position: arrow.position,
            },
        );
        Ok(id)
    }

    async fn update_arrow(&self, id: ArrowId, arrow: &Arrow) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        let record = guard.arrows.get_mut(&id).ok_or(StorageError::NotFound)?;
        record.score = arrow.score;
        record.position = arrow.position;
        Ok(())
    }

    async fn delete_arrow(&self, id: ArrowId) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        guard.arrows.remove(&id).ok_or(StorageError::NotFound)?;
        Ok(())
    }
}

#[async_trait]
impl AssessmentRepository for InMemoryRepository {
    async fn save_assessment(
        &self,
        session_id: SessionId,
        assessment: &SelfAssessment,
    ) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.sessions.contains_key(&session_id) {
            return Err(StorageError::NotFound);
        }
        guard.assessments.insert(session_id, *assessment);
        Ok(())
    }
}

//
// ─── AGGREGATE ─────────────────────────────────────────────────────────────────
//

/// Aggregates the repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub sessions: Arc<dyn SessionRepository>,
    pub series: Arc<dyn SeriesRepository>,
    pub arrows: Arc<dyn ArrowRepository>,
    pub assessments: Arc<dyn AssessmentRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        Self::from_repository(InMemoryRepository::new())
    }

    pub(crate) fn from_repository<R>(repo: R) -> Self
    where
        R: SessionRepository
            + SeriesRepository
            + ArrowRepository
            + AssessmentRepository
            + Clone
            + 'static,
    {
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo.clone());
        let series: Arc<dyn SeriesRepository> = Arc::new(repo.clone());
        let arrows: Arc<dyn ArrowRepository> = Arc::new(repo.clone());
        let assessments: Arc<dyn AssessmentRepository> = Arc::new(repo);
        Self {
            sessions,
            series,
            arrows,
            assessments,
        }
    }

    /// Write a whole session (header, series, arrows, self-assessment) as new
    /// rows and return the new session id.
    ///
    /// Existing ids on the session are ignored.
    ///
    /// # Errors
    ///
    /// Returns the first `StorageError`; rows written before it are kept.
    pub async fn insert_full_session(&self, session: &Session) -> Result<SessionId, StorageError> {
        let session_id = self.sessions.create_session(session).await?;
        for (index, series) in session.series().iter().enumerate() {
            let number = u32::try_from(index + 1).map_err(ser)?;
            let series_id = self
                .series
                .create_series(session_id, number, series.score())
                .await?;
            for (order, arrow) in series.arrows().iter().enumerate() {
                let order = u32::try_from(order + 1).map_err(ser)?;
                self.arrows.create_arrow(series_id, order, arrow).await?;
            }
        }
        if let Some(assessment) = session.self_assessment() {
            self.assessments
                .save_assessment(session_id, assessment)
                .await?;
        }
        Ok(session_id)
    }
}
