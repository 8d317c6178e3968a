use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use arco_core::analysis::{
    AssessmentInsights, HistoryFilter, HistoryStats, assessment_insights, filter_history,
};
use arco_core::model::{Arrow, OwnerId, Score, Session, SessionId};
use serde::{Deserialize, Serialize};
use storage::repository::{
    ArrowRepository, SeriesRepository, SessionRepository, Storage, StorageError,
};

use crate::Clock;
use crate::config::DEFAULT_REQUEST_TIMEOUT;
use crate::error::{HistoryError, PersistenceError};

/// Corrected value for one recorded arrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrowEdit {
    pub series_index: usize,
    pub arrow_index: usize,
    pub score: Score,
}

/// Changes applied to a stored session. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionEdit {
    pub notes: Option<Option<String>>,
    pub goal: Option<Option<u32>>,
    pub distance: Option<u32>,
    pub arrows: Vec<ArrowEdit>,
}

impl SessionEdit {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_notes(mut self, notes: Option<String>) -> Self {
        self.notes = Some(notes);
        self
    }

    #[must_use]
    pub fn with_goal(mut self, goal: Option<u32>) -> Self {
        self.goal = Some(goal);
        self
    }

    #[must_use]
    pub fn with_distance(mut self, distance: u32) -> Self {
        self.distance = Some(distance);
        self
    }

    #[must_use]
    pub fn with_arrow(mut self, series_index: usize, arrow_index: usize, score: Score) -> Self {
        self.arrows.push(ArrowEdit {
            series_index,
            arrow_index,
            score,
        });
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.notes.is_none() && self.goal.is_none() && self.distance.is_none() && self.arrows.is_empty()
    }
}

/// Read and edit finished sessions.
#[derive(Clone)]
pub struct HistoryService {
    clock: Clock,
    sessions: Arc<dyn SessionRepository>,
    series: Arc<dyn SeriesRepository>,
    arrows: Arc<dyn ArrowRepository>,
    request_timeout: Duration,
}

impl HistoryService {
    #[must_use]
    pub fn new(clock: Clock, storage: &Storage) -> Self {
        Self {
            clock,
            sessions: Arc::clone(&storage.sessions),
            series: Arc::clone(&storage.series),
            arrows: Arc::clone(&storage.arrows),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    async fn bounded<T>(
        &self,
        read: impl std::future::Future<Output = Result<T, StorageError>>,
    ) -> Result<T, HistoryError> {
        match tokio::time::timeout(self.request_timeout, read).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(PersistenceError::Timeout(self.request_timeout).into()),
        }
    }

    /// Every session of `owner`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Persistence` on storage failures or timeouts.
    pub async fn list_sessions(&self, owner: OwnerId) -> Result<Vec<Session>, HistoryError> {
        self.bounded(self.sessions.list_sessions(owner)).await
    }

    /// # Errors
    ///
    /// Returns `HistoryError::Persistence` wrapping `StorageError::NotFound`
    /// for unknown ids.
    pub async fn get_session(&self, id: SessionId) -> Result<Session, HistoryError> {
        self.bounded(self.sessions.get_session(id)).await
    }

    /// Delete a session with all its series, arrows and self-assessment.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Persistence` on storage failures or timeouts.
    pub async fn delete_session(&self, id: SessionId) -> Result<(), HistoryError> {
        self.bounded(self.sessions.delete_session(id)).await?;
        log::info!("deleted session {id}");
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `HistoryError::Persistence` on storage failures or timeouts.
    pub async fn filtered(
        &self,
        owner: OwnerId,
        filter: HistoryFilter,
    ) -> Result<Vec<Session>, HistoryError> {
        let sessions = self.list_sessions(owner).await?;
        Ok(filter_history(&sessions, filter, self.clock.today())
            .into_iter()
            .cloned()
            .collect())
    }

    /// # Errors
    ///
    /// Returns `HistoryError::Persistence` on storage failures or timeouts.
    pub async fn stats(&self, owner: OwnerId) -> Result<HistoryStats, HistoryError> {
        let sessions = self.list_sessions(owner).await?;
        Ok(HistoryStats::from_sessions(&sessions, self.clock.today()))
    }

    /// # Errors
    ///
    /// Returns `HistoryError::Persistence` on storage failures or timeouts.
    pub async fn insights(&self, owner: OwnerId) -> Result<AssessmentInsights, HistoryError> {
        let sessions = self.list_sessions(owner).await?;
        Ok(assessment_insights(&sessions))
    }

    /// Apply `edit` to a stored session and write the changed rows back.
    ///
    /// An edited arrow becomes a manual entry: its impact position is
    /// dropped. Totals are recomputed before they are stored.
    ///
    /// # Errors
    ///
    /// Returns `HistoryError::Data` for unknown arrows or a zero distance,
    /// before anything is written, and `HistoryError::Persistence` when a
    /// write fails.
    pub async fn update_session(
        &self,
        id: SessionId,
        edit: SessionEdit,
    ) -> Result<Session, HistoryError> {
        let mut session = self.get_session(id).await?;
        if edit.is_empty() {
            return Ok(session);
        }

        if let Some(notes) = edit.notes {
            session.set_notes(notes);
        }
        if let Some(goal) = edit.goal {
            session.set_goal(goal);
        }
        if let Some(distance) = edit.distance {
            session.set_distance(distance)?;
        }

        let mut touched_series = BTreeSet::new();
        let mut changed_arrows = Vec::with_capacity(edit.arrows.len());
        for change in &edit.arrows {
            let current_id = session
                .series()
                .get(change.series_index)
                .and_then(|series| series.arrows().get(change.arrow_index))
                .and_then(|arrow| arrow.id);
            let arrow = Arrow {
                id: current_id,
                ..Arrow::manual(change.score)
            };
            session.replace_arrow(change.series_index, change.arrow_index, arrow)?;
            touched_series.insert(change.series_index);
            if let Some(arrow_id) = current_id {
                changed_arrows.push((arrow_id, arrow));
            }
        }

        for (arrow_id, arrow) in &changed_arrows {
            self.bounded(self.arrows.update_arrow(*arrow_id, arrow)).await?;
        }
        for index in touched_series {
            if let Some(series) = session.series().get(index) {
                if let Some(series_id) = series.id() {
                    self.bounded(self.series.update_series_score(series_id, series.score()))
                        .await?;
                }
            }
        }
        self.bounded(self.sessions.update_session(&session)).await?;

        log::info!(
            "updated session {id}: {} arrow edits, total {}",
            changed_arrows.len(),
            session.total_score()
        );
        Ok(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arco_core::model::{SelfAssessmentDraft, SessionConfigDraft};
    use arco_core::time::{fixed_clock, fixed_now};
    use arco_core::SessionTracker;
    use chrono::Duration as Days;

    async fn seed(storage: &Storage, owner: OwnerId, days_ago: i64, points: &[u8]) -> SessionId {
        let at = fixed_now() - Days::days(days_ago);
        let draft = SessionConfigDraft::new(at.date_naive())
            .with_series(1, u32::try_from(points.len()).unwrap())
            .with_goal(Some(20));
        let mut tracker = SessionTracker::start(draft, owner, at).unwrap();
        for p in points {
            tracker
                .register_arrow(Arrow::manual(Score::new(*p).unwrap()))
                .unwrap();
        }
        let assessment = SelfAssessmentDraft::uniform(7).validate().unwrap();
        let session = tracker.finalize(None, Some(assessment)).unwrap();
        storage.insert_full_session(session).await.unwrap()
    }

    #[test]
    fn edit_from_json() {
        let edit: SessionEdit = serde_json::from_str(
            r#"{"distance": 30, "arrows": [{"series_index": 1, "arrow_index": 0, "score": 7}]}"#,
        )
        .unwrap();
        assert_eq!(
            edit,
            SessionEdit::new()
                .with_distance(30)
                .with_arrow(1, 0, Score::new(7).unwrap())
        );
        let out_of_range = r#"{"arrows": [{"series_index": 0, "arrow_index": 0, "score": 11}]}"#;
        assert!(serde_json::from_str::<SessionEdit>(out_of_range).is_err());
        assert!(serde_json::from_str::<SessionEdit>("{}").unwrap().is_empty());
    }

    #[tokio::test]
    async fn edits_recompute_and_persist_totals() {
        let storage = Storage::in_memory();
        let owner = OwnerId::random();
        let id = seed(&storage, owner, 0, &[10, 9, 8]).await;
        let history = HistoryService::new(fixed_clock(), &storage);

        let edit = SessionEdit::new()
            .with_notes(Some(" gusty ".into()))
            .with_goal(None)
            .with_distance(30)
            .with_arrow(0, 2, Score::new(2).unwrap());
        let updated = history.update_session(id, edit).await.unwrap();
        assert_eq!(updated.total_score(), 21);

        let stored = history.get_session(id).await.unwrap();
        assert_eq!(stored.total_score(), 21);
        assert_eq!(stored.series()[0].score(), 21);
        assert_eq!(stored.series()[0].arrows()[2].position, None);
        assert_eq!(stored.notes(), Some("gusty"));
        assert_eq!(stored.config().goal(), None);
        assert_eq!(stored.config().distance(), 30);
    }

    #[tokio::test]
    async fn bad_edits_write_nothing() {
        let storage = Storage::in_memory();
        let id = seed(&storage, OwnerId::random(), 0, &[10, 9]).await;
        let history = HistoryService::new(fixed_clock(), &storage);

        let edit = SessionEdit::new()
            .with_notes(Some("never stored".into()))
            .with_arrow(3, 0, Score::MAX);
        assert!(matches!(
            history.update_session(id, edit).await,
            Err(HistoryError::Data(_))
        ));
        assert_eq!(history.get_session(id).await.unwrap().notes(), None);
    }

    #[tokio::test]
    async fn stats_filters_and_delete() {
        let storage = Storage::in_memory();
        let owner = OwnerId::random();
        let recent = seed(&storage, owner, 1, &[10, 10]).await;
        let old = seed(&storage, owner, 60, &[4, 4]).await;
        let history = HistoryService::new(fixed_clock(), &storage);

        let stats = history.stats(owner).await.unwrap();
        assert_eq!(stats.sessions, 2);
        assert_eq!(stats.best_total, 20);

        let week: Vec<_> = history
            .filtered(owner, HistoryFilter::LastWeek)
            .await
            .unwrap()
            .iter()
            .filter_map(Session::id)
            .collect();
        assert_eq!(week, vec![recent]);

        let insights = history.insights(owner).await.unwrap();
        assert!(!insights.averages.is_empty());

        history.delete_session(old).await.unwrap();
        assert!(matches!(
            history.get_session(old).await,
            Err(HistoryError::Persistence(PersistenceError::Storage(
                StorageError::NotFound
            )))
        ));
        assert_eq!(history.list_sessions(owner).await.unwrap().len(), 1);
    }
}
