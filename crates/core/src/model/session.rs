use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{
    Arrow, ConfigError, OwnerId, SelfAssessment, Series, SessionConfig, SessionId,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionDataError {
    #[error("session holds {len} series but is configured for {max}")]
    TooManySeries { len: usize, max: u32 },

    #[error("series {series_index} holds {len} arrows but is configured for {max}")]
    TooManyArrows {
        series_index: usize,
        len: usize,
        max: u32,
    },

    #[error("no arrow at series {series_index}, position {arrow_index}")]
    ArrowNotFound {
        series_index: usize,
        arrow_index: usize,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// A training session: configuration, recorded series, and closing notes.
///
/// `total_score` and `best_series` are recomputed from the arrows after every
/// mutation and never patched incrementally. Deserialized totals are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SessionData")]
pub struct Session {
    id: Option<SessionId>,
    owner: OwnerId,
    config: SessionConfig,
    series: Vec<Series>,
    total_score: u32,
    best_series: Option<u32>,
    notes: Option<String>,
    self_assessment: Option<SelfAssessment>,
    completed: bool,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct SessionData {
    #[serde(default)]
    id: Option<SessionId>,
    owner: OwnerId,
    config: SessionConfig,
    series: Vec<Series>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    self_assessment: Option<SelfAssessment>,
    completed: bool,
    created_at: DateTime<Utc>,
}

impl From<SessionData> for Session {
    fn from(data: SessionData) -> Self {
        let mut session = Self {
            id: data.id,
            owner: data.owner,
            config: data.config,
            series: data.series,
            total_score: 0,
            best_series: None,
            notes: data.notes,
            self_assessment: data.self_assessment,
            completed: data.completed,
            created_at: data.created_at,
        };
        session.refresh_totals();
        session
    }
}

impl Session {
    /// Start an empty, in-progress session.
    #[must_use]
    pub fn new(owner: OwnerId, config: SessionConfig, created_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            owner,
            config,
            series: Vec::new(),
            total_score: 0,
            best_series: None,
            notes: None,
            self_assessment: None,
            completed: false,
            created_at,
        }
    }

    /// Rehydrate a session from persisted storage.
    ///
    /// Totals are recomputed from the arrows; stored totals are not trusted.
    ///
    /// # Errors
    ///
    /// Returns `SessionDataError` if the series or arrows exceed the configuration.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: SessionId,
        owner: OwnerId,
        config: SessionConfig,
        series: Vec<Series>,
        notes: Option<String>,
        self_assessment: Option<SelfAssessment>,
        completed: bool,
        created_at: DateTime<Utc>,
    ) -> Result<Self, SessionDataError> {
        let mut session = Self {
            id: Some(id),
            owner,
            config,
            series,
            total_score: 0,
            best_series: None,
            notes: normalize_notes(notes),
            self_assessment,
            completed,
            created_at,
        };
        session.check_shape()?;
        session.refresh_totals();
        Ok(session)
    }

    /// Revalidate a session that bypassed `from_persisted`, such as one read
    /// back from a cached snapshot.
    pub(crate) fn checked(mut self) -> Result<Self, SessionDataError> {
        let c = &self.config;
        self.config = SessionConfig::from_persisted(
            c.date(),
            c.series_count(),
            c.arrows_per_series(),
            c.distance(),
            c.goal(),
        )?;
        self.check_shape()?;
        self.refresh_totals();
        Ok(self)
    }

    fn check_shape(&self) -> Result<(), SessionDataError> {
        if self.series.len() > self.config.series_len() {
            return Err(SessionDataError::TooManySeries {
                len: self.series.len(),
                max: self.config.series_count(),
            });
        }
        for (series_index, series) in self.series.iter().enumerate() {
            if series.len() > self.config.arrows_len() {
                return Err(SessionDataError::TooManyArrows {
                    series_index,
                    len: series.len(),
                    max: self.config.arrows_per_series(),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn id(&self) -> Option<SessionId> {
        self.id
    }

    pub fn set_id(&mut self, id: SessionId) {
        self.id = Some(id);
    }

    #[must_use]
    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn series(&self) -> &[Series] {
        &self.series
    }

    #[must_use]
    pub fn total_score(&self) -> u32 {
        self.total_score
    }

    /// Highest series score, `None` before the first series is started.
    #[must_use]
    pub fn best_series(&self) -> Option<u32> {
        self.best_series
    }

    #[must_use]
    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    #[must_use]
    pub fn self_assessment(&self) -> Option<&SelfAssessment> {
        self.self_assessment.as_ref()
    }

    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Number of arrows actually shot.
    #[must_use]
    pub fn arrows_shot(&self) -> usize {
        self.series.iter().map(Series::len).sum()
    }

    /// Whether the goal (if any) has been reached.
    #[must_use]
    pub fn goal_reached(&self) -> bool {
        self.config
            .goal()
            .is_some_and(|goal| self.total_score >= goal)
    }

    //
    // ─── MUTATION (history edits) ──────────────────────────────────────────────
    //

    /// Replace a recorded arrow and return the previous one.
    ///
    /// # Errors
    ///
    /// Returns `SessionDataError::ArrowNotFound` if either index is out of bounds.
    pub fn replace_arrow(
        &mut self,
        series_index: usize,
        arrow_index: usize,
        arrow: Arrow,
    ) -> Result<Arrow, SessionDataError> {
        let slot = self
            .series
            .get_mut(series_index)
            .and_then(|series| series.arrow_mut(arrow_index))
            .ok_or(SessionDataError::ArrowNotFound {
                series_index,
                arrow_index,
            })?;
        let previous = std::mem::replace(slot, arrow);
        self.refresh_totals();
        Ok(previous)
    }

    /// Remove a recorded arrow and return it.
    ///
    /// # Errors
    ///
    /// Returns `SessionDataError::ArrowNotFound` if either index is out of bounds.
    pub fn remove_arrow(
        &mut self,
        series_index: usize,
        arrow_index: usize,
    ) -> Result<Arrow, SessionDataError> {
        let removed = self
            .series
            .get_mut(series_index)
            .and_then(|series| series.remove(arrow_index))
            .ok_or(SessionDataError::ArrowNotFound {
                series_index,
                arrow_index,
            })?;
        self.refresh_totals();
        Ok(removed)
    }

    pub fn set_notes(&mut self, notes: Option<String>) {
        self.notes = normalize_notes(notes);
    }

    pub fn set_goal(&mut self, goal: Option<u32>) {
        self.config.set_goal(goal);
    }

    /// # Errors
    ///
    /// Returns `SessionDataError::Config` if the distance is zero.
    pub fn set_distance(&mut self, distance: u32) -> Result<(), SessionDataError> {
        self.config.set_distance(distance)?;
        Ok(())
    }

    pub(crate) fn series_mut(&mut self, index: usize) -> Option<&mut Series> {
        self.series.get_mut(index)
    }

    /// Make sure a series exists at `index`, creating empty ones up to it.
    pub(crate) fn ensure_series(&mut self, index: usize) -> &mut Series {
        while self.series.len() <= index {
            self.series.push(Series::new());
        }
        &mut self.series[index]
    }

    pub(crate) fn finalize(&mut self, notes: Option<String>, assessment: Option<SelfAssessment>) {
        self.refresh_totals();
        self.notes = normalize_notes(notes);
        self.self_assessment = assessment;
        self.completed = true;
    }

    /// Recompute every derived total from the arrows.
    pub(crate) fn refresh_totals(&mut self) {
        self.total_score = self.series.iter().map(Series::score).sum();
        self.best_series = self.series.iter().map(Series::score).max();
    }
}

fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Score, SessionConfigDraft};
    use crate::time::fixed_now;

    fn config(series: u32, arrows: u32) -> SessionConfig {
        SessionConfigDraft::new(fixed_now().date_naive())
            .with_series(series, arrows)
            .validate()
            .unwrap()
    }

    fn series_of(points: &[u8]) -> Series {
        Series::from_persisted(
            None,
            points
                .iter()
                .map(|p| Arrow::manual(Score::new(*p).unwrap()))
                .collect(),
        )
    }

    #[test]
    fn persisted_totals_are_recomputed() {
        let session = Session::from_persisted(
            SessionId::new(1),
            OwnerId::random(),
            config(2, 3),
            vec![series_of(&[10, 9, 8]), series_of(&[5, 5, 5])],
            Some("  windy  ".into()),
            None,
            true,
            fixed_now(),
        )
        .unwrap();

        assert_eq!(session.total_score(), 42);
        assert_eq!(session.best_series(), Some(27));
        assert_eq!(session.notes(), Some("windy"));
    }

    #[test]
    fn persisted_shape_is_checked() {
        let err = Session::from_persisted(
            SessionId::new(1),
            OwnerId::random(),
            config(1, 2),
            vec![series_of(&[1, 2, 3])],
            None,
            None,
            false,
            fixed_now(),
        )
        .unwrap_err();
        assert!(matches!(err, SessionDataError::TooManyArrows { series_index: 0, len: 3, max: 2 }));
    }

    #[test]
    fn removing_an_arrow_updates_totals() {
        let mut session = Session::new(OwnerId::random(), config(1, 3), fixed_now());
        session.ensure_series(0).push(Arrow::manual(Score::new(9).unwrap()));
        session.ensure_series(0).push(Arrow::manual(Score::new(4).unwrap()));
        session.refresh_totals();
        assert_eq!(session.total_score(), 13);

        session.remove_arrow(0, 0).unwrap();
        assert_eq!(session.total_score(), 4);
        assert!(session.remove_arrow(0, 5).is_err());
    }

    #[test]
    fn empty_session_has_no_best_series() {
        let session = Session::new(OwnerId::random(), config(2, 2), fixed_now());
        assert_eq!(session.best_series(), None);
        assert_eq!(session.total_score(), 0);
    }
}
