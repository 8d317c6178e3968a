use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::{
    Arrow, ArrowId, ConfigError, OwnerId, SelfAssessment, Series, SeriesId, Session,
    SessionConfig, SessionConfigDraft, SessionDataError, SessionId,
};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TrackerError {
    #[error(transparent)]
    Validation(#[from] ConfigError),

    #[error("no arrow at series {series_index}, position {arrow_index}")]
    NotFound {
        series_index: usize,
        arrow_index: usize,
    },

    #[error("series {series_number} cannot be selected ({started} started)")]
    OutOfRange { series_number: usize, started: usize },

    #[error("session is already finalized")]
    Finalized,

    #[error("inconsistent session data: {0}")]
    Data(#[from] SessionDataError),
}

//
// ─── POLICY & OUTCOMES ─────────────────────────────────────────────────────────
//

/// What happens when an arrow fills the current series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdvancePolicy {
    /// Stay on the filled series until the archer advances explicitly.
    #[default]
    Manual,
    /// Move to the next series as soon as one fills.
    Auto,
}

impl fmt::Display for AdvancePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdvancePolicy::Manual => f.write_str("manual"),
            AdvancePolicy::Auto => f.write_str("auto"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown advance policy: {0}")]
pub struct ParsePolicyError(pub String);

impl FromStr for AdvancePolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" => Ok(AdvancePolicy::Manual),
            "auto" => Ok(AdvancePolicy::Auto),
            other => Err(ParsePolicyError(other.to_string())),
        }
    }
}

/// Location of a recorded arrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrowSlot {
    pub series_index: usize,
    pub arrow_index: usize,
}

/// Result of registering an arrow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// Stored; the series still has room.
    Recorded(ArrowSlot),
    /// Stored and the series is now full. The tracker stays on it.
    SeriesFilled(ArrowSlot),
    /// Stored, the series filled, and the tracker moved to the next one.
    Advanced(ArrowSlot),
    /// Stored as the last arrow of the last series.
    SessionFilled(ArrowSlot),
    /// Nothing stored: the current series is already full.
    Ignored,
}

impl RegisterOutcome {
    /// Where the arrow landed, if it was stored.
    #[must_use]
    pub fn slot(&self) -> Option<ArrowSlot> {
        match self {
            RegisterOutcome::Recorded(slot)
            | RegisterOutcome::SeriesFilled(slot)
            | RegisterOutcome::Advanced(slot)
            | RegisterOutcome::SessionFilled(slot) => Some(*slot),
            RegisterOutcome::Ignored => None,
        }
    }

    #[must_use]
    pub fn is_recorded(&self) -> bool {
        self.slot().is_some()
    }
}

/// Display state of one series in a navigation strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeriesStatus {
    NotStarted,
    Current,
    Started,
    Completed,
}

/// Serializable tracker state for the local snapshot cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerSnapshot {
    pub session: Session,
    pub current_series: usize,
    pub current_arrow: usize,
    #[serde(default)]
    pub policy: AdvancePolicy,
}

//
// ─── TRACKER ───────────────────────────────────────────────────────────────────
//

/// Progress through a running session: which series and arrow come next,
/// plus the recorded arrows themselves.
///
/// Failed operations leave the tracker untouched. Once finalized the tracker
/// is read-only apart from id assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTracker {
    session: Session,
    current_series: usize,
    current_arrow: usize,
    policy: AdvancePolicy,
}

impl SessionTracker {
    /// Start a new session at series 0, arrow 0.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::Validation` when the series count, arrows per
    /// series, or distance is zero.
    pub fn start(
        draft: SessionConfigDraft,
        owner: OwnerId,
        created_at: DateTime<Utc>,
    ) -> Result<Self, TrackerError> {
        let config = draft.validate()?;
        Ok(Self {
            session: Session::new(owner, config, created_at),
            current_series: 0,
            current_arrow: 0,
            policy: AdvancePolicy::default(),
        })
    }

    #[must_use]
    pub fn with_policy(mut self, policy: AdvancePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Continue a session loaded from storage.
    ///
    /// The tracker lands on the first series that still has room, or one past
    /// the last recorded series when all of them are full.
    #[must_use]
    pub fn resume(session: Session) -> Self {
        let per_series = session.config().arrows_per_series();
        let series_count = session.config().series_len();
        let current_series = session
            .series()
            .iter()
            .position(|series| !series.is_complete(per_series))
            .unwrap_or_else(|| session.series().len())
            .min(series_count);
        let current_arrow = session.series().get(current_series).map_or(0, Series::len);

        Self {
            session,
            current_series,
            current_arrow,
            policy: AdvancePolicy::default(),
        }
    }

    /// Restore a tracker from a cached snapshot.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::Data` when the recorded arrows do not fit the
    /// configuration, and `TrackerError::OutOfRange` when the cursor points
    /// past the session.
    pub fn from_snapshot(snapshot: TrackerSnapshot) -> Result<Self, TrackerError> {
        let TrackerSnapshot {
            session,
            current_series,
            current_arrow,
            policy,
        } = snapshot;
        let session = session.checked()?;

        let series_count = session.config().series_len();
        if current_series > series_count || current_arrow > session.config().arrows_len() {
            return Err(TrackerError::OutOfRange {
                series_number: current_series.saturating_add(1),
                started: session.series().len(),
            });
        }

        Ok(Self {
            session,
            current_series,
            current_arrow,
            policy,
        })
    }

    #[must_use]
    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            session: self.session.clone(),
            current_series: self.current_series,
            current_arrow: self.current_arrow,
            policy: self.policy,
        }
    }

    //
    // ─── ACCESSORS ─────────────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn session(&self) -> &Session {
        &self.session
    }

    #[must_use]
    pub fn into_session(self) -> Session {
        self.session
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        self.session.config()
    }

    #[must_use]
    pub fn policy(&self) -> AdvancePolicy {
        self.policy
    }

    /// Zero-based index of the series being shot. Equals `series_count` once
    /// the archer has advanced past the last series.
    #[must_use]
    pub fn current_series_index(&self) -> usize {
        self.current_series
    }

    #[must_use]
    pub fn current_arrow_index(&self) -> usize {
        self.current_arrow
    }

    /// The series being shot, if it has been started.
    #[must_use]
    pub fn current_series(&self) -> Option<&Series> {
        self.session.series().get(self.current_series)
    }

    #[must_use]
    pub fn total_score(&self) -> u32 {
        self.session.total_score()
    }

    #[must_use]
    pub fn best_series(&self) -> Option<u32> {
        self.session.best_series()
    }

    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.session.is_completed()
    }

    /// Arrows still to shoot across the whole session.
    #[must_use]
    pub fn remaining_arrows(&self) -> usize {
        let planned = usize::try_from(self.config().planned_arrows()).unwrap_or(usize::MAX);
        planned.saturating_sub(self.session.arrows_shot())
    }

    /// `false` when the series has not been started.
    #[must_use]
    pub fn is_series_complete(&self, index: usize) -> bool {
        self.session
            .series()
            .get(index)
            .is_some_and(|series| series.is_complete(self.config().arrows_per_series()))
    }

    #[must_use]
    pub fn is_session_complete(&self) -> bool {
        (0..self.config().series_len()).all(|index| self.is_series_complete(index))
    }

    #[must_use]
    pub fn series_status(&self, index: usize) -> SeriesStatus {
        if self.is_series_complete(index) {
            SeriesStatus::Completed
        } else if index == self.current_series {
            SeriesStatus::Current
        } else if index < self.session.series().len() {
            SeriesStatus::Started
        } else {
            SeriesStatus::NotStarted
        }
    }

    //
    // ─── MUTATION ──────────────────────────────────────────────────────────────
    //

    fn ensure_open(&self) -> Result<(), TrackerError> {
        if self.is_finalized() {
            return Err(TrackerError::Finalized);
        }
        Ok(())
    }

    /// Append an arrow to the current series.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::Finalized` after `finalize`.
    pub fn register_arrow(&mut self, arrow: Arrow) -> Result<RegisterOutcome, TrackerError> {
        self.ensure_open()?;

        let series_count = self.config().series_len();
        let per_series = self.config().arrows_len();
        if self.current_series >= series_count {
            return Ok(RegisterOutcome::Ignored);
        }
        let index = self.current_series;
        if self.session.series().get(index).is_some_and(|s| s.len() >= per_series) {
            return Ok(RegisterOutcome::Ignored);
        }

        let series = self.session.ensure_series(index);
        series.push(arrow);
        let slot = ArrowSlot {
            series_index: index,
            arrow_index: series.len() - 1,
        };
        let filled = series.len() >= per_series;
        self.current_arrow = series.len();
        self.session.refresh_totals();

        let outcome = if !filled {
            RegisterOutcome::Recorded(slot)
        } else if index + 1 >= series_count {
            RegisterOutcome::SessionFilled(slot)
        } else if self.policy == AdvancePolicy::Auto {
            self.current_series = index + 1;
            self.current_arrow = 0;
            RegisterOutcome::Advanced(slot)
        } else {
            RegisterOutcome::SeriesFilled(slot)
        };
        Ok(outcome)
    }

    /// Replace a recorded arrow (score and position together) and return the
    /// previous one.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::NotFound` if either index is out of bounds and
    /// `TrackerError::Finalized` after `finalize`.
    pub fn edit_arrow(
        &mut self,
        series_index: usize,
        arrow_index: usize,
        arrow: Arrow,
    ) -> Result<Arrow, TrackerError> {
        self.ensure_open()?;
        self.session
            .replace_arrow(series_index, arrow_index, arrow)
            .map_err(|err| match err {
                SessionDataError::ArrowNotFound {
                    series_index,
                    arrow_index,
                } => TrackerError::NotFound {
                    series_index,
                    arrow_index,
                },
                other => TrackerError::Data(other),
            })
    }

    /// Move to the next series without checking that the current one is full.
    ///
    /// Stops one past the last series; further calls change nothing.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::Finalized` after `finalize`.
    pub fn advance_to_next_series(&mut self) -> Result<usize, TrackerError> {
        self.ensure_open()?;
        let series_count = self.config().series_len();
        if self.current_series < series_count {
            self.current_series += 1;
            self.current_arrow = 0;
        }
        Ok(self.current_series)
    }

    /// Jump back (or forward) to an already started series. `series_number`
    /// is 1-based.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::OutOfRange` when the series has not been started
    /// and `TrackerError::Finalized` after `finalize`.
    pub fn navigate_to_series(&mut self, series_number: usize) -> Result<(), TrackerError> {
        self.ensure_open()?;
        let started = self.session.series().len();
        let in_config = (1..=self.config().series_len()).contains(&series_number);
        if !in_config || series_number > started {
            return Err(TrackerError::OutOfRange {
                series_number,
                started,
            });
        }

        let index = series_number - 1;
        self.current_series = index;
        self.current_arrow = self.session.series().get(index).map_or(0, Series::len);
        Ok(())
    }

    /// Close the session with optional notes and self-assessment.
    ///
    /// Allowed at any point, whether or not every series is full. Blank notes
    /// are dropped.
    ///
    /// # Errors
    ///
    /// Returns `TrackerError::Finalized` if the session was already closed.
    pub fn finalize(
        &mut self,
        notes: Option<String>,
        self_assessment: Option<SelfAssessment>,
    ) -> Result<&Session, TrackerError> {
        self.ensure_open()?;
        self.session.finalize(notes, self_assessment);
        Ok(&self.session)
    }

    //
    // ─── REMOTE IDS ────────────────────────────────────────────────────────────
    //

    pub fn assign_session_id(&mut self, id: SessionId) {
        self.session.set_id(id);
    }

    /// Returns `false` if the series does not exist.
    pub fn assign_series_id(&mut self, series_index: usize, id: SeriesId) -> bool {
        match self.session.series_mut(series_index) {
            Some(series) => {
                series.set_id(id);
                true
            }
            None => false,
        }
    }

    /// Returns `false` if the arrow does not exist.
    pub fn assign_arrow_id(&mut self, slot: ArrowSlot, id: ArrowId) -> bool {
        match self
            .session
            .series_mut(slot.series_index)
            .and_then(|series| series.arrow_mut(slot.arrow_index))
        {
            Some(arrow) => {
                arrow.id = Some(id);
                true
            }
            None => false,
        }
    }
}
