use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::ids::ArrowId;
use crate::scoring;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScoreError {
    #[error("score must be between 0 and 10, got {0}")]
    OutOfRange(i64),
}

//
// ─── SCORE ────────────────────────────────────────────────────────────────────
//

/// Points awarded for a single arrow, always within `0..=10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Score(u8);

impl Score {
    /// Arrow outside the scoring rings.
    pub const MISS: Score = Score(0);
    /// Inner gold.
    pub const MAX: Score = Score(10);

    /// # Errors
    ///
    /// Returns `ScoreError::OutOfRange` for values above 10.
    pub fn new(value: u8) -> Result<Self, ScoreError> {
        if value > Self::MAX.0 {
            return Err(ScoreError::OutOfRange(i64::from(value)));
        }
        Ok(Self(value))
    }

    /// Build a score from a persisted integer column.
    ///
    /// # Errors
    ///
    /// Returns `ScoreError::OutOfRange` when the value is negative or above 10.
    pub fn from_i64(value: i64) -> Result<Self, ScoreError> {
        u8::try_from(value)
            .map_err(|_| ScoreError::OutOfRange(value))
            .and_then(Self::new)
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    #[must_use]
    pub fn is_miss(self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<u8> for Score {
    type Error = ScoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Score> for u8 {
    fn from(score: Score) -> Self {
        score.0
    }
}

impl From<Score> for u32 {
    fn from(score: Score) -> Self {
        u32::from(score.0)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

//
// ─── HIT POINT ────────────────────────────────────────────────────────────────
//

/// Impact position in the 280×280 logical target space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HitPoint {
    pub x: f64,
    pub y: f64,
}

impl HitPoint {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to the target centre.
    #[must_use]
    pub fn distance_from_center(self) -> f64 {
        let (cx, cy) = scoring::TargetFace::CENTER;
        (self.x - cx).hypot(self.y - cy)
    }

    #[must_use]
    pub fn score(self) -> Score {
        scoring::score(self.x, self.y)
    }
}

//
// ─── ARROW ────────────────────────────────────────────────────────────────────
//

/// A scored arrow. Position is absent for manual entries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arrow {
    pub score: Score,
    #[serde(default)]
    pub position: Option<HitPoint>,
    #[serde(default)]
    pub id: Option<ArrowId>,
}

impl Arrow {
    /// Arrow scored from its impact position.
    #[must_use]
    pub fn at(point: HitPoint) -> Self {
        Self {
            score: point.score(),
            position: Some(point),
            id: None,
        }
    }

    /// Arrow entered by value, without a position.
    #[must_use]
    pub fn manual(score: Score) -> Self {
        Self {
            score,
            position: None,
            id: None,
        }
    }

    #[must_use]
    pub fn miss() -> Self {
        Self::manual(Score::MISS)
    }

    #[must_use]
    pub fn with_id(mut self, id: ArrowId) -> Self {
        self.id = Some(id);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_rejects_values_above_ten() {
        assert!(Score::new(10).is_ok());
        assert_eq!(Score::new(11).unwrap_err(), ScoreError::OutOfRange(11));
        assert_eq!(Score::from_i64(-1).unwrap_err(), ScoreError::OutOfRange(-1));
    }

    #[test]
    fn score_deserialization_is_validated() {
        let ok: Score = serde_json::from_str("7").unwrap();
        assert_eq!(ok.value(), 7);
        assert!(serde_json::from_str::<Score>("12").is_err());
    }

    #[test]
    fn positioned_arrow_takes_its_score_from_the_target() {
        let arrow = Arrow::at(HitPoint::new(140.0, 140.0));
        assert_eq!(arrow.score, Score::MAX);
        assert!(arrow.position.is_some());
    }

    #[test]
    fn miss_has_no_position() {
        let arrow = Arrow::miss();
        assert!(arrow.score.is_miss());
        assert_eq!(arrow.position, None);
    }
}
