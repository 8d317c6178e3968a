use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::Score;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("series count must be > 0")]
    InvalidSeriesCount,

    #[error("arrows per series must be > 0")]
    InvalidArrowsPerSeries,

    #[error("distance must be > 0")]
    InvalidDistance,
}

//
// ─── DRAFT ─────────────────────────────────────────────────────────────────────
//

/// Unvalidated session setup, as filled in on the configuration screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfigDraft {
    pub date: NaiveDate,
    pub series_count: u32,
    pub arrows_per_series: u32,
    /// Shooting distance in metres.
    pub distance: u32,
    pub goal: Option<u32>,
}

impl SessionConfigDraft {
    /// Common club setup: 10 series of 6 arrows at 30 m, no goal.
    #[must_use]
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            series_count: 10,
            arrows_per_series: 6,
            distance: 30,
            goal: None,
        }
    }

    #[must_use]
    pub fn with_series(mut self, series_count: u32, arrows_per_series: u32) -> Self {
        self.series_count = series_count;
        self.arrows_per_series = arrows_per_series;
        self
    }

    #[must_use]
    pub fn with_distance(mut self, distance: u32) -> Self {
        self.distance = distance;
        self
    }

    #[must_use]
    pub fn with_goal(mut self, goal: Option<u32>) -> Self {
        self.goal = goal;
        self
    }

    /// Validate the draft into an immutable configuration.
    ///
    /// A goal of `0` is treated as "no goal".
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the series count, arrows per series, or
    /// distance is zero.
    pub fn validate(self) -> Result<SessionConfig, ConfigError> {
        if self.series_count == 0 {
            return Err(ConfigError::InvalidSeriesCount);
        }
        if self.arrows_per_series == 0 {
            return Err(ConfigError::InvalidArrowsPerSeries);
        }
        if self.distance == 0 {
            return Err(ConfigError::InvalidDistance);
        }

        Ok(SessionConfig {
            date: self.date,
            series_count: self.series_count,
            arrows_per_series: self.arrows_per_series,
            distance: self.distance,
            goal: self.goal.filter(|goal| *goal > 0),
        })
    }
}

//
// ─── CONFIG ────────────────────────────────────────────────────────────────────
//

/// Validated session setup. Fixed for the lifetime of a running session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    date: NaiveDate,
    series_count: u32,
    arrows_per_series: u32,
    distance: u32,
    goal: Option<u32>,
}

impl SessionConfig {
    /// Rehydrate a configuration from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the stored values no longer validate.
    pub fn from_persisted(
        date: NaiveDate,
        series_count: u32,
        arrows_per_series: u32,
        distance: u32,
        goal: Option<u32>,
    ) -> Result<Self, ConfigError> {
        SessionConfigDraft {
            date,
            series_count,
            arrows_per_series,
            distance,
            goal,
        }
        .validate()
    }

    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.date
    }

    #[must_use]
    pub fn series_count(&self) -> u32 {
        self.series_count
    }

    #[must_use]
    pub fn arrows_per_series(&self) -> u32 {
        self.arrows_per_series
    }

    #[must_use]
    pub fn distance(&self) -> u32 {
        self.distance
    }

    #[must_use]
    pub fn goal(&self) -> Option<u32> {
        self.goal
    }

    #[must_use]
    pub fn has_goal(&self) -> bool {
        self.goal.is_some()
    }

    /// Highest total reachable with every arrow in the ten.
    #[must_use]
    pub fn max_possible_score(&self) -> u32 {
        self.series_count
            .saturating_mul(self.arrows_per_series)
            .saturating_mul(u32::from(Score::MAX))
    }

    /// Total number of arrows the session plans for.
    #[must_use]
    pub fn planned_arrows(&self) -> u32 {
        self.series_count.saturating_mul(self.arrows_per_series)
    }

    pub(crate) fn series_len(&self) -> usize {
        usize::try_from(self.series_count).unwrap_or(usize::MAX)
    }

    pub(crate) fn arrows_len(&self) -> usize {
        usize::try_from(self.arrows_per_series).unwrap_or(usize::MAX)
    }

    /// Change the goal of a recorded session (history editing).
    pub(crate) fn set_goal(&mut self, goal: Option<u32>) {
        self.goal = goal.filter(|goal| *goal > 0);
    }

    /// Change the distance of a recorded session (history editing).
    pub(crate) fn set_distance(&mut self, distance: u32) -> Result<(), ConfigError> {
        if distance == 0 {
            return Err(ConfigError::InvalidDistance);
        }
        self.distance = distance;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 4).unwrap()
    }

    #[test]
    fn zero_values_are_rejected() {
        let base = SessionConfigDraft::new(date());
        assert_eq!(
            base.clone().with_series(0, 6).validate().unwrap_err(),
            ConfigError::InvalidSeriesCount
        );
        assert_eq!(
            base.clone().with_series(3, 0).validate().unwrap_err(),
            ConfigError::InvalidArrowsPerSeries
        );
        assert_eq!(
            base.with_distance(0).validate().unwrap_err(),
            ConfigError::InvalidDistance
        );
    }

    #[test]
    fn zero_goal_means_no_goal() {
        let config = SessionConfigDraft::new(date())
            .with_goal(Some(0))
            .validate()
            .unwrap();
        assert!(!config.has_goal());

        let config = SessionConfigDraft::new(date())
            .with_goal(Some(500))
            .validate()
            .unwrap();
        assert_eq!(config.goal(), Some(500));
    }

    #[test]
    fn max_possible_score_counts_every_arrow_as_ten() {
        let config = SessionConfigDraft::new(date())
            .with_series(2, 3)
            .validate()
            .unwrap();
        assert_eq!(config.max_possible_score(), 60);
        assert_eq!(config.planned_arrows(), 6);
    }
}
