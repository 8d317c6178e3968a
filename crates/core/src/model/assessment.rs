use serde::{Deserialize, Serialize};
use thiserror::Error;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssessmentError {
    #[error("{category:?} rating must be between 0 and 10, got {value}")]
    RatingOutOfRange {
        category: AssessmentCategory,
        value: u8,
    },
}

//
// ─── CATEGORIES ───────────────────────────────────────────────────────────────
//

/// Steps of the shot process the archer rates after a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssessmentCategory {
    Posture,
    Anchoring,
    Alignment,
    Breathing,
    Aiming,
    Release,
    FollowThrough,
    Consistency,
    Rhythm,
    Focus,
}

impl AssessmentCategory {
    pub const ALL: [AssessmentCategory; 10] = [
        AssessmentCategory::Posture,
        AssessmentCategory::Anchoring,
        AssessmentCategory::Alignment,
        AssessmentCategory::Breathing,
        AssessmentCategory::Aiming,
        AssessmentCategory::Release,
        AssessmentCategory::FollowThrough,
        AssessmentCategory::Consistency,
        AssessmentCategory::Rhythm,
        AssessmentCategory::Focus,
    ];

    /// Stable storage key.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            AssessmentCategory::Posture => "posture",
            AssessmentCategory::Anchoring => "anchoring",
            AssessmentCategory::Alignment => "alignment",
            AssessmentCategory::Breathing => "breathing",
            AssessmentCategory::Aiming => "aiming",
            AssessmentCategory::Release => "release",
            AssessmentCategory::FollowThrough => "follow_through",
            AssessmentCategory::Consistency => "consistency",
            AssessmentCategory::Rhythm => "rhythm",
            AssessmentCategory::Focus => "focus",
        }
    }
}

//
// ─── DRAFT ────────────────────────────────────────────────────────────────────
//

/// Raw ratings as entered on the self-assessment screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelfAssessmentDraft {
    pub posture: u8,
    pub anchoring: u8,
    pub alignment: u8,
    pub breathing: u8,
    pub aiming: u8,
    pub release: u8,
    pub follow_through: u8,
    pub consistency: u8,
    pub rhythm: u8,
    pub focus: u8,
}

impl Default for SelfAssessmentDraft {
    /// Every slider starts in the middle.
    fn default() -> Self {
        Self::uniform(SelfAssessment::NEUTRAL)
    }
}

impl SelfAssessmentDraft {
    #[must_use]
    pub fn uniform(value: u8) -> Self {
        Self {
            posture: value,
            anchoring: value,
            alignment: value,
            breathing: value,
            aiming: value,
            release: value,
            follow_through: value,
            consistency: value,
            rhythm: value,
            focus: value,
        }
    }

    #[must_use]
    pub fn with(mut self, category: AssessmentCategory, value: u8) -> Self {
        *self.slot(category) = value;
        self
    }

    fn slot(&mut self, category: AssessmentCategory) -> &mut u8 {
        match category {
            AssessmentCategory::Posture => &mut self.posture,
            AssessmentCategory::Anchoring => &mut self.anchoring,
            AssessmentCategory::Alignment => &mut self.alignment,
            AssessmentCategory::Breathing => &mut self.breathing,
            AssessmentCategory::Aiming => &mut self.aiming,
            AssessmentCategory::Release => &mut self.release,
            AssessmentCategory::FollowThrough => &mut self.follow_through,
            AssessmentCategory::Consistency => &mut self.consistency,
            AssessmentCategory::Rhythm => &mut self.rhythm,
            AssessmentCategory::Focus => &mut self.focus,
        }
    }

    fn get(&self, category: AssessmentCategory) -> u8 {
        match category {
            AssessmentCategory::Posture => self.posture,
            AssessmentCategory::Anchoring => self.anchoring,
            AssessmentCategory::Alignment => self.alignment,
            AssessmentCategory::Breathing => self.breathing,
            AssessmentCategory::Aiming => self.aiming,
            AssessmentCategory::Release => self.release,
            AssessmentCategory::FollowThrough => self.follow_through,
            AssessmentCategory::Consistency => self.consistency,
            AssessmentCategory::Rhythm => self.rhythm,
            AssessmentCategory::Focus => self.focus,
        }
    }

    /// # Errors
    ///
    /// Returns `AssessmentError::RatingOutOfRange` for the first rating above 10.
    pub fn validate(self) -> Result<SelfAssessment, AssessmentError> {
        for category in AssessmentCategory::ALL {
            let value = self.get(category);
            if value > SelfAssessment::MAX_RATING {
                return Err(AssessmentError::RatingOutOfRange { category, value });
            }
        }
        Ok(SelfAssessment { ratings: self })
    }
}

//
// ─── ASSESSMENT ───────────────────────────────────────────────────────────────
//

/// Validated per-category ratings (`0..=10`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SelfAssessmentDraft", into = "SelfAssessmentDraft")]
pub struct SelfAssessment {
    ratings: SelfAssessmentDraft,
}

impl SelfAssessment {
    pub const MAX_RATING: u8 = 10;
    pub const NEUTRAL: u8 = 5;

    #[must_use]
    pub fn rating(&self, category: AssessmentCategory) -> u8 {
        self.ratings.get(category)
    }

    /// Ratings in `AssessmentCategory::ALL` order.
    pub fn ratings(&self) -> impl Iterator<Item = (AssessmentCategory, u8)> + '_ {
        AssessmentCategory::ALL
            .into_iter()
            .map(|category| (category, self.rating(category)))
    }

    #[must_use]
    pub fn average(&self) -> f64 {
        let sum: u32 = self.ratings().map(|(_, value)| u32::from(value)).sum();
        f64::from(sum) / AssessmentCategory::ALL.len() as f64
    }
}

impl TryFrom<SelfAssessmentDraft> for SelfAssessment {
    type Error = AssessmentError;

    fn try_from(draft: SelfAssessmentDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl From<SelfAssessment> for SelfAssessmentDraft {
    fn from(assessment: SelfAssessment) -> Self {
        assessment.ratings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_draft_is_neutral() {
        let assessment = SelfAssessmentDraft::default().validate().unwrap();
        assert!(assessment.ratings().all(|(_, v)| v == 5));
        assert!((assessment.average() - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn out_of_range_rating_names_the_category() {
        let err = SelfAssessmentDraft::default()
            .with(AssessmentCategory::Breathing, 11)
            .validate()
            .unwrap_err();
        assert_eq!(
            err,
            AssessmentError::RatingOutOfRange {
                category: AssessmentCategory::Breathing,
                value: 11
            }
        );
    }

    #[test]
    fn serde_rejects_invalid_ratings() {
        let mut json = serde_json::to_value(SelfAssessmentDraft::uniform(7)).unwrap();
        let parsed: SelfAssessment = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(parsed.rating(AssessmentCategory::Focus), 7);

        json["focus"] = serde_json::json!(42);
        assert!(serde_json::from_value::<SelfAssessment>(json).is_err());
    }
}
