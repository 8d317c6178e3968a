mod arrow;
mod assessment;
mod config;
mod ids;
mod series;
mod session;

pub use ids::{ArrowId, OwnerId, ParseIdError, SeriesId, SessionId};

pub use arrow::{Arrow, HitPoint, Score, ScoreError};
pub use assessment::{AssessmentCategory, AssessmentError, SelfAssessment, SelfAssessmentDraft};
pub use config::{ConfigError, SessionConfig, SessionConfigDraft};
pub use series::Series;
pub use session::{Session, SessionDataError};
