//! Read-only analysis over recorded sessions.
//!
//! Results are typed values; turning them into text is left to the caller.

pub mod grouping;
pub mod insights;
pub mod stats;

pub use grouping::{
    GroupingQuality, HorizontalTendency, Progression, ScoreBand, SeriesAnalysis, SessionAnalysis,
    VerticalTendency, analyze_series, analyze_session,
};
pub use insights::{
    AssessmentInsights, CategoryCorrelation, CategoryTrend, Impact, RatingSnapshot, Recommendation,
    Trend, assessment_insights,
};
pub use stats::{HistoryFilter, HistoryStats, SessionReport, filter_history};

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10_f64.powi(decimals);
    (value * factor).round() / factor
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}
