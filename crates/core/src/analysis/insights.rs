use chrono::NaiveDate;

use crate::analysis::{mean, round_to};
use crate::model::{AssessmentCategory, SelfAssessment, Session};

const STRENGTH_THRESHOLD: f64 = 7.5;
const WEAKNESS_THRESHOLD: f64 = 6.0;
const TREND_SLOPE: f64 = 0.1;
const MAX_RECOMMENDATIONS: usize = 5;
const EVOLUTION_WINDOW: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Impact {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryTrend {
    pub category: AssessmentCategory,
    pub trend: Trend,
    /// Regression slope in rating points per session, two decimals.
    pub slope: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryCorrelation {
    pub category: AssessmentCategory,
    /// Pearson coefficient between the rating and the normalised score.
    pub coefficient: f64,
    pub impact: Impact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    /// Fewer than two finished sessions with a self-assessment.
    NotEnoughData,
    /// The rating tracks the score closely.
    FocusOnHighImpact(AssessmentCategory),
    ReviewDeclining(AssessmentCategory),
    WorkOnWeakest(AssessmentCategory),
    /// Category-specific drill for a mean rating below 5.
    Drill(AssessmentCategory),
    KeepConsistency,
    VaryDistances,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RatingSnapshot {
    pub date: NaiveDate,
    pub assessment: SelfAssessment,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AssessmentInsights {
    /// Category means in `AssessmentCategory::ALL` order.
    pub averages: Vec<(AssessmentCategory, f64)>,
    pub strengths: Vec<AssessmentCategory>,
    pub weaknesses: Vec<AssessmentCategory>,
    pub trends: Vec<CategoryTrend>,
    pub correlations: Vec<CategoryCorrelation>,
    pub recommendations: Vec<Recommendation>,
    /// Oldest first, at most the last ten sessions.
    pub evolution: Vec<RatingSnapshot>,
}

/// Derive self-assessment insights from a session history.
///
/// Only finished sessions carrying a self-assessment are considered.
#[must_use]
pub fn assessment_insights(sessions: &[Session]) -> AssessmentInsights {
    let mut rated: Vec<(&Session, &SelfAssessment)> = sessions
        .iter()
        .filter(|s| s.is_completed())
        .filter_map(|s| s.self_assessment().map(|a| (s, a)))
        .collect();

    if rated.len() < 2 {
        return AssessmentInsights {
            recommendations: vec![Recommendation::NotEnoughData],
            ..AssessmentInsights::default()
        };
    }
    rated.sort_by_key(|(s, _)| (s.config().date(), s.created_at()));

    let averages: Vec<(AssessmentCategory, f64)> = AssessmentCategory::ALL
        .into_iter()
        .map(|category| {
            let values: Vec<f64> = rated
                .iter()
                .map(|(_, a)| f64::from(a.rating(category)))
                .collect();
            (category, mean(&values).unwrap_or(0.0))
        })
        .collect();

    let mut strengths: Vec<(AssessmentCategory, f64)> = averages
        .iter()
        .copied()
        .filter(|(_, avg)| *avg >= STRENGTH_THRESHOLD)
        .collect();
    strengths.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut weaknesses: Vec<(AssessmentCategory, f64)> = averages
        .iter()
        .copied()
        .filter(|(_, avg)| *avg <= WEAKNESS_THRESHOLD)
        .collect();
    weaknesses.sort_by(|a, b| a.1.total_cmp(&b.1));

    let trends = trends(&rated);
    let correlations = correlations(&rated);
    let recommendations = recommendations(&averages, &trends, &correlations);

    let evolution = rated
        .iter()
        .skip(rated.len().saturating_sub(EVOLUTION_WINDOW))
        .map(|(s, a)| RatingSnapshot {
            date: s.config().date(),
            assessment: **a,
        })
        .collect();

    AssessmentInsights {
        strengths: strengths.into_iter().take(3).map(|(c, _)| c).collect(),
        weaknesses: weaknesses.into_iter().take(3).map(|(c, _)| c).collect(),
        averages,
        trends,
        correlations,
        recommendations,
        evolution,
    }
}

fn trends(rated: &[(&Session, &SelfAssessment)]) -> Vec<CategoryTrend> {
    if rated.len() < 3 {
        return Vec::new();
    }
    AssessmentCategory::ALL
        .into_iter()
        .map(|category| {
            let ys: Vec<f64> = rated
                .iter()
                .map(|(_, a)| f64::from(a.rating(category)))
                .collect();
            let slope = slope(&ys);
            let trend = if slope > TREND_SLOPE {
                Trend::Improving
            } else if slope < -TREND_SLOPE {
                Trend::Declining
            } else {
                Trend::Stable
            };
            CategoryTrend {
                category,
                trend,
                slope: round_to(slope, 2),
            }
        })
        .collect()
}

fn correlations(rated: &[(&Session, &SelfAssessment)]) -> Vec<CategoryCorrelation> {
    if rated.len() < 3 {
        return Vec::new();
    }
    let scores: Vec<f64> = rated
        .iter()
        .map(|(s, _)| {
            let max = f64::from(s.config().max_possible_score());
            f64::from(s.total_score()) / max
        })
        .collect();

    let mut out: Vec<CategoryCorrelation> = AssessmentCategory::ALL
        .into_iter()
        .map(|category| {
            let ratings: Vec<f64> = rated
                .iter()
                .map(|(_, a)| f64::from(a.rating(category)))
                .collect();
            let r = pearson(&ratings, &scores);
            let impact = if r.abs() > 0.6 {
                Impact::High
            } else if r.abs() > 0.3 {
                Impact::Medium
            } else {
                Impact::Low
            };
            CategoryCorrelation {
                category,
                coefficient: round_to(r, 2),
                impact,
            }
        })
        .collect();
    out.sort_by(|a, b| b.coefficient.abs().total_cmp(&a.coefficient.abs()));
    out
}

fn recommendations(
    averages: &[(AssessmentCategory, f64)],
    trends: &[CategoryTrend],
    correlations: &[CategoryCorrelation],
) -> Vec<Recommendation> {
    let mut out = Vec::new();

    if let Some(c) = correlations
        .iter()
        .find(|c| c.impact == Impact::High && c.coefficient > 0.5)
    {
        out.push(Recommendation::FocusOnHighImpact(c.category));
    }
    if let Some(t) = trends.iter().find(|t| t.trend == Trend::Declining) {
        out.push(Recommendation::ReviewDeclining(t.category));
    }
    let weakest = averages
        .iter()
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .filter(|(_, avg)| *avg < WEAKNESS_THRESHOLD);
    if let Some((category, _)) = weakest {
        out.push(Recommendation::WorkOnWeakest(*category));
    }
    for (category, avg) in averages {
        let drilled = matches!(
            category,
            AssessmentCategory::Posture
                | AssessmentCategory::Breathing
                | AssessmentCategory::Aiming
                | AssessmentCategory::Release
                | AssessmentCategory::Focus
        );
        if drilled && *avg < 5.0 {
            out.push(Recommendation::Drill(*category));
        }
    }

    if out.is_empty() {
        out.push(Recommendation::KeepConsistency);
        out.push(Recommendation::VaryDistances);
    }
    out.truncate(MAX_RECOMMENDATIONS);
    out
}

/// Least-squares slope of `ys` against their index.
fn slope(ys: &[f64]) -> f64 {
    let n = ys.len() as f64;
    let (mut sx, mut sy, mut sxy, mut sxx) = (0.0, 0.0, 0.0, 0.0);
    for (i, y) in ys.iter().enumerate() {
        let x = i as f64;
        sx += x;
        sy += y;
        sxy += x * y;
        sxx += x * x;
    }
    let denominator = n * sxx - sx * sx;
    if denominator == 0.0 {
        return 0.0;
    }
    (n * sxy - sx * sy) / denominator
}

fn pearson(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len();
    if n != ys.len() || n < 2 {
        return 0.0;
    }
    let nf = n as f64;
    let sx: f64 = xs.iter().sum();
    let sy: f64 = ys.iter().sum();
    let sxy: f64 = xs.iter().zip(ys).map(|(x, y)| x * y).sum();
    let sxx: f64 = xs.iter().map(|x| x * x).sum();
    let syy: f64 = ys.iter().map(|y| y * y).sum();

    let denominator = ((nf * sxx - sx * sx) * (nf * syy - sy * sy)).sqrt();
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    (nf * sxy - sx * sy) / denominator
}
