use crate::analysis::mean;
use crate::model::{HitPoint, Series, Session};
use crate::scoring::TargetFace;

/// Offsets of the group centre below this many units count as centred.
const CENTRED_TOLERANCE: f64 = 15.0;

/// Dispersion at which consistency reaches zero.
const ZERO_CONSISTENCY_DISPERSION: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HorizontalTendency {
    Left,
    Right,
    Centered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerticalTendency {
    High,
    Low,
    Centered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GroupingQuality {
    Excellent,
    Good,
    Fair,
    Scattered,
}

/// Average points per arrow, bucketed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreBand {
    Excellent,
    Good,
    Moderate,
    NeedsWork,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progression {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesAnalysis {
    pub center_of_mass: HitPoint,
    /// Root-mean-square distance of the positioned arrows from their centre.
    pub dispersion: f64,
    pub horizontal: HorizontalTendency,
    pub vertical: VerticalTendency,
    pub grouping: GroupingQuality,
    /// `0..=100`, higher is tighter.
    pub consistency: u8,
    pub score_band: ScoreBand,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionAnalysis {
    pub series: Vec<SeriesAnalysis>,
    pub horizontal: HorizontalTendency,
    pub vertical: VerticalTendency,
    pub grouping: GroupingQuality,
    /// Mean series consistency, rounded.
    pub consistency: u8,
    pub best_series: usize,
    pub most_consistent_series: usize,
    pub progression: Progression,
}

/// Analyse the impact pattern of one series.
///
/// Arrows without a position are ignored for the geometry but still count
/// towards the score band.
#[must_use]
pub fn analyze_series(series: &Series) -> SeriesAnalysis {
    let points: Vec<HitPoint> = series.arrows().iter().filter_map(|a| a.position).collect();
    let center_of_mass = center_of_mass(&points);
    let dispersion = dispersion(&points, center_of_mass);

    let (cx, cy) = TargetFace::CENTER;
    let dx = center_of_mass.x - cx;
    let dy = center_of_mass.y - cy;

    let horizontal = if dx.abs() < CENTRED_TOLERANCE {
        HorizontalTendency::Centered
    } else if dx < 0.0 {
        HorizontalTendency::Left
    } else {
        HorizontalTendency::Right
    };
    // Screen coordinates: y grows downwards.
    let vertical = if dy.abs() < CENTRED_TOLERANCE {
        VerticalTendency::Centered
    } else if dy < 0.0 {
        VerticalTendency::High
    } else {
        VerticalTendency::Low
    };

    let grouping = if dispersion < 20.0 {
        GroupingQuality::Excellent
    } else if dispersion < 35.0 {
        GroupingQuality::Good
    } else if dispersion < 55.0 {
        GroupingQuality::Fair
    } else {
        GroupingQuality::Scattered
    };

    let consistency =
        (100.0 - dispersion / ZERO_CONSISTENCY_DISPERSION * 100.0).clamp(0.0, 100.0);

    let per_arrow = if series.is_empty() {
        0.0
    } else {
        f64::from(series.score()) / series.len() as f64
    };
    let score_band = if per_arrow >= 8.5 {
        ScoreBand::Excellent
    } else if per_arrow >= 7.0 {
        ScoreBand::Good
    } else if per_arrow >= 5.0 {
        ScoreBand::Moderate
    } else {
        ScoreBand::NeedsWork
    };

    SeriesAnalysis {
        center_of_mass,
        dispersion,
        horizontal,
        vertical,
        grouping,
        consistency: percent(consistency),
        score_band,
    }
}

/// Analyse every series of a session. `None` when nothing was shot.
#[must_use]
pub fn analyze_session(session: &Session) -> Option<SessionAnalysis> {
    if session.series().is_empty() {
        return None;
    }
    let series: Vec<SeriesAnalysis> = session.series().iter().map(analyze_series).collect();

    let horizontal = predominant(
        &[
            HorizontalTendency::Left,
            HorizontalTendency::Right,
            HorizontalTendency::Centered,
        ],
        series.iter().map(|a| a.horizontal),
    );
    let vertical = predominant(
        &[
            VerticalTendency::High,
            VerticalTendency::Low,
            VerticalTendency::Centered,
        ],
        series.iter().map(|a| a.vertical),
    );

    let consistencies: Vec<f64> = series.iter().map(|a| f64::from(a.consistency)).collect();
    let mean_consistency = mean(&consistencies).unwrap_or(0.0);
    let grouping = if mean_consistency >= 80.0 {
        GroupingQuality::Excellent
    } else if mean_consistency >= 65.0 {
        GroupingQuality::Good
    } else if mean_consistency >= 45.0 {
        GroupingQuality::Fair
    } else {
        GroupingQuality::Scattered
    };

    let scores: Vec<u32> = session.series().iter().map(Series::score).collect();

    Some(SessionAnalysis {
        horizontal,
        vertical,
        grouping,
        consistency: percent(mean_consistency),
        best_series: first_max_index(&scores),
        most_consistent_series: first_max_index(
            &series.iter().map(|a| a.consistency).collect::<Vec<_>>(),
        ),
        progression: progression(&scores),
        series,
    })
}

fn center_of_mass(points: &[HitPoint]) -> HitPoint {
    if points.is_empty() {
        let (cx, cy) = TargetFace::CENTER;
        return HitPoint::new(cx, cy);
    }
    let n = points.len() as f64;
    let (sx, sy) = points
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    HitPoint::new(sx / n, sy / n)
}

fn dispersion(points: &[HitPoint], center: HitPoint) -> f64 {
    if points.len() <= 1 {
        return 0.0;
    }
    let sum_sq: f64 = points
        .iter()
        .map(|p| (p.x - center.x).powi(2) + (p.y - center.y).powi(2))
        .sum();
    (sum_sq / points.len() as f64).sqrt()
}

/// Most frequent value; ties go to the latest entry in `order`, so an even
/// split with `Centered` reads as centred.
fn predominant<T: Copy + PartialEq>(order: &[T], values: impl Iterator<Item = T> + Clone) -> T {
    let mut best = order[0];
    let mut best_count = 0;
    for candidate in order {
        let count = values.clone().filter(|v| v == candidate).count();
        if count >= best_count {
            best = *candidate;
            best_count = count;
        }
    }
    best
}

fn first_max_index<T: PartialOrd>(values: &[T]) -> usize {
    let mut best = 0;
    for (index, value) in values.iter().enumerate() {
        if *value > values[best] {
            best = index;
        }
    }
    best
}

/// Compare the mean of the first third of series with the last third.
fn progression(scores: &[u32]) -> Progression {
    let third = scores.len() / 3;
    if third == 0 {
        return Progression::Stable;
    }
    let to_f64 = |s: &[u32]| s.iter().map(|v| f64::from(*v)).collect::<Vec<_>>();
    let first = mean(&to_f64(&scores[..third])).unwrap_or(0.0);
    let last = mean(&to_f64(&scores[scores.len() - third..])).unwrap_or(0.0);
    let diff = last - first;

    if diff > 2.0 {
        Progression::Improving
    } else if diff < -2.0 {
        Progression::Declining
    } else {
        Progression::Stable
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}
