use chrono::{Datelike, Duration, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::analysis::mean;
use crate::model::{Series, Session};

/// Aggregate figures shown above the session history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HistoryStats {
    pub sessions: usize,
    /// Mean session total, rounded.
    pub average_total: u32,
    pub best_total: u32,
    /// `100 - coefficient of variation` in percent, clamped to `0..=100`.
    /// `None` when there is nothing to compare.
    pub consistency: Option<u8>,
    pub sessions_this_month: usize,
    /// Arrows planned across every session.
    pub total_arrows: u64,
}

impl HistoryStats {
    #[must_use]
    pub fn from_sessions(sessions: &[Session], today: NaiveDate) -> Self {
        if sessions.is_empty() {
            return Self::default();
        }
        let totals: Vec<f64> = sessions.iter().map(|s| f64::from(s.total_score())).collect();
        let avg = mean(&totals).unwrap_or(0.0);

        let consistency = (avg > 0.0).then(|| {
            let variance = totals.iter().map(|t| (t - avg).powi(2)).sum::<f64>() / totals.len() as f64;
            percent(100.0 - variance.sqrt() / avg * 100.0)
        });

        Self {
            sessions: sessions.len(),
            average_total: rounded(avg),
            best_total: sessions.iter().map(Session::total_score).max().unwrap_or(0),
            consistency,
            sessions_this_month: sessions
                .iter()
                .filter(|s| same_month(s.config().date(), today))
                .count(),
            total_arrows: sessions
                .iter()
                .map(|s| u64::from(s.config().planned_arrows()))
                .sum(),
        }
    }
}

/// Period and performance filters for the session history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryFilter {
    #[default]
    All,
    LastWeek,
    ThisMonth,
    LastThreeMonths,
    /// Sessions at or above the mean total of the whole history.
    HighPerformance,
}

impl HistoryFilter {
    pub const ALL: [HistoryFilter; 5] = [
        HistoryFilter::All,
        HistoryFilter::LastWeek,
        HistoryFilter::ThisMonth,
        HistoryFilter::LastThreeMonths,
        HistoryFilter::HighPerformance,
    ];
}

/// Apply `filter` and sort newest first.
#[must_use]
pub fn filter_history<'a>(
    sessions: &'a [Session],
    filter: HistoryFilter,
    today: NaiveDate,
) -> Vec<&'a Session> {
    let overall_mean = {
        let totals: Vec<f64> = sessions.iter().map(|s| f64::from(s.total_score())).collect();
        mean(&totals).unwrap_or(0.0)
    };
    let week_ago = today - Duration::days(7);
    let three_months_ago = today.checked_sub_months(Months::new(3)).unwrap_or(NaiveDate::MIN);

    let mut out: Vec<&Session> = sessions
        .iter()
        .filter(|s| {
            let date = s.config().date();
            match filter {
                HistoryFilter::All => true,
                HistoryFilter::LastWeek => date >= week_ago,
                HistoryFilter::ThisMonth => same_month(date, today),
                HistoryFilter::LastThreeMonths => date >= three_months_ago,
                HistoryFilter::HighPerformance => f64::from(s.total_score()) >= overall_mean,
            }
        })
        .collect();
    out.sort_by(|a, b| {
        (b.config().date(), b.created_at()).cmp(&(a.config().date(), a.created_at()))
    });
    out
}

/// End-of-session report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub total: u32,
    pub best_series: Option<u32>,
    pub worst_series: Option<u32>,
    /// Mean series score, rounded. Zero when nothing was shot.
    pub average_per_series: u32,
    /// Total as a share of the maximum possible score, rounded percent.
    pub hit_percentage: u8,
    pub goal: Option<u32>,
    pub goal_reached: bool,
}

impl SessionReport {
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        let scores: Vec<u32> = session.series().iter().map(Series::score).collect();
        let total = session.total_score();
        let average = if scores.is_empty() {
            0.0
        } else {
            f64::from(total) / scores.len() as f64
        };
        let max = f64::from(session.config().max_possible_score());

        Self {
            total,
            best_series: scores.iter().copied().max(),
            worst_series: scores.iter().copied().min(),
            average_per_series: rounded(average),
            hit_percentage: percent(f64::from(total) / max * 100.0),
            goal: session.config().goal(),
            goal_reached: session.goal_reached(),
        }
    }
}

fn same_month(date: NaiveDate, today: NaiveDate) -> bool {
    date.year() == today.year() && date.month() == today.month()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn rounded(value: f64) -> u32 {
    value.round().max(0.0) as u32
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn percent(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}
