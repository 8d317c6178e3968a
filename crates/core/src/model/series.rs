use serde::{Deserialize, Serialize};

use crate::model::{Arrow, SeriesId};

/// One end of arrows, in shooting order.
///
/// The series score is always derived from its arrows, never stored.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Series {
    #[serde(default)]
    id: Option<SeriesId>,
    arrows: Vec<Arrow>,
}

impl Series {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_persisted(id: Option<SeriesId>, arrows: Vec<Arrow>) -> Self {
        Self { id, arrows }
    }

    #[must_use]
    pub fn id(&self) -> Option<SeriesId> {
        self.id
    }

    pub fn set_id(&mut self, id: SeriesId) {
        self.id = Some(id);
    }

    #[must_use]
    pub fn arrows(&self) -> &[Arrow] {
        &self.arrows
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.arrows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arrows.is_empty()
    }

    /// Sum of the arrow scores.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.arrows.iter().map(|arrow| u32::from(arrow.score)).sum()
    }

    /// `>=` rather than `==` so an over-filled series from bad data still
    /// counts as done.
    #[must_use]
    pub fn is_complete(&self, arrows_per_series: u32) -> bool {
        self.arrows.len() >= usize::try_from(arrows_per_series).unwrap_or(usize::MAX)
    }

    pub(crate) fn push(&mut self, arrow: Arrow) {
        self.arrows.push(arrow);
    }

    pub(crate) fn arrow_mut(&mut self, index: usize) -> Option<&mut Arrow> {
        self.arrows.get_mut(index)
    }

    pub(crate) fn remove(&mut self, index: usize) -> Option<Arrow> {
        (index < self.arrows.len()).then(|| self.arrows.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Score;

    fn arrow(points: u8) -> Arrow {
        Arrow::manual(Score::new(points).unwrap())
    }

    #[test]
    fn score_is_the_sum_of_arrows() {
        let mut series = Series::new();
        for points in [10, 9, 8] {
            series.push(arrow(points));
        }
        assert_eq!(series.score(), 27);
        assert!(series.is_complete(3));
        assert!(!series.is_complete(4));
    }

    #[test]
    fn removing_out_of_bounds_is_none() {
        let mut series = Series::from_persisted(Some(SeriesId::new(1)), vec![arrow(5)]);
        assert!(series.remove(3).is_none());
        assert_eq!(series.remove(0), Some(arrow(5)));
        assert!(series.is_empty());
    }
}
