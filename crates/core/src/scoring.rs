//! Ten-ring target scoring in a fixed 280×280 logical space.

use crate::model::{HitPoint, Score};

/// Geometry of the logical target face.
#[derive(Debug, Clone, Copy)]
pub struct TargetFace;

impl TargetFace {
    /// Side of the logical square.
    pub const SIZE: f64 = 280.0;
    pub const CENTER: (f64, f64) = (140.0, 140.0);

    /// Outer radius (inclusive) of each scoring ring, outermost first.
    pub const RINGS: [(f64, u8); 10] = [
        (135.0, 1),
        (122.0, 2),
        (108.0, 3),
        (95.0, 4),
        (81.0, 5),
        (68.0, 6),
        (54.0, 7),
        (41.0, 8),
        (27.0, 9),
        (14.0, 10),
    ];

    /// Convert a hit inside a rendered box of `width`×`height` into logical
    /// coordinates, rounded to whole units.
    ///
    /// Returns `None` when the box size is not a positive finite number or the
    /// converted point falls outside the logical square.
    #[must_use]
    pub fn to_logical(px: f64, py: f64, width: f64, height: f64) -> Option<HitPoint> {
        let valid_size = |s: f64| s.is_finite() && s > 0.0;
        if !valid_size(width) || !valid_size(height) || !px.is_finite() || !py.is_finite() {
            return None;
        }

        let x = (px * (Self::SIZE / width)).round();
        let y = (py * (Self::SIZE / height)).round();
        let inside = |v: f64| (0.0..=Self::SIZE).contains(&v);
        if inside(x) && inside(y) {
            Some(HitPoint::new(x, y))
        } else {
            None
        }
    }
}

/// Score for an impact at `(x, y)` in logical coordinates.
///
/// Points on a ring boundary belong to the inner ring. Anything beyond the
/// outermost ring, and any non-finite input, scores 0.
#[must_use]
pub fn score(x: f64, y: f64) -> Score {
    if !x.is_finite() || !y.is_finite() {
        return Score::MISS;
    }
    let distance = HitPoint::new(x, y).distance_from_center();
    if !distance.is_finite() {
        return Score::MISS;
    }

    TargetFace::RINGS
        .iter()
        .rev()
        .find(|(radius, _)| distance <= *radius)
        .map_or(Score::MISS, |(_, points)| Score::new(*points).unwrap_or(Score::MISS))
}

/// Outer radius of the ring awarding `score`, or `None` for a miss.
#[must_use]
pub fn ring_radius(score: Score) -> Option<f64> {
    TargetFace::RINGS
        .iter()
        .find(|(_, points)| *points == score.value())
        .map(|(radius, _)| *radius)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_distance(d: f64) -> Score {
        score(140.0 + d, 140.0)
    }

    #[test]
    fn center_is_a_ten() {
        assert_eq!(score(140.0, 140.0), Score::MAX);
        assert_eq!(at_distance(14.0).value(), 10);
        assert_eq!(score(140.0 + 9.0, 140.0 + 10.0).value(), 10);
    }

    #[test]
    fn ring_boundaries_belong_to_the_inner_ring() {
        assert_eq!(at_distance(41.0).value(), 8);
        assert_eq!(at_distance(41.0001).value(), 7);
        assert_eq!(at_distance(135.0).value(), 1);
        for (radius, points) in TargetFace::RINGS {
            assert_eq!(at_distance(radius).value(), points, "radius {radius}");
        }
    }

    #[test]
    fn outside_the_face_is_a_miss() {
        assert_eq!(at_distance(135.5), Score::MISS);
        assert_eq!(score(0.0, 0.0), Score::MISS);
        assert_eq!(score(-5000.0, 1e9), Score::MISS);
    }

    #[test]
    fn non_finite_input_is_a_miss() {
        assert_eq!(score(f64::NAN, 5.0), Score::MISS);
        assert_eq!(score(5.0, f64::NAN), Score::MISS);
        assert_eq!(score(f64::INFINITY, 140.0), Score::MISS);
    }

    #[test]
    fn every_point_within_the_gold_scores_ten() {
        for step in 0..28 {
            let d = f64::from(step) * 0.5;
            for (dx, dy) in [(d, 0.0), (0.0, -d), (d / 2f64.sqrt(), d / 2f64.sqrt())] {
                assert_eq!(score(140.0 + dx, 140.0 + dy), Score::MAX);
            }
        }
    }

    #[test]
    fn screen_hits_convert_to_logical_space() {
        let point = TargetFace::to_logical(280.0, 280.0, 560.0, 560.0).unwrap();
        assert_eq!(point, HitPoint::new(140.0, 140.0));
        assert_eq!(TargetFace::to_logical(10.0, 10.0, 0.0, 100.0), None);
        assert_eq!(TargetFace::to_logical(-3.0, 10.0, 280.0, 280.0), None);
    }

    #[test]
    fn ring_radius_lookup() {
        assert_eq!(ring_radius(Score::MAX), Some(14.0));
        assert_eq!(ring_radius(Score::MISS), None);
    }
}
