//! Position filter over candidate lists

use crate::types::Candidate;
use action_primitives::Point;

/// Whether `actual` is within `tolerance_pct` of `expected` on both axes.
pub fn within_tolerance(actual: Point, expected: Point, tolerance_pct: f64) -> bool {
    (actual.x - expected.x).abs() <= tolerance_pct && (actual.y - expected.y).abs() <= tolerance_pct
}

/// Candidates whose relative position lies within `tolerance_pct` of
/// `expected`. Order is preserved and no winner is picked.
pub fn filter_by_position(
    candidates: &[Candidate],
    expected: Point,
    tolerance_pct: f64,
) -> Vec<Candidate> {
    candidates
        .iter()
        .filter(|c| within_tolerance(c.relative_position, expected, tolerance_pct))
        .cloned()
        .collect()
}
