//! 2D line and segment intersection helpers.

use crate::math::{Point2, Vector2, TOLERANCE};

/// Intersects two infinite lines given in parametric form.
///
/// Returns the parameters `(t, u)` such that `p1 + t * d1 == p2 + u * d2`, or
/// `None` when the lines are parallel within tolerance.
#[must_use]
pub fn line_line_parameters(
    p1: &Point2,
    d1: &Vector2,
    p2: &Point2,
    d2: &Vector2,
) -> Option<(f64, f64)> {
    let denom = d1.x * d2.y - d1.y * d2.x;
    if denom.abs() <= TOLERANCE {
        return None;
    }
    let w = p2 - p1;
    let t = (w.x * d2.y - w.y * d2.x) / denom;
    let u = (w.x * d1.y - w.y * d1.x) / denom;
    Some((t, u))
}

/// Intersects two infinite lines, returning the intersection point.
#[must_use]
pub fn line_line_point(
    p1: &Point2,
    d1: &Vector2,
    p2: &Point2,
    d2: &Vector2,
) -> Option<Point2> {
    line_line_parameters(p1, d1, p2, d2).map(|(t, _)| p1 + d1 * t)
}

/// Intersects the segments `[a0, a1]` and `[b0, b1]`.
///
/// Returns the intersection point together with the segment parameters, or
/// `None` when the segments are parallel or the intersection lies outside
/// either segment (with a small tolerance band at the endpoints).
#[must_use]
pub fn segment_segment_intersection(
    a0: &Point2,
    a1: &Point2,
    b0: &Point2,
    b1: &Point2,
) -> Option<(Point2, f64, f64)> {
    let da = a1 - a0;
    let db = b1 - b0;
    let (t, u) = line_line_parameters(a0, &da, b0, &db)?;
    let band = TOLERANCE;
    if !(-band..=1.0 + band).contains(&t) || !(-band..=1.0 + band).contains(&u) {
        return None;
    }
    Some((a0 + da * t, t, u))
}

// ── intersect_2d tests ────────────────────────────────────────────────────
