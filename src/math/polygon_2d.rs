//! Planar polygon and polyline queries on flat-local coordinates.

use crate::error::{GeometryError, Result};
use crate::math::intersect_2d::segment_segment_intersection;
use crate::math::{Point2, Vector2, TOLERANCE};

/// Signed area of a closed polygon (positive for counter-clockwise winding).
///
/// The polygon is given as an open vertex list; the closing segment from the
/// last vertex back to the first is implied.
#[must_use]
pub fn signed_area(vertices: &[Point2]) -> f64 {
    if vertices.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..vertices.len() {
        let a = vertices[i];
        let b = vertices[(i + 1) % vertices.len()];
        sum += a.x * b.y - b.x * a.y;
    }
    sum * 0.5
}

/// Total length of an open polyline.
#[must_use]
pub fn polyline_length(points: &[Point2]) -> f64 {
    points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
}

/// Removes consecutive duplicate vertices, including a duplicated closing
/// vertex, so the result is an open vertex list.
#[must_use]
pub fn dedup_loop(vertices: &[Point2]) -> Vec<Point2> {
    let mut out: Vec<Point2> = Vec::with_capacity(vertices.len());
    for &v in vertices {
        if out.last().is_none_or(|last| (v - last).norm() > TOLERANCE) {
            out.push(v);
        }
    }
    while out.len() > 1 && (out[out.len() - 1] - out[0]).norm() <= TOLERANCE {
        out.pop();
    }
    out
}

/// Reverses the winding of `vertices` in place if the signed area is negative,
/// so callers can rely on counter-clockwise outer loops.
pub fn force_ccw(vertices: &mut [Point2]) {
    if signed_area(vertices) < 0.0 {
        vertices.reverse();
    }
}

/// Tests whether `point` lies inside the closed polygon using even-odd ray
/// casting. Points exactly on the boundary may report either side.
#[must_use]
pub fn point_in_polygon(vertices: &[Point2], point: &Point2) -> bool {
    let mut inside = false;
    let n = vertices.len();
    let mut j = n - 1;
    for i in 0..n {
        let a = vertices[i];
        let b = vertices[j];
        if (a.y > point.y) != (b.y > point.y) {
            let t = (point.y - a.y) / (b.y - a.y);
            if point.x < a.x + t * (b.x - a.x) {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Shortest distance from `point` to the segment `[a, b]`.
#[must_use]
pub fn point_to_segment_distance(point: &Point2, a: &Point2, b: &Point2) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq <= TOLERANCE * TOLERANCE {
        return (point - a).norm();
    }
    let t = ((point - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    (point - (a + ab * t)).norm()
}

/// Shortest distance from `point` to the boundary of the closed polygon.
#[must_use]
pub fn point_to_boundary_distance(vertices: &[Point2], point: &Point2) -> f64 {
    let mut best = f64::INFINITY;
    for i in 0..vertices.len() {
        let a = vertices[i];
        let b = vertices[(i + 1) % vertices.len()];
        best = best.min(point_to_segment_distance(point, &a, &b));
    }
    best
}

/// Tests whether every vertex of `inner` lies inside `outer`, allowing
/// vertices within `slack` of the outer boundary to count as inside.
#[must_use]
pub fn polygon_contains_loop(outer: &[Point2], inner: &[Point2], slack: f64) -> bool {
    inner.iter().all(|p| {
        point_in_polygon(outer, p) || point_to_boundary_distance(outer, p) <= slack
    })
}

/// Unit direction of the segment from `a` to `b`.
///
/// # Errors
///
/// Returns [`GeometryError::ZeroVector`] if the segment is shorter than the
/// global tolerance.
pub fn segment_direction(a: &Point2, b: &Point2) -> Result<Vector2> {
    let d = b - a;
    if d.norm() <= TOLERANCE {
        return Err(GeometryError::ZeroVector.into());
    }
    Ok(d.normalize())
}

/// Left-hand perpendicular of `v`. For a counter-clockwise outline this points
/// into the material.
#[must_use]
pub fn perp_left(v: &Vector2) -> Vector2 {
    Vector2::new(-v.y, v.x)
}

/// Right-hand perpendicular of `v`. For a counter-clockwise outline this points
/// out of the material.
#[must_use]
pub fn perp_right(v: &Vector2) -> Vector2 {
    Vector2::new(v.y, -v.x)
}

/// Tests whether a closed polygon is free of self-intersections.
///
/// Only non-adjacent segment pairs are tested; segments that share a vertex
/// around the loop are allowed to touch there. Collinear overlaps between
/// parallel segments are not detected.
#[must_use]
pub fn is_simple_polygon(vertices: &[Point2]) -> bool {
    let n = vertices.len();
    if n < 3 {
        return false;
    }
    for i in 0..n {
        for j in (i + 1)..n {
            if j == i + 1 || (i == 0 && j == n - 1) {
                continue;
            }
            if segment_segment_intersection(
                &vertices[i],
                &vertices[(i + 1) % n],
                &vertices[j],
                &vertices[(j + 1) % n],
            )
            .is_some()
            {
                return false;
            }
        }
    }
    true
}

// ── polygon_2d tests ──────────────────────────────────────────────────────
