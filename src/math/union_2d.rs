//! Boolean union of closed planar loops.
//!
//! Used when several hole loops on the same flat overlap and must merge into
//! one cavity. The loops are split at their mutual intersections, triangulated
//! together with constraint edges, and the union region is recovered by
//! classifying triangle centroids against the input loops.

use std::collections::{HashMap, HashSet};

use spade::{ConstrainedDelaunayTriangulation, InsertionError, Point2 as SpadePoint2, Triangulation};

use crate::error::{GeometryError, Result};
use crate::math::polygon_2d::{dedup_loop, point_in_polygon, signed_area};
use crate::math::{Point2, MIN_AREA, TOLERANCE};

/// Parameter-space band for snapping intersection parameters to segment ends.
const PARAM_BAND: f64 = 1e-9;

/// Computes the union of closed loops, returning its boundary loops.
///
/// Each input loop is an open vertex list. The result loops are walked with
/// the union interior on the left, so outer boundaries come out
/// counter-clockwise and cavities clockwise. Loops enclosing less than the
/// minimum area are dropped.
///
/// # Errors
///
/// Returns [`GeometryError::Degenerate`] if a loop has fewer than three
/// vertices, if a coordinate is not finite, or if the union boundary cannot
/// be stitched into closed loops.
pub fn union_loops(loops: &[Vec<Point2>]) -> Result<Vec<Vec<Point2>>> {
    let cleaned: Vec<Vec<Point2>> = loops.iter().map(|l| dedup_loop(l)).collect();
    for lp in &cleaned {
        if lp.len() < 3 {
            return Err(
                GeometryError::Degenerate("union loop needs at least 3 vertices".into()).into(),
            );
        }
    }
    if cleaned.len() == 1 {
        return Ok(cleaned);
    }

    let split = split_loops_at_intersections(&cleaned);

    let mut cdt = ConstrainedDelaunayTriangulation::<SpadePoint2<f64>>::new();
    let mut loop_handles = Vec::with_capacity(split.len());
    for lp in &split {
        let mut handles = Vec::with_capacity(lp.len());
        for p in lp {
            let h = cdt
                .insert(SpadePoint2::new(p.x, p.y))
                .map_err(|e: InsertionError| {
                    GeometryError::Degenerate(format!("union CDT insert: {e}"))
                })?;
            handles.push(h);
        }
        loop_handles.push(handles);
    }
    for handles in &loop_handles {
        for i in 0..handles.len() {
            let from = handles[i];
            let to = handles[(i + 1) % handles.len()];
            if from != to {
                cdt.add_constraint(from, to);
            }
        }
    }

    // A triangle lies in the union iff its centroid is inside any input loop.
    // Constraint edges guarantee no triangle straddles a loop boundary.
    let mut in_union = HashSet::new();
    for face in cdt.inner_faces() {
        let vs = face.vertices();
        let centroid = Point2::new(
            (vs[0].position().x + vs[1].position().x + vs[2].position().x) / 3.0,
            (vs[0].position().y + vs[1].position().y + vs[2].position().y) / 3.0,
        );
        if cleaned.iter().any(|lp| point_in_polygon(lp, &centroid)) {
            in_union.insert(face.fix().index());
        }
    }

    // Boundary edges keep the union on their left.
    let mut edges: Vec<(usize, usize, Point2)> = Vec::new();
    for edge in cdt.directed_edges() {
        let left_in = edge
            .face()
            .as_inner()
            .is_some_and(|f| in_union.contains(&f.fix().index()));
        if !left_in {
            continue;
        }
        let right_in = edge
            .rev()
            .face()
            .as_inner()
            .is_some_and(|f| in_union.contains(&f.fix().index()));
        if right_in {
            continue;
        }
        let from = edge.from();
        let pos = from.position();
        edges.push((
            from.fix().index(),
            edge.to().fix().index(),
            Point2::new(pos.x, pos.y),
        ));
    }

    stitch_boundary_loops(&edges)
}

/// Chains directed boundary edges into closed loops.
fn stitch_boundary_loops(edges: &[(usize, usize, Point2)]) -> Result<Vec<Vec<Point2>>> {
    let mut by_from: HashMap<usize, Vec<usize>> = HashMap::new();
    for (i, &(from, _, _)) in edges.iter().enumerate() {
        by_from.entry(from).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut result = Vec::new();
    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        let mut lp = Vec::new();
        let mut i = start;
        loop {
            used[i] = true;
            let (_, to, pos) = edges[i];
            lp.push(pos);
            if to == edges[start].0 {
                break;
            }
            let next = by_from
                .get(&to)
                .and_then(|c| c.iter().copied().find(|&j| !used[j]))
                .ok_or_else(|| {
                    GeometryError::Degenerate("union boundary did not close".into())
                })?;
            i = next;
        }
        let lp = dedup_loop(&lp);
        if lp.len() >= 3 && signed_area(&lp).abs() > MIN_AREA {
            result.push(lp);
        }
    }
    Ok(result)
}

/// Splits every loop segment at its intersections with segments of the other
/// loops, so no two constraint edges cross when fed to the triangulation.
///
/// Intersection points are computed once and shared verbatim between the
/// segments involved, so coincident features collapse to a single vertex.
fn split_loops_at_intersections(loops: &[Vec<Point2>]) -> Vec<Vec<Point2>> {
    let seg = |lp: &[Point2], i: usize| (lp[i], lp[(i + 1) % lp.len()]);

    let mut splits: Vec<Vec<Vec<Split>>> = loops
        .iter()
        .map(|lp| vec![Vec::new(); lp.len()])
        .collect();

    for li in 0..loops.len() {
        for si in 0..loops[li].len() {
            let (a0, a1) = seg(&loops[li], si);
            for lj in li..loops.len() {
                let sj_start = if lj == li { si + 1 } else { 0 };
                for sj in sj_start..loops[lj].len() {
                    let (b0, b1) = seg(&loops[lj], sj);
                    let da = a1 - a0;
                    let db = b1 - b0;
                    let denom = da.x * db.y - da.y * db.x;
                    if denom.abs() <= TOLERANCE {
                        collect_collinear_splits(a0, a1, b0, b1, &mut splits[li][si]);
                        let mut back = std::mem::take(&mut splits[lj][sj]);
                        collect_collinear_splits(b0, b1, a0, a1, &mut back);
                        splits[lj][sj] = back;
                        continue;
                    }
                    let w = b0 - a0;
                    let t = (w.x * db.y - w.y * db.x) / denom;
                    let u = (w.x * da.y - w.y * da.x) / denom;
                    if !(-PARAM_BAND..=1.0 + PARAM_BAND).contains(&t)
                        || !(-PARAM_BAND..=1.0 + PARAM_BAND).contains(&u)
                    {
                        continue;
                    }
                    // Snap to an existing endpoint so coincident vertices
                    // share exact coordinates.
                    let p = if u.abs() <= PARAM_BAND {
                        b0
                    } else if (u - 1.0).abs() <= PARAM_BAND {
                        b1
                    } else if t.abs() <= PARAM_BAND {
                        a0
                    } else if (t - 1.0).abs() <= PARAM_BAND {
                        a1
                    } else {
                        a0 + da * t
                    };
                    if p != a0 && p != a1 {
                        let ta = (p - a0).dot(&da) / da.norm_squared();
                        splits[li][si].push(Split { t: ta, p });
                    }
                    if p != b0 && p != b1 {
                        let tb = (p - b0).dot(&db) / db.norm_squared();
                        splits[lj][sj].push(Split { t: tb, p });
                    }
                }
            }
        }
    }

    let mut out = Vec::with_capacity(loops.len());
    for (li, lp) in loops.iter().enumerate() {
        let mut rebuilt = Vec::with_capacity(lp.len());
        for (si, &v) in lp.iter().enumerate() {
            rebuilt.push(v);
            let list = &mut splits[li][si];
            list.sort_by(|a, b| a.t.total_cmp(&b.t));
            list.dedup_by(|a, b| a.p == b.p);
            rebuilt.extend(list.iter().map(|s| s.p));
        }
        out.push(dedup_loop(&rebuilt));
    }
    out
}

/// A pending split point on a loop segment, at parameter `t` along it.
#[derive(Clone, Copy)]
struct Split {
    t: f64,
    p: Point2,
}

/// Splits the segment `[a0, a1]` at endpoints of a collinear overlapping
/// segment `[b0, b1]` that fall strictly inside it.
fn collect_collinear_splits(a0: Point2, a1: Point2, b0: Point2, b1: Point2, out: &mut Vec<Split>) {
    let da = a1 - a0;
    let len_sq = da.norm_squared();
    if len_sq <= TOLERANCE * TOLERANCE {
        return;
    }
    let off = b0 - a0;
    let cross = da.x * off.y - da.y * off.x;
    if cross.abs() > TOLERANCE * len_sq.sqrt() {
        return;
    }
    for q in [b0, b1] {
        let t = (q - a0).dot(&da) / len_sq;
        if t > PARAM_BAND && t < 1.0 - PARAM_BAND && q != a0 && q != a1 {
            out.push(Split { t, p: q });
        }
    }
}

// ── union_2d tests ────────────────────────────────────────────────────────
