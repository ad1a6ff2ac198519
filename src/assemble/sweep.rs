//! Bend emission: ruled sweep of the sheet cross-section around the fold
//! axis, closed by a cap at each end of the hinge.

use nalgebra::{Unit, UnitQuaternion};

use crate::error::Result;
use crate::evaluate::BendPlacement;
use crate::math::{Isometry3, Point3, Vector3};
use crate::tree::SheetTree;

use super::naming::{CapEnd, FaceKind, SheetSide};
use super::sink::SolidSink;
use super::AssemblyStats;

/// Emits one bend: the A and B cylinder surfaces between the parent's hinge
/// rim and the child's attach rim, plus the two end caps.
///
/// Rings are swept by rotating the hinge about the bend axis. The pure
/// rotation already lands on the attach rim when hinge and attach are
/// straight and equally long; any residual (curved hinges, resampling) is
/// blended in linearly so the final ring meets the child exactly and the
/// seam stays watertight.
pub(super) fn emit_bend<S: SolidSink>(
    tree: &SheetTree,
    placement: &BendPlacement,
    feature: &str,
    sink: &mut S,
    stats: &mut AssemblyStats,
) -> Result<()> {
    let half = tree.thickness() / 2.0;
    let theta = placement.angle_rad;
    let steps = sweep_steps(theta);

    let n = placement
        .hinge_samples
        .len()
        .max(placement.attach_samples.len());
    let hinge = resample_polyline(&placement.hinge_samples, n);
    let attach = resample_polyline(&placement.attach_samples, n);

    let axis = Unit::new_normalize(placement.axis_dir);
    let full_rot = UnitQuaternion::from_axis_angle(&axis, theta);
    let full = Isometry3::rotation_wrt_point(full_rot, placement.axis_point);
    let residual: Vec<Vector3> = hinge
        .iter()
        .zip(&attach)
        .map(|(h, a)| a - full * h)
        .collect();

    // ring_a[k][i]: sweep ring k, sample i, on the +t/2 surface.
    let mut ring_a: Vec<Vec<Point3>> = Vec::with_capacity(steps + 1);
    let mut ring_b: Vec<Vec<Point3>> = Vec::with_capacity(steps + 1);
    #[allow(clippy::cast_precision_loss)]
    for k in 0..=steps {
        let f = k as f64 / steps as f64;
        let rot = UnitQuaternion::from_axis_angle(&axis, theta * f);
        let iso = Isometry3::rotation_wrt_point(rot, placement.axis_point);
        let normal = rot * placement.parent_normal;
        let mut a_row = Vec::with_capacity(n);
        let mut b_row = Vec::with_capacity(n);
        for (i, h) in hinge.iter().enumerate() {
            let mid = iso * h + residual[i] * f;
            a_row.push(mid + normal * half);
            b_row.push(mid - normal * half);
        }
        ring_a.push(a_row);
        ring_b.push(b_row);
    }

    let skin_a = super::declare_face(
        sink,
        stats,
        feature,
        &FaceKind::BendSkin {
            bend: placement.bend,
            side: SheetSide::A,
        },
    );
    let skin_b = super::declare_face(
        sink,
        stats,
        feature,
        &FaceKind::BendSkin {
            bend: placement.bend,
            side: SheetSide::B,
        },
    );
    for k in 0..steps {
        for i in 0..n - 1 {
            super::emit_checked(
                sink,
                stats,
                &skin_a,
                ring_a[k][i],
                ring_a[k + 1][i],
                ring_a[k + 1][i + 1],
            );
            super::emit_checked(
                sink,
                stats,
                &skin_a,
                ring_a[k][i],
                ring_a[k + 1][i + 1],
                ring_a[k][i + 1],
            );
            super::emit_checked(
                sink,
                stats,
                &skin_b,
                ring_b[k][i],
                ring_b[k + 1][i + 1],
                ring_b[k + 1][i],
            );
            super::emit_checked(
                sink,
                stats,
                &skin_b,
                ring_b[k][i],
                ring_b[k][i + 1],
                ring_b[k + 1][i + 1],
            );
        }
    }

    let cap_start = super::declare_face(
        sink,
        stats,
        feature,
        &FaceKind::BendCap {
            bend: placement.bend,
            end: CapEnd::Start,
        },
    );
    let cap_end = super::declare_face(
        sink,
        stats,
        feature,
        &FaceKind::BendCap {
            bend: placement.bend,
            end: CapEnd::End,
        },
    );
    let last = n - 1;
    for k in 0..steps {
        super::emit_checked(
            sink,
            stats,
            &cap_start,
            ring_a[k][0],
            ring_b[k][0],
            ring_b[k + 1][0],
        );
        super::emit_checked(
            sink,
            stats,
            &cap_start,
            ring_a[k][0],
            ring_b[k + 1][0],
            ring_a[k + 1][0],
        );
        super::emit_checked(
            sink,
            stats,
            &cap_end,
            ring_a[k][last],
            ring_b[k + 1][last],
            ring_b[k][last],
        );
        super::emit_checked(
            sink,
            stats,
            &cap_end,
            ring_a[k][last],
            ring_a[k + 1][last],
            ring_b[k + 1][last],
        );
    }

    Ok(())
}

/// Ring count of a sweep: one ring per 6 degrees, never fewer than 16
/// segments so shallow bends still read as curved.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn sweep_steps(theta: f64) -> usize {
    let by_angle = (theta.abs().to_degrees() / 6.0).ceil() as usize;
    by_angle.max(16)
}

/// Resamples a polyline to `n` points, uniformly spaced by arc length.
/// Endpoints are preserved exactly.
#[allow(clippy::cast_precision_loss)]
fn resample_polyline(points: &[Point3], n: usize) -> Vec<Point3> {
    if points.len() == n {
        return points.to_vec();
    }
    let mut cumulative = Vec::with_capacity(points.len());
    let mut total = 0.0;
    cumulative.push(0.0);
    for w in points.windows(2) {
        total += (w[1] - w[0]).norm();
        cumulative.push(total);
    }

    let mut out = Vec::with_capacity(n);
    out.push(points[0]);
    let mut seg = 0;
    for j in 1..n - 1 {
        let target = total * j as f64 / (n - 1) as f64;
        while seg + 2 < points.len() && cumulative[seg + 1] < target {
            seg += 1;
        }
        let span = cumulative[seg + 1] - cumulative[seg];
        let t = if span > 0.0 {
            (target - cumulative[seg]) / span
        } else {
            0.0
        };
        out.push(points[seg] + (points[seg + 1] - points[seg]) * t);
    }
    out.push(points[points.len() - 1]);
    out
}

// ── sweep tests ───────────────────────────────────────────────────────────
