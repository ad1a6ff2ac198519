//! Base tab: a flat sheet cut from a closed profile.

use nalgebra::{Matrix3, Rotation3, Translation3, UnitQuaternion};

use crate::error::{OperationError, Result};
use crate::math::polygon_2d::{dedup_loop, force_ccw, is_simple_polygon, signed_area};
use crate::math::{Isometry3, Point2, Point3, Vector3, MIN_AREA, TOLERANCE};
use crate::tree::{BaseType, EdgeData, FlatData, SheetMeta, SheetTree};

use super::PROFILE_PLANAR_TOL;

/// K-factor seeded into the tree metadata for later bends.
const DEFAULT_K_FACTOR: f64 = 0.4;

/// Creates a fresh sheet tree from a closed planar profile.
///
/// The profile may be given in any plane; a best-fit frame is derived and the
/// outline is stored in that frame's 2D coordinates, forced counter-clockwise.
pub struct Tab {
    profile: Vec<Point3>,
    thickness: f64,
}

impl Tab {
    #[must_use]
    pub fn new(profile: Vec<Point3>, thickness: f64) -> Self {
        Self { profile, thickness }
    }

    /// Builds the tree and the world placement of its root flat.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::InvalidInput`] if the thickness is not
    /// positive, the profile has fewer than three distinct vertices, is not
    /// planar within tolerance, self-intersects, or encloses no usable area.
    pub fn execute(&self) -> Result<(SheetTree, Isometry3)> {
        if !self.thickness.is_finite() || self.thickness <= 0.0 {
            return Err(OperationError::InvalidInput(format!(
                "thickness must be positive, got {}",
                self.thickness
            ))
            .into());
        }
        if self
            .profile
            .iter()
            .any(|p| !p.coords.iter().all(|c| c.is_finite()))
        {
            return Err(
                OperationError::InvalidInput("profile contains non-finite coordinates".into())
                    .into(),
            );
        }

        let distinct = dedup_points(&self.profile);
        if distinct.len() < 3 {
            return Err(OperationError::InvalidInput(format!(
                "profile needs at least 3 distinct vertices, got {}",
                distinct.len()
            ))
            .into());
        }

        let frame = best_fit_frame(&distinct)?;
        let inverse = frame.inverse();
        let mut local = Vec::with_capacity(distinct.len());
        for p in &distinct {
            let q = inverse * p;
            if q.z.abs() > PROFILE_PLANAR_TOL {
                return Err(OperationError::InvalidInput(format!(
                    "profile is not planar: vertex deviates by {:.3e}",
                    q.z.abs()
                ))
                .into());
            }
            local.push(Point2::new(q.x, q.y));
        }

        let mut local = dedup_loop(&local);
        if local.len() < 3 {
            return Err(
                OperationError::InvalidInput("profile collapses when projected".into()).into(),
            );
        }
        if signed_area(&local).abs() <= MIN_AREA {
            return Err(OperationError::InvalidInput("profile encloses no area".into()).into());
        }
        if !is_simple_polygon(&local) {
            return Err(OperationError::InvalidInput("profile self-intersects".into()).into());
        }
        force_ccw(&mut local);

        let meta = SheetMeta::new(BaseType::Tab, self.thickness, DEFAULT_K_FACTOR);
        let mut tree = SheetTree::new(self.thickness, meta);
        let n = local.len();
        let mut edges = Vec::with_capacity(n);
        for i in 0..n {
            edges.push(tree.add_edge(EdgeData::new(vec![local[i], local[(i + 1) % n]])));
        }
        let flat = tree.add_flat(FlatData::new(edges));
        tree.set_root(flat);
        tree.validate()?;
        Ok((tree, frame))
    }
}

/// Drops consecutive duplicates and a closing vertex equal to the first.
fn dedup_points(points: &[Point3]) -> Vec<Point3> {
    let mut out: Vec<Point3> = Vec::with_capacity(points.len());
    for p in points {
        if out.last().is_none_or(|q| (p - q).norm() > TOLERANCE) {
            out.push(*p);
        }
    }
    while out.len() > 1 && (out[out.len() - 1] - out[0]).norm() <= TOLERANCE {
        out.pop();
    }
    out
}

/// Best-fit plane frame: origin at the centroid, z along the Newell normal,
/// x along the first usable profile segment projected into the plane.
#[allow(clippy::cast_precision_loss)]
fn best_fit_frame(points: &[Point3]) -> Result<Isometry3> {
    let mut normal = Vector3::zeros();
    for i in 0..points.len() {
        let a = &points[i];
        let b = &points[(i + 1) % points.len()];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    let len = normal.norm();
    if !len.is_finite() || len <= TOLERANCE {
        return Err(
            OperationError::InvalidInput("profile vertices are collinear".into()).into(),
        );
    }
    let z = normal / len;

    let mut x = None;
    for i in 0..points.len() {
        let d = points[(i + 1) % points.len()] - points[i];
        let in_plane = d - z * d.dot(&z);
        if in_plane.norm() > TOLERANCE {
            x = Some(in_plane.normalize());
            break;
        }
    }
    let Some(x) = x else {
        return Err(OperationError::InvalidInput("profile has no usable segment".into()).into());
    };
    let y = z.cross(&x);

    let centroid = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords)
        / points.len() as f64;
    let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(
        Matrix3::from_columns(&[x, y, z]),
    ));
    Ok(Isometry3::from_parts(Translation3::from(centroid), rotation))
}

// ── tab tests ─────────────────────────────────────────────────────────────
