//! Contour flange: a chain of walls folded along an open section profile.

use nalgebra::{Matrix3, Rotation3, Translation3, UnitQuaternion};

use crate::error::{OperationError, Result};
use crate::math::intersect_2d::line_line_point;
use crate::math::polygon_2d::perp_right;
use crate::math::{Isometry3, Point2, Point3, Vector2, Vector3, MIN_LEG, TOLERANCE};
use crate::tree::{
    BaseType, BendChild, BendData, EdgeData, EdgeId, FlatData, SheetMeta, SheetTree,
};

use super::PROFILE_PLANAR_TOL;

#[derive(Debug, Clone)]
pub struct ContourFlangeParams {
    pub thickness: f64,
    /// Wall extent perpendicular to the section plane.
    pub wall_height: f64,
    pub inside_radius: f64,
    pub k_factor: f64,
    /// Per-wall height overrides, one entry per path segment.
    pub leg_heights: Option<Vec<f64>>,
}

/// Builds a sheet from an open section path: every path segment becomes a
/// rectangular wall, every interior vertex a bend.
///
/// The path is the sheet surface the user sketched against; walls sit on the
/// midplane, offset by half the thickness with mitered corners, and each
/// corner gives up the bend setback `mid_radius * tan(|turn| / 2)` on both
/// adjacent segments so the flats meet the bend arc tangentially.
pub struct ContourFlange {
    path: Vec<Point3>,
    params: ContourFlangeParams,
}

impl ContourFlange {
    #[must_use]
    pub fn new(path: Vec<Point3>, params: ContourFlangeParams) -> Self {
        Self { path, params }
    }

    /// Builds the tree and the world placement of its first wall.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::InvalidInput`] for out-of-range parameters,
    /// a path with fewer than two distinct vertices, a non-planar or
    /// reversing path, a `leg_heights` list that does not match the segment
    /// count, or any segment whose trimmed length is consumed by its corner
    /// setbacks.
    pub fn execute(&self) -> Result<(SheetTree, Isometry3)> {
        let p = &self.params;
        if !p.thickness.is_finite() || p.thickness <= 0.0 {
            return Err(OperationError::InvalidInput(format!(
                "thickness must be positive, got {}",
                p.thickness
            ))
            .into());
        }
        if !p.wall_height.is_finite() || p.wall_height <= MIN_LEG {
            return Err(OperationError::InvalidInput(format!(
                "wall height must exceed {MIN_LEG}, got {}",
                p.wall_height
            ))
            .into());
        }
        if !p.inside_radius.is_finite() || p.inside_radius < 0.0 {
            return Err(OperationError::InvalidInput(format!(
                "inside radius must be non-negative, got {}",
                p.inside_radius
            ))
            .into());
        }
        if !(0.0..=1.0).contains(&p.k_factor) {
            return Err(OperationError::InvalidInput(format!(
                "k-factor must be in [0, 1], got {}",
                p.k_factor
            ))
            .into());
        }
        if self
            .path
            .iter()
            .any(|pt| !pt.coords.iter().all(|c| c.is_finite()))
        {
            return Err(
                OperationError::InvalidInput("path contains non-finite coordinates".into()).into(),
            );
        }

        let distinct = dedup_path(&self.path);
        if distinct.len() < 2 {
            return Err(OperationError::InvalidInput(
                "path needs at least 2 distinct vertices".into(),
            )
            .into());
        }

        let (origin, u, v, normal) = section_frame(&distinct)?;
        let mut section = Vec::with_capacity(distinct.len());
        for pt in &distinct {
            let d = pt - origin;
            if d.dot(&normal).abs() > PROFILE_PLANAR_TOL {
                return Err(OperationError::InvalidInput(
                    "path is not planar within tolerance".into(),
                )
                .into());
            }
            section.push(Point2::new(d.dot(&u), d.dot(&v)));
        }
        let section = merge_collinear(&section)?;
        let segment_count = section.len() - 1;

        let heights = match &p.leg_heights {
            None => vec![p.wall_height; segment_count],
            Some(overrides) => {
                if overrides.len() != segment_count {
                    return Err(OperationError::InvalidInput(format!(
                        "leg_heights has {} entries for {} segments",
                        overrides.len(),
                        segment_count
                    ))
                    .into());
                }
                for (i, h) in overrides.iter().enumerate() {
                    if !h.is_finite() || *h <= MIN_LEG {
                        return Err(OperationError::InvalidInput(format!(
                            "leg height {i} must exceed {MIN_LEG}, got {h}"
                        ))
                        .into());
                    }
                }
                overrides.clone()
            }
        };

        let mid_radius = p.inside_radius + p.thickness / 2.0;
        let walls = layout_walls(&section, p.thickness, mid_radius)?;

        let meta = SheetMeta::new(BaseType::ContourFlange, p.inside_radius, p.k_factor);
        let mut tree = SheetTree::new(p.thickness, meta);
        let mut previous: Option<(EdgeId, f64)> = None;
        for (k, wall) in walls.iter().enumerate() {
            let length = wall.length;
            let height = heights[k];
            let bottom = tree.add_edge(EdgeData::new(vec![
                Point2::new(0.0, 0.0),
                Point2::new(length, 0.0),
            ]));
            let right = tree.add_edge(EdgeData::new(vec![
                Point2::new(length, 0.0),
                Point2::new(length, height),
            ]));
            let top = tree.add_edge(EdgeData::new(vec![
                Point2::new(length, height),
                Point2::new(0.0, height),
            ]));
            let left = if previous.is_some() {
                EdgeData::attach(vec![Point2::new(0.0, height), Point2::new(0.0, 0.0)])
            } else {
                EdgeData::new(vec![Point2::new(0.0, height), Point2::new(0.0, 0.0)])
            };
            let left = tree.add_edge(left);
            let flat = tree.add_flat(FlatData::new(vec![bottom, right, top, left]));

            if let Some((hinge, turn)) = previous.take() {
                let mut bend = BendData::new(-turn.to_degrees(), mid_radius, p.k_factor);
                bend.children.push(BendChild {
                    flat,
                    attach_edge: left,
                });
                let bend_id = tree.add_bend(bend);
                tree.edge_mut(hinge)?.bend = Some(bend_id);
            } else {
                tree.set_root(flat);
            }
            if let Some(turn) = wall.end_turn {
                previous = Some((right, turn));
            }
        }
        tree.validate()?;

        let first = &walls[0];
        let start_world = origin + u * first.start.x + v * first.start.y;
        let x = u * first.dir.x + v * first.dir.y;
        let y = normal;
        let z = x.cross(&y);
        let rotation = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(
            Matrix3::from_columns(&[x, y, z]),
        ));
        let root = Isometry3::from_parts(Translation3::from(start_world.coords), rotation);
        Ok((tree, root))
    }
}

/// One wall of the chain: the trimmed midplane segment it stands on and the
/// signed turn toward the next wall, if any.
struct Wall {
    start: Point2,
    dir: Vector2,
    length: f64,
    end_turn: Option<f64>,
}

/// Offsets the section path to the midplane with mitered corners, then trims
/// both sides of every interior vertex by the bend setback.
fn layout_walls(section: &[Point2], thickness: f64, mid_radius: f64) -> Result<Vec<Wall>> {
    let half = thickness / 2.0;
    let count = section.len() - 1;
    let mut dirs: Vec<Vector2> = Vec::with_capacity(count);
    for i in 0..count {
        let seg = section[i + 1] - section[i];
        let len = seg.norm();
        if len <= MIN_LEG {
            return Err(OperationError::InvalidInput(format!(
                "path segment {i} is degenerate after projection"
            ))
            .into());
        }
        dirs.push(seg / len);
    }

    // Mitered midplane polyline, one joint per interior vertex.
    let mut mid = Vec::with_capacity(section.len());
    mid.push(section[0] + perp_right(&dirs[0]) * half);
    for i in 1..count {
        let a = section[i - 1] + perp_right(&dirs[i - 1]) * half;
        let b = section[i] + perp_right(&dirs[i]) * half;
        let Some(joint) = line_line_point(&a, &dirs[i - 1], &b, &dirs[i]) else {
            return Err(OperationError::InvalidInput(format!(
                "path vertex {i} has no miter joint"
            ))
            .into());
        };
        mid.push(joint);
    }
    mid.push(section[count] + perp_right(&dirs[count - 1]) * half);

    let turns: Vec<f64> = (1..count)
        .map(|i| {
            let a = &dirs[i - 1];
            let b = &dirs[i];
            (a.x * b.y - a.y * b.x).atan2(a.dot(b))
        })
        .collect();

    let mut walls = Vec::with_capacity(count);
    for k in 0..count {
        let start_trim = if k > 0 {
            mid_radius * (turns[k - 1].abs() / 2.0).tan()
        } else {
            0.0
        };
        let end_trim = if k < count - 1 {
            mid_radius * (turns[k].abs() / 2.0).tan()
        } else {
            0.0
        };
        let raw = (mid[k + 1] - mid[k]).norm();
        let length = raw - start_trim - end_trim;
        if length <= MIN_LEG {
            return Err(OperationError::InvalidInput(format!(
                "segment {k} is consumed by its corner setbacks ({raw:.6} - {start_trim:.6} - {end_trim:.6})"
            ))
            .into());
        }
        let end_turn = if k < count - 1 { Some(turns[k]) } else { None };
        walls.push(Wall {
            start: mid[k] + dirs[k] * start_trim,
            dir: dirs[k],
            length,
            end_turn,
        });
    }
    Ok(walls)
}

/// Drops consecutive duplicate path vertices.
fn dedup_path(points: &[Point3]) -> Vec<Point3> {
    let mut out: Vec<Point3> = Vec::with_capacity(points.len());
    for p in points {
        if out.last().is_none_or(|q| (p - q).norm() > TOLERANCE) {
            out.push(*p);
        }
    }
    out
}

/// Merges collinear interior vertices and rejects reversals.
fn merge_collinear(section: &[Point2]) -> Result<Vec<Point2>> {
    let mut out: Vec<Point2> = Vec::with_capacity(section.len());
    out.push(section[0]);
    for i in 1..section.len() - 1 {
        let a = (section[i] - out[out.len() - 1]).normalize();
        let b = (section[i + 1] - section[i]).normalize();
        let cross = a.x * b.y - a.y * b.x;
        let dot = a.dot(&b);
        if cross.abs() <= TOLERANCE {
            if dot < 0.0 {
                return Err(OperationError::InvalidInput(format!(
                    "path reverses onto itself at vertex {i}"
                ))
                .into());
            }
            continue;
        }
        out.push(section[i]);
    }
    out.push(section[section.len() - 1]);
    Ok(out)
}

/// Section frame of the path: origin at the first vertex, `u`/`v` spanning
/// the section plane, and the plane normal (the wall extrusion direction).
fn section_frame(points: &[Point3]) -> Result<(Point3, Vector3, Vector3, Vector3)> {
    let origin = points[0];
    let first = points[1] - points[0];
    let tangent = first.norm();
    if tangent <= TOLERANCE {
        return Err(OperationError::InvalidInput("path starts degenerate".into()).into());
    }
    let u = first / tangent;

    let mut newell = Vector3::zeros();
    for i in 0..points.len() {
        let a = &points[i];
        let b = &points[(i + 1) % points.len()];
        newell.x += (a.y - b.y) * (a.z + b.z);
        newell.y += (a.z - b.z) * (a.x + b.x);
        newell.z += (a.x - b.x) * (a.y + b.y);
    }
    let normal = if newell.norm() > TOLERANCE {
        newell.normalize()
    } else {
        // straight path: any perpendicular will do, picked deterministically
        let mut candidate = u.cross(&Vector3::z());
        if candidate.norm() <= TOLERANCE {
            candidate = u.cross(&Vector3::x());
        }
        candidate.normalize()
    };
    let v = normal.cross(&u);
    Ok((origin, u, v, normal))
}

// ── contour flange tests ──────────────────────────────────────────────────
