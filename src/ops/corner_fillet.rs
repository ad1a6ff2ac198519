//! Corner fillet: round the endpoint corners of outline edges.

use std::f64::consts::PI;

use nalgebra::Rotation2;
use tracing::warn;

use crate::error::{OperationError, Result};
use crate::math::polygon_2d::{perp_left, segment_direction};
use crate::math::MIN_LEG;
use crate::tree::{key_label, EdgeData, EdgeId, FlatId, SheetTree};

use super::{Skip, SkipReason};

/// Turns closer than this to straight or fully reversed leave no corner
/// to round.
const MIN_TURN: f64 = 1e-9;

#[derive(Debug, Clone, Default)]
pub struct CornerFilletReport {
    pub edges_applied: usize,
    pub corners_rounded: usize,
    pub skips: Vec<Skip>,
}

/// Rounds the corners at both ends of each target edge with a circular arc.
pub struct CornerFillet {
    targets: Vec<EdgeId>,
    radius: f64,
    resolution: usize,
}

#[derive(Clone, Copy)]
enum Corner {
    Start,
    End,
}

impl Corner {
    fn label(self, edge: EdgeId) -> String {
        match self {
            Corner::Start => format!("{} start corner", key_label(edge)),
            Corner::End => format!("{} end corner", key_label(edge)),
        }
    }
}

impl CornerFillet {
    #[must_use]
    pub fn new(targets: Vec<EdgeId>, radius: f64, resolution: usize) -> Self {
        Self {
            targets,
            radius,
            resolution,
        }
    }

    /// Rounds the reachable corners and reports the rest as skips.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::InvalidInput`] for an empty target list, a
    /// radius at or below the minimum leg length, or a zero resolution.
    pub fn execute(&self, source: &SheetTree) -> Result<(SheetTree, CornerFilletReport)> {
        if self.targets.is_empty() {
            return Err(OperationError::InvalidInput(
                "corner fillet needs at least one target edge".into(),
            )
            .into());
        }
        if !self.radius.is_finite() || self.radius <= MIN_LEG {
            return Err(OperationError::InvalidInput(format!(
                "fillet radius must exceed {MIN_LEG}, got {}",
                self.radius
            ))
            .into());
        }
        if self.resolution == 0 {
            return Err(
                OperationError::InvalidInput("arc resolution must be at least 1".into()).into(),
            );
        }

        let mut tree = source.clone();
        let mut report = CornerFilletReport::default();
        for &target in &self.targets {
            self.round_target(&mut tree, target, &mut report)?;
        }
        tree.validate()?;
        Ok((tree, report))
    }

    fn round_target(
        &self,
        tree: &mut SheetTree,
        target: EdgeId,
        report: &mut CornerFilletReport,
    ) -> Result<()> {
        let edge = tree.edge(target)?;
        let skip = if edge.bend.is_some() {
            Some(SkipReason::EdgeAlreadyHasBend)
        } else if edge.is_attach_edge {
            Some(SkipReason::EdgeIsAttach)
        } else {
            None
        };
        if let Some(reason) = skip {
            let label = key_label(target);
            warn!(edge = %label, reason = %reason, "skipping corner fillet target");
            report.skips.push(Skip::new(label, reason));
            return Ok(());
        }

        let flat = tree.owner_of_edge(target)?;
        let mut rounded = 0;
        for corner in [Corner::Start, Corner::End] {
            match self.round_corner(tree, flat, target, corner)? {
                None => rounded += 1,
                Some(reason) => {
                    let label = corner.label(target);
                    warn!(corner = %label, reason = %reason, "skipping corner");
                    report.skips.push(Skip::new(label, reason));
                }
            }
        }
        if rounded > 0 {
            report.edges_applied += 1;
            report.corners_rounded += rounded;
        }
        Ok(())
    }

    /// Rounds one corner, or explains why it cannot be rounded.
    ///
    /// Trims both polylines meeting at the corner back to the arc tangent
    /// points and inserts the arc as a new outline edge between them.
    #[allow(clippy::cast_precision_loss)]
    fn round_corner(
        &self,
        tree: &mut SheetTree,
        flat: FlatId,
        target: EdgeId,
        corner: Corner,
    ) -> Result<Option<SkipReason>> {
        let edges = &tree.flat(flat)?.edges;
        let count = edges.len();
        let index = edges
            .iter()
            .position(|&e| e == target)
            .ok_or_else(|| OperationError::Failed(format!("edge {} left its flat", key_label(target))))?;
        let neighbor = match corner {
            Corner::Start => edges[(index + count - 1) % count],
            Corner::End => edges[(index + 1) % count],
        };
        let neighbor_data = tree.edge(neighbor)?;
        if neighbor_data.bend.is_some() || neighbor_data.is_attach_edge {
            return Ok(Some(SkipReason::CornerProtected));
        }

        // segments meeting at the corner, incoming then outgoing
        let (before, corner_pt, after) = match corner {
            Corner::Start => {
                let incoming = &tree.edge(neighbor)?.polyline;
                let outgoing = &tree.edge(target)?.polyline;
                (
                    incoming[incoming.len() - 2],
                    incoming[incoming.len() - 1],
                    outgoing[1],
                )
            }
            Corner::End => {
                let incoming = &tree.edge(target)?.polyline;
                let outgoing = &tree.edge(neighbor)?.polyline;
                (
                    incoming[incoming.len() - 2],
                    incoming[incoming.len() - 1],
                    outgoing[1],
                )
            }
        };
        let u = segment_direction(&before, &corner_pt)?;
        let v = segment_direction(&corner_pt, &after)?;
        let cross = u.x * v.y - u.y * v.x;
        let turn = cross.atan2(u.dot(&v));
        if turn.abs() < MIN_TURN || PI - turn.abs() < MIN_TURN {
            return Ok(Some(SkipReason::CornerExceedsEdge));
        }

        let trim = self.radius * (turn.abs() / 2.0).tan();
        let available_in = (corner_pt - before).norm();
        let available_out = (after - corner_pt).norm();
        if trim + MIN_LEG > available_in || trim + MIN_LEG > available_out {
            return Ok(Some(SkipReason::CornerExceedsEdge));
        }

        let p_in = corner_pt - u * trim;
        let p_out = corner_pt + v * trim;
        let center = p_in + perp_left(&u) * self.radius * turn.signum();
        let spoke = p_in - center;
        let mut arc = Vec::with_capacity(self.resolution + 1);
        arc.push(p_in);
        for j in 1..self.resolution {
            let angle = turn * j as f64 / self.resolution as f64;
            arc.push(center + Rotation2::new(angle) * spoke);
        }
        arc.push(p_out);

        let (incoming, outgoing) = match corner {
            Corner::Start => (neighbor, target),
            Corner::End => (target, neighbor),
        };
        if let Some(last) = tree.edge_mut(incoming)?.polyline.last_mut() {
            *last = p_in;
        }
        if let Some(first) = tree.edge_mut(outgoing)?.polyline.first_mut() {
            *first = p_out;
        }
        let arc_edge = tree.add_edge(EdgeData::new(arc));
        let insert_at = match corner {
            Corner::Start => index,
            Corner::End => index + 1,
        };
        tree.flat_mut(flat)?.edges.insert(insert_at, arc_edge);
        Ok(None)
    }
}

// ── corner fillet tests ───────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::math::polygon_2d::{polyline_length, signed_area};
    use crate::math::{Point2, Point3};
    use crate::ops::{Flange, FlangeParams, InsetMode, LegLengthReference, Tab};

    fn square_tab(side: f64, thickness: f64) -> SheetTree {
        let h = side / 2.0;
        let profile = vec![
            Point3::new(-h, -h, 0.0),
            Point3::new(h, -h, 0.0),
            Point3::new(h, h, 0.0),
            Point3::new(-h, h, 0.0),
        ];
        Tab::new(profile, thickness).execute().unwrap().0
    }

    fn outside_flange() -> FlangeParams {
        FlangeParams {
            angle_deg: 90.0,
            inside_radius: 1.0,
            k_factor: 0.4,
            leg_length: 5.0,
            leg_length_reference: LegLengthReference::Web,
            inset_mode: InsetMode::BendOutside,
            offset: 0.0,
        }
    }

    #[test]
    fn rounds_both_corners_of_a_square_edge() {
        let source = square_tab(20.0, 1.0);
        let target = source.flat(source.root()).unwrap().edges[0];
        let (tree, report) = CornerFillet::new(vec![target], 1.0, 4)
            .execute(&source)
            .unwrap();

        assert_eq!(report.edges_applied, 1);
        assert_eq!(report.corners_rounded, 2);
        assert!(report.skips.is_empty());

        let outline = tree.flat_outline(tree.root()).unwrap();
        assert_eq!(outline.len(), 12);

        let polyline = &tree.edge(target).unwrap().polyline;
        assert_abs_diff_eq!(polyline[0], Point2::new(-9.0, -10.0), epsilon = 1e-12);
        assert_abs_diff_eq!(polyline[1], Point2::new(9.0, -10.0), epsilon = 1e-12);
        assert_abs_diff_eq!(polyline_length(polyline), 18.0, epsilon = 1e-12);

        // each arc vertex sits on the fillet circle
        let edges = &tree.flat(tree.root()).unwrap().edges;
        assert_eq!(edges.len(), 6);
        let arc = &tree.edge(edges[0]).unwrap().polyline;
        assert_eq!(arc.len(), 5);
        let center = Point2::new(-9.0, -9.0);
        for p in arc {
            assert_abs_diff_eq!((p - center).norm(), 1.0, epsilon = 1e-12);
        }

        // polygonal quarter arcs remove slightly more than circular ones
        let fan = 2.0 * (PI / 8.0).sin();
        assert_abs_diff_eq!(
            signed_area(&outline),
            400.0 - 2.0 * (1.0 - fan),
            epsilon = 1e-9
        );
        assert!(tree.validate().is_ok());
    }

    #[test]
    fn single_segment_resolution_chamfers() {
        let source = square_tab(20.0, 1.0);
        let target = source.flat(source.root()).unwrap().edges[0];
        let (tree, report) = CornerFillet::new(vec![target], 2.0, 1)
            .execute(&source)
            .unwrap();

        assert_eq!(report.corners_rounded, 2);
        let outline = tree.flat_outline(tree.root()).unwrap();
        assert_eq!(outline.len(), 6);
        let edges = &tree.flat(tree.root()).unwrap().edges;
        let arc = &tree.edge(edges[0]).unwrap().polyline;
        assert_eq!(arc.len(), 2);
        assert_abs_diff_eq!(arc[0], Point2::new(-10.0, -8.0), epsilon = 1e-12);
        assert_abs_diff_eq!(arc[1], Point2::new(-8.0, -10.0), epsilon = 1e-12);
    }

    #[test]
    fn oversized_radius_skips_both_corners() {
        let source = square_tab(20.0, 1.0);
        let target = source.flat(source.root()).unwrap().edges[0];
        let (tree, report) = CornerFillet::new(vec![target], 25.0, 4)
            .execute(&source)
            .unwrap();

        assert_eq!(report.edges_applied, 0);
        assert_eq!(report.corners_rounded, 0);
        assert_eq!(report.skips.len(), 2);
        assert!(report
            .skips
            .iter()
            .all(|s| s.reason == SkipReason::CornerExceedsEdge));
        assert_eq!(tree.flat_outline(tree.root()).unwrap().len(), 4);
        assert_abs_diff_eq!(
            signed_area(&tree.flat_outline(tree.root()).unwrap()),
            400.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn second_corner_respects_the_first_trim() {
        // radius 10 on a 20 edge: the first corner consumes half the edge,
        // leaving nothing for the second
        let source = square_tab(20.0, 1.0);
        let target = source.flat(source.root()).unwrap().edges[0];
        let (tree, report) = CornerFillet::new(vec![target], 10.0, 2)
            .execute(&source)
            .unwrap();

        assert_eq!(report.edges_applied, 1);
        assert_eq!(report.corners_rounded, 1);
        assert_eq!(report.skips.len(), 1);
        assert_eq!(report.skips[0].reason, SkipReason::CornerExceedsEdge);

        let polyline = &tree.edge(target).unwrap().polyline;
        assert_abs_diff_eq!(polyline[0], Point2::new(0.0, -10.0), epsilon = 1e-12);
        assert_abs_diff_eq!(polyline[1], Point2::new(10.0, -10.0), epsilon = 1e-12);
        let left = tree.flat(tree.root()).unwrap().edges[4];
        let left_poly = &tree.edge(left).unwrap().polyline;
        assert_abs_diff_eq!(
            left_poly[left_poly.len() - 1],
            Point2::new(-10.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn corners_next_to_bends_are_protected() {
        let source = square_tab(20.0, 1.0);
        let edges = source.flat(source.root()).unwrap().edges.clone();
        let (folded, _) = Flange::new(vec![edges[1], edges[3]], outside_flange())
            .execute(&source)
            .unwrap();

        let (tree, report) = CornerFillet::new(vec![edges[0]], 1.0, 4)
            .execute(&folded)
            .unwrap();
        assert_eq!(report.edges_applied, 0);
        assert_eq!(report.skips.len(), 2);
        assert!(report
            .skips
            .iter()
            .all(|s| s.reason == SkipReason::CornerProtected));
        assert_eq!(tree.flat_outline(tree.root()).unwrap().len(), 4);
    }

    #[test]
    fn hinged_and_attach_targets_are_skipped() {
        let source = square_tab(20.0, 1.0);
        let target = source.flat(source.root()).unwrap().edges[0];
        let (folded, _) = Flange::new(vec![target], outside_flange())
            .execute(&source)
            .unwrap();

        let (_, report) = CornerFillet::new(vec![target], 1.0, 4)
            .execute(&folded)
            .unwrap();
        assert_eq!(report.skips[0].reason, SkipReason::EdgeAlreadyHasBend);

        let child = folded.flat_ids().find(|&f| f != folded.root()).unwrap();
        let attach = folded.attach_edge_of(child).unwrap();
        let (_, report) = CornerFillet::new(vec![attach], 1.0, 4)
            .execute(&folded)
            .unwrap();
        assert_eq!(report.skips[0].reason, SkipReason::EdgeIsAttach);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        let source = square_tab(20.0, 1.0);
        let target = source.flat(source.root()).unwrap().edges[0];
        assert!(CornerFillet::new(vec![], 1.0, 4).execute(&source).is_err());
        assert!(CornerFillet::new(vec![target], 0.0, 4)
            .execute(&source)
            .is_err());
        assert!(CornerFillet::new(vec![target], -1.0, 4)
            .execute(&source)
            .is_err());
        assert!(CornerFillet::new(vec![target], f64::NAN, 4)
            .execute(&source)
            .is_err());
        assert!(CornerFillet::new(vec![target], 1.0, 0)
            .execute(&source)
            .is_err());
    }
}
