use std::collections::HashSet;

use nalgebra::{Translation2, Translation3, Unit, UnitComplex, UnitQuaternion};

use crate::error::{Result, TreeError};
use crate::math::polygon_2d::perp_right;
use crate::math::{Isometry2, Isometry3, Point3, Vector3, TOLERANCE};
use crate::tree::{key_label, SheetTree};

use super::{BendLayout, BendPlacement, Evaluated, FlatLayout, FlatPlacement};

/// Walks a sheet tree depth-first and produces world placements for the
/// folded part plus layouts in the shared unfold plane.
///
/// The evaluator assumes an already-validated tree: operations reject zero
/// fold angles and degenerate radii before they ever reach the arena.
/// Structural breakage, such as a dangling id, a zero-length hinge, or a
/// cycle, is a fatal error.
pub struct Evaluator<'a> {
    tree: &'a SheetTree,
    root_transform: Isometry3,
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator placing the root flat at the identity.
    #[must_use]
    pub fn new(tree: &'a SheetTree) -> Self {
        Self {
            tree,
            root_transform: Isometry3::identity(),
        }
    }

    /// Places the root flat with the given transform instead.
    #[must_use]
    pub fn with_root_transform(mut self, transform: Isometry3) -> Self {
        self.root_transform = transform;
        self
    }

    /// Executes the walk.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree references missing entities, contains a
    /// cycle, or has a degenerate hinge or attach edge.
    pub fn execute(&self) -> Result<Evaluated> {
        let tree = self.tree;
        let mut out = Evaluated::default();
        let mut visited: HashSet<_> = HashSet::new();
        let mut stack = vec![(tree.root(), self.root_transform, Isometry2::identity())];

        while let Some((flat_id, world, plane)) = stack.pop() {
            if !visited.insert(flat_id) {
                return Err(TreeError::InvalidStructure(format!(
                    "flat {} is reachable twice",
                    key_label(flat_id)
                ))
                .into());
            }
            out.flats_3d.push(FlatPlacement {
                flat: flat_id,
                world,
            });
            out.flats_2d.push(FlatLayout {
                flat: flat_id,
                plane,
            });

            for (hinge_id, bend_id) in tree.hinges_of(flat_id)? {
                let bend = tree.bend(bend_id)?;
                let hinge = tree.edge(hinge_id)?;
                let (a, b) = (hinge.start(), hinge.end());
                let chord = b - a;
                if chord.norm() <= TOLERANCE {
                    return Err(TreeError::InvalidStructure(format!(
                        "hinge edge {} has zero length",
                        key_label(hinge_id)
                    ))
                    .into());
                }
                let d = chord / chord.norm();
                let o = perp_right(&d);
                let theta = bend.angle_rad();
                let allowance = bend.allowance(tree.thickness());

                // The fold is one rigid rotation about the bend cylinder
                // axis. The cylinder is tangent to the midplane along the
                // hinge line, so its axis sits mid_radius along the plane
                // normal, on the side the fold sweeps toward.
                let o3 = Vector3::new(o.x, o.y, 0.0);
                let axis_dir_local = o3.cross(&Vector3::z());
                let axis_point_local =
                    Point3::new(a.x, a.y, theta.signum() * bend.mid_radius);
                let fold_rot =
                    UnitQuaternion::from_axis_angle(&Unit::new_normalize(axis_dir_local), theta);
                let fold = Isometry3::rotation_wrt_point(fold_rot, axis_point_local);

                for child in &bend.children {
                    let attach = tree.edge(child.attach_edge)?;
                    let (ca, cb) = (attach.start(), attach.end());
                    let attach_chord = cb - ca;
                    if attach_chord.norm() <= TOLERANCE {
                        return Err(TreeError::InvalidStructure(format!(
                            "attach edge {} has zero length",
                            key_label(child.attach_edge)
                        ))
                        .into());
                    }
                    let cd = attach_chord / attach_chord.norm();

                    // Weld the child into the parent plane: its attach edge
                    // lands on the hinge line reversed, since both outlines
                    // run counter-clockwise and face each other.
                    let target = -d;
                    let sin_phi = cd.x * target.y - cd.y * target.x;
                    let cos_phi = cd.dot(&target);
                    let phi = sin_phi.atan2(cos_phi);

                    let rot2 = UnitComplex::new(phi);
                    let weld2 =
                        Isometry2::from_parts(Translation2::from(b - rot2 * ca), rot2);
                    let rot3 = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), phi);
                    let weld3 = Isometry3::from_parts(
                        Translation3::from(
                            Point3::new(b.x, b.y, 0.0) - rot3 * Point3::new(ca.x, ca.y, 0.0),
                        ),
                        rot3,
                    );

                    let child_world = world * fold * weld3;
                    let child_plane =
                        plane * Isometry2::translation(o.x * allowance, o.y * allowance) * weld2;

                    let hinge_samples: Vec<Point3> = hinge
                        .polyline
                        .iter()
                        .map(|p| world * Point3::new(p.x, p.y, 0.0))
                        .collect();
                    let mut attach_samples: Vec<Point3> = attach
                        .polyline
                        .iter()
                        .map(|p| child_world * Point3::new(p.x, p.y, 0.0))
                        .collect();
                    attach_samples.reverse();

                    out.bends_3d.push(BendPlacement {
                        bend: bend_id,
                        parent: flat_id,
                        child: child.flat,
                        hinge_edge: hinge_id,
                        attach_edge: child.attach_edge,
                        angle_rad: theta,
                        mid_radius: bend.mid_radius,
                        axis_point: world * axis_point_local,
                        axis_dir: world * axis_dir_local,
                        parent_normal: world * Vector3::z(),
                        hinge_samples,
                        attach_samples,
                    });

                    let la = plane * a;
                    let lb = plane * b;
                    let o_plane = plane * o;
                    out.bends_2d.push(BendLayout {
                        bend: bend_id,
                        parent: flat_id,
                        child: child.flat,
                        strip: [
                            la,
                            lb,
                            lb + o_plane * allowance,
                            la + o_plane * allowance,
                        ],
                        allowance,
                        angle_deg: bend.angle_deg,
                    });

                    stack.push((child.flat, child_world, child_plane));
                }
            }
        }

        Ok(out)
    }
}

// ── evaluator tests ───────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::Point2;
    use crate::tree::{BaseType, BendChild, BendData, EdgeData, FlatData, FlatId, SheetMeta};
    use approx::assert_relative_eq;
    use std::f64::consts::{FRAC_PI_2, PI};

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    fn square_edges(tree: &mut SheetTree, size: f64) -> Vec<crate::tree::EdgeId> {
        let c = [p(0.0, 0.0), p(size, 0.0), p(size, size), p(0.0, size)];
        (0..4)
            .map(|i| tree.add_edge(EdgeData::new(vec![c[i], c[(i + 1) % 4]])))
            .collect()
    }

    /// Parent 4x4 square with a child 4x5 rectangle folded off its right
    /// edge. Mid radius 2, so a 90 degree fold wraps a quarter cylinder.
    fn folded_tree(angle_deg: f64) -> (SheetTree, FlatId, FlatId) {
        let meta = SheetMeta::new(BaseType::Tab, 1.5, 0.5);
        let mut tree = SheetTree::new(1.0, meta);
        let parent_edges = square_edges(&mut tree, 4.0);
        let parent = tree.add_flat(FlatData::new(parent_edges.clone()));
        tree.set_root(parent);

        let c = [p(0.0, 0.0), p(4.0, 0.0), p(4.0, 5.0), p(0.0, 5.0)];
        let attach = tree.add_edge(EdgeData::attach(vec![c[0], c[1]]));
        let mut child_edges = vec![attach];
        for i in 1..4 {
            child_edges.push(tree.add_edge(EdgeData::new(vec![c[i], c[(i + 1) % 4]])));
        }
        let child = tree.add_flat(FlatData::new(child_edges));

        let mut bend = BendData::new(angle_deg, 2.0, 0.5);
        bend.children.push(BendChild {
            flat: child,
            attach_edge: attach,
        });
        let bend_id = tree.add_bend(bend);
        // Hinge on the parent's right edge, (4,0) -> (4,4).
        tree.edge_mut(parent_edges[1]).unwrap().bend = Some(bend_id);
        (tree, parent, child)
    }

    #[test]
    fn single_flat_takes_the_root_transform() {
        let meta = SheetMeta::new(BaseType::Tab, 1.0, 0.5);
        let mut tree = SheetTree::new(1.0, meta);
        let edges = square_edges(&mut tree, 4.0);
        let root = tree.add_flat(FlatData::new(edges));
        tree.set_root(root);

        let shift = Isometry3::translation(10.0, -2.0, 3.0);
        let evaluated = Evaluator::new(&tree)
            .with_root_transform(shift)
            .execute()
            .unwrap();
        assert_eq!(evaluated.flats_3d.len(), 1);
        assert!(evaluated.bends_3d.is_empty());
        let world = evaluated.flat_world(root).unwrap();
        assert_relative_eq!(
            world * Point3::origin(),
            Point3::new(10.0, -2.0, 3.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn quarter_fold_up_lands_on_the_cylinder_exit_line() {
        let (tree, _, child) = folded_tree(90.0);
        let evaluated = Evaluator::new(&tree).execute().unwrap();
        let world = evaluated.flat_world(child).unwrap();

        // The fold wraps a quarter cylinder of radius 2 around an axis at
        // (4, y, 2), so the child starts on the exit line x = 6, z = 2.
        assert_relative_eq!(
            world * Point3::new(0.0, 0.0, 0.0),
            Point3::new(6.0, 4.0, 2.0),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            world * Point3::new(4.0, 0.0, 0.0),
            Point3::new(6.0, 0.0, 2.0),
            epsilon = 1e-9
        );
        // The far edge of a height-5 child rises straight up from there.
        assert_relative_eq!(
            world * Point3::new(0.0, 5.0, 0.0),
            Point3::new(6.0, 4.0, 7.0),
            epsilon = 1e-9
        );
        // Folding up makes the child's +z face the concave side: the normal
        // turns from +z to -x, back over the parent.
        assert_relative_eq!(world * Vector3::z(), -Vector3::x(), epsilon = 1e-9);
    }

    #[test]
    fn quarter_fold_down_mirrors_through_the_sheet() {
        let (tree, _, child) = folded_tree(-90.0);
        let evaluated = Evaluator::new(&tree).execute().unwrap();
        let world = evaluated.flat_world(child).unwrap();
        assert_relative_eq!(
            world * Point3::new(0.0, 0.0, 0.0),
            Point3::new(6.0, 4.0, -2.0),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            world * Point3::new(0.0, 5.0, 0.0),
            Point3::new(6.0, 4.0, -7.0),
            epsilon = 1e-9
        );
    }

    #[test]
    fn bend_placement_reports_axis_and_aligned_samples() {
        let (tree, parent, child) = folded_tree(90.0);
        let evaluated = Evaluator::new(&tree).execute().unwrap();
        assert_eq!(evaluated.bends_3d.len(), 1);
        let bend = &evaluated.bends_3d[0];
        assert_eq!(bend.parent, parent);
        assert_eq!(bend.child, child);
        assert_relative_eq!(bend.axis_point, Point3::new(4.0, 0.0, 2.0), epsilon = 1e-9);
        assert_relative_eq!(bend.axis_dir, Vector3::new(0.0, -1.0, 0.0), epsilon = 1e-9);
        // Sample chains run the same way: hinge (4,0)->(4,4) pairs with the
        // exit line (6,0)->(6,4) at height 2.
        assert_relative_eq!(
            bend.hinge_samples[0],
            Point3::new(4.0, 0.0, 0.0),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            bend.attach_samples[0],
            Point3::new(6.0, 0.0, 2.0),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            *bend.hinge_samples.last().unwrap(),
            Point3::new(4.0, 4.0, 0.0),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            *bend.attach_samples.last().unwrap(),
            Point3::new(6.0, 4.0, 2.0),
            epsilon = 1e-9
        );
    }

    #[test]
    fn unfold_layout_offsets_child_by_the_allowance() {
        let (tree, _, child) = folded_tree(90.0);
        let evaluated = Evaluator::new(&tree).execute().unwrap();
        // Allowance at k = 0.5 is the mid-radius arc: pi/2 * 2 = pi.
        let allowance = FRAC_PI_2 * 2.0;
        let plane = evaluated.flat_plane(child).unwrap();
        assert_relative_eq!(
            plane * Point2::new(0.0, 0.0),
            Point2::new(4.0 + allowance, 4.0),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            plane * Point2::new(4.0, 0.0),
            Point2::new(4.0 + allowance, 0.0),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            plane * Point2::new(0.0, 5.0),
            Point2::new(9.0 + allowance, 4.0),
            epsilon = 1e-9
        );

        let layout = &evaluated.bends_2d[0];
        assert_relative_eq!(layout.allowance, PI, epsilon = 1e-12);
        assert_relative_eq!(layout.strip[0], Point2::new(4.0, 0.0), epsilon = 1e-9);
        assert_relative_eq!(layout.strip[1], Point2::new(4.0, 4.0), epsilon = 1e-9);
        assert_relative_eq!(
            layout.strip[2],
            Point2::new(4.0 + allowance, 4.0),
            epsilon = 1e-9
        );
        assert_relative_eq!(
            layout.strip[3],
            Point2::new(4.0 + allowance, 0.0),
            epsilon = 1e-9
        );
    }

    #[test]
    fn k_factor_shifts_the_allowance() {
        let (mut tree, _, _) = folded_tree(90.0);
        let bend_id = {
            let (_, id) = tree
                .hinges_of(tree.root())
                .unwrap()
                .into_iter()
                .next()
                .unwrap();
            id
        };
        tree.bend_mut(bend_id).unwrap().k_factor = 0.0;
        let evaluated = Evaluator::new(&tree).execute().unwrap();
        // Neutral line moves to the inside surface: radius 2 - 0.5.
        assert_relative_eq!(
            evaluated.bends_2d[0].allowance,
            FRAC_PI_2 * 1.5,
            epsilon = 1e-12
        );
    }

    #[test]
    fn cycle_is_a_fatal_error() {
        let (mut tree, parent, _) = folded_tree(90.0);
        let bend_id = {
            let (_, id) = tree.hinges_of(parent).unwrap().into_iter().next().unwrap();
            id
        };
        let parent_attach = {
            let flat = tree.flat(parent).unwrap();
            flat.edges[3]
        };
        tree.edge_mut(parent_attach).unwrap().is_attach_edge = true;
        tree.bend_mut(bend_id).unwrap().children.push(BendChild {
            flat: parent,
            attach_edge: parent_attach,
        });
        assert!(Evaluator::new(&tree).execute().is_err());
    }

    #[test]
    fn zero_length_hinge_is_a_fatal_error() {
        let (mut tree, parent, _) = folded_tree(90.0);
        let hinge = tree.hinges_of(parent).unwrap()[0].0;
        tree.edge_mut(hinge).unwrap().polyline = vec![p(4.0, 0.0), p(4.0, 0.0)];
        assert!(Evaluator::new(&tree).execute().is_err());
    }

    #[test]
    fn chained_folds_compose() {
        let (mut tree, _, child) = folded_tree(90.0);
        // Second fold off the child's far edge, at the top of the wall.
        let far_edge = tree.flat(child).unwrap().edges[2];
        let g = [p(0.0, 0.0), p(4.0, 0.0), p(4.0, 2.0), p(0.0, 2.0)];
        let attach = tree.add_edge(EdgeData::attach(vec![g[0], g[1]]));
        let mut edges = vec![attach];
        for i in 1..4 {
            edges.push(tree.add_edge(EdgeData::new(vec![g[i], g[(i + 1) % 4]])));
        }
        let grandchild = tree.add_flat(FlatData::new(edges));
        let mut bend = BendData::new(90.0, 2.0, 0.5);
        bend.children.push(BendChild {
            flat: grandchild,
            attach_edge: attach,
        });
        let bend_id = tree.add_bend(bend);
        tree.edge_mut(far_edge).unwrap().bend = Some(bend_id);

        let evaluated = Evaluator::new(&tree).execute().unwrap();
        assert_eq!(evaluated.flats_3d.len(), 3);
        assert_eq!(evaluated.bends_3d.len(), 2);
        assert_eq!(evaluated.bends_2d.len(), 2);

        // First wall is vertical with normal -x; folding its top edge by
        // +90 again swings the grandchild normal out of the x axis entirely.
        let world = evaluated.flat_world(grandchild).unwrap();
        let normal = world * Vector3::z();
        assert_relative_eq!(normal.norm(), 1.0, epsilon = 1e-9);
        assert!(normal.x.abs() < 1e-9, "normal should leave -x, got {normal}");
    }
}
