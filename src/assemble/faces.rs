//! Flat panel emission: triangulated skins at `±t/2` and prismatic walls.

use std::collections::{HashMap, HashSet, VecDeque};

use spade::handles::FixedFaceHandle;
use spade::{
    ConstrainedDelaunayTriangulation, InsertionError, Point2 as SpadePoint2, Triangulation,
};

use crate::error::{AssemblyError, Result};
use crate::evaluate::FlatPlacement;
use crate::math::{Isometry3, Point2, Point3};
use crate::tree::SheetTree;

use super::naming::{FaceKind, SheetSide};
use super::sink::SolidSink;
use super::AssemblyStats;

/// Emits one flat of the tree: two skins offset from the midplane, a wall
/// along every plain boundary edge and a wall ring inside every hole.
///
/// Edges that carry a bend and attach edges get no wall; the bend sweep
/// seals those openings.
pub(super) fn emit_flat<S: SolidSink>(
    tree: &SheetTree,
    placement: &FlatPlacement,
    feature: &str,
    sink: &mut S,
    stats: &mut AssemblyStats,
) -> Result<()> {
    let flat_id = placement.flat;
    let flat = tree.flat(flat_id)?;
    let outline = tree.flat_outline(flat_id)?;
    let half = tree.thickness() / 2.0;
    let world = &placement.world;

    let mut hole_outlines = Vec::with_capacity(flat.holes.len());
    for &hole_id in &flat.holes {
        hole_outlines.push((hole_id, tree.hole(hole_id)?.outline.clone()));
    }
    let hole_loops: Vec<&[Point2]> = hole_outlines
        .iter()
        .map(|(_, outline)| outline.as_slice())
        .collect();

    let triangles = triangulate_with_holes(&outline, &hole_loops)?;

    // CDT faces come out counter-clockwise in the plane, which is the
    // outward orientation on the A side. The B side reverses.
    let skin_a = super::declare_face(
        sink,
        stats,
        feature,
        &FaceKind::FlatSkin {
            flat: flat_id,
            side: SheetSide::A,
        },
    );
    let skin_b = super::declare_face(
        sink,
        stats,
        feature,
        &FaceKind::FlatSkin {
            flat: flat_id,
            side: SheetSide::B,
        },
    );
    for tri in &triangles {
        let [a, b, c] = *tri;
        super::emit_checked(
            sink,
            stats,
            &skin_a,
            lift(world, a, half),
            lift(world, b, half),
            lift(world, c, half),
        );
        super::emit_checked(
            sink,
            stats,
            &skin_b,
            lift(world, a, -half),
            lift(world, c, -half),
            lift(world, b, -half),
        );
    }

    for &edge_id in &flat.edges {
        let edge = tree.edge(edge_id)?;
        if edge.bend.is_some() || edge.is_attach_edge {
            continue;
        }
        let wall = super::declare_face(
            sink,
            stats,
            feature,
            &FaceKind::FlatWall {
                flat: flat_id,
                edge: edge_id,
            },
        );
        for w in edge.polyline.windows(2) {
            emit_wall_quad(sink, stats, &wall, world, w[0], w[1], half, false);
        }
    }

    for (hole_id, outline) in &hole_outlines {
        let n = outline.len();
        for i in 0..n {
            let face = super::declare_face(
                sink,
                stats,
                feature,
                &FaceKind::HoleWall {
                    flat: flat_id,
                    hole: *hole_id,
                    segment: i,
                },
            );
            emit_wall_quad(
                sink,
                stats,
                &face,
                world,
                outline[i],
                outline[(i + 1) % n],
                half,
                true,
            );
        }
    }

    Ok(())
}

fn lift(world: &Isometry3, p: Point2, z: f64) -> Point3 {
    world * Point3::new(p.x, p.y, z)
}

/// One vertical wall quad between two outline points, split into two
/// triangles. Outline walls face away from the material, hole walls face
/// into the cavity.
#[allow(clippy::too_many_arguments)]
fn emit_wall_quad<S: SolidSink>(
    sink: &mut S,
    stats: &mut AssemblyStats,
    face: &str,
    world: &Isometry3,
    p0: Point2,
    p1: Point2,
    half: f64,
    into_cavity: bool,
) {
    let p0m = lift(world, p0, -half);
    let p1m = lift(world, p1, -half);
    let p1p = lift(world, p1, half);
    let p0p = lift(world, p0, half);
    if into_cavity {
        super::emit_checked(sink, stats, face, p0m, p0p, p1p);
        super::emit_checked(sink, stats, face, p0m, p1p, p1m);
    } else {
        super::emit_checked(sink, stats, face, p0m, p1m, p1p);
        super::emit_checked(sink, stats, face, p0m, p1p, p0p);
    }
}

/// Triangulates a polygon with holes in its own plane.
///
/// Loops are passed open (closure implied) and may wind either way; the
/// parity classification only needs them to be closed constraint cycles.
///
/// # Errors
///
/// Returns an error if a loop has fewer than 3 points or a point cannot be
/// inserted into the triangulation.
pub(super) fn triangulate_with_holes(
    outer: &[Point2],
    holes: &[&[Point2]],
) -> Result<Vec<[Point2; 3]>> {
    let mut cdt = ConstrainedDelaunayTriangulation::<SpadePoint2<f64>>::new();
    insert_constraint_loop(&mut cdt, outer)?;
    for hole in holes {
        insert_constraint_loop(&mut cdt, hole)?;
    }

    let interior = classify_interior_faces(&cdt);

    let mut triangles = Vec::with_capacity(interior.len());
    for face in cdt.inner_faces() {
        if !interior.contains(&face.fix().index()) {
            continue;
        }
        let vs = face.vertices();
        triangles.push([
            Point2::new(vs[0].position().x, vs[0].position().y),
            Point2::new(vs[1].position().x, vs[1].position().y),
            Point2::new(vs[2].position().x, vs[2].position().y),
        ]);
    }
    Ok(triangles)
}

fn insert_constraint_loop(
    cdt: &mut ConstrainedDelaunayTriangulation<SpadePoint2<f64>>,
    points: &[Point2],
) -> Result<()> {
    if points.len() < 3 {
        return Err(
            AssemblyError::Triangulation("constraint loop needs at least 3 points".into()).into(),
        );
    }

    let mut handles = Vec::with_capacity(points.len());
    for pt in points {
        let h = cdt
            .insert(SpadePoint2::new(pt.x, pt.y))
            .map_err(|e: InsertionError| {
                AssemblyError::Triangulation(format!("CDT insert: {e}"))
            })?;
        handles.push(h);
    }

    for i in 0..handles.len() {
        let from = handles[i];
        let to = handles[(i + 1) % handles.len()];
        if from != to {
            cdt.add_constraint(from, to);
        }
    }

    Ok(())
}

/// Classifies which inner faces of the CDT lie inside the polygon using
/// flood-fill. Faces adjacent to the outer face start at depth 0; crossing
/// a constraint edge increments depth. Odd depth means interior.
fn classify_interior_faces(
    cdt: &ConstrainedDelaunayTriangulation<SpadePoint2<f64>>,
) -> HashSet<usize> {
    let mut interior = HashSet::new();
    let mut depth_map: HashMap<usize, u32> = HashMap::new();
    let mut queue: VecDeque<(FixedFaceHandle<spade::handles::InnerTag>, u32)> = VecDeque::new();

    let outer_fix = cdt.outer_face().fix();

    for edge in cdt.directed_edges() {
        if edge.face().fix() == outer_fix {
            let rev_face = edge.rev().face();
            if let Some(inner) = rev_face.as_inner() {
                let idx = inner.fix().index();
                if depth_map.contains_key(&idx) {
                    continue;
                }
                let depth = u32::from(cdt.is_constraint_edge(edge.as_undirected().fix()));
                depth_map.insert(idx, depth);
                if depth % 2 == 1 {
                    interior.insert(idx);
                }
                queue.push_back((inner.fix(), depth));
            }
        }
    }

    while let Some((face_fix, depth)) = queue.pop_front() {
        let face = cdt.face(face_fix);
        for edge in face.adjacent_edges() {
            let neighbor = edge.rev().face();
            if let Some(inner_neighbor) = neighbor.as_inner() {
                let n_idx = inner_neighbor.fix().index();
                if depth_map.contains_key(&n_idx) {
                    continue;
                }
                let new_depth = if cdt.is_constraint_edge(edge.as_undirected().fix()) {
                    depth + 1
                } else {
                    depth
                };
                depth_map.insert(n_idx, new_depth);
                if new_depth % 2 == 1 {
                    interior.insert(n_idx);
                }
                queue.push_back((inner_neighbor.fix(), new_depth));
            }
        }
    }

    interior
}

// ── flat emission tests ───────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::assemble::sink::MeshBuffer;
    use crate::math::{polygon_2d, Vector3};
    use crate::tree::{BaseType, EdgeData, FlatData, FlatId, HoleData, SheetMeta};

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    fn square_tree(size: f64, thickness: f64) -> (SheetTree, FlatId) {
        let meta = SheetMeta::new(BaseType::Tab, 1.0, 0.5);
        let mut tree = SheetTree::new(thickness, meta);
        let c = [p(0.0, 0.0), p(size, 0.0), p(size, size), p(0.0, size)];
        let edges = (0..4)
            .map(|i| tree.add_edge(EdgeData::new(vec![c[i], c[(i + 1) % 4]])))
            .collect();
        let flat = tree.add_flat(FlatData::new(edges));
        tree.set_root(flat);
        (tree, flat)
    }

    fn triangulated_area(triangles: &[[Point2; 3]]) -> f64 {
        triangles
            .iter()
            .map(|t| polygon_2d::signed_area(t).abs())
            .sum()
    }

    #[test]
    fn triangulation_covers_the_outline() {
        let outer = vec![p(0.0, 0.0), p(4.0, 0.0), p(4.0, 4.0), p(0.0, 4.0)];
        let triangles = triangulate_with_holes(&outer, &[]).unwrap();
        assert_eq!(triangles.len(), 2);
        assert!((triangulated_area(&triangles) - 16.0).abs() < 1e-9);
        // Interior faces keep the positive plane orientation.
        for tri in &triangles {
            assert!(polygon_2d::signed_area(tri) > 0.0);
        }
    }

    #[test]
    fn triangulation_leaves_holes_uncovered() {
        let outer = vec![p(0.0, 0.0), p(6.0, 0.0), p(6.0, 6.0), p(0.0, 6.0)];
        let hole = vec![p(2.0, 2.0), p(4.0, 2.0), p(4.0, 4.0), p(2.0, 4.0)];
        let triangles = triangulate_with_holes(&outer, &[&hole]).unwrap();
        assert!((triangulated_area(&triangles) - 32.0).abs() < 1e-9);
        // No triangle centroid falls in the hole.
        for tri in &triangles {
            let cx = (tri[0].x + tri[1].x + tri[2].x) / 3.0;
            let cy = (tri[0].y + tri[1].y + tri[2].y) / 3.0;
            assert!(!polygon_2d::point_in_polygon(&hole, &p(cx, cy)));
        }
    }

    #[test]
    fn degenerate_loop_is_rejected() {
        let line = vec![p(0.0, 0.0), p(1.0, 0.0)];
        assert!(triangulate_with_holes(&line, &[]).is_err());
    }

    #[test]
    fn square_flat_emits_skins_and_four_walls() {
        let (tree, flat) = square_tree(4.0, 1.0);
        let placement = FlatPlacement {
            flat,
            world: Isometry3::identity(),
        };
        let mut buf = MeshBuffer::new();
        let mut stats = AssemblyStats::default();
        emit_flat(&tree, &placement, "base1", &mut buf, &mut stats).unwrap();

        // 2 skin triangles per side, 2 per wall quad.
        assert_eq!(stats.triangles, 2 + 2 + 4 * 2);
        assert_eq!(stats.dropped_triangles, 0);
        assert_eq!(stats.faces, 6);
        assert_eq!(buf.face_names().len(), 6);
    }

    #[test]
    fn skin_windings_face_away_from_the_sheet() {
        let (tree, flat) = square_tree(4.0, 1.0);
        let placement = FlatPlacement {
            flat,
            world: Isometry3::identity(),
        };
        let mut buf = MeshBuffer::new();
        let mut stats = AssemblyStats::default();
        emit_flat(&tree, &placement, "base1", &mut buf, &mut stats).unwrap();

        for name in buf.face_names() {
            let meta = buf.face_metadata(&name).unwrap();
            if let FaceKind::FlatSkin { side, .. } = meta.kind {
                for [a, b, c] in buf.triangles_of(&name) {
                    let normal = (b - a).cross(&(c - a));
                    let expect = match side {
                        SheetSide::A => Vector3::z(),
                        SheetSide::B => -Vector3::z(),
                    };
                    assert!(normal.dot(&expect) > 0.0);
                }
            }
        }
    }

    #[test]
    fn wall_normals_point_outward() {
        let (tree, flat) = square_tree(4.0, 1.0);
        let placement = FlatPlacement {
            flat,
            world: Isometry3::identity(),
        };
        let mut buf = MeshBuffer::new();
        let mut stats = AssemblyStats::default();
        emit_flat(&tree, &placement, "base1", &mut buf, &mut stats).unwrap();

        let center = Point3::new(2.0, 2.0, 0.0);
        for name in buf.face_names() {
            let meta = buf.face_metadata(&name).unwrap();
            if !matches!(meta.kind, FaceKind::FlatWall { .. }) {
                continue;
            }
            for [a, b, c] in buf.triangles_of(&name) {
                let normal = (b - a).cross(&(c - a));
                let centroid = Point3::from((a.coords + b.coords + c.coords) / 3.0);
                assert!(normal.dot(&(centroid - center)) > 0.0);
            }
        }
    }

    #[test]
    fn hole_walls_face_into_the_cavity() {
        let (mut tree, flat) = square_tree(6.0, 1.0);
        let hole = tree.add_hole(HoleData::new(
            "cut1",
            vec![p(2.0, 2.0), p(4.0, 2.0), p(4.0, 4.0), p(2.0, 4.0)],
        ));
        tree.flat_mut(flat).unwrap().holes.push(hole);

        let placement = FlatPlacement {
            flat,
            world: Isometry3::identity(),
        };
        let mut buf = MeshBuffer::new();
        let mut stats = AssemblyStats::default();
        emit_flat(&tree, &placement, "base1", &mut buf, &mut stats).unwrap();

        // One face per hole segment.
        let hole_faces: Vec<_> = buf
            .face_names()
            .into_iter()
            .filter(|n| {
                matches!(
                    buf.face_metadata(n).unwrap().kind,
                    FaceKind::HoleWall { .. }
                )
            })
            .collect();
        assert_eq!(hole_faces.len(), 4);

        let cavity_center = Point3::new(3.0, 3.0, 0.0);
        for name in &hole_faces {
            for [a, b, c] in buf.triangles_of(name) {
                let normal = (b - a).cross(&(c - a));
                let centroid = Point3::from((a.coords + b.coords + c.coords) / 3.0);
                assert!(normal.dot(&(cavity_center - centroid)) > 0.0);
            }
        }
    }

    #[test]
    fn hinge_and_attach_edges_get_no_wall() {
        let (mut tree, flat) = square_tree(4.0, 1.0);
        let edges = tree.flat(flat).unwrap().edges.clone();
        let bend = tree.add_bend(crate::tree::BendData::new(90.0, 2.0, 0.5));
        tree.edge_mut(edges[1]).unwrap().bend = Some(bend);
        tree.edge_mut(edges[3]).unwrap().is_attach_edge = true;

        let placement = FlatPlacement {
            flat,
            world: Isometry3::identity(),
        };
        let mut buf = MeshBuffer::new();
        let mut stats = AssemblyStats::default();
        emit_flat(&tree, &placement, "base1", &mut buf, &mut stats).unwrap();

        let walls = buf
            .face_names()
            .into_iter()
            .filter(|n| {
                matches!(
                    buf.face_metadata(n).unwrap().kind,
                    FaceKind::FlatWall { .. }
                )
            })
            .count();
        assert_eq!(walls, 2);
    }
}
