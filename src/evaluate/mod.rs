//! Tree evaluation: 3D placements for the folded part and 2D layouts for the
//! unfolded flat pattern.

pub mod evaluator;

pub use evaluator::Evaluator;

use crate::math::{Isometry2, Isometry3, Point2, Point3, Vector3};
use crate::tree::{BendId, EdgeId, FlatId};

/// World placement of one flat's midplane frame.
#[derive(Debug, Clone)]
pub struct FlatPlacement {
    pub flat: FlatId,
    /// Maps flat-local coordinates (midplane at `z = 0`) into the world.
    pub world: Isometry3,
}

/// World geometry of one fold, enough to sweep its cylinder surface.
#[derive(Debug, Clone)]
pub struct BendPlacement {
    pub bend: BendId,
    pub parent: FlatId,
    pub child: FlatId,
    pub hinge_edge: EdgeId,
    pub attach_edge: EdgeId,
    /// Signed fold sweep in radians.
    pub angle_rad: f64,
    pub mid_radius: f64,
    /// A point on the bend cylinder axis, world frame.
    pub axis_point: Point3,
    /// Unit axis direction, world frame.
    pub axis_dir: Vector3,
    /// Normal of the parent flat's midplane, world frame.
    pub parent_normal: Vector3,
    /// Hinge edge polyline on the parent midplane, world frame.
    pub hinge_samples: Vec<Point3>,
    /// Attach edge polyline on the child midplane, world frame, reversed so
    /// it runs parallel to `hinge_samples`.
    pub attach_samples: Vec<Point3>,
}

/// Placement of one flat in the shared unfold plane.
#[derive(Debug, Clone)]
pub struct FlatLayout {
    pub flat: FlatId,
    /// Maps flat-local coordinates into the unfold plane.
    pub plane: Isometry2,
}

/// The allowance strip a fold occupies in the unfold plane.
#[derive(Debug, Clone)]
pub struct BendLayout {
    pub bend: BendId,
    pub parent: FlatId,
    pub child: FlatId,
    /// Strip corners: hinge start, hinge end, then the same two points
    /// pushed outward by the allowance.
    pub strip: [Point2; 4],
    /// Flat-pattern length consumed by the fold.
    pub allowance: f64,
    pub angle_deg: f64,
}

/// Everything the assembler and the flat-pattern exporter need: every flat
/// and bend of the tree, placed in 3D and laid out in 2D.
#[derive(Debug, Clone, Default)]
pub struct Evaluated {
    pub flats_3d: Vec<FlatPlacement>,
    pub bends_3d: Vec<BendPlacement>,
    pub flats_2d: Vec<FlatLayout>,
    pub bends_2d: Vec<BendLayout>,
}

impl Evaluated {
    /// World placement of a flat, if it was reached by the walk.
    #[must_use]
    pub fn flat_world(&self, flat: FlatId) -> Option<&Isometry3> {
        self.flats_3d
            .iter()
            .find(|p| p.flat == flat)
            .map(|p| &p.world)
    }

    /// Unfold-plane layout of a flat, if it was reached by the walk.
    #[must_use]
    pub fn flat_plane(&self, flat: FlatId) -> Option<&Isometry2> {
        self.flats_2d
            .iter()
            .find(|l| l.flat == flat)
            .map(|l| &l.plane)
    }
}
