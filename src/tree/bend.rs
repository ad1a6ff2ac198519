use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use super::{EdgeId, FlatId};

new_key_type! {
    /// Identifier for a bend.
    pub struct BendId;
}

/// A child flat hanging off a bend, welded along its attach edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BendChild {
    pub flat: FlatId,
    pub attach_edge: EdgeId,
}

/// A cylindrical fold connecting a parent flat to its children.
///
/// The bend hinges on one edge of the parent. `angle_deg` is the signed fold
/// sweep: positive folds toward the parent's `+z` side. `mid_radius` is the
/// radius of the sheet midplane in the fold, `inside_radius + thickness / 2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BendData {
    pub angle_deg: f64,
    pub mid_radius: f64,
    /// Neutral-line position across the gauge, in `[0, 1]`. `0` pins the
    /// neutral line to the inside surface, `0.5` to the midplane, `1` to the
    /// outside surface.
    pub k_factor: f64,
    pub children: Vec<BendChild>,
}

impl BendData {
    /// Creates a bend with no children yet.
    #[must_use]
    pub fn new(angle_deg: f64, mid_radius: f64, k_factor: f64) -> Self {
        Self {
            angle_deg,
            mid_radius,
            k_factor,
            children: Vec::new(),
        }
    }

    /// Signed fold angle in radians.
    #[must_use]
    pub fn angle_rad(&self) -> f64 {
        self.angle_deg.to_radians()
    }

    /// Radius of the neutral line, the fiber that keeps its length when the
    /// sheet folds. Arc length at this radius is the bend allowance.
    #[must_use]
    pub fn neutral_radius(&self, thickness: f64) -> f64 {
        self.mid_radius + (self.k_factor - 0.5) * thickness
    }

    /// Bend allowance: the flat-pattern length consumed by the fold.
    #[must_use]
    pub fn allowance(&self, thickness: f64) -> f64 {
        self.angle_rad().abs() * self.neutral_radius(thickness)
    }
}

// ── bend tests ────────────────────────────────────────────────────────────
