use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use super::{EdgeId, HoleId};

new_key_type! {
    /// Identifier for a flat segment.
    pub struct FlatId;
}

/// A planar sheet segment.
///
/// All geometry is expressed in the flat's own local frame: the midplane is
/// `z = 0`, material extends `thickness / 2` to either side. The boundary
/// outline is the concatenation of the edge polylines in order, so it is
/// never stored separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatData {
    /// Boundary edges in counter-clockwise order. Consecutive edges share
    /// their endpoints; the last edge closes back to the first.
    pub edges: Vec<EdgeId>,
    /// Holes cut into this flat, each fully inside the outline.
    pub holes: Vec<HoleId>,
}

impl FlatData {
    /// Creates a flat bounded by `edges`, with no holes.
    #[must_use]
    pub fn new(edges: Vec<EdgeId>) -> Self {
        Self {
            edges,
            holes: Vec::new(),
        }
    }
}
