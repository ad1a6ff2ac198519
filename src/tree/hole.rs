use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use crate::math::Point2;

new_key_type! {
    /// Identifier for a cutout hole.
    pub struct HoleId;
}

/// Material removed from one flat by a cutout.
///
/// The loop lives in the owning flat's local frame and is contained, within
/// tolerance, in the flat's outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HoleData {
    /// Feature id of the cutout that produced this hole.
    pub cutout_id: String,
    /// Closed loop, counter-clockwise, no closing duplicate.
    pub outline: Vec<Point2>,
}

impl HoleData {
    /// Creates a hole attributed to the given cutout feature.
    #[must_use]
    pub fn new(cutout_id: impl Into<String>, outline: Vec<Point2>) -> Self {
        Self {
            cutout_id: cutout_id.into(),
            outline,
        }
    }
}
