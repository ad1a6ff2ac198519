use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

use super::BendId;
use crate::math::Point2;

new_key_type! {
    /// Identifier for a boundary edge.
    pub struct EdgeId;
}

/// A directed chain of segments on one flat's boundary.
///
/// Straight edges carry exactly two points; fillet arcs carry one point per
/// arc segment plus one. The chain runs counter-clockwise with the rest of
/// the owning flat's outline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    pub polyline: Vec<Point2>,
    /// True on the one edge of a child flat that welds onto its parent's
    /// hinge edge. Attach edges cannot be edit targets.
    pub is_attach_edge: bool,
    /// The bend hinged on this edge, if any. Hinge edges cannot be edit
    /// targets either.
    pub bend: Option<BendId>,
}

impl EdgeData {
    /// Creates a plain boundary edge from a polyline.
    #[must_use]
    pub fn new(polyline: Vec<Point2>) -> Self {
        Self {
            polyline,
            is_attach_edge: false,
            bend: None,
        }
    }

    /// Creates the attach edge of a child flat.
    #[must_use]
    pub fn attach(polyline: Vec<Point2>) -> Self {
        Self {
            polyline,
            is_attach_edge: true,
            bend: None,
        }
    }

    /// A straight edge is a single segment. Fillet arcs and other sampled
    /// curves report false.
    #[must_use]
    pub fn is_straight(&self) -> bool {
        self.polyline.len() == 2
    }

    /// First point of the chain.
    #[must_use]
    pub fn start(&self) -> Point2 {
        self.polyline[0]
    }

    /// Last point of the chain.
    #[must_use]
    pub fn end(&self) -> Point2 {
        self.polyline[self.polyline.len() - 1]
    }
}
