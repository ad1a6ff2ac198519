//! Edit operations on sheet trees.
//!
//! Every operation is a small command struct: construct it with `new`, then
//! call `execute` against a source tree. Execution never mutates the source;
//! it clones, edits the clone, and returns the result together with a report.
//! Whole-operation problems (bad parameters, malformed trees) come back as
//! errors before anything is touched. Per-target problems do not abort the
//! batch; the target is skipped and the skip lands in the report with a
//! machine-readable reason.

mod contour_flange;
mod corner_fillet;
mod cutout;
mod flange;
mod tab;

pub use contour_flange::{ContourFlange, ContourFlangeParams};
pub use corner_fillet::{CornerFillet, CornerFilletReport};
pub use cutout::{CutProfile, Cutout, CutoutParams, CutoutReport, LoopMapping};
pub use flange::{Flange, FlangeParams, FlangeReport, InsetMode, LegLengthReference, RELIEF_JOG};
pub use tab::Tab;

use std::fmt;

use crate::error::{OperationError, Result};
use crate::math::Point3;
use crate::tree::EdgeId;

/// Out-of-plane tolerance for picked profiles and section paths. Picks arrive
/// with solver jitter well below this.
pub(crate) const PROFILE_PLANAR_TOL: f64 = 1e-6;

/// Why one target of a batch operation was passed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The edge already carries a bend.
    EdgeAlreadyHasBend,
    /// The edge is the attach side of its flat.
    EdgeIsAttach,
    /// The edge is a polyline, not a straight segment.
    EdgeNotStraight,
    /// The bend setback left no leg to build.
    LegConsumedBySetback,
    /// The overlap-relief jog left the shifted edge shorter than usable.
    ReliefConsumedTargetEdge,
    /// Rebuilding the outline would leave fewer than three segments.
    InsufficientSegments,
    /// No flat could host the projected cut loop.
    NoFlatMapping,
    /// An adjacent edge at the corner is hinged or is the attach edge.
    CornerProtected,
    /// The fillet trim does not fit the adjacent edge lengths.
    CornerExceedsEdge,
}

impl SkipReason {
    /// Stable identifier used in reports and logs.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::EdgeAlreadyHasBend => "edge_already_has_bend",
            Self::EdgeIsAttach => "edge_is_attach",
            Self::EdgeNotStraight => "edge_not_straight",
            Self::LegConsumedBySetback => "leg_consumed_by_setback",
            Self::ReliefConsumedTargetEdge => "relief_consumed_target_edge",
            Self::InsufficientSegments => "insufficient_segments",
            Self::NoFlatMapping => "no_flat_mapping",
            Self::CornerProtected => "corner_protected",
            Self::CornerExceedsEdge => "corner_exceeds_edge",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One skipped target and the reason it was passed over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skip {
    /// Label of the skipped target, usually an edge key label.
    pub target: String,
    pub reason: SkipReason,
}

impl Skip {
    pub(crate) fn new(target: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            target: target.into(),
            reason,
        }
    }
}

/// What a user's pick resolves to at the operation boundary.
///
/// Selections are resolved into concrete geometry exactly once, before the
/// operation runs; nothing downstream ever sees a raw pick again.
#[derive(Debug, Clone)]
pub enum Selection {
    /// Boundary loops of a picked face, in world coordinates.
    Face(Vec<Vec<Point3>>),
    /// Closed loops of a picked sketch, in world coordinates.
    Sketch(Vec<Vec<Point3>>),
    /// One edge of the sheet tree.
    Edge(EdgeId),
    /// A picked solid body, carried as its serialized snapshot.
    Solid(String),
}

/// Resolves edge-targeting selections into edge ids.
///
/// # Errors
///
/// Returns [`OperationError::InvalidInput`] if a selection is not an edge or
/// if no edges are selected at all.
pub fn resolve_edges(selections: &[Selection]) -> Result<Vec<EdgeId>> {
    let mut edges = Vec::with_capacity(selections.len());
    for selection in selections {
        match selection {
            Selection::Edge(id) => edges.push(*id),
            other => {
                return Err(OperationError::InvalidInput(format!(
                    "expected an edge selection, got {}",
                    selection_kind(other)
                ))
                .into());
            }
        }
    }
    if edges.is_empty() {
        return Err(OperationError::InvalidInput("no edges selected".into()).into());
    }
    Ok(edges)
}

/// Resolves a profile-targeting selection into a cut profile.
///
/// # Errors
///
/// Returns [`OperationError::InvalidInput`] if the selection carries no loops
/// or cannot describe a cut at all.
pub fn resolve_cut_profile(selection: Selection) -> Result<CutProfile> {
    match selection {
        Selection::Face(loops) | Selection::Sketch(loops) => {
            if loops.is_empty() {
                return Err(
                    OperationError::InvalidInput("selection has no closed loops".into()).into(),
                );
            }
            Ok(CutProfile::Loops(loops))
        }
        Selection::Solid(snapshot) => Ok(CutProfile::Solid(snapshot)),
        Selection::Edge(_) => {
            Err(OperationError::InvalidInput("an edge cannot define a cut profile".into()).into())
        }
    }
}

fn selection_kind(selection: &Selection) -> &'static str {
    match selection {
        Selection::Face(_) => "a face",
        Selection::Sketch(_) => "a sketch",
        Selection::Edge(_) => "an edge",
        Selection::Solid(_) => "a solid",
    }
}

// ── selection tests ───────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use slotmap::Key;

    #[test]
    fn skip_reasons_render_as_snake_case() {
        assert_eq!(SkipReason::EdgeAlreadyHasBend.to_string(), "edge_already_has_bend");
        assert_eq!(SkipReason::LegConsumedBySetback.to_string(), "leg_consumed_by_setback");
        assert_eq!(
            SkipReason::ReliefConsumedTargetEdge.to_string(),
            "relief_consumed_target_edge"
        );
        assert_eq!(SkipReason::NoFlatMapping.to_string(), "no_flat_mapping");
        assert_eq!(SkipReason::CornerExceedsEdge.to_string(), "corner_exceeds_edge");
    }

    #[test]
    fn edge_selections_resolve_to_ids() {
        let id = EdgeId::null();
        let resolved = resolve_edges(&[Selection::Edge(id), Selection::Edge(id)]).unwrap();
        assert_eq!(resolved.len(), 2);
    }

    #[test]
    fn face_selection_is_rejected_as_edge_target() {
        let err = resolve_edges(&[Selection::Face(vec![])]);
        assert!(err.is_err());
    }

    #[test]
    fn empty_edge_selection_is_rejected() {
        assert!(resolve_edges(&[]).is_err());
    }

    #[test]
    fn sketch_loops_resolve_to_a_loop_profile() {
        let lp = vec![vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ]];
        match resolve_cut_profile(Selection::Sketch(lp)).unwrap() {
            CutProfile::Loops(loops) => assert_eq!(loops.len(), 1),
            CutProfile::Solid(_) => panic!("expected loops"),
        }
    }

    #[test]
    fn solid_selection_resolves_to_a_snapshot_profile() {
        match resolve_cut_profile(Selection::Solid("{}".into())).unwrap() {
            CutProfile::Solid(s) => assert_eq!(s, "{}"),
            CutProfile::Loops(_) => panic!("expected solid"),
        }
    }

    #[test]
    fn edge_selection_cannot_be_a_cut_profile() {
        assert!(resolve_cut_profile(Selection::Edge(EdgeId::null())).is_err());
    }
}
