//! Flange: fold a rectangular leg off a straight outline edge.

use tracing::warn;

use crate::error::{OperationError, Result, TreeError};
use crate::math::intersect_2d::line_line_parameters;
use crate::math::polygon_2d::{perp_right, segment_direction};
use crate::math::{Point2, Vector2, MIN_LEG, TOLERANCE};
use crate::tree::{key_label, BendChild, BendData, EdgeData, EdgeId, FlatData, FlatId, SheetTree};

use super::{Skip, SkipReason};

/// Shortening applied to the shifted edge on every bridged side when a bridge
/// would double back over a protected neighbor. Keeps the rebuilt outline free
/// of exactly collinear overlaps.
pub const RELIEF_JOG: f64 = 1e-4;

/// Which surface of the finished leg the `leg_length` parameter measures to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegLengthReference {
    /// To the inside tangent of the bend.
    Inside,
    /// To the outside tangent of the bend.
    Outside,
    /// The full web length, no setback.
    Web,
}

/// Where the folded material sits relative to the original edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsetMode {
    /// Bend and leg stay entirely inside the original footprint.
    MaterialInside,
    /// Bend arc inside, leg thickness outside.
    MaterialOutside,
    /// Bend starts at the original edge, everything beyond it.
    BendOutside,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlangeParams {
    /// Fold angle in degrees, strictly between 0 and 180.
    pub angle_deg: f64,
    /// Inside bend radius, non-negative.
    pub inside_radius: f64,
    /// Neutral-axis factor in `[0, 1]`.
    pub k_factor: f64,
    /// Leg length measured per `leg_length_reference`.
    pub leg_length: f64,
    pub leg_length_reference: LegLengthReference,
    pub inset_mode: InsetMode,
    /// Extra outward offset subtracted from the inset shift.
    pub offset: f64,
}

/// What happened to each requested target.
#[derive(Debug, Clone, Default)]
pub struct FlangeReport {
    pub applied: usize,
    pub skips: Vec<Skip>,
}

/// Adds a flange to each targeted edge of a sheet tree.
pub struct Flange {
    targets: Vec<EdgeId>,
    params: FlangeParams,
}

/// How one neighbor of the shifted edge is reconnected.
#[derive(Clone, Copy)]
enum SideAction {
    /// Replace the neighbor's corner vertex with the intersection point.
    Trim { edge: EdgeId, point: Point2 },
    /// Keep the neighbor, insert a connecting edge to the shifted line.
    Bridge,
}

/// Fully planned outline rebuild for one target. Nothing is mutated until a
/// plan has passed every check.
struct ShiftPlan {
    target_index: usize,
    start: SideAction,
    end: SideAction,
    old_start: Point2,
    old_end: Point2,
    new_start: Point2,
    new_end: Point2,
}

enum Planned {
    Keep,
    Rebuild(ShiftPlan),
    Skip(SkipReason),
}

impl Flange {
    #[must_use]
    pub fn new(targets: Vec<EdgeId>, params: FlangeParams) -> Self {
        Self { targets, params }
    }

    /// Applies the flange to every target, collecting per-target skips.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::InvalidInput`] for out-of-range parameters
    /// before anything is touched, and a tree error if a target id does not
    /// exist in the source.
    pub fn execute(&self, source: &SheetTree) -> Result<(SheetTree, FlangeReport)> {
        self.validate()?;
        let mut tree = source.clone();
        let mut report = FlangeReport::default();
        for &target in &self.targets {
            match self.apply_one(&mut tree, target)? {
                None => report.applied += 1,
                Some(reason) => {
                    let label = key_label(target);
                    warn!(edge = %label, reason = %reason, "skipping flange target");
                    report.skips.push(Skip::new(label, reason));
                }
            }
        }
        tree.validate()?;
        Ok((tree, report))
    }

    fn validate(&self) -> Result<()> {
        let p = &self.params;
        if !p.angle_deg.is_finite() || p.angle_deg <= 0.0 || p.angle_deg >= 180.0 {
            return Err(OperationError::InvalidInput(format!(
                "flange angle must be in (0, 180) degrees, got {}",
                p.angle_deg
            ))
            .into());
        }
        if !p.leg_length.is_finite() || p.leg_length <= MIN_LEG {
            return Err(OperationError::InvalidInput(format!(
                "leg length must exceed {MIN_LEG}, got {}",
                p.leg_length
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
        if !p.offset.is_finite() {
            return Err(
                OperationError::InvalidInput("offset must be finite".into()).into(),
            );
        }
        Ok(())
    }

    /// Applies one target. `Ok(None)` means applied, `Ok(Some(_))` skipped.
    fn apply_one(&self, tree: &mut SheetTree, target: EdgeId) -> Result<Option<SkipReason>> {
        let edge = tree.edge(target)?;
        if edge.bend.is_some() {
            return Ok(Some(SkipReason::EdgeAlreadyHasBend));
        }
        if edge.is_attach_edge {
            return Ok(Some(SkipReason::EdgeIsAttach));
        }
        if !edge.is_straight() {
            return Ok(Some(SkipReason::EdgeNotStraight));
        }
        if segment_direction(&edge.start(), &edge.end()).is_err() {
            return Ok(Some(SkipReason::EdgeNotStraight));
        }
        let owner = tree.owner_of_edge(target)?;

        let t = tree.thickness();
        let r_i = self.params.inside_radius;
        let half_tan = (self.params.angle_deg.to_radians() / 2.0).tan();
        let setback = match self.params.leg_length_reference {
            LegLengthReference::Inside => r_i * half_tan,
            LegLengthReference::Outside => (r_i + t) * half_tan,
            LegLengthReference::Web => 0.0,
        };
        let height = self.params.leg_length - setback;
        if height <= MIN_LEG {
            return Ok(Some(SkipReason::LegConsumedBySetback));
        }

        let base_shift = match self.params.inset_mode {
            InsetMode::MaterialInside => t + r_i,
            InsetMode::MaterialOutside => r_i,
            InsetMode::BendOutside => 0.0,
        };
        let shift = base_shift - self.params.offset;

        match plan_shift(tree, owner, target, shift)? {
            Planned::Skip(reason) => return Ok(Some(reason)),
            Planned::Keep => {}
            Planned::Rebuild(plan) => commit_shift(tree, owner, target, plan)?,
        }

        let edge = tree.edge(target)?;
        let length = (edge.end() - edge.start()).norm();
        let attach = tree.add_edge(EdgeData::attach(vec![
            Point2::new(0.0, 0.0),
            Point2::new(length, 0.0),
        ]));
        let side = tree.add_edge(EdgeData::new(vec![
            Point2::new(length, 0.0),
            Point2::new(length, height),
        ]));
        let top = tree.add_edge(EdgeData::new(vec![
            Point2::new(length, height),
            Point2::new(0.0, height),
        ]));
        let back = tree.add_edge(EdgeData::new(vec![
            Point2::new(0.0, height),
            Point2::new(0.0, 0.0),
        ]));
        let child = tree.add_flat(FlatData::new(vec![attach, side, top, back]));

        let mut bend = BendData::new(self.params.angle_deg, r_i + t / 2.0, self.params.k_factor);
        bend.children.push(BendChild {
            flat: child,
            attach_edge: attach,
        });
        let bend_id = tree.add_bend(bend);
        tree.edge_mut(target)?.bend = Some(bend_id);
        Ok(None)
    }
}

/// Plans the outline rebuild for an inset shift without touching the tree.
fn plan_shift(
    tree: &SheetTree,
    owner: FlatId,
    target: EdgeId,
    shift: f64,
) -> Result<Planned> {
    if shift.abs() <= TOLERANCE {
        return Ok(Planned::Keep);
    }

    let flat = tree.flat(owner)?;
    let n = flat.edges.len();
    let Some(target_index) = flat.edges.iter().position(|&e| e == target) else {
        return Err(TreeError::InvalidStructure(format!(
            "edge {} is not part of flat {}",
            key_label(target),
            key_label(owner)
        ))
        .into());
    };
    let prev_id = flat.edges[(target_index + n - 1) % n];
    let next_id = flat.edges[(target_index + 1) % n];
    let prev = tree.edge(prev_id)?;
    let next = tree.edge(next_id)?;
    let edge = tree.edge(target)?;

    let old_start = edge.start();
    let old_end = edge.end();
    let dir = segment_direction(&old_start, &old_end)?;
    let outward = perp_right(&dir);
    let moved_start = old_start - outward * shift;
    let moved_end = old_end - outward * shift;

    let start = if prev.bend.is_some() || prev.is_attach_edge {
        SideAction::Bridge
    } else {
        let q = prev.polyline[prev.polyline.len() - 2];
        match trim_to_line(&q, &old_start, &moved_start, &dir) {
            Some(point) => SideAction::Trim {
                edge: prev_id,
                point,
            },
            None => SideAction::Bridge,
        }
    };
    let end = if next.bend.is_some() || next.is_attach_edge {
        SideAction::Bridge
    } else {
        let q = next.polyline[1];
        match trim_to_line(&q, &old_end, &moved_end, &dir) {
            Some(point) => SideAction::Trim {
                edge: next_id,
                point,
            },
            None => SideAction::Bridge,
        }
    };

    // A bridge that runs exactly back along its neighbor would leave two
    // collinear overlapping segments in the outline. Shorten the shifted edge
    // on every bridged side in that case.
    let mut jog = false;
    if matches!(start, SideAction::Bridge) {
        let incoming = prev.polyline[prev.polyline.len() - 2];
        if doubles_back(&incoming, &old_start, &moved_start) {
            jog = true;
        }
    }
    if matches!(end, SideAction::Bridge) {
        let outgoing = next.polyline[1];
        if doubles_back(&outgoing, &old_end, &moved_end) {
            jog = true;
        }
    }

    let mut new_start = match start {
        SideAction::Trim { point, .. } => point,
        SideAction::Bridge => moved_start,
    };
    let mut new_end = match end {
        SideAction::Trim { point, .. } => point,
        SideAction::Bridge => moved_end,
    };
    if jog {
        if matches!(start, SideAction::Bridge) {
            new_start += dir * RELIEF_JOG;
        }
        if matches!(end, SideAction::Bridge) {
            new_end -= dir * RELIEF_JOG;
        }
    }

    if (new_end - new_start).dot(&dir) <= MIN_LEG {
        return Ok(Planned::Skip(SkipReason::ReliefConsumedTargetEdge));
    }

    let mut segments = 0usize;
    for &e in &flat.edges {
        segments += tree.edge(e)?.polyline.len() - 1;
    }
    segments += usize::from(matches!(start, SideAction::Bridge));
    segments += usize::from(matches!(end, SideAction::Bridge));
    if segments < 3 {
        return Ok(Planned::Skip(SkipReason::InsufficientSegments));
    }

    Ok(Planned::Rebuild(ShiftPlan {
        target_index,
        start,
        end,
        old_start,
        old_end,
        new_start,
        new_end,
    }))
}

/// Applies a planned rebuild: trims neighbor corners, inserts bridge edges,
/// and moves the target polyline onto the shifted line.
fn commit_shift(
    tree: &mut SheetTree,
    owner: FlatId,
    target: EdgeId,
    plan: ShiftPlan,
) -> Result<()> {
    if let SideAction::Trim { edge, point } = plan.start {
        let data = tree.edge_mut(edge)?;
        if let Some(last) = data.polyline.last_mut() {
            *last = point;
        }
    }
    if let SideAction::Trim { edge, point } = plan.end {
        let data = tree.edge_mut(edge)?;
        if let Some(first) = data.polyline.first_mut() {
            *first = point;
        }
    }

    let start_bridge = matches!(plan.start, SideAction::Bridge)
        .then(|| tree.add_edge(EdgeData::new(vec![plan.old_start, plan.new_start])));
    let end_bridge = matches!(plan.end, SideAction::Bridge)
        .then(|| tree.add_edge(EdgeData::new(vec![plan.new_end, plan.old_end])));

    let flat = tree.flat_mut(owner)?;
    if let Some(id) = end_bridge {
        flat.edges.insert(plan.target_index + 1, id);
    }
    if let Some(id) = start_bridge {
        flat.edges.insert(plan.target_index, id);
    }

    tree.edge_mut(target)?.polyline = vec![plan.new_start, plan.new_end];
    Ok(())
}

/// Intersects the neighbor segment `q -> corner` with the shifted edge line.
/// Returns the trim point, or `None` when the lines are parallel or the
/// trimmed segment would be reversed or shorter than usable.
fn trim_to_line(
    q: &Point2,
    corner: &Point2,
    on_line: &Point2,
    line_dir: &Vector2,
) -> Option<Point2> {
    let seg = corner - q;
    let (t_param, _) = line_line_parameters(q, &seg, on_line, line_dir)?;
    if t_param * seg.norm() <= MIN_LEG {
        return None;
    }
    Some(q + seg * t_param)
}

/// True when the bridge from `corner` to `moved` runs anti-parallel to the
/// neighbor segment between `neighbor_point` and `corner`.
fn doubles_back(neighbor_point: &Point2, corner: &Point2, moved: &Point2) -> bool {
    let bridge = moved - corner;
    let neighbor = corner - neighbor_point;
    let lengths = bridge.norm() * neighbor.norm();
    if lengths <= TOLERANCE {
        return false;
    }
    bridge.dot(&neighbor) / lengths < -(1.0 - 1e-9)
}

// ── flange tests ──────────────────────────────────────────────────────────
