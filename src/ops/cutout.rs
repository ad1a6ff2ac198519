//! Cutout: map world-space cut loops onto flats as 2D holes.

use tracing::warn;

use crate::error::{OperationError, Result};
use crate::evaluate::{Evaluated, Evaluator};
use crate::math::polygon_2d::{
    dedup_loop, force_ccw, polygon_contains_loop, signed_area,
};
use crate::math::union_2d::union_loops;
use crate::math::{Point2, Point3, Vector3, MIN_AREA, TOLERANCE};
use crate::tree::{CutoutRecord, FlatId, HoleData, HoleId, SheetTree};

use super::{Skip, SkipReason};

/// Loop z spread below this fraction of the sheet thickness counts as flush
/// with a single plane, so the loop is usable as a 2D hole directly.
const FLUSH_SPREAD_FRACTION: f64 = 1e-2;

/// Minimum |z| component of a loop normal in flat-local coordinates. Below
/// this the loop is edge-on to the flat and cannot be projected onto it.
const EDGE_ON: f64 = 1e-6;

/// What drives the cut.
#[derive(Debug, Clone)]
pub enum CutProfile {
    /// Closed loops from a face or sketch pick, in world coordinates.
    Loops(Vec<Vec<Point3>>),
    /// A serialized cutter solid, replayed as a boolean subtraction at
    /// assembly time.
    Solid(String),
}

#[derive(Debug, Clone)]
pub struct CutoutParams {
    /// Feature identity, kept on the holes for naming and regeneration.
    pub feature_id: String,
    /// Cut depth, must be positive. Holes cut through the sheet.
    pub depth: f64,
}

/// Where one input loop ended up.
#[derive(Debug, Clone)]
pub struct LoopMapping {
    pub loop_index: usize,
    pub flat: FlatId,
    pub holes: Vec<HoleId>,
}

#[derive(Debug, Clone, Default)]
pub struct CutoutReport {
    pub mappings: Vec<LoopMapping>,
    pub skips: Vec<Skip>,
}

/// Applies a cut profile to a sheet tree.
pub struct Cutout {
    profile: CutProfile,
    params: CutoutParams,
}

/// One candidate flat for a loop, cheapest first.
struct Candidate {
    score: f64,
    spread: f64,
    flat: FlatId,
    locals: Vec<Point3>,
    normal: Vector3,
}

impl Cutout {
    #[must_use]
    pub fn new(profile: CutProfile, params: CutoutParams) -> Self {
        Self { profile, params }
    }

    /// Maps the profile onto the tree's flats, or records a boolean cutter.
    ///
    /// # Errors
    ///
    /// Returns [`OperationError::InvalidInput`] for an empty profile, a
    /// non-positive depth, or a degenerate loop, all before any mutation.
    pub fn execute(&self, source: &SheetTree) -> Result<(SheetTree, CutoutReport)> {
        if self.params.feature_id.is_empty() {
            return Err(OperationError::InvalidInput("cutout needs a feature id".into()).into());
        }
        if !self.params.depth.is_finite() || self.params.depth <= 0.0 {
            return Err(OperationError::InvalidInput(format!(
                "cut depth must be positive, got {}",
                self.params.depth
            ))
            .into());
        }

        let mut tree = source.clone();
        let mut report = CutoutReport::default();
        match &self.profile {
            CutProfile::Solid(snapshot) => {
                if snapshot.is_empty() {
                    return Err(
                        OperationError::InvalidInput("cutter snapshot is empty".into()).into(),
                    );
                }
                tree.meta_mut().cutouts.push(CutoutRecord::BooleanSubtract {
                    feature_id: self.params.feature_id.clone(),
                    snapshot: snapshot.clone(),
                });
            }
            CutProfile::Loops(loops) => {
                if loops.is_empty() {
                    return Err(
                        OperationError::InvalidInput("cut profile has no loops".into()).into(),
                    );
                }
                let mut normals = Vec::with_capacity(loops.len());
                for (i, lp) in loops.iter().enumerate() {
                    normals.push(loop_normal(i, lp)?);
                }

                let evaluated = Evaluator::new(source).execute()?;
                let mut all_holes = Vec::new();
                for (i, lp) in loops.iter().enumerate() {
                    match self.map_loop(&mut tree, &evaluated, i, lp, &normals[i])? {
                        Some(mapping) => {
                            all_holes.extend(mapping.holes.iter().copied());
                            report.mappings.push(mapping);
                        }
                        None => {
                            let target = format!("loop {i}");
                            warn!(loop_index = i, reason = %SkipReason::NoFlatMapping, "skipping cut loop");
                            report.skips.push(Skip::new(target, SkipReason::NoFlatMapping));
                        }
                    }
                }
                if !all_holes.is_empty() {
                    tree.meta_mut().cutouts.push(CutoutRecord::MappedHoles {
                        feature_id: self.params.feature_id.clone(),
                        holes: all_holes,
                    });
                }
            }
        }
        tree.validate()?;
        Ok((tree, report))
    }

    /// Tries candidate flats from best score to worst until the loop's hole
    /// outlines land fully inside one of them.
    fn map_loop(
        &self,
        tree: &mut SheetTree,
        evaluated: &Evaluated,
        index: usize,
        lp: &[Point3],
        normal: &Vector3,
    ) -> Result<Option<LoopMapping>> {
        let thickness = tree.thickness();
        let half = thickness / 2.0;

        let mut candidates: Vec<Candidate> = evaluated
            .flats_3d
            .iter()
            .map(|placement| {
                let inverse = placement.world.inverse();
                let locals: Vec<Point3> = lp.iter().map(|p| inverse * p).collect();
                let mut lo = f64::INFINITY;
                let mut hi = f64::NEG_INFINITY;
                let mut sum = 0.0;
                for p in &locals {
                    lo = lo.min(p.z);
                    hi = hi.max(p.z);
                    sum += p.z;
                }
                let spread = hi - lo;
                #[allow(clippy::cast_precision_loss)]
                let mean = sum / locals.len() as f64;
                Candidate {
                    score: mean.abs() + spread,
                    spread,
                    flat: placement.flat,
                    locals,
                    normal: inverse * normal,
                }
            })
            .collect();
        candidates.sort_by(|a, b| a.score.total_cmp(&b.score));

        for candidate in candidates {
            let hole_loops = if candidate.spread <= FLUSH_SPREAD_FRACTION * thickness {
                let mut lp2d: Vec<Point2> = candidate
                    .locals
                    .iter()
                    .map(|p| Point2::new(p.x, p.y))
                    .collect();
                force_ccw(&mut lp2d);
                vec![lp2d]
            } else {
                if candidate.normal.z.abs() <= EDGE_ON {
                    continue;
                }
                let top = project_onto(&candidate.locals, &candidate.normal, half);
                let bottom = project_onto(&candidate.locals, &candidate.normal, -half);
                match union_loops(&[top.clone(), bottom.clone()]) {
                    Ok(merged) => {
                        // cavities in the union would be islands of kept
                        // material inside the hole, which flats cannot carry
                        let mut keep = Vec::new();
                        for m in merged {
                            if signed_area(&m) > MIN_AREA {
                                keep.push(m);
                            } else {
                                warn!(feature = %self.params.feature_id, "dropping island inside cut region");
                            }
                        }
                        keep
                    }
                    Err(error) => {
                        warn!(feature = %self.params.feature_id, %error, "polygon union failed, keeping both projected loops");
                        let mut raw = vec![top, bottom];
                        for lp2d in &mut raw {
                            force_ccw(lp2d);
                        }
                        raw
                    }
                }
            };

            let mut cleaned: Vec<Vec<Point2>> = Vec::with_capacity(hole_loops.len());
            for h in hole_loops {
                let h = dedup_loop(&h);
                if h.len() >= 3 && signed_area(&h).abs() > MIN_AREA {
                    cleaned.push(h);
                }
            }
            if cleaned.is_empty() {
                continue;
            }

            let outline = tree.flat_outline(candidate.flat)?;
            let slack = containment_slack(&outline);
            if !cleaned
                .iter()
                .all(|h| polygon_contains_loop(&outline, h, slack))
            {
                continue;
            }

            let mut holes = Vec::with_capacity(cleaned.len());
            for h in cleaned {
                let id = tree.add_hole(HoleData::new(self.params.feature_id.clone(), h));
                tree.flat_mut(candidate.flat)?.holes.push(id);
                holes.push(id);
            }
            return Ok(Some(LoopMapping {
                loop_index: index,
                flat: candidate.flat,
                holes,
            }));
        }
        Ok(None)
    }
}

/// Slides every loop vertex along the loop normal onto the plane `z = h`.
fn project_onto(locals: &[Point3], normal: &Vector3, h: f64) -> Vec<Point2> {
    locals
        .iter()
        .map(|p| {
            let s = (h - p.z) / normal.z;
            Point2::new(p.x + normal.x * s, p.y + normal.y * s)
        })
        .collect()
}

/// Containment slack proportional to the outline extent.
fn containment_slack(outline: &[Point2]) -> f64 {
    let extent = outline
        .iter()
        .map(|p| p.x.abs().max(p.y.abs()))
        .fold(0.0, f64::max);
    1e-6 * (1.0 + extent)
}

/// Unit normal of a world-space loop, rejecting degenerate loops.
fn loop_normal(index: usize, lp: &[Point3]) -> Result<Vector3> {
    if lp
        .iter()
        .any(|p| !p.coords.iter().all(|c| c.is_finite()))
    {
        return Err(OperationError::InvalidInput(format!(
            "loop {index} contains non-finite coordinates"
        ))
        .into());
    }
    let mut distinct: Vec<Point3> = Vec::with_capacity(lp.len());
    for p in lp {
        if distinct.last().is_none_or(|q| (p - q).norm() > TOLERANCE) {
            distinct.push(*p);
        }
    }
    if distinct.len() < 3 {
        return Err(OperationError::InvalidInput(format!(
            "loop {index} needs at least 3 distinct vertices"
        ))
        .into());
    }
    let mut normal = Vector3::zeros();
    for i in 0..distinct.len() {
        let a = &distinct[i];
        let b = &distinct[(i + 1) % distinct.len()];
        normal.x += (a.y - b.y) * (a.z + b.z);
        normal.y += (a.z - b.z) * (a.x + b.x);
        normal.z += (a.x - b.x) * (a.y + b.y);
    }
    let len = normal.norm();
    if len / 2.0 <= MIN_AREA {
        return Err(OperationError::InvalidInput(format!(
            "loop {index} encloses no area"
        ))
        .into());
    }
    Ok(normal / len)
}

// ── cutout tests ──────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::ops::{Flange, FlangeParams, InsetMode, LegLengthReference, Tab};
    use crate::tree::BaseType;

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

    fn cut(feature_id: &str) -> CutoutParams {
        CutoutParams {
            feature_id: feature_id.into(),
            depth: 1.0,
        }
    }

    fn rectangle(x0: f64, y0: f64, x1: f64, y1: f64, z: f64) -> Vec<Point3> {
        vec![
            Point3::new(x0, y0, z),
            Point3::new(x1, y0, z),
            Point3::new(x1, y1, z),
            Point3::new(x0, y1, z),
        ]
    }

    #[test]
    fn flush_loop_becomes_a_hole_on_the_surface() {
        let source = square_tab(20.0, 1.0);
        let lp = rectangle(-2.0, -2.0, 2.0, 2.0, 0.5);
        let (tree, report) = Cutout::new(CutProfile::Loops(vec![lp]), cut("slot1"))
            .execute(&source)
            .unwrap();

        assert_eq!(report.mappings.len(), 1);
        assert!(report.skips.is_empty());
        let mapping = &report.mappings[0];
        assert_eq!(mapping.flat, tree.root());
        assert_eq!(mapping.holes.len(), 1);

        let hole = tree.hole(mapping.holes[0]).unwrap();
        assert_eq!(hole.cutout_id, "slot1");
        assert_abs_diff_eq!(signed_area(&hole.outline), 16.0, epsilon = 1e-9);
        assert_eq!(tree.flat(tree.root()).unwrap().holes.len(), 1);
        assert!(matches!(
            tree.meta().cutouts[0],
            CutoutRecord::MappedHoles { .. }
        ));
    }

    #[test]
    fn spanning_loop_projects_onto_both_surfaces_and_unions() {
        let source = square_tab(20.0, 1.0);
        // planar loop tilted through the sheet, normal (-2, 0, 8) / |.|
        let lp = vec![
            Point3::new(-3.0, -1.0, -0.5),
            Point3::new(1.0, -1.0, 0.5),
            Point3::new(1.0, 1.0, 0.5),
            Point3::new(-3.0, 1.0, -0.5),
        ];
        let (tree, report) = Cutout::new(CutProfile::Loops(vec![lp]), cut("punch"))
            .execute(&source)
            .unwrap();

        assert_eq!(report.mappings.len(), 1);
        let mapping = &report.mappings[0];
        assert_eq!(mapping.holes.len(), 1, "projections must merge");
        let hole = tree.hole(mapping.holes[0]).unwrap();
        // strips [-3.25, 1] and [-3, 1.25] merge into 4.5 x 2
        assert_abs_diff_eq!(signed_area(&hole.outline), 9.0, epsilon = 1e-9);
    }

    #[test]
    fn loop_on_a_folded_wall_maps_to_that_wall() {
        let source = square_tab(20.0, 1.0);
        let target = source.flat(source.root()).unwrap().edges[0];
        let params = FlangeParams {
            angle_deg: 90.0,
            inside_radius: 1.0,
            k_factor: 0.4,
            leg_length: 6.0,
            leg_length_reference: LegLengthReference::Web,
            inset_mode: InsetMode::BendOutside,
            offset: 0.0,
        };
        let (folded, _) = Flange::new(vec![target], params).execute(&source).unwrap();
        let child = folded.flat_ids().find(|&f| f != folded.root()).unwrap();

        let evaluated = Evaluator::new(&folded).execute().unwrap();
        let child_world = *evaluated.flat_world(child).unwrap();
        let lp: Vec<Point3> = rectangle(2.0, 1.0, 4.0, 3.0, 0.5)
            .into_iter()
            .map(|p| child_world * p)
            .collect();

        let (tree, report) = Cutout::new(CutProfile::Loops(vec![lp]), cut("vent"))
            .execute(&folded)
            .unwrap();
        assert_eq!(report.mappings.len(), 1);
        assert_eq!(report.mappings[0].flat, child);
        let hole = tree.hole(report.mappings[0].holes[0]).unwrap();
        assert_abs_diff_eq!(signed_area(&hole.outline), 4.0, epsilon = 1e-9);
    }

    #[test]
    fn unmappable_loops_are_skipped_per_loop() {
        let source = square_tab(20.0, 1.0);
        let outside = rectangle(30.0, 30.0, 34.0, 34.0, 0.5);
        let inside = rectangle(-2.0, -2.0, 2.0, 2.0, 0.5);
        let (tree, report) = Cutout::new(CutProfile::Loops(vec![outside, inside]), cut("pair"))
            .execute(&source)
            .unwrap();

        assert_eq!(report.mappings.len(), 1);
        assert_eq!(report.mappings[0].loop_index, 1);
        assert_eq!(report.skips.len(), 1);
        assert_eq!(report.skips[0].reason, SkipReason::NoFlatMapping);
        assert_eq!(report.skips[0].target, "loop 0");
        assert_eq!(tree.flat(tree.root()).unwrap().holes.len(), 1);
    }

    #[test]
    fn edge_on_loop_cannot_be_projected() {
        let source = square_tab(20.0, 1.0);
        let vertical = vec![
            Point3::new(0.0, 0.0, -0.5),
            Point3::new(2.0, 0.0, -0.5),
            Point3::new(2.0, 0.0, 0.5),
            Point3::new(0.0, 0.0, 0.5),
        ];
        let (_, report) = Cutout::new(CutProfile::Loops(vec![vertical]), cut("edgeon"))
            .execute(&source)
            .unwrap();
        assert!(report.mappings.is_empty());
        assert_eq!(report.skips[0].reason, SkipReason::NoFlatMapping);
    }

    #[test]
    fn solid_profile_records_a_boolean_subtraction() {
        let source = square_tab(20.0, 1.0);
        let (tree, report) = Cutout::new(
            CutProfile::Solid("{\"kind\":\"cylinder\"}".into()),
            cut("legacy7"),
        )
        .execute(&source)
        .unwrap();
        assert!(report.mappings.is_empty());
        match &tree.meta().cutouts[0] {
            CutoutRecord::BooleanSubtract {
                feature_id,
                snapshot,
            } => {
                assert_eq!(feature_id, "legacy7");
                assert!(snapshot.contains("cylinder"));
            }
            CutoutRecord::MappedHoles { .. } => panic!("expected a boolean record"),
        }
        assert_eq!(tree.meta().base_type, BaseType::Tab);
    }

    #[test]
    fn invalid_profiles_are_rejected_before_mutation() {
        let source = square_tab(20.0, 1.0);
        assert!(
            Cutout::new(CutProfile::Loops(vec![]), cut("x"))
                .execute(&source)
                .is_err()
        );
        let degenerate = vec![Point3::new(0.0, 0.0, 0.5), Point3::new(1.0, 0.0, 0.5)];
        assert!(
            Cutout::new(CutProfile::Loops(vec![degenerate]), cut("x"))
                .execute(&source)
                .is_err()
        );
        let lp = rectangle(-2.0, -2.0, 2.0, 2.0, 0.5);
        let mut bad_depth = cut("x");
        bad_depth.depth = 0.0;
        assert!(
            Cutout::new(CutProfile::Loops(vec![lp.clone()]), bad_depth)
                .execute(&source)
                .is_err()
        );
        let mut no_id = cut("x");
        no_id.feature_id.clear();
        assert!(
            Cutout::new(CutProfile::Loops(vec![lp]), no_id)
                .execute(&source)
                .is_err()
        );
        assert!(
            Cutout::new(CutProfile::Solid(String::new()), cut("x"))
                .execute(&source)
                .is_err()
        );
    }
}
