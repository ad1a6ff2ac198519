//! Durable identity for faces and edges on the assembled mesh.
//!
//! Default face names embed the owning feature id, but renames applied by a
//! user must survive regeneration, when every face is re-emitted under a
//! fresh default name. The stable key is the feature-independent part of a
//! face's identity; saved names are re-attached by key after assembly, as an
//! explicit pass with no hidden state on the container.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::evaluate::Evaluated;
use crate::math::Point3;
use crate::tree::{key_label, BendId, EdgeId, FlatId, HoleId, SheetTree};

use super::sink::SolidSink;
use super::AssemblyStats;

/// Which sheet surface a skin face lies on: `A` is the `+t/2` side of the
/// midplane, `B` the `-t/2` side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SheetSide {
    A,
    B,
}

impl SheetSide {
    #[must_use]
    fn tag(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
        }
    }

    #[must_use]
    fn key_tag(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
        }
    }
}

/// Which end of a bend sweep a cap face closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapEnd {
    Start,
    End,
}

impl CapEnd {
    #[must_use]
    fn tag(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::End => "END",
        }
    }

    #[must_use]
    fn key_tag(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
        }
    }
}

/// Identity of one named face on the mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaceKind {
    /// Top or bottom skin of a flat.
    FlatSkin { flat: FlatId, side: SheetSide },
    /// Side wall along one boundary edge of a flat.
    FlatWall { flat: FlatId, edge: EdgeId },
    /// Wall of one segment of a cutout hole.
    HoleWall {
        flat: FlatId,
        hole: HoleId,
        segment: usize,
    },
    /// Inner or outer surface of a bend cylinder.
    BendSkin { bend: BendId, side: SheetSide },
    /// Flat cap closing one end of a bend sweep.
    BendCap { bend: BendId, end: CapEnd },
}

/// Metadata attached to every emitted face.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaceMetadata {
    /// Feature that emitted the face.
    pub feature: String,
    pub kind: FaceKind,
}

/// Metadata attached to boundary edges, pointing back into the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeMetadata {
    pub flat: FlatId,
    pub edge: EdgeId,
}

/// A user-assigned face name captured before regeneration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedName {
    pub stable_key: String,
    pub name: String,
}

/// Default name of a face, embedding the feature id.
#[must_use]
pub fn face_name(feature: &str, kind: &FaceKind) -> String {
    match kind {
        FaceKind::FlatSkin { flat, side } => {
            format!("{feature}:FLAT:{}:{}", key_label(*flat), side.tag())
        }
        FaceKind::FlatWall { flat, edge } => {
            format!("{feature}:FLAT:{}:SIDE:{}", key_label(*flat), key_label(*edge))
        }
        FaceKind::HoleWall {
            flat,
            hole,
            segment,
        } => format!(
            "{feature}:FLAT:{}:CUTOUT:{}:EDGE:{segment}",
            key_label(*flat),
            key_label(*hole),
        ),
        FaceKind::BendSkin { bend, side } => {
            format!("{feature}:BEND:{}:{}", key_label(*bend), side.tag())
        }
        FaceKind::BendCap { bend, end } => {
            format!("{feature}:BEND:{}:END:{}", key_label(*bend), end.tag())
        }
    }
}

/// Feature-independent identity key of a face, `kind|id|side`. Two meshes
/// regenerated from the same tree agree on these keys even when the feature
/// id changes.
#[must_use]
pub fn stable_key(kind: &FaceKind) -> String {
    match kind {
        FaceKind::FlatSkin { flat, side } => {
            format!("flat|{}|{}", key_label(*flat), side.key_tag())
        }
        FaceKind::FlatWall { edge, .. } => format!("wall|{}|-", key_label(*edge)),
        FaceKind::HoleWall { hole, segment, .. } => {
            format!("hole|{}|{segment}", key_label(*hole))
        }
        FaceKind::BendSkin { bend, side } => {
            format!("bend|{}|{}", key_label(*bend), side.key_tag())
        }
        FaceKind::BendCap { bend, end } => format!("cap|{}|{}", key_label(*bend), end.key_tag()),
    }
}

/// Re-attaches saved face names to a freshly assembled mesh by stable key.
///
/// Returns how many names found their face again. Names whose key no longer
/// exists (the feature was deleted or its geometry vanished) are dropped
/// silently.
pub fn reattach_names<S: SolidSink>(
    sink: &mut S,
    stats: &AssemblyStats,
    saved: &[SavedName],
) -> usize {
    let mut reattached = 0;
    for entry in saved {
        let hit = stats
            .face_keys
            .iter()
            .find(|(_, key)| *key == entry.stable_key);
        if let Some((default_name, _)) = hit {
            if sink.rename_face(default_name, &entry.name) {
                reattached += 1;
            }
        }
    }
    reattached
}

/// One candidate rim segment a boundary edge can map onto.
struct RimSegment {
    flat: FlatId,
    edge: EdgeId,
    start: Point3,
    end: Point3,
    length: f64,
}

/// Maps the container's boundary edges back onto tree edges.
///
/// Every tree edge owns two rims in 3D, one per sheet surface. A boundary
/// polyline is matched to the rim segment whose endpoints it meets within a
/// relative tolerance; among several hits the best endpoint fit wins, with a
/// length penalty breaking ties. Returns the number of edges mapped;
/// unmatched edges (for example the vertical corners of side walls) keep no
/// metadata.
///
/// # Errors
///
/// Returns an error if the tree references missing entities.
pub fn map_boundary_edges<S: SolidSink>(
    tree: &SheetTree,
    evaluated: &Evaluated,
    sink: &mut S,
) -> Result<usize> {
    let half = tree.thickness() / 2.0;
    let mut candidates = Vec::new();
    for placement in &evaluated.flats_3d {
        let flat = tree.flat(placement.flat)?;
        for &edge_id in &flat.edges {
            let edge = tree.edge(edge_id)?;
            for w in edge.polyline.windows(2) {
                for h in [half, -half] {
                    let start = placement.world * Point3::new(w[0].x, w[0].y, h);
                    let end = placement.world * Point3::new(w[1].x, w[1].y, h);
                    candidates.push(RimSegment {
                        flat: placement.flat,
                        edge: edge_id,
                        length: (end - start).norm(),
                        start,
                        end,
                    });
                }
            }
        }
    }

    let mut mapped = 0;
    for (name, polyline) in sink.boundary_edge_polylines() {
        if polyline.len() < 2 {
            continue;
        }
        let s = polyline[0];
        let e = polyline[polyline.len() - 1];
        let polyline_length: f64 = polyline.windows(2).map(|w| (w[1] - w[0]).norm()).sum();

        let mut best: Option<(f64, &RimSegment)> = None;
        for cand in &candidates {
            let forward = (s - cand.start).norm() + (e - cand.end).norm();
            let reverse = (s - cand.end).norm() + (e - cand.start).norm();
            let ends = forward.min(reverse);
            if ends > 1e-6 * (1.0 + cand.length) {
                continue;
            }
            let score = ends + 0.1 * (polyline_length - cand.length).abs();
            if best.as_ref().is_none_or(|(b, _)| score < *b) {
                best = Some((score, cand));
            }
        }
        if let Some((_, cand)) = best {
            sink.set_edge_metadata(
                &name,
                EdgeMetadata {
                    flat: cand.flat,
                    edge: cand.edge,
                },
            );
            mapped += 1;
        }
    }
    Ok(mapped)
}

// ── naming tests ──────────────────────────────────────────────────────────
