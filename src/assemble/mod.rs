//! Mesh assembly: emits an evaluated sheet tree as named triangles on a
//! [`SolidSink`].
//!
//! Every flat becomes two triangulated skins offset `±t/2` from its
//! midplane plus prismatic walls; every bend becomes a ruled sweep between
//! the parent's hinge rim and the child's attach rim, capped at both ends.
//! Faces are named for durable identity, boundary edges are mapped back to
//! tree edges, recorded legacy boolean cutouts are replayed, and the mesh
//! is sealed.

mod faces;
mod sweep;

pub mod naming;
pub mod sink;

pub use naming::{
    map_boundary_edges, reattach_names, CapEnd, EdgeMetadata, FaceKind, FaceMetadata, SavedName,
    SheetSide,
};
pub use sink::{MeshBuffer, SolidSink};

use tracing::debug;

use crate::error::Result;
use crate::evaluate::Evaluated;
use crate::math::Point3;
use crate::tree::{CutoutRecord, SheetTree};

/// Triangles below this area are dropped instead of emitted.
const MIN_TRIANGLE_AREA: f64 = 1e-12;

/// Counters and the face-key table produced by one assembly run.
#[derive(Debug, Clone, Default)]
pub struct AssemblyStats {
    pub triangles: usize,
    /// Degenerate triangles dropped during emission.
    pub dropped_triangles: usize,
    pub faces: usize,
    /// Default face names paired with their stable keys, emission order.
    pub face_keys: Vec<(String, String)>,
    pub boolean_subtractions: usize,
    pub mapped_edges: usize,
}

/// Emits an evaluated sheet tree into a solid container.
pub struct MeshAssembler<'a> {
    tree: &'a SheetTree,
    evaluated: &'a Evaluated,
    feature: String,
}

impl<'a> MeshAssembler<'a> {
    /// Creates an assembler emitting under the given feature id.
    #[must_use]
    pub fn new(tree: &'a SheetTree, evaluated: &'a Evaluated, feature: impl Into<String>) -> Self {
        Self {
            tree,
            evaluated,
            feature: feature.into(),
        }
    }

    /// Emits every flat and bend, maps boundary edges back onto the tree,
    /// replays recorded boolean cutouts and seals the mesh.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree references missing entities, a flat
    /// cannot be triangulated, or the container fails to seal the mesh.
    pub fn assemble<S: SolidSink>(&self, sink: &mut S) -> Result<AssemblyStats> {
        let mut stats = AssemblyStats::default();
        for placement in &self.evaluated.flats_3d {
            faces::emit_flat(self.tree, placement, &self.feature, sink, &mut stats)?;
        }
        for placement in &self.evaluated.bends_3d {
            sweep::emit_bend(self.tree, placement, &self.feature, sink, &mut stats)?;
        }
        stats.mapped_edges = naming::map_boundary_edges(self.tree, self.evaluated, sink)?;

        for record in &self.tree.meta().cutouts {
            if let CutoutRecord::BooleanSubtract {
                feature_id,
                snapshot,
            } = record
            {
                debug!(feature = %feature_id, "replaying recorded boolean cutout");
                sink.subtract(snapshot)?;
                stats.boolean_subtractions += 1;
            }
        }

        sink.finalize_manifold()?;
        debug!(
            triangles = stats.triangles,
            faces = stats.faces,
            dropped = stats.dropped_triangles,
            "assembly finished"
        );
        Ok(stats)
    }
}

/// Registers a face on the sink and in the stats tables, returning its
/// default name.
fn declare_face<S: SolidSink>(
    sink: &mut S,
    stats: &mut AssemblyStats,
    feature: &str,
    kind: &FaceKind,
) -> String {
    let name = naming::face_name(feature, kind);
    sink.set_face_metadata(
        &name,
        FaceMetadata {
            feature: feature.to_string(),
            kind: kind.clone(),
        },
    );
    stats.faces += 1;
    stats
        .face_keys
        .push((name.clone(), naming::stable_key(kind)));
    name
}

/// Emits one triangle unless it is degenerate.
fn emit_checked<S: SolidSink>(
    sink: &mut S,
    stats: &mut AssemblyStats,
    face: &str,
    a: Point3,
    b: Point3,
    c: Point3,
) {
    let area = (b - a).cross(&(c - a)).norm() / 2.0;
    if area <= MIN_TRIANGLE_AREA {
        stats.dropped_triangles += 1;
        return;
    }
    sink.add_triangle(face, a, b, c);
    stats.triangles += 1;
}

// ── assembly tests ────────────────────────────────────────────────────────
