use std::collections::{HashMap, HashSet};

use crate::error::{AssemblyError, Result};
use crate::math::Point3;

use super::naming::{EdgeMetadata, FaceMetadata};

/// Write-side interface of the external solid container.
///
/// The assembler emits named triangles and metadata through this trait and
/// never reads geometry back, except for the boundary-edge listing used to
/// attach edge metadata after emission.
pub trait SolidSink {
    /// Appends one triangle to the named face. Vertices arrive in
    /// counter-clockwise order seen from outside the material.
    fn add_triangle(&mut self, face: &str, a: Point3, b: Point3, c: Point3);

    /// Attaches identity metadata to a face.
    fn set_face_metadata(&mut self, face: &str, meta: FaceMetadata);

    /// Attaches identity metadata to a boundary edge.
    fn set_edge_metadata(&mut self, edge: &str, meta: EdgeMetadata);

    /// Lists named boundary edges with their polylines. For triangle
    /// containers these are the open borders of each named face.
    fn boundary_edge_polylines(&self) -> Vec<(String, Vec<Point3>)>;

    /// Subtracts a recorded cutter solid, given as its serialized snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot replay the subtraction.
    fn subtract(&mut self, cutter_snapshot: &str) -> Result<()>;

    /// Renames a face, keeping its triangles and metadata. Returns false if
    /// no face carries the old name.
    fn rename_face(&mut self, old_name: &str, new_name: &str) -> bool;

    /// Called once after emission so the container can seal the mesh.
    ///
    /// # Errors
    ///
    /// Returns an error if the mesh cannot be sealed into a closed solid.
    fn finalize_manifold(&mut self) -> Result<()>;
}

/// Vertices closer than this are the same point. Separate surfaces of the
/// sheet sit at least a leg length apart, far above this band; only seams
/// that differ by accumulated rounding fall inside it.
const WELD_EPS: f64 = 1e-9;

/// Plain in-memory container: a named triangle list with metadata tables.
///
/// Stands in for the real solid container in tests and headless callers.
/// Boolean subtractions are recorded, not carved.
#[derive(Debug, Clone, Default)]
pub struct MeshBuffer {
    triangles: Vec<(String, [Point3; 3])>,
    face_meta: HashMap<String, FaceMetadata>,
    edge_meta: HashMap<String, EdgeMetadata>,
    subtractions: Vec<String>,
    finalized: bool,
}

impl MeshBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total triangle count across all faces.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Triangles of one face, in emission order.
    #[must_use]
    pub fn triangles_of(&self, face: &str) -> Vec<[Point3; 3]> {
        self.triangles
            .iter()
            .filter(|(name, _)| name == face)
            .map(|(_, tri)| *tri)
            .collect()
    }

    /// Distinct face names, in first-emission order.
    #[must_use]
    pub fn face_names(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();
        for (name, _) in &self.triangles {
            if seen.insert(name.as_str()) {
                names.push(name.clone());
            }
        }
        names
    }

    /// Metadata attached to a face, if any.
    #[must_use]
    pub fn face_metadata(&self, face: &str) -> Option<&FaceMetadata> {
        self.face_meta.get(face)
    }

    /// Metadata attached to a boundary edge, if any.
    #[must_use]
    pub fn edge_metadata(&self, edge: &str) -> Option<&EdgeMetadata> {
        self.edge_meta.get(edge)
    }

    /// Recorded boolean subtractions, oldest first.
    #[must_use]
    pub fn subtractions(&self) -> &[String] {
        &self.subtractions
    }

    /// Whether `finalize_manifold` has been called.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Number of undirected edges not shared by exactly two triangles.
    /// Zero on a closed mesh.
    #[must_use]
    pub fn open_edge_count(&self) -> usize {
        let mut counts: HashMap<([u64; 3], [u64; 3]), usize> = HashMap::new();
        for (_, tri) in &self.triangles {
            for i in 0..3 {
                let a = point_key(&tri[i]);
                let b = point_key(&tri[(i + 1) % 3]);
                let key = if a <= b { (a, b) } else { (b, a) };
                *counts.entry(key).or_insert(0) += 1;
            }
        }
        counts.values().filter(|&&c| c != 2).count()
    }
}

/// Exact-bit key for a vertex, so shared triangle edges cancel.
fn point_key(p: &Point3) -> [u64; 3] {
    [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]
}

/// Spatial hash cell of a vertex at the weld resolution.
#[allow(clippy::cast_possible_truncation)]
fn weld_cell(p: &Point3) -> [i64; 3] {
    [
        (p.x / WELD_EPS).floor() as i64,
        (p.y / WELD_EPS).floor() as i64,
        (p.z / WELD_EPS).floor() as i64,
    ]
}

impl SolidSink for MeshBuffer {
    fn add_triangle(&mut self, face: &str, a: Point3, b: Point3, c: Point3) {
        self.triangles.push((face.to_string(), [a, b, c]));
    }

    fn set_face_metadata(&mut self, face: &str, meta: FaceMetadata) {
        self.face_meta.insert(face.to_string(), meta);
    }

    fn set_edge_metadata(&mut self, edge: &str, meta: EdgeMetadata) {
        self.edge_meta.insert(edge.to_string(), meta);
    }

    fn boundary_edge_polylines(&self) -> Vec<(String, Vec<Point3>)> {
        type SegKey = ([u64; 3], [u64; 3]);
        let mut counts: HashMap<(&str, SegKey), usize> = HashMap::new();
        for (face, tri) in &self.triangles {
            for i in 0..3 {
                let a = point_key(&tri[i]);
                let b = point_key(&tri[(i + 1) % 3]);
                let key = if a <= b { (a, b) } else { (b, a) };
                *counts.entry((face.as_str(), key)).or_insert(0) += 1;
            }
        }

        let mut out = Vec::new();
        let mut emitted: HashSet<(&str, SegKey)> = HashSet::new();
        let mut per_face: HashMap<&str, usize> = HashMap::new();
        for (face, tri) in &self.triangles {
            for i in 0..3 {
                let pa = tri[i];
                let pb = tri[(i + 1) % 3];
                let a = point_key(&pa);
                let b = point_key(&pb);
                let key = if a <= b { (a, b) } else { (b, a) };
                let face_key = (face.as_str(), key);
                if counts.get(&face_key) == Some(&1) && emitted.insert(face_key) {
                    let n = per_face.entry(face.as_str()).or_insert(0);
                    out.push((format!("{face}#{n}"), vec![pa, pb]));
                    *n += 1;
                }
            }
        }
        out
    }

    fn subtract(&mut self, cutter_snapshot: &str) -> Result<()> {
        self.subtractions.push(cutter_snapshot.to_string());
        Ok(())
    }

    fn rename_face(&mut self, old_name: &str, new_name: &str) -> bool {
        let mut hit = false;
        for (face, _) in &mut self.triangles {
            if face == old_name {
                new_name.clone_into(face);
                hit = true;
            }
        }
        if let Some(meta) = self.face_meta.remove(old_name) {
            self.face_meta.insert(new_name.to_string(), meta);
            hit = true;
        }
        hit
    }

    fn finalize_manifold(&mut self) -> Result<()> {
        // Seams between separately emitted faces agree only up to rounding.
        // Weld vertices within the epsilon band to their first-seen
        // representative, then require every edge to be shared by exactly
        // two triangles.
        let mut cells: HashMap<[i64; 3], Vec<Point3>> = HashMap::new();
        let mut canon = |p: Point3| -> Point3 {
            let cell = weld_cell(&p);
            for dx in -1..=1_i64 {
                for dy in -1..=1_i64 {
                    for dz in -1..=1_i64 {
                        let key = [cell[0] + dx, cell[1] + dy, cell[2] + dz];
                        if let Some(reps) = cells.get(&key) {
                            for rep in reps {
                                if (p - rep).norm() < WELD_EPS {
                                    return *rep;
                                }
                            }
                        }
                    }
                }
            }
            cells.entry(cell).or_default().push(p);
            p
        };
        for (_, tri) in &mut self.triangles {
            for v in tri.iter_mut() {
                *v = canon(*v);
            }
        }
        self.triangles
            .retain(|(_, t)| t[0] != t[1] && t[1] != t[2] && t[0] != t[2]);

        let open = self.open_edge_count();
        if open > 0 {
            return Err(AssemblyError::Failed(format!("mesh has {open} open edges")).into());
        }
        self.finalized = true;
        Ok(())
    }
}

// ── mesh buffer tests ─────────────────────────────────────────────────────
