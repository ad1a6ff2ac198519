pub mod bend;
pub mod edge;
pub mod flat;
pub mod hole;
pub mod meta;
pub mod snapshot;

pub use bend::{BendChild, BendData, BendId};
pub use edge::{EdgeData, EdgeId};
pub use flat::{FlatData, FlatId};
pub use hole::{HoleData, HoleId};
pub use meta::{BaseType, CutoutRecord, SheetMeta};

use serde::{Deserialize, Serialize};
use slotmap::{Key, SlotMap};

use crate::error::TreeError;
use crate::math::{Point2, TOLERANCE};

/// Renders a generational key as a compact stable label, e.g. `"1v1"`.
///
/// Labels appear in face and edge names on the assembled mesh, so they must
/// be deterministic across snapshot round-trips.
#[must_use]
pub fn key_label<K: Key>(key: K) -> String {
    let ffi = key.data().as_ffi();
    format!("{}v{}", ffi & 0xffff_ffff, ffi >> 32)
}

/// Central arena that owns the whole part: flats, their boundary edges, the
/// bends connecting them, and cutout holes.
///
/// Entities reference each other via typed generational ids, so the tree can
/// be mutated without self-referential structures and deep-cloned with a
/// plain `clone()`. Edit operations clone the tree, mutate the clone, and
/// hand it back; the source tree stays untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetTree {
    thickness: f64,
    root: FlatId,
    flats: SlotMap<FlatId, FlatData>,
    edges: SlotMap<EdgeId, EdgeData>,
    bends: SlotMap<BendId, BendData>,
    holes: SlotMap<HoleId, HoleData>,
    meta: SheetMeta,
}

impl SheetTree {
    /// Creates an empty tree for a sheet of the given gauge. The root flat
    /// must be added and registered via [`SheetTree::set_root`] before the
    /// tree is usable.
    #[must_use]
    pub fn new(thickness: f64, meta: SheetMeta) -> Self {
        Self {
            thickness,
            root: FlatId::null(),
            flats: SlotMap::with_key(),
            edges: SlotMap::with_key(),
            bends: SlotMap::with_key(),
            holes: SlotMap::with_key(),
            meta,
        }
    }

    /// Sheet gauge, constant across the whole tree.
    #[must_use]
    pub fn thickness(&self) -> f64 {
        self.thickness
    }

    /// The root flat.
    #[must_use]
    pub fn root(&self) -> FlatId {
        self.root
    }

    /// Registers the root flat.
    pub fn set_root(&mut self, root: FlatId) {
        self.root = root;
    }

    /// Per-tree metadata.
    #[must_use]
    pub fn meta(&self) -> &SheetMeta {
        &self.meta
    }

    /// Mutable per-tree metadata.
    pub fn meta_mut(&mut self) -> &mut SheetMeta {
        &mut self.meta
    }

    // --- Flat operations ---

    /// Inserts a flat and returns its id.
    pub fn add_flat(&mut self, data: FlatData) -> FlatId {
        self.flats.insert(data)
    }

    /// Returns a reference to the flat data.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not in the tree.
    pub fn flat(&self, id: FlatId) -> Result<&FlatData, TreeError> {
        self.flats
            .get(id)
            .ok_or_else(|| TreeError::EntityNotFound(format!("flat {}", key_label(id))))
    }

    /// Returns a mutable reference to the flat data.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not in the tree.
    pub fn flat_mut(&mut self, id: FlatId) -> Result<&mut FlatData, TreeError> {
        self.flats
            .get_mut(id)
            .ok_or_else(|| TreeError::EntityNotFound(format!("flat {}", key_label(id))))
    }

    /// Iterates over all flat ids.
    pub fn flat_ids(&self) -> impl Iterator<Item = FlatId> + '_ {
        self.flats.keys()
    }

    // --- Edge operations ---

    /// Inserts an edge and returns its id.
    pub fn add_edge(&mut self, data: EdgeData) -> EdgeId {
        self.edges.insert(data)
    }

    /// Returns a reference to the edge data.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not in the tree.
    pub fn edge(&self, id: EdgeId) -> Result<&EdgeData, TreeError> {
        self.edges
            .get(id)
            .ok_or_else(|| TreeError::EntityNotFound(format!("edge {}", key_label(id))))
    }

    /// Returns a mutable reference to the edge data.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not in the tree.
    pub fn edge_mut(&mut self, id: EdgeId) -> Result<&mut EdgeData, TreeError> {
        self.edges
            .get_mut(id)
            .ok_or_else(|| TreeError::EntityNotFound(format!("edge {}", key_label(id))))
    }

    // --- Bend operations ---

    /// Inserts a bend and returns its id.
    pub fn add_bend(&mut self, data: BendData) -> BendId {
        self.bends.insert(data)
    }

    /// Returns a reference to the bend data.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not in the tree.
    pub fn bend(&self, id: BendId) -> Result<&BendData, TreeError> {
        self.bends
            .get(id)
            .ok_or_else(|| TreeError::EntityNotFound(format!("bend {}", key_label(id))))
    }

    /// Returns a mutable reference to the bend data.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not in the tree.
    pub fn bend_mut(&mut self, id: BendId) -> Result<&mut BendData, TreeError> {
        self.bends
            .get_mut(id)
            .ok_or_else(|| TreeError::EntityNotFound(format!("bend {}", key_label(id))))
    }

    // --- Hole operations ---

    /// Inserts a hole and returns its id.
    pub fn add_hole(&mut self, data: HoleData) -> HoleId {
        self.holes.insert(data)
    }

    /// Returns a reference to the hole data.
    ///
    /// # Errors
    ///
    /// Returns an error if the entity is not in the tree.
    pub fn hole(&self, id: HoleId) -> Result<&HoleData, TreeError> {
        self.holes
            .get(id)
            .ok_or_else(|| TreeError::EntityNotFound(format!("hole {}", key_label(id))))
    }

    // --- Structural queries ---

    /// Assembles the closed outline of a flat by concatenating its edge
    /// polylines, dropping each edge's trailing point since the next edge
    /// repeats it.
    ///
    /// # Errors
    ///
    /// Returns an error if the flat or one of its edges is missing.
    pub fn flat_outline(&self, id: FlatId) -> Result<Vec<Point2>, TreeError> {
        let flat = self.flat(id)?;
        let mut outline = Vec::new();
        for &edge_id in &flat.edges {
            let edge = self.edge(edge_id)?;
            outline.extend(&edge.polyline[..edge.polyline.len() - 1]);
        }
        Ok(outline)
    }

    /// Finds the flat whose boundary contains the given edge.
    ///
    /// # Errors
    ///
    /// Returns an error if no flat owns the edge.
    pub fn owner_of_edge(&self, id: EdgeId) -> Result<FlatId, TreeError> {
        self.flats
            .iter()
            .find(|(_, flat)| flat.edges.contains(&id))
            .map(|(flat_id, _)| flat_id)
            .ok_or_else(|| {
                TreeError::EntityNotFound(format!("flat owning edge {}", key_label(id)))
            })
    }

    /// Finds the attach edge of a child flat.
    ///
    /// # Errors
    ///
    /// Returns an error if the flat is missing or carries no attach edge.
    pub fn attach_edge_of(&self, id: FlatId) -> Result<EdgeId, TreeError> {
        let flat = self.flat(id)?;
        for &edge_id in &flat.edges {
            if self.edge(edge_id)?.is_attach_edge {
                return Ok(edge_id);
            }
        }
        Err(TreeError::InvalidStructure(format!(
            "flat {} has no attach edge",
            key_label(id)
        )))
    }

    /// Lists the hinge edges of a flat together with their bends, in outline
    /// order.
    ///
    /// # Errors
    ///
    /// Returns an error if the flat or one of its edges is missing.
    pub fn hinges_of(&self, id: FlatId) -> Result<Vec<(EdgeId, BendId)>, TreeError> {
        let flat = self.flat(id)?;
        let mut hinges = Vec::new();
        for &edge_id in &flat.edges {
            if let Some(bend) = self.edge(edge_id)?.bend {
                hinges.push((edge_id, bend));
            }
        }
        Ok(hinges)
    }

    /// Checks referential integrity and outline closure across the whole
    /// tree. Used after deserializing a snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first structural defect found.
    pub fn validate(&self) -> Result<(), TreeError> {
        if !self.flats.contains_key(self.root) {
            return Err(TreeError::InvalidStructure(format!(
                "root flat {} is not in the tree",
                key_label(self.root)
            )));
        }
        for (flat_id, flat) in &self.flats {
            if flat.edges.len() < 3 {
                return Err(TreeError::InvalidStructure(format!(
                    "flat {} has fewer than 3 edges",
                    key_label(flat_id)
                )));
            }
            for i in 0..flat.edges.len() {
                let here = self.edge(flat.edges[i])?;
                let next = self.edge(flat.edges[(i + 1) % flat.edges.len()])?;
                if (next.start() - here.end()).norm() > TOLERANCE {
                    return Err(TreeError::InvalidStructure(format!(
                        "outline of flat {} does not close between edges {} and {}",
                        key_label(flat_id),
                        key_label(flat.edges[i]),
                        key_label(flat.edges[(i + 1) % flat.edges.len()]),
                    )));
                }
            }
            for &hole_id in &flat.holes {
                self.hole(hole_id)?;
            }
        }
        for (edge_id, edge) in &self.edges {
            if edge.polyline.len() < 2 {
                return Err(TreeError::InvalidStructure(format!(
                    "edge {} has fewer than 2 points",
                    key_label(edge_id)
                )));
            }
            if let Some(bend_id) = edge.bend {
                self.bend(bend_id)?;
            }
        }
        for (bend_id, bend) in &self.bends {
            for child in &bend.children {
                self.flat(child.flat)?;
                if !self.edge(child.attach_edge)?.is_attach_edge {
                    return Err(TreeError::InvalidStructure(format!(
                        "bend {} child edge {} is not an attach edge",
                        key_label(bend_id),
                        key_label(child.attach_edge),
                    )));
                }
            }
        }
        Ok(())
    }
}

// ── tree structure tests ──────────────────────────────────────────────────
