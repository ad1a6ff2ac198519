use serde::{Deserialize, Serialize};

use super::HoleId;

/// Which base operation seeded the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseType {
    Tab,
    ContourFlange,
}

/// One applied cutout, kept so regeneration can reproduce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutoutRecord {
    /// The cutout mapped cleanly onto flats as 2D holes.
    MappedHoles { feature_id: String, holes: Vec<HoleId> },
    /// Legacy solid cutter, replayed as a boolean subtraction against the
    /// assembled mesh.
    BooleanSubtract { feature_id: String, snapshot: String },
}

/// Per-tree bookkeeping that does not belong to any single flat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetMeta {
    pub base_type: BaseType,
    /// Inside radius offered to operations that do not specify one.
    pub default_inside_radius: f64,
    /// K-factor offered to operations that do not specify one.
    pub default_k_factor: f64,
    pub cutouts: Vec<CutoutRecord>,
}

impl SheetMeta {
    /// Creates metadata for a freshly built base.
    #[must_use]
    pub fn new(base_type: BaseType, default_inside_radius: f64, default_k_factor: f64) -> Self {
        Self {
            base_type,
            default_inside_radius,
            default_k_factor,
            cutouts: Vec::new(),
        }
    }
}
