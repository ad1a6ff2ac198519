//! Plain-JSON persistence for sheet trees.
//!
//! Snapshots are the unit of undo history and of boolean-cutter replay, so
//! the round-trip must preserve every generational id: face names derived
//! from those ids have to survive a save and load unchanged.

use super::SheetTree;
use crate::error::{Result, TreeError};

/// Serializes a tree to a JSON snapshot.
///
/// # Errors
///
/// Returns [`TreeError::MalformedSnapshot`] if serialization fails.
pub fn to_json(tree: &SheetTree) -> Result<String> {
    serde_json::to_string(tree)
        .map_err(|e| TreeError::MalformedSnapshot(format!("serialize: {e}")).into())
}

/// Restores a tree from a JSON snapshot.
///
/// # Errors
///
/// Returns [`TreeError::MalformedSnapshot`] if the JSON does not parse, or
/// [`TreeError::InvalidStructure`] if the loaded tree fails validation (for
/// example, a missing root flat).
pub fn from_json(snapshot: &str) -> Result<SheetTree> {
    let tree: SheetTree = serde_json::from_str(snapshot)
        .map_err(|e| TreeError::MalformedSnapshot(format!("parse: {e}")))?;
    tree.validate()?;
    Ok(tree)
}

// ── snapshot tests ────────────────────────────────────────────────────────
