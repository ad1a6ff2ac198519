use thiserror::Error;

/// Top-level error type for the Lamina sheet-metal kernel.
#[derive(Debug, Error)]
pub enum LaminaError {
    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error(transparent)]
    Tree(#[from] TreeError),

    #[error(transparent)]
    Operation(#[from] OperationError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

/// Errors related to geometric computations.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("degenerate geometry: {0}")]
    Degenerate(String),

    #[error("zero-length vector")]
    ZeroVector,
}

/// Errors related to the flat/bend tree structure.
///
/// These are fatal: a tree that fails here is malformed, and nothing
/// downstream is attempted.
#[derive(Debug, Error)]
pub enum TreeError {
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    #[error("invalid tree structure: {0}")]
    InvalidStructure(String),
}

/// Errors related to edit operations.
///
/// `InvalidInput` is returned before any mutation. Per-target failures are
/// not errors; they are aggregated into the operation's report instead.
#[derive(Debug, Error)]
pub enum OperationError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("operation failed: {0}")]
    Failed(String),
}

/// Errors related to mesh assembly.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("triangulation failed: {0}")]
    Triangulation(String),

    #[error("assembly failed: {0}")]
    Failed(String),
}

/// Convenience type alias for results using [`LaminaError`].
pub type Result<T> = std::result::Result<T, LaminaError>;
