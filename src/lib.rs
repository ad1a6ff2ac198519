pub mod assemble;
pub mod error;
pub mod evaluate;
pub mod math;
pub mod ops;
pub mod tree;

pub use error::{LaminaError, Result};
