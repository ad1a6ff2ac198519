pub mod intersect_2d;
pub mod polygon_2d;
pub mod union_2d;

/// 2D point in flat-local coordinates.
pub type Point2 = nalgebra::Point2<f64>;
/// 3D point in world coordinates.
pub type Point3 = nalgebra::Point3<f64>;
/// 2D vector type.
pub type Vector2 = nalgebra::Vector2<f64>;
/// 3D vector type.
pub type Vector3 = nalgebra::Vector3<f64>;
/// Rigid transform in the plane, used for flat-pattern layouts.
pub type Isometry2 = nalgebra::Isometry2<f64>;
/// Rigid transform in space, used to place flats and bends.
pub type Isometry3 = nalgebra::Isometry3<f64>;

/// Global tolerance for geometric computations.
pub const TOLERANCE: f64 = 1e-10;

/// Minimum usable length for an outline segment or a flange leg.
pub const MIN_LEG: f64 = 1e-6;

/// Minimum enclosed area for a flat outline or a hole loop.
pub const MIN_AREA: f64 = 1e-8;
