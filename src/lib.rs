/*!
rampart
========

**rampart** is a static triangle-mesh collision shape for rigid-body
physics engines, written with the rust programming language.

A [`shape::MeshShape`] stores an immutable triangle soup (typically
terrain or static level geometry) as a single compact byte buffer: a
quaternary bounding-volume hierarchy with half-float bounds, and
triangle leaves packed as indexed 8-bit SoA blocks carrying per-triangle
material and active-edge flags. Queries (ray casts, point containment,
swept convex casts, convex overlap and region enumeration) walk this
buffer with query-specific visitors and report hits through compact
sub-shape identifiers.

*/

#![deny(non_camel_case_types)]
#![deny(unused_parens)]
#![deny(non_upper_case_globals)]
#![deny(unused_results)]
#![warn(missing_docs)]
#![warn(unused_imports)]
#![allow(missing_copy_implementations)]
#![allow(clippy::too_many_arguments)] // Maybe revisit this one later.
#![allow(clippy::module_inception)]
#![allow(clippy::manual_range_contains)] // This usually makes it way more verbose that it could be.

#[cfg(feature = "serde")]
#[macro_use]
extern crate serde;
#[cfg(test)]
#[macro_use]
extern crate approx;
extern crate num_traits as num;

pub extern crate nalgebra as na;
pub extern crate simba;

pub mod bounding_volume;
pub mod mass_properties;
pub mod partitioning;
pub mod query;
pub mod shape;
pub mod utils;

mod real {
    /// The scalar type used throughout this crate.
    pub use f32 as Real;
}

/// Aliases for the mathematical types used throughout this crate.
pub mod math {
    pub use super::real::*;
    pub use super::simd::*;
    pub use na::{Isometry3, Matrix3, Point3, Translation3, UnitQuaternion, UnitVector3, Vector3};

    /// The default tolerance used for geometric operations.
    pub const DEFAULT_EPSILON: Real = Real::EPSILON;

    /// The dimension of the space.
    pub const DIM: usize = 3;

    /// The point type.
    pub use Point3 as Point;

    /// The vector type.
    pub use Vector3 as Vector;

    /// The unit vector type.
    pub use UnitVector3 as UnitVector;

    /// The matrix type.
    pub use Matrix3 as Matrix;

    /// The transformation matrix type.
    pub use Isometry3 as Isometry;

    /// The rotation type.
    pub use UnitQuaternion as Rotation;

    /// The translation type.
    pub use Translation3 as Translation;
}

#[cfg(not(feature = "simd-is-enabled"))]
mod simd {
    /// The number of lanes of a SIMD number.
    pub const SIMD_WIDTH: usize = 4;
    /// SIMD_WIDTH - 1
    pub const SIMD_LAST_INDEX: usize = 3;

    /// A SIMD float with SIMD_WIDTH lanes.
    pub type SimdReal = simba::simd::AutoF32x4;

    /// A SIMD bool with SIMD_WIDTH lanes.
    pub type SimdBool = simba::simd::AutoBoolx4;
}

#[cfg(feature = "simd-is-enabled")]
mod simd {
    pub use simba::simd::{WideBoolF32x4 as SimdBool, WideF32x4 as SimdReal};

    /// The number of lanes of a SIMD number.
    pub const SIMD_WIDTH: usize = 4;
    /// SIMD_WIDTH - 1
    pub const SIMD_LAST_INDEX: usize = 3;
}
