//! Spatial queries against a mesh shape, and the interfaces they rely on.

pub use self::collector::{
    AllHitsCollector, ClosestHitCollector, CollidePointResult, CollisionCollector, HitWithFraction,
};
pub use self::ray::{BackFaceMode, Ray, RayCastResult, RayCastSettings};
pub use self::ray_triangle::ray_triangle;
pub use self::shape_cast::{CastConvexVsTriangles, CollideConvexVsTriangles, ShapeCast};
pub use self::simd_ray::SimdRay;

mod collector;
mod ray;
mod ray_triangle;
mod shape_cast;
mod simd_ray;
