use crate::math::{Point, SimdReal, Vector};
use crate::query::Ray;
use simba::simd::SimdValue;

/// A ray with SIMD components, for testing four AABB lanes at once.
#[derive(Debug, Copy, Clone)]
pub struct SimdRay {
    /// The origin of the ray represented as a SIMD point.
    pub origin: Point<SimdReal>,
    /// The direction of the ray represented as a SIMD vector.
    pub dir: Vector<SimdReal>,
}

impl SimdRay {
    /// Creates a SIMD ray with all its lanes set to a copy of `ray`.
    pub fn splat(ray: Ray) -> Self {
        Self {
            origin: Point::splat(ray.origin),
            dir: Vector::splat(ray.dir),
        }
    }
}
