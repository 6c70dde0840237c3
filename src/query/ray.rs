//! Structures needed to cast rays.

use crate::math::{Point, Real, Vector};
use crate::shape::SubShapeId;

/// A ray for ray-casting queries.
///
/// The direction vector is *not* normalized: its length is the reach of the
/// cast, and hits are reported as fractions in `[0, 1]` along it.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Ray {
    /// Starting point of the ray.
    pub origin: Point<Real>,
    /// Direction and reach of the ray.
    pub dir: Vector<Real>,
}

impl Ray {
    /// Creates a new ray from an origin point and direction vector.
    pub fn new(origin: Point<Real>, dir: Vector<Real>) -> Ray {
        Ray { origin, dir }
    }

    /// Computes the point along the ray at the given fraction.
    #[inline]
    pub fn point_at(&self, fraction: Real) -> Point<Real> {
        self.origin + self.dir * fraction
    }
}

/// Should ray casts against a triangle report hits on its back side?
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum BackFaceMode {
    /// Triangles facing away from the ray are skipped.
    #[default]
    IgnoreBackFaces,
    /// Triangles are hit from both sides.
    CollideWithBackFaces,
}

/// Settings for collector-based ray casts.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct RayCastSettings {
    /// How back-facing triangles are treated.
    pub back_face_mode: BackFaceMode,
}

/// A ray hit against a mesh shape.
///
/// `fraction` doubles as the upper bound of the cast on input: a nearest-hit
/// cast only reports hits strictly closer than the incoming value.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct RayCastResult {
    /// Fraction along the ray direction at which the hit occurred.
    pub fraction: Real,
    /// Identifies the triangle that was hit.
    pub sub_shape_id: SubShapeId,
}

impl Default for RayCastResult {
    fn default() -> Self {
        RayCastResult {
            // Slightly above 1 so that hits at the very end of the ray are
            // still reported.
            fraction: 1.0 + Real::EPSILON,
            sub_shape_id: SubShapeId::empty(),
        }
    }
}
