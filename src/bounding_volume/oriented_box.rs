use crate::bounding_volume::Aabb;
use crate::math::{Isometry, Real, Translation, Vector};

/// A box with an arbitrary orientation, described by an isometry and half-extents.
#[derive(Debug, Copy, Clone)]
pub struct OrientedBox {
    /// Maps the box's local frame (box centered at the origin) to the frame
    /// the box lives in.
    pub transform: Isometry<Real>,
    /// The half-extents of the box along its local axes.
    pub half_extents: Vector<Real>,
}

impl OrientedBox {
    /// Expresses a world-space AABB as an oriented box in another frame.
    ///
    /// `world_to_local` is the inverse of the target frame's pose. The result
    /// is the same box, seen from the target frame.
    pub fn from_world_aabb(world_to_local: &Isometry<Real>, aabb: &Aabb) -> Self {
        let center = aabb.center();
        OrientedBox {
            transform: world_to_local * Translation::from(center.coords),
            half_extents: aabb.half_extents(),
        }
    }
}
