use crate::bounding_volume::{Aabb, OrientedBox};
use crate::math::{Point, Real, SimdBool, SimdReal, Vector, DIM, SIMD_WIDTH};
use crate::query::SimdRay;
use na;
use num::{One, Zero};
use simba::simd::{SimdPartialOrd, SimdValue};

/// Four AABB represented as a single SoA AABB with SIMD components.
#[derive(Debug, Copy, Clone)]
pub struct SimdAabb {
    /// The min coordinates of the AABBs.
    pub mins: Point<SimdReal>,
    /// The max coordinates the AABBs.
    pub maxs: Point<SimdReal>,
}

impl SimdAabb {
    /// An invalid AABB.
    pub fn new_invalid() -> Self {
        Self::splat(Aabb::new_invalid())
    }

    /// Builds an SIMD AABB composed of four identical AABBs.
    pub fn splat(aabb: Aabb) -> Self {
        Self {
            mins: Point::splat(aabb.mins),
            maxs: Point::splat(aabb.maxs),
        }
    }

    /// Extract the AABB stored in the given SIMD lane.
    #[inline]
    pub fn extract(&self, lane: usize) -> Aabb {
        Aabb::new(self.mins.extract(lane), self.maxs.extract(lane))
    }

    /// Checks which of the four AABBs is valid (i.e. has `mins <= maxs` on every axis).
    ///
    /// Empty child slots of an encoded tree node are stored with inverted
    /// bounds, so this is the lane mask of actually-present children.
    #[inline]
    pub fn is_valid(&self) -> SimdBool {
        self.mins.x.simd_le(self.maxs.x)
            & self.mins.y.simd_le(self.maxs.y)
            & self.mins.z.simd_le(self.maxs.z)
    }

    /// Scale each of the four AABBs by the (possibly negative) `scale`.
    #[inline]
    pub fn scaled(&self, scale: &Vector<Real>) -> Self {
        let scale = Vector::new(
            SimdReal::splat(scale.x),
            SimdReal::splat(scale.y),
            SimdReal::splat(scale.z),
        );
        let a = self.mins.coords.component_mul(&scale);
        let b = self.maxs.coords.component_mul(&scale);

        Self {
            mins: Point::from(a.zip_map(&b, |a, b| a.simd_min(b))),
            maxs: Point::from(a.zip_map(&b, |a, b| a.simd_max(b))),
        }
    }

    /// Enlarge each of the four AABBs by the given half-extent on every axis.
    ///
    /// This is the Minkowski sum with a box of half-extents `half_extent`,
    /// used to turn a swept-shape test into a ray test against padded bounds.
    #[inline]
    pub fn enlarged_by_extent(&self, half_extent: &Vector<Real>) -> Self {
        let he = Vector::new(
            SimdReal::splat(half_extent.x),
            SimdReal::splat(half_extent.y),
            SimdReal::splat(half_extent.z),
        );

        Self {
            mins: self.mins - he,
            maxs: self.maxs + he,
        }
    }

    /// Casts a ray on all the AABBs represented by `self`.
    pub fn cast_local_ray(&self, ray: &SimdRay, max_toi: SimdReal) -> (SimdBool, SimdReal) {
        let zero = SimdReal::zero();
        let one = SimdReal::one();
        let infinity = SimdReal::splat(Real::MAX);

        let mut hit = SimdBool::splat(true);
        let mut tmin = SimdReal::zero();
        let mut tmax = max_toi;

        for i in 0usize..DIM {
            let is_not_zero = ray.dir[i].simd_ne(zero);
            let is_zero_test =
                ray.origin[i].simd_ge(self.mins[i]) & ray.origin[i].simd_le(self.maxs[i]);
            let is_not_zero_test = {
                let denom = one / ray.dir[i];
                let mut inter_with_near_plane =
                    ((self.mins[i] - ray.origin[i]) * denom).select(is_not_zero, -infinity);
                let mut inter_with_far_plane =
                    ((self.maxs[i] - ray.origin[i]) * denom).select(is_not_zero, infinity);

                let gt = inter_with_near_plane.simd_gt(inter_with_far_plane);
                simd_swap(gt, &mut inter_with_near_plane, &mut inter_with_far_plane);

                tmin = tmin.simd_max(inter_with_near_plane);
                tmax = tmax.simd_min(inter_with_far_plane);

                tmin.simd_le(tmax)
            };

            hit = hit & is_not_zero_test.select(is_not_zero, is_zero_test);
        }

        (hit, tmin)
    }

    /// The entry distance of a ray into each of the four AABBs, `Real::MAX` on a miss.
    ///
    /// An origin inside an AABB yields a distance of `0.0`.
    #[inline]
    pub fn ray_hit_distances(&self, ray: &SimdRay) -> [Real; SIMD_WIDTH] {
        let (hit, toi) = self.cast_local_ray(ray, SimdReal::splat(Real::MAX));
        let toi = toi.select(hit, SimdReal::splat(Real::MAX));
        [
            toi.extract(0),
            toi.extract(1),
            toi.extract(2),
            toi.extract(3),
        ]
    }

    /// Check which AABB represented by `self` contains the given `point`.
    #[inline]
    pub fn contains_local_point(&self, point: &Point<SimdReal>) -> SimdBool {
        self.mins.x.simd_le(point.x)
            & self.mins.y.simd_le(point.y)
            & self.mins.z.simd_le(point.z)
            & self.maxs.x.simd_ge(point.x)
            & self.maxs.y.simd_ge(point.y)
            & self.maxs.z.simd_ge(point.z)
    }

    /// Lanewise separating-axis test of the four AABBs against an oriented box.
    ///
    /// Only the three world axes and the three box axes are tested, so the
    /// result may report an intersection for a pair that is actually
    /// separated by an edge-cross axis. That is acceptable for tree pruning:
    /// false positives only cost a deeper descent.
    pub fn intersects_oriented_box(&self, obb: &OrientedBox) -> SimdBool {
        let rot = obb.transform.rotation.to_rotation_matrix();
        let rot = rot.matrix();
        let center = obb.transform.translation.vector;

        // The projection radius of the box onto each world axis.
        let mut result = SimdBool::splat(true);
        for i in 0..DIM {
            let mut radius = 0.0;
            for j in 0..DIM {
                radius += rot[(i, j)].abs() * obb.half_extents[j];
            }
            let c = SimdReal::splat(center[i]);
            let r = SimdReal::splat(radius);
            result = result & (c - r).simd_le(self.maxs[i]) & (c + r).simd_ge(self.mins[i]);
        }

        // The projection of each AABB onto the box axes.
        let aabb_center = na::center(&self.mins, &self.maxs);
        let aabb_half = (self.maxs - self.mins) * SimdReal::splat(0.5);
        for k in 0..DIM {
            let axis = rot.column(k);
            let box_proj = SimdReal::splat(axis.dot(&center));
            let box_radius = SimdReal::splat(obb.half_extents[k]);

            let mut aabb_proj = SimdReal::zero();
            let mut aabb_radius = SimdReal::zero();
            for i in 0..DIM {
                aabb_proj = aabb_proj + aabb_center[i] * SimdReal::splat(axis[i]);
                aabb_radius = aabb_radius + aabb_half[i] * SimdReal::splat(axis[i].abs());
            }

            let dist = aabb_proj - box_proj;
            let dist = dist.simd_max(-dist);
            result = result & dist.simd_le(aabb_radius + box_radius);
        }

        result
    }
}

impl From<[Aabb; SIMD_WIDTH]> for SimdAabb {
    fn from(aabbs: [Aabb; SIMD_WIDTH]) -> Self {
        let mins = [aabbs[0].mins, aabbs[1].mins, aabbs[2].mins, aabbs[3].mins];
        let maxs = [aabbs[0].maxs, aabbs[1].maxs, aabbs[2].maxs, aabbs[3].maxs];

        SimdAabb {
            mins: Point::from(mins),
            maxs: Point::from(maxs),
        }
    }
}

#[inline]
fn simd_swap(do_swap: SimdBool, a: &mut SimdReal, b: &mut SimdReal) {
    let _a = *a;
    *a = b.select(do_swap, *a);
    *b = _a.select(do_swap, *b);
}
