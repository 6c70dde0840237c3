//! Hit collectors driving cooperative early-out of traversals.

use crate::math::Real;
use crate::query::RayCastResult;
use crate::shape::SubShapeId;

/// A hit that carries a fraction usable to shrink the search space.
pub trait HitWithFraction {
    /// The fraction used for early-out bookkeeping.
    fn fraction(&self) -> Real;
}

impl HitWithFraction for RayCastResult {
    #[inline]
    fn fraction(&self) -> Real {
        self.fraction
    }
}

/// Receives the hits produced by a collector-based query.
///
/// The two early-out methods drive the cooperative cancellation of a
/// traversal: the walker checks `should_early_out` before expanding each
/// node, and distance-ordered visitors prune children whose entry distance
/// is not below `early_out_fraction`. `early_out_fraction` must never
/// increase while a query is running.
pub trait CollisionCollector<H> {
    /// Reports one hit.
    fn add_hit(&mut self, hit: H);

    /// Hits at or beyond this fraction can no longer affect the result.
    #[inline]
    fn early_out_fraction(&self) -> Real {
        Real::MAX
    }

    /// Should the query stop right away?
    #[inline]
    fn should_early_out(&self) -> bool {
        false
    }
}

/// A collector that keeps every hit, in traversal order.
#[derive(Debug, Clone, Default)]
pub struct AllHitsCollector<H> {
    /// The collected hits.
    pub hits: Vec<H>,
}

impl<H> AllHitsCollector<H> {
    /// An empty collector.
    pub fn new() -> Self {
        AllHitsCollector { hits: Vec::new() }
    }
}

impl<H> CollisionCollector<H> for AllHitsCollector<H> {
    #[inline]
    fn add_hit(&mut self, hit: H) {
        self.hits.push(hit);
    }
}

/// A collector that keeps only the hit with the smallest fraction.
#[derive(Debug, Clone, Default)]
pub struct ClosestHitCollector<H> {
    /// The closest hit seen so far, if any.
    pub hit: Option<H>,
}

impl<H> ClosestHitCollector<H> {
    /// An empty collector.
    pub fn new() -> Self {
        ClosestHitCollector { hit: None }
    }
}

impl<H: HitWithFraction> CollisionCollector<H> for ClosestHitCollector<H> {
    #[inline]
    fn add_hit(&mut self, hit: H) {
        if self
            .hit
            .as_ref()
            .map(|best| hit.fraction() < best.fraction())
            .unwrap_or(true)
        {
            self.hit = Some(hit);
        }
    }

    #[inline]
    fn early_out_fraction(&self) -> Real {
        self.hit
            .as_ref()
            .map(|best| best.fraction())
            .unwrap_or(Real::MAX)
    }
}

/// The result of a point-containment query: the identifier of one of the
/// triangles that established containment.
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct CollidePointResult {
    /// Identifies a triangle of the containing mesh.
    pub sub_shape_id: SubShapeId,
}
