//! Interfaces to the engine-side convex-vs-triangle solvers.
//!
//! A mesh shape never collides a convex shape against a triangle itself: it
//! walks its tree, and hands every candidate triangle (with its active-edge
//! bits and sub-shape id) to a solver provided by the embedding engine. The
//! traits here are that seam. Solver implementations own their collector,
//! their collide/cast settings, shape filters and the transform of the other
//! shape; the mesh only reads back the early-out state.

use crate::bounding_volume::Aabb;
use crate::math::{Point, Real, Vector};
use crate::shape::SubShapeId;

/// The mesh-side description of a swept convex shape.
///
/// `dir` is the full displacement of the sweep; hits are fractions in
/// `[0, 1]` along it. `shape_world_bounds` is the bounding box of the convex
/// shape at the start of the sweep, expressed in the mesh's scaled local
/// frame.
#[derive(Debug, Clone, Copy)]
pub struct ShapeCast {
    /// Displacement of the swept shape.
    pub dir: Vector<Real>,
    /// Bounds of the swept shape at fraction 0, in the mesh frame.
    pub shape_world_bounds: Aabb,
}

/// Engine-side solver sweeping a convex shape against individual triangles.
pub trait CastConvexVsTriangles {
    /// Sweeps the convex shape against one triangle.
    ///
    /// The vertices are in the mesh's unscaled local frame; applying the mesh
    /// scale is the solver's responsibility. `active_edges` holds one bit per
    /// edge `(v0v1, v1v2, v2v0)` in its low three bits.
    fn cast(
        &mut self,
        v0: Point<Real>,
        v1: Point<Real>,
        v2: Point<Real>,
        active_edges: u8,
        sub_shape_id2: SubShapeId,
    );

    /// Fraction below which a hit must fall to still matter.
    fn early_out_fraction(&self) -> Real;

    /// Should the sweep stop right away?
    fn should_early_out(&self) -> bool;
}

/// Engine-side solver overlapping a convex shape with individual triangles.
pub trait CollideConvexVsTriangles {
    /// Collides the convex shape with one triangle.
    ///
    /// Vertex frame and `active_edges` are as in
    /// [`CastConvexVsTriangles::cast`].
    fn collide(
        &mut self,
        v0: Point<Real>,
        v1: Point<Real>,
        v2: Point<Real>,
        active_edges: u8,
        sub_shape_id2: SubShapeId,
    );

    /// Should the overlap test stop right away?
    fn should_early_out(&self) -> bool;
}
