use crate::bounding_volume::Aabb;
use crate::math::{Point, Real, Vector, DIM};

/// Partitions a set of triangles in two, to reduce the surface area of the
/// bounding boxes of the resulting subsets.
///
/// The tree builder drives the whole recursion; a splitter only decides, for
/// one subset at a time, which triangles go left and which go right. This
/// keeps the splitting strategy pluggable: the built-in [`CenterSplitter`] is
/// cheap and good enough for most static geometry, while an embedder can
/// provide e.g. a binned SAH splitter for higher-quality trees without
/// touching the builder.
pub trait TriangleSplitter {
    /// Reorders `indices` in place so that the first returned count of them
    /// form the "left" subset and the rest the "right" subset.
    ///
    /// `bounds[i]` is the AABB of triangle `i`. Implementations must return a
    /// split position strictly inside `1..indices.len()` so that both subsets
    /// are non-empty.
    fn split(&mut self, bounds: &[Aabb], indices: &mut [u32]) -> usize;
}

/// A splitter that partitions triangles against the mean of their AABB
/// centers, along the axis where those centers vary the most.
#[derive(Debug, Clone, Default)]
pub struct CenterSplitter;

impl TriangleSplitter for CenterSplitter {
    fn split(&mut self, bounds: &[Aabb], indices: &mut [u32]) -> usize {
        let center_denom = 1.0 / (indices.len() as Real);
        let mut center = Point::origin();
        for i in &*indices {
            center += bounds[*i as usize].center().coords * center_denom;
        }

        let mut variance = Vector::zeros();
        for i in &*indices {
            let dir_to_center = bounds[*i as usize].center() - center;
            variance += dir_to_center.component_mul(&dir_to_center);
        }

        let mut dim = 0;
        for i in 1..DIM {
            if variance[i] > variance[dim] {
                dim = i;
            }
        }

        // Hoare-style partition against the mean.
        let mut left = 0;
        let mut right = indices.len();
        while left < right {
            if bounds[indices[left] as usize].center()[dim] <= center[dim] {
                left += 1;
            } else {
                right -= 1;
                indices.swap(left, right);
            }
        }

        if left == 0 || left == indices.len() {
            // All centers fell on the same side (e.g. identical triangles):
            // fall back to an arbitrary median split.
            indices.len() / 2
        } else {
            left
        }
    }
}
