use crate::bounding_volume::Aabb;
use crate::math::{Point, Real};
use crate::partitioning::splitter::TriangleSplitter;
use crate::partitioning::MAX_TRIANGLES_PER_LEAF;
use crate::shape::IndexedTriangle;
use arrayvec::ArrayVec;

/// A node of the intermediate binary AABB tree built before encoding.
#[derive(Debug)]
pub struct BuildNode {
    /// The bounds of everything below this node.
    pub aabb: Aabb,
    /// Inner node or triangle leaf.
    pub kind: BuildNodeKind,
}

/// The two kinds of intermediate tree nodes.
#[derive(Debug)]
pub enum BuildNodeKind {
    /// An inner node with exactly two children.
    Inner(Box<BuildNode>, Box<BuildNode>),
    /// A leaf holding the indices of at most [`MAX_TRIANGLES_PER_LEAF`] triangles.
    Leaf(ArrayVec<u32, MAX_TRIANGLES_PER_LEAF>),
}

/// Builds the intermediate binary tree over a set of triangles.
///
/// The tree is binary here; the encoder collapses two levels at a time into
/// the quaternary nodes of the final buffer.
pub struct AabbTreeBuilder<'a, S> {
    bounds: Vec<Aabb>,
    splitter: &'a mut S,
}

impl<'a, S: TriangleSplitter> AabbTreeBuilder<'a, S> {
    /// Prepares a builder for the given triangle set.
    pub fn new(
        vertices: &[Point<Real>],
        triangles: &[IndexedTriangle],
        splitter: &'a mut S,
    ) -> Self {
        let bounds = triangles
            .iter()
            .map(|t| {
                Aabb::from_points(t.idx.iter().map(|i| &vertices[*i as usize]))
            })
            .collect();

        Self { bounds, splitter }
    }

    /// Builds the tree over all the triangles.
    pub fn build(&mut self) -> BuildNode {
        let mut indices: Vec<u32> = (0..self.bounds.len() as u32).collect();
        self.build_recursive(&mut indices)
    }

    fn build_recursive(&mut self, indices: &mut [u32]) -> BuildNode {
        if indices.len() <= MAX_TRIANGLES_PER_LEAF {
            let mut aabb = Aabb::new_invalid();
            for i in &*indices {
                aabb = aabb.merged(&self.bounds[*i as usize]);
            }

            return BuildNode {
                aabb,
                kind: BuildNodeKind::Leaf(indices.iter().copied().collect()),
            };
        }

        let mut mid = self.splitter.split(&self.bounds, indices);
        if mid == 0 || mid >= indices.len() {
            // A misbehaving splitter must not be able to trigger unbounded
            // recursion.
            mid = indices.len() / 2;
        }

        let (left_indices, right_indices) = indices.split_at_mut(mid);
        let left = self.build_recursive(left_indices);
        let right = self.build_recursive(right_indices);

        BuildNode {
            aabb: left.aabb.merged(&right.aabb),
            kind: BuildNodeKind::Inner(Box::new(left), Box::new(right)),
        }
    }
}
