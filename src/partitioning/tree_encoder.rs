//! Conversion of a built AABB tree into the encoded byte buffer.

use crate::bounding_volume::Aabb;
use crate::math::{Point, Real};
use crate::partitioning::aabb_tree_builder::{BuildNode, BuildNodeKind};
use crate::partitioning::node_codec::{
    self, NodeHeader, BLOCK_ID_MASK, INVALID_NODE, LEAF_FLAG, NODE_HEADER_SIZE, NODE_SIZE,
    STACK_SIZE, TRIANGLE_COUNT_SHIFT,
};
use crate::partitioning::triangle_codec::{
    LeafBlock, TriangleHeader, PACKED_VERTEX_SIZE, TRIANGLE_BLOCK_SIZE, TRIANGLE_HEADER_SIZE,
};
use crate::shape::IndexedTriangle;
use crate::utils::ByteBuffer;
use arrayvec::ArrayVec;

/// Ways the tree encoder can fail.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeEncodingError {
    /// The tree is too deep for the fixed-size traversal stack.
    #[error("the tree needs {required} traversal stack entries but only {STACK_SIZE} are available")]
    StackDepthExceeded {
        /// Worst-case number of stack entries the tree would need.
        required: u32,
    },
    /// More leaf blocks than the properties word can address.
    #[error("too many leaf blocks ({0}) for the node properties word")]
    TooManyLeafBlocks(usize),
    /// The encoded buffer would exceed the addressable offset range.
    #[error("the encoded tree exceeds the addressable buffer size")]
    BufferTooLarge,
}

enum ChildRef {
    Node(u32),
    Leaf { id: u32, count: u8 },
}

struct QuadNode {
    bounds: [Option<Aabb>; 4],
    children: ArrayVec<ChildRef, 4>,
}

struct Encoder<'a> {
    vertices: &'a [Point<Real>],
    triangles: &'a [IndexedTriangle],
    triangle_header: TriangleHeader,
    pool: Vec<[u16; 3]>,
    quad_nodes: Vec<QuadNode>,
    blocks: Vec<LeafBlock>,
    max_depth: u32,
}

impl<'a> Encoder<'a> {
    fn encode_subtree(&mut self, node: &BuildNode, depth: u32) -> ChildRef {
        match &node.kind {
            BuildNodeKind::Leaf(members) => {
                let id = self.blocks.len() as u32;
                self.blocks.push(LeafBlock::encode(
                    &self.triangle_header,
                    self.vertices,
                    self.triangles,
                    members,
                    &mut self.pool,
                ));
                ChildRef::Leaf {
                    id,
                    count: members.len() as u8,
                }
            }
            BuildNodeKind::Inner(..) => {
                self.max_depth = self.max_depth.max(depth);

                // Reserve our slot first so the node order is depth-first.
                let my_index = self.quad_nodes.len() as u32;
                self.quad_nodes.push(QuadNode {
                    bounds: [None; 4],
                    children: ArrayVec::new(),
                });

                let slots = gather_quad_children(node);
                let mut bounds = [None; 4];
                let mut children = ArrayVec::new();
                for (i, slot) in slots.iter().enumerate() {
                    bounds[i] = Some(slot.aabb);
                    children.push(self.encode_subtree(slot, depth + 1));
                }

                self.quad_nodes[my_index as usize] = QuadNode { bounds, children };
                ChildRef::Node(my_index)
            }
        }
    }
}

/// The children of a quaternary node: the grandchildren of the binary node,
/// with binary leaves passing through unsplit.
fn gather_quad_children(node: &BuildNode) -> ArrayVec<&BuildNode, 4> {
    let mut result = ArrayVec::new();
    let BuildNodeKind::Inner(left, right) = &node.kind else {
        unreachable!("only inner nodes are collapsed into quad nodes")
    };

    for child in [left.as_ref(), right.as_ref()] {
        match &child.kind {
            BuildNodeKind::Inner(grand_left, grand_right) => {
                result.push(grand_left.as_ref());
                result.push(grand_right.as_ref());
            }
            BuildNodeKind::Leaf(_) => result.push(child),
        }
    }

    result
}

/// Encodes a built tree into a self-contained byte buffer.
///
/// Layout and properties-word format are documented in the node codec. All
/// inner nodes are emitted before any leaf block, depth-first, so the block
/// id of a leaf is its dense index within the trailing leaf region.
pub fn encode_tree(
    vertices: &[Point<Real>],
    triangles: &[IndexedTriangle],
    root: &BuildNode,
) -> Result<Vec<u8>, TreeEncodingError> {
    let vertices_start = (NODE_HEADER_SIZE + TRIANGLE_HEADER_SIZE) as u32;
    let mut encoder = Encoder {
        vertices,
        triangles,
        triangle_header: TriangleHeader::from_root_bounds(&root.aabb, vertices_start),
        pool: Vec::new(),
        quad_nodes: Vec::new(),
        blocks: Vec::new(),
        max_depth: 0,
    };

    let root_ref = encoder.encode_subtree(root, 1);

    let stack_depth = 3 * encoder.max_depth + 1;
    if stack_depth as usize > STACK_SIZE {
        return Err(TreeEncodingError::StackDepthExceeded {
            required: stack_depth,
        });
    }
    if encoder.blocks.len() > BLOCK_ID_MASK as usize + 1 {
        return Err(TreeEncodingError::TooManyLeafBlocks(encoder.blocks.len()));
    }

    let nodes_start = vertices_start as usize + encoder.pool.len() * PACKED_VERTEX_SIZE;
    let leaf_blocks_start = nodes_start + encoder.quad_nodes.len() * NODE_SIZE;
    let total_size = leaf_blocks_start + encoder.blocks.len() * TRIANGLE_BLOCK_SIZE;
    if total_size > LEAF_FLAG as usize {
        // Inner-node offsets must fit in a properties word with bit 31 clear.
        return Err(TreeEncodingError::BufferTooLarge);
    }

    let child_properties = |child: &ChildRef| -> u32 {
        match child {
            ChildRef::Node(index) => (nodes_start + *index as usize * NODE_SIZE) as u32,
            ChildRef::Leaf { id, count } => {
                LEAF_FLAG | ((*count as u32 - 1) << TRIANGLE_COUNT_SHIFT) | id
            }
        }
    };

    let header = NodeHeader {
        root_bounds_min: root.aabb.mins,
        root_bounds_max: root.aabb.maxs,
        root_properties: child_properties(&root_ref),
        leaf_blocks_start: leaf_blocks_start as u32,
        num_leaf_blocks: encoder.blocks.len() as u32,
        stack_depth,
    };

    let mut buffer = ByteBuffer::new();
    header.write(&mut buffer);
    encoder.triangle_header.write(&mut buffer);

    for vertex in &encoder.pool {
        for component in vertex {
            buffer.write_u16(*component);
        }
    }

    for node in &encoder.quad_nodes {
        let mut properties = [INVALID_NODE; 4];
        for (i, child) in node.children.iter().enumerate() {
            properties[i] = child_properties(child);
        }
        node_codec::write_node(&mut buffer, &node.bounds, &properties);
    }

    for block in &encoder.blocks {
        block.write(&mut buffer);
    }

    debug_assert_eq!(buffer.len(), total_size);
    Ok(buffer.into_vec())
}
