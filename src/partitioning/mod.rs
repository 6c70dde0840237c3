//! Construction, encoding and traversal of the mesh bounding-volume tree.

pub use self::aabb_tree_builder::{AabbTreeBuilder, BuildNode, BuildNodeKind};
pub use self::node_codec::{
    block_id_bits, NodeDecodingContext, NodeHeader, TreeVisitor, NODE_HEADER_SIZE, STACK_SIZE,
};
pub use self::splitter::{CenterSplitter, TriangleSplitter};
pub use self::tree_encoder::{encode_tree, TreeEncodingError};
pub use self::triangle_codec::{
    TriangleDecodingContext, TriangleHeader, MAX_TRIANGLES_PER_LEAF, NUM_TRIANGLE_BITS,
    TRIANGLE_BLOCK_SIZE, TRIANGLE_HEADER_SIZE,
};

mod aabb_tree_builder;
mod node_codec;
mod splitter;
mod tree_encoder;
mod triangle_codec;
