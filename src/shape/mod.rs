//! The mesh shape, its construction settings, and its supporting types.

pub use self::active_edges::{is_edge_active, mark_active_edges};
pub use self::indexed_triangle::{
    IndexedTriangle, FLAGS_ACTIVE_EDGE_MASK, FLAGS_ACTIVE_EDGE_SHIFT, FLAGS_MATERIAL_MASK,
};
pub use self::mesh_shape::{
    GetTrianglesContext, MeshShape, MeshShapeError, MeshShapeSettings, ShapeStats,
};
pub use self::physics_material::{default_material, MaterialRef, PhysicsMaterial};
pub use self::sub_shape_id::{SubShapeId, SubShapeIdCreator, MAX_SUB_SHAPE_BITS};

mod active_edges;
mod indexed_triangle;
mod mesh_shape;
mod physics_material;
mod sub_shape_id;
