//! A static triangle-mesh collision shape.

use crate::bounding_volume::{Aabb, OrientedBox, SimdAabb};
use crate::mass_properties::MassProperties;
use crate::math::{Isometry, Point, Real, Rotation, Translation, Vector};
use crate::partitioning::{
    encode_tree, AabbTreeBuilder, CenterSplitter, NodeDecodingContext, NodeHeader, TreeVisitor,
    TriangleDecodingContext, TriangleHeader, MAX_TRIANGLES_PER_LEAF, NODE_HEADER_SIZE,
    NUM_TRIANGLE_BITS, STACK_SIZE, TRIANGLE_BLOCK_SIZE, TRIANGLE_HEADER_SIZE,
};
use crate::query::{
    BackFaceMode, CastConvexVsTriangles, CollideConvexVsTriangles, CollidePointResult,
    CollisionCollector, Ray, RayCastResult, RayCastSettings, ShapeCast, SimdRay,
};
use crate::shape::{
    default_material, mark_active_edges, IndexedTriangle, MaterialRef, SubShapeId,
    SubShapeIdCreator, FLAGS_ACTIVE_EDGE_MASK, FLAGS_ACTIVE_EDGE_SHIFT, FLAGS_MATERIAL_MASK,
    MAX_SUB_SHAPE_BITS,
};
use crate::utils::hashmap::HashMap;
use crate::utils::sort4_descending_clipped;
use simba::simd::SimdValue;
use std::io;
use std::sync::{Arc, OnceLock};

/// Magic + version tag of the binary state stream.
const BINARY_MAGIC: u32 = u32::from_le_bytes(*b"RMP1");

/// Errors that can occur while building a [`MeshShape`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshShapeError {
    /// The triangle list was empty.
    #[error("a mesh shape needs at least one triangle")]
    EmptyInput,
    /// A triangle uses the same vertex more than once.
    #[error("triangle {triangle} is degenerate")]
    DegenerateTriangle {
        /// Index of the offending triangle.
        triangle: usize,
    },
    /// A triangle references a vertex beyond the vertex list.
    #[error(
        "vertex index {index} of triangle {triangle} (slot {slot}) is beyond the vertex list (size: {num_vertices})"
    )]
    IndexOutOfRange {
        /// Index of the offending triangle.
        triangle: usize,
        /// Which of its three vertex slots is out of range.
        slot: usize,
        /// The out-of-range vertex index.
        index: u32,
        /// The size of the vertex list.
        num_vertices: usize,
    },
    /// More materials than the flag word can address.
    #[error("at most 32 materials are supported per mesh, got {count}")]
    TooManyMaterials {
        /// The number of materials supplied.
        count: usize,
    },
    /// A triangle references a material beyond the material table.
    #[error(
        "material index {material} of triangle {triangle} is beyond the material list (size: {num_materials})"
    )]
    MaterialOutOfRange {
        /// Index of the offending triangle.
        triangle: usize,
        /// The out-of-range material index.
        material: u32,
        /// The size of the material table.
        num_materials: usize,
    },
    /// A triangle uses a non-zero material index on a mesh without materials.
    #[error("no materials are present, but triangle {triangle} does not use material index 0")]
    MissingMaterialNonZero {
        /// Index of the offending triangle.
        triangle: usize,
    },
    /// The mesh needs more sub-shape id bits than are available.
    #[error("the mesh is too large and exceeds the available sub-shape id bits ({bits} needed)")]
    MeshTooLarge {
        /// The number of bits the mesh would need.
        bits: u32,
    },
    /// The tree encoder rejected the mesh.
    #[error("failed to encode the bounding-volume tree: {0}")]
    EncodingFailure(String),
}

/// Construction settings of a [`MeshShape`].
///
/// The constructors sanitize their input (degenerate and duplicate triangles
/// are dropped); [`MeshShapeSettings::create`] validates everything else and
/// caches the built shape.
pub struct MeshShapeSettings {
    /// The vertex positions.
    pub vertices: Vec<Point<Real>>,
    /// The triangles, with their material indices.
    pub triangles: Vec<IndexedTriangle>,
    /// The ordered material table. May be empty, in which case every triangle
    /// must use material index 0 and queries report the default material.
    pub materials: Vec<MaterialRef>,
    cached_result: OnceLock<Result<Arc<MeshShape>, MeshShapeError>>,
}

impl MeshShapeSettings {
    /// Settings for an indexed triangle list without materials.
    pub fn new(vertices: Vec<Point<Real>>, triangles: Vec<IndexedTriangle>) -> Self {
        Self::with_materials(vertices, triangles, Vec::new())
    }

    /// Settings for an indexed triangle list with a material table.
    pub fn with_materials(
        vertices: Vec<Point<Real>>,
        triangles: Vec<IndexedTriangle>,
        materials: Vec<MaterialRef>,
    ) -> Self {
        let mut result = MeshShapeSettings {
            vertices,
            triangles,
            materials,
            cached_result: OnceLock::new(),
        };
        result.sanitize();
        result
    }

    /// Settings for a raw triangle soup.
    ///
    /// Vertices with bit-identical positions are welded into one; every
    /// triangle uses material index 0.
    pub fn from_triangle_soup(triangles: impl IntoIterator<Item = [Point<Real>; 3]>) -> Self {
        let mut vertex_ids: HashMap<[u32; 3], u32> = HashMap::default();
        let mut vertices = Vec::new();
        let mut indexed = Vec::new();

        for triangle in triangles {
            let mut idx = [0; 3];
            for (slot, point) in triangle.iter().enumerate() {
                let key = [
                    point.x.to_bits(),
                    point.y.to_bits(),
                    point.z.to_bits(),
                ];
                idx[slot] = *vertex_ids.entry(key).or_insert_with(|| {
                    vertices.push(*point);
                    vertices.len() as u32 - 1
                });
            }
            indexed.push(IndexedTriangle::new(idx, 0));
        }

        Self::new(vertices, indexed)
    }

    /// Removes degenerate triangles and duplicates.
    ///
    /// Two triangles are duplicates when they have the same
    /// lowest-index-first canonical form (winding included); the first
    /// occurrence survives.
    pub fn sanitize(&mut self) {
        let mut seen: HashMap<[u32; 3], ()> = HashMap::default();
        self.triangles.retain(|triangle| {
            !triangle.is_degenerate()
                && seen
                    .insert(triangle.lowest_index_first().idx, ())
                    .is_none()
        });
    }

    /// Builds the shape, or returns the cached result of a previous call.
    pub fn create(&self) -> Result<Arc<MeshShape>, MeshShapeError> {
        self.cached_result
            .get_or_init(|| MeshShape::new(self).map(Arc::new))
            .clone()
    }
}

/// Size and content statistics of a mesh shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeStats {
    /// Total memory used by the shape, in bytes.
    pub size_bytes: usize,
    /// Number of triangles stored in the tree.
    pub num_triangles: u32,
}

/// An immutable triangle mesh, for static level geometry.
///
/// The whole mesh lives in a single encoded byte buffer (see the
/// `partitioning` module for the layout); queries walk that buffer directly.
/// A shape is immutable once built, so any number of threads may query it
/// concurrently.
pub struct MeshShape {
    tree: Vec<u8>,
    header: NodeHeader,
    triangle_header: TriangleHeader,
    materials: Vec<MaterialRef>,
}

impl std::fmt::Debug for MeshShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshShape")
            .field("tree", &self.tree)
            .field("header", &self.header)
            .field("triangle_header", &self.triangle_header)
            .field(
                "materials",
                &self.materials.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl MeshShape {
    /// Builds a mesh shape from validated settings.
    pub fn new(settings: &MeshShapeSettings) -> Result<MeshShape, MeshShapeError> {
        if settings.triangles.is_empty() {
            return Err(MeshShapeError::EmptyInput);
        }

        for (t, triangle) in settings.triangles.iter().enumerate() {
            if triangle.is_degenerate() {
                return Err(MeshShapeError::DegenerateTriangle { triangle: t });
            }
            for slot in 0..3 {
                if triangle.idx[slot] as usize >= settings.vertices.len() {
                    return Err(MeshShapeError::IndexOutOfRange {
                        triangle: t,
                        slot,
                        index: triangle.idx[slot],
                        num_vertices: settings.vertices.len(),
                    });
                }
            }
        }

        if !settings.materials.is_empty() {
            if settings.materials.len() > FLAGS_MATERIAL_MASK as usize + 1 {
                return Err(MeshShapeError::TooManyMaterials {
                    count: settings.materials.len(),
                });
            }
            for (t, triangle) in settings.triangles.iter().enumerate() {
                if triangle.material_index as usize >= settings.materials.len() {
                    return Err(MeshShapeError::MaterialOutOfRange {
                        triangle: t,
                        material: triangle.material_index,
                        num_materials: settings.materials.len(),
                    });
                }
            }
        } else {
            for (t, triangle) in settings.triangles.iter().enumerate() {
                if triangle.material_index != 0 {
                    return Err(MeshShapeError::MissingMaterialNonZero { triangle: t });
                }
            }
        }

        // The input stays untouched; the active-edge bits go into a copy.
        let mut triangles = settings.triangles.clone();
        mark_active_edges(&settings.vertices, &mut triangles);

        let mut splitter = CenterSplitter;
        let root = AabbTreeBuilder::new(&settings.vertices, &triangles, &mut splitter).build();
        let tree = encode_tree(&settings.vertices, &triangles, &root)
            .map_err(|e| MeshShapeError::EncodingFailure(e.to_string()))?;

        let header = NodeHeader::read(&tree);
        let bits = header.block_id_bits() + NUM_TRIANGLE_BITS;
        if bits > MAX_SUB_SHAPE_BITS {
            return Err(MeshShapeError::MeshTooLarge { bits });
        }

        let triangle_header = TriangleHeader::read(&tree, NODE_HEADER_SIZE);

        Ok(MeshShape {
            tree,
            header,
            triangle_header,
            materials: settings.materials.clone(),
        })
    }

    /// The AABB of the whole mesh, in its local frame.
    pub fn local_bounds(&self) -> Aabb {
        Aabb::new(self.header.root_bounds_min, self.header.root_bounds_max)
    }

    /// Mesh shapes are static: no mass, identity inertia.
    pub fn mass_properties(&self) -> MassProperties {
        MassProperties::default()
    }

    /// The ordered material table of this mesh.
    pub fn materials(&self) -> &[MaterialRef] {
        &self.materials
    }

    /// The number of sub-shape id bits a hit on this mesh consumes.
    pub fn sub_shape_id_bits(&self) -> u32 {
        self.header.block_id_bits() + NUM_TRIANGLE_BITS
    }

    /// The raw encoded tree buffer.
    pub fn tree_bytes(&self) -> &[u8] {
        &self.tree
    }

    fn decode_sub_shape_id(&self, id: SubShapeId) -> (&[u8], u32) {
        let (block_id, rest) = id.pop(self.header.block_id_bits());
        let (triangle_idx, remainder) = rest.pop(NUM_TRIANGLE_BITS);
        debug_assert!(remainder.is_empty(), "invalid sub-shape id");
        (self.header.triangle_block(&self.tree, block_id), triangle_idx)
    }

    /// The material of the triangle identified by `sub_shape_id`.
    pub fn get_material(&self, sub_shape_id: SubShapeId) -> MaterialRef {
        if self.materials.is_empty() {
            return default_material();
        }

        let (block, triangle_idx) = self.decode_sub_shape_id(sub_shape_id);
        let flags = TriangleDecodingContext::get_flag(block, triangle_idx as usize);
        self.materials[(flags as u32 & FLAGS_MATERIAL_MASK) as usize].clone()
    }

    /// The outward (counter-clockwise) normal of the triangle identified by
    /// `sub_shape_id`.
    pub fn get_surface_normal(
        &self,
        sub_shape_id: SubShapeId,
        _local_surface_position: &Point<Real>,
    ) -> Vector<Real> {
        let (block, triangle_idx) = self.decode_sub_shape_id(sub_shape_id);
        let ctx = TriangleDecodingContext::new(&self.triangle_header, &self.tree);
        let [v0, v1, v2] = ctx.get_triangle(block, triangle_idx as usize);
        (v2 - v1).cross(&(v0 - v1)).normalize()
    }

    fn walk_tree<V: TreeVisitor>(&self, visitor: &mut V) {
        let triangle_ctx = TriangleDecodingContext::new(&self.triangle_header, &self.tree);
        let mut walk = NodeDecodingContext::new(&self.header);
        walk.walk_tree(&self.tree, &triangle_ctx, visitor);
    }

    /// Casts a ray and keeps the nearest hit.
    ///
    /// `hit.fraction` is the upper bound of the search on input; only hits
    /// strictly below it are reported. Returns `true` if `hit` was updated.
    pub fn cast_ray(
        &self,
        ray: &Ray,
        sub_shape_id_creator: &SubShapeIdCreator,
        hit: &mut RayCastResult,
    ) -> bool {
        struct Visitor<'a> {
            hit: &'a mut RayCastResult,
            simd_ray: SimdRay,
            origin: Point<Real>,
            dir: Vector<Real>,
            block_id_bits: u32,
            sub_shape_id_creator: SubShapeIdCreator,
            found: bool,
            distance_stack: [Real; STACK_SIZE],
        }

        impl<'a> TreeVisitor for Visitor<'a> {
            fn should_abort(&self) -> bool {
                self.hit.fraction <= 0.0
            }

            fn should_visit_node(&self, stack_top: usize) -> bool {
                self.distance_stack[stack_top] < self.hit.fraction
            }

            fn visit_nodes(
                &mut self,
                bounds: &SimdAabb,
                properties: &mut [u32; 4],
                stack_top: usize,
            ) -> usize {
                let mut distances = bounds.ray_hit_distances(&self.simd_ray);
                let num = sort4_descending_clipped(&mut distances, properties, self.hit.fraction);
                self.distance_stack[stack_top..stack_top + num]
                    .copy_from_slice(&distances[..num]);
                num
            }

            fn visit_triangles(
                &mut self,
                triangle_ctx: &TriangleDecodingContext,
                _root_bounds_min: &Point<Real>,
                _root_bounds_max: &Point<Real>,
                block: &[u8],
                num_triangles: usize,
                block_id: u32,
            ) {
                let (fraction, triangle_idx) = triangle_ctx.test_ray(
                    &self.origin,
                    &self.dir,
                    block,
                    num_triangles,
                    self.hit.fraction,
                );
                if fraction < self.hit.fraction {
                    self.hit.fraction = fraction;
                    self.hit.sub_shape_id = self
                        .sub_shape_id_creator
                        .push(block_id, self.block_id_bits)
                        .push(triangle_idx, NUM_TRIANGLE_BITS)
                        .id();
                    self.found = true;
                }
            }
        }

        let mut visitor = Visitor {
            hit,
            simd_ray: SimdRay::splat(*ray),
            origin: ray.origin,
            dir: ray.dir,
            block_id_bits: self.header.block_id_bits(),
            sub_shape_id_creator: *sub_shape_id_creator,
            found: false,
            distance_stack: [Real::MAX; STACK_SIZE],
        };
        self.walk_tree(&mut visitor);
        visitor.found
    }

    /// Casts a ray and reports every hit within `[0, 1]` to `collector`.
    ///
    /// Hits arrive in traversal order, not sorted by fraction.
    pub fn cast_ray_with_collector<C: CollisionCollector<RayCastResult>>(
        &self,
        ray: &Ray,
        settings: &RayCastSettings,
        sub_shape_id_creator: &SubShapeIdCreator,
        collector: &mut C,
    ) {
        struct Visitor<'a, C> {
            collector: &'a mut C,
            simd_ray: SimdRay,
            origin: Point<Real>,
            dir: Vector<Real>,
            back_face_mode: BackFaceMode,
            block_id_bits: u32,
            sub_shape_id_creator: SubShapeIdCreator,
            distance_stack: [Real; STACK_SIZE],
        }

        impl<'a, C: CollisionCollector<RayCastResult>> Visitor<'a, C> {
            fn early_out_fraction(&self) -> Real {
                // A hit past the end of the ray is no hit at all.
                self.collector.early_out_fraction().min(1.0 + Real::EPSILON)
            }
        }

        impl<'a, C: CollisionCollector<RayCastResult>> TreeVisitor for Visitor<'a, C> {
            fn should_abort(&self) -> bool {
                self.collector.should_early_out()
            }

            fn should_visit_node(&self, stack_top: usize) -> bool {
                self.distance_stack[stack_top] < self.early_out_fraction()
            }

            fn visit_nodes(
                &mut self,
                bounds: &SimdAabb,
                properties: &mut [u32; 4],
                stack_top: usize,
            ) -> usize {
                let mut distances = bounds.ray_hit_distances(&self.simd_ray);
                let num =
                    sort4_descending_clipped(&mut distances, properties, self.early_out_fraction());
                self.distance_stack[stack_top..stack_top + num]
                    .copy_from_slice(&distances[..num]);
                num
            }

            fn visit_triangles(
                &mut self,
                triangle_ctx: &TriangleDecodingContext,
                _root_bounds_min: &Point<Real>,
                _root_bounds_max: &Point<Real>,
                block: &[u8],
                num_triangles: usize,
                block_id: u32,
            ) {
                let block_id_creator = self
                    .sub_shape_id_creator
                    .push(block_id, self.block_id_bits);

                let mut vertices = [Point::origin(); MAX_TRIANGLES_PER_LEAF * 3];
                triangle_ctx.unpack(block, num_triangles, &mut vertices);

                for triangle_idx in 0..num_triangles {
                    let v0 = vertices[triangle_idx * 3];
                    let v1 = vertices[triangle_idx * 3 + 1];
                    let v2 = vertices[triangle_idx * 3 + 2];

                    if self.back_face_mode == BackFaceMode::IgnoreBackFaces
                        && (v2 - v0).cross(&(v1 - v0)).dot(&self.dir) < 0.0
                    {
                        continue;
                    }

                    let fraction =
                        crate::query::ray_triangle(&self.origin, &self.dir, &v0, &v1, &v2);
                    if fraction < self.early_out_fraction() {
                        let hit = RayCastResult {
                            fraction,
                            sub_shape_id: block_id_creator
                                .push(triangle_idx as u32, NUM_TRIANGLE_BITS)
                                .id(),
                        };
                        self.collector.add_hit(hit);
                    }
                }
            }
        }

        let mut visitor = Visitor {
            collector,
            simd_ray: SimdRay::splat(*ray),
            origin: ray.origin,
            dir: ray.dir,
            back_face_mode: settings.back_face_mode,
            block_id_bits: self.header.block_id_bits(),
            sub_shape_id_creator: *sub_shape_id_creator,
            distance_stack: [Real::MAX; STACK_SIZE],
        };
        self.walk_tree(&mut visitor);
    }

    /// Tests whether `point` lies inside the mesh, assuming it encloses a
    /// volume.
    ///
    /// A ray is cast from the point along `+y`, 10% longer than the mesh
    /// bounds are tall; an odd number of crossings means inside, in which
    /// case one hit is reported carrying the sub-shape id of the last
    /// triangle the ray crossed.
    pub fn collide_point<C: CollisionCollector<CollidePointResult>>(
        &self,
        point: &Point<Real>,
        sub_shape_id_creator: &SubShapeIdCreator,
        collector: &mut C,
    ) {
        let bounds = self.local_bounds();
        if !bounds.contains_local_point(point) {
            return;
        }

        #[derive(Default)]
        struct HitCountCollector {
            count: u32,
            sub_shape_id: SubShapeId,
        }

        impl CollisionCollector<RayCastResult> for HitCountCollector {
            fn add_hit(&mut self, hit: RayCastResult) {
                self.sub_shape_id = hit.sub_shape_id;
                self.count += 1;
            }
        }

        let mut counter = HitCountCollector::default();
        let settings = RayCastSettings {
            back_face_mode: BackFaceMode::CollideWithBackFaces,
        };
        let ray = Ray::new(
            *point,
            Vector::new(0.0, 1.1 * bounds.extents().y, 0.0),
        );
        self.cast_ray_with_collector(&ray, &settings, sub_shape_id_creator, &mut counter);

        if counter.count % 2 == 1 {
            collector.add_hit(CollidePointResult {
                sub_shape_id: counter.sub_shape_id,
            });
        }
    }

    /// Sweeps a convex shape through this mesh.
    ///
    /// The mesh walks its tree front-to-back along the sweep and hands every
    /// candidate triangle to `caster`, which owns the actual convex-triangle
    /// solver and its collector.
    pub fn cast_shape<C: CastConvexVsTriangles>(
        &self,
        shape_cast: &ShapeCast,
        scale: &Vector<Real>,
        sub_shape_id_creator2: &SubShapeIdCreator,
        caster: &mut C,
    ) {
        struct Visitor<'a, C> {
            caster: &'a mut C,
            simd_ray: SimdRay,
            scale: Vector<Real>,
            box_half_extent: Vector<Real>,
            block_id_bits: u32,
            sub_shape_id_creator: SubShapeIdCreator,
            distance_stack: [Real; STACK_SIZE],
        }

        impl<'a, C: CastConvexVsTriangles> TreeVisitor for Visitor<'a, C> {
            fn should_abort(&self) -> bool {
                self.caster.should_early_out()
            }

            fn should_visit_node(&self, stack_top: usize) -> bool {
                self.distance_stack[stack_top] < self.caster.early_out_fraction()
            }

            fn visit_nodes(
                &mut self,
                bounds: &SimdAabb,
                properties: &mut [u32; 4],
                stack_top: usize,
            ) -> usize {
                let bounds = bounds
                    .scaled(&self.scale)
                    .enlarged_by_extent(&self.box_half_extent);
                let mut distances = bounds.ray_hit_distances(&self.simd_ray);
                let num = sort4_descending_clipped(
                    &mut distances,
                    properties,
                    self.caster.early_out_fraction(),
                );
                self.distance_stack[stack_top..stack_top + num]
                    .copy_from_slice(&distances[..num]);
                num
            }

            fn visit_triangles(
                &mut self,
                triangle_ctx: &TriangleDecodingContext,
                _root_bounds_min: &Point<Real>,
                _root_bounds_max: &Point<Real>,
                block: &[u8],
                num_triangles: usize,
                block_id: u32,
            ) {
                let block_id_creator = self
                    .sub_shape_id_creator
                    .push(block_id, self.block_id_bits);

                let mut vertices = [Point::origin(); MAX_TRIANGLES_PER_LEAF * 3];
                triangle_ctx.unpack(block, num_triangles, &mut vertices);
                let mut flags = [0; MAX_TRIANGLES_PER_LEAF];
                TriangleDecodingContext::get_flags(block, num_triangles, &mut flags);

                for triangle_idx in 0..num_triangles {
                    let active_edges =
                        (flags[triangle_idx] as u32 >> FLAGS_ACTIVE_EDGE_SHIFT) as u8
                            & FLAGS_ACTIVE_EDGE_MASK as u8;
                    let sub_shape_id = block_id_creator
                        .push(triangle_idx as u32, NUM_TRIANGLE_BITS)
                        .id();

                    self.caster.cast(
                        vertices[triangle_idx * 3],
                        vertices[triangle_idx * 3 + 1],
                        vertices[triangle_idx * 3 + 2],
                        active_edges,
                        sub_shape_id,
                    );

                    if self.caster.should_early_out() {
                        break;
                    }
                }
            }
        }

        let mut visitor = Visitor {
            caster,
            simd_ray: SimdRay::splat(Ray::new(
                shape_cast.shape_world_bounds.center(),
                shape_cast.dir,
            )),
            scale: *scale,
            box_half_extent: shape_cast.shape_world_bounds.half_extents(),
            block_id_bits: self.header.block_id_bits(),
            sub_shape_id_creator: *sub_shape_id_creator2,
            distance_stack: [Real::MAX; STACK_SIZE],
        };
        self.walk_tree(&mut visitor);
    }

    /// Overlaps a convex shape with this mesh.
    ///
    /// `bounds_of_convex` is the convex shape's world-space AABB expressed as
    /// an oriented box in this mesh's (unscaled) local frame. Every triangle
    /// whose scaled node chain intersects that box is handed to `collider`.
    pub fn collide_convex<C: CollideConvexVsTriangles>(
        &self,
        bounds_of_convex: &OrientedBox,
        scale: &Vector<Real>,
        sub_shape_id_creator2: &SubShapeIdCreator,
        collider: &mut C,
    ) {
        struct Visitor<'a, C> {
            collider: &'a mut C,
            local_box: OrientedBox,
            scale: Vector<Real>,
            block_id_bits: u32,
            sub_shape_id_creator: SubShapeIdCreator,
        }

        impl<'a, C: CollideConvexVsTriangles> TreeVisitor for Visitor<'a, C> {
            fn should_abort(&self) -> bool {
                self.collider.should_early_out()
            }

            fn should_visit_node(&self, _stack_top: usize) -> bool {
                true
            }

            fn visit_nodes(
                &mut self,
                bounds: &SimdAabb,
                properties: &mut [u32; 4],
                _stack_top: usize,
            ) -> usize {
                let collides = bounds
                    .scaled(&self.scale)
                    .intersects_oriented_box(&self.local_box);

                let mut num = 0;
                for lane in 0..4 {
                    if collides.extract(lane) {
                        properties[num] = properties[lane];
                        num += 1;
                    }
                }
                num
            }

            fn visit_triangles(
                &mut self,
                triangle_ctx: &TriangleDecodingContext,
                _root_bounds_min: &Point<Real>,
                _root_bounds_max: &Point<Real>,
                block: &[u8],
                num_triangles: usize,
                block_id: u32,
            ) {
                let block_id_creator = self
                    .sub_shape_id_creator
                    .push(block_id, self.block_id_bits);

                let mut vertices = [Point::origin(); MAX_TRIANGLES_PER_LEAF * 3];
                triangle_ctx.unpack(block, num_triangles, &mut vertices);
                let mut flags = [0; MAX_TRIANGLES_PER_LEAF];
                TriangleDecodingContext::get_flags(block, num_triangles, &mut flags);

                for triangle_idx in 0..num_triangles {
                    let active_edges =
                        (flags[triangle_idx] as u32 >> FLAGS_ACTIVE_EDGE_SHIFT) as u8
                            & FLAGS_ACTIVE_EDGE_MASK as u8;
                    let sub_shape_id = block_id_creator
                        .push(triangle_idx as u32, NUM_TRIANGLE_BITS)
                        .id();

                    self.collider.collide(
                        vertices[triangle_idx * 3],
                        vertices[triangle_idx * 3 + 1],
                        vertices[triangle_idx * 3 + 2],
                        active_edges,
                        sub_shape_id,
                    );

                    if self.collider.should_early_out() {
                        break;
                    }
                }
            }
        }

        let mut visitor = Visitor {
            collider,
            local_box: *bounds_of_convex,
            scale: *scale,
            block_id_bits: self.header.block_id_bits(),
            sub_shape_id_creator: *sub_shape_id_creator2,
        };
        self.walk_tree(&mut visitor);
    }

    /// Starts a resumable enumeration of the triangles inside a region.
    ///
    /// `bounds` is a world-space box; `position`, `rotation` and `scale` are
    /// the pose of this mesh in the world. Feed the returned context to
    /// [`MeshShape::get_triangles_next`] until it returns 0.
    pub fn get_triangles_start(
        &self,
        bounds: &Aabb,
        position: &Point<Real>,
        rotation: &Rotation<Real>,
        scale: &Vector<Real>,
    ) -> GetTrianglesContext {
        let local_to_world = Isometry::from_parts(Translation::from(position.coords), *rotation);

        GetTrianglesContext {
            walk: NodeDecodingContext::new(&self.header),
            local_box: OrientedBox::from_world_aabb(&local_to_world.inverse(), bounds),
            mesh_scale: *scale,
            local_to_world,
            is_inside_out: scale.x * scale.y * scale.z < 0.0,
        }
    }

    /// Resumes a triangle enumeration, filling the output arrays.
    ///
    /// Writes up to `max_triangles` triangles (three world-space vertices
    /// each) into `out_vertices`, and one material per triangle into
    /// `out_materials` when provided, then returns the number of triangles
    /// written. A return of 0 means the enumeration is finished. If the next
    /// leaf would not fit, the walk pauses *before* it and the following
    /// call resumes there, so every triangle is produced exactly once.
    ///
    /// # Panics
    ///
    /// Panics if `max_triangles < MAX_TRIANGLES_PER_LEAF` or the output
    /// arrays are too small.
    pub fn get_triangles_next(
        &self,
        context: &mut GetTrianglesContext,
        max_triangles: usize,
        out_vertices: &mut [Point<Real>],
        out_materials: Option<&mut [MaterialRef]>,
    ) -> usize {
        assert!(max_triangles >= MAX_TRIANGLES_PER_LEAF);
        assert!(out_vertices.len() >= max_triangles * 3);
        if let Some(materials) = &out_materials {
            assert!(materials.len() >= max_triangles);
        }

        if context.walk.is_done_walking() {
            return 0;
        }

        struct Visitor<'a> {
            local_box: OrientedBox,
            mesh_scale: Vector<Real>,
            local_to_world: Isometry<Real>,
            is_inside_out: bool,
            mesh_materials: &'a [MaterialRef],
            max_triangles: usize,
            num_found: usize,
            full: bool,
            out_vertices: &'a mut [Point<Real>],
            out_materials: Option<&'a mut [MaterialRef]>,
        }

        impl<'a> TreeVisitor for Visitor<'a> {
            fn should_abort(&self) -> bool {
                self.full
            }

            fn should_visit_node(&self, _stack_top: usize) -> bool {
                true
            }

            fn visit_nodes(
                &mut self,
                bounds: &SimdAabb,
                properties: &mut [u32; 4],
                _stack_top: usize,
            ) -> usize {
                let collides = bounds
                    .scaled(&self.mesh_scale)
                    .intersects_oriented_box(&self.local_box);

                let mut num = 0;
                for lane in 0..4 {
                    if collides.extract(lane) {
                        properties[num] = properties[lane];
                        num += 1;
                    }
                }
                num
            }

            fn visit_triangles(
                &mut self,
                triangle_ctx: &TriangleDecodingContext,
                _root_bounds_min: &Point<Real>,
                _root_bounds_max: &Point<Real>,
                block: &[u8],
                num_triangles: usize,
                _block_id: u32,
            ) {
                // The buffer cannot take this leaf: pause the walk without
                // consuming it, the next call picks it up again.
                if self.num_found + num_triangles > self.max_triangles {
                    self.full = true;
                    return;
                }

                let mut vertices = [Point::origin(); MAX_TRIANGLES_PER_LEAF * 3];
                triangle_ctx.unpack(block, num_triangles, &mut vertices);

                for triangle_idx in 0..num_triangles {
                    let out_base = (self.num_found + triangle_idx) * 3;
                    let local = &vertices[triangle_idx * 3..triangle_idx * 3 + 3];

                    // Inside-out scales flip the winding to keep the output
                    // counter-clockwise.
                    let order: [usize; 3] = if self.is_inside_out {
                        [0, 2, 1]
                    } else {
                        [0, 1, 2]
                    };
                    for (slot, source) in order.iter().enumerate() {
                        let scaled = local[*source]
                            .coords
                            .component_mul(&self.mesh_scale);
                        self.out_vertices[out_base + slot] =
                            self.local_to_world * Point::from(scaled);
                    }
                }

                if let Some(out_materials) = &mut self.out_materials {
                    if self.mesh_materials.is_empty() {
                        for triangle_idx in 0..num_triangles {
                            out_materials[self.num_found + triangle_idx] = default_material();
                        }
                    } else {
                        let mut flags = [0; MAX_TRIANGLES_PER_LEAF];
                        TriangleDecodingContext::get_flags(block, num_triangles, &mut flags);
                        for triangle_idx in 0..num_triangles {
                            let material = (flags[triangle_idx] as u32 & FLAGS_MATERIAL_MASK) as usize;
                            out_materials[self.num_found + triangle_idx] =
                                self.mesh_materials[material].clone();
                        }
                    }
                }

                self.num_found += num_triangles;
            }
        }

        let mut visitor = Visitor {
            local_box: context.local_box,
            mesh_scale: context.mesh_scale,
            local_to_world: context.local_to_world,
            is_inside_out: context.is_inside_out,
            mesh_materials: &self.materials,
            max_triangles,
            num_found: 0,
            full: false,
            out_vertices,
            out_materials,
        };

        let triangle_ctx = TriangleDecodingContext::new(&self.triangle_header, &self.tree);
        context
            .walk
            .walk_tree(&self.tree, &triangle_ctx, &mut visitor);
        visitor.num_found
    }

    /// Counts the triangles stored in the tree and sums up memory use.
    pub fn stats(&self) -> ShapeStats {
        struct Visitor {
            num_triangles: u32,
        }

        impl TreeVisitor for Visitor {
            fn should_abort(&self) -> bool {
                false
            }

            fn should_visit_node(&self, _stack_top: usize) -> bool {
                true
            }

            fn visit_nodes(
                &mut self,
                bounds: &SimdAabb,
                properties: &mut [u32; 4],
                _stack_top: usize,
            ) -> usize {
                let valid = bounds.is_valid();
                let mut num = 0;
                for lane in 0..4 {
                    if valid.extract(lane) {
                        properties[num] = properties[lane];
                        num += 1;
                    }
                }
                num
            }

            fn visit_triangles(
                &mut self,
                _triangle_ctx: &TriangleDecodingContext,
                _root_bounds_min: &Point<Real>,
                _root_bounds_max: &Point<Real>,
                _block: &[u8],
                num_triangles: usize,
                _block_id: u32,
            ) {
                self.num_triangles += num_triangles as u32;
            }
        }

        let mut visitor = Visitor { num_triangles: 0 };
        self.walk_tree(&mut visitor);

        ShapeStats {
            size_bytes: std::mem::size_of::<Self>()
                + self.materials.len() * std::mem::size_of::<MaterialRef>()
                + self.tree.len(),
            num_triangles: visitor.num_triangles,
        }
    }

    /// Writes the binary state of this shape (everything but the materials).
    ///
    /// The tree buffer is written verbatim, length-prefixed; the material
    /// table goes through [`MeshShape::save_material_state`] so embedders can
    /// version material references separately.
    pub fn save_binary_state(&self, stream: &mut dyn io::Write) -> io::Result<()> {
        stream.write_all(&BINARY_MAGIC.to_le_bytes())?;
        stream.write_all(&(self.tree.len() as u64).to_le_bytes())?;
        stream.write_all(&self.tree)
    }

    /// Reads back a shape written by [`MeshShape::save_binary_state`].
    ///
    /// The restored shape has an empty material table; use
    /// [`MeshShape::restore_material_state`] to reattach one.
    pub fn restore_binary_state(stream: &mut dyn io::Read) -> io::Result<MeshShape> {
        let mut word = [0; 4];
        stream.read_exact(&mut word)?;
        if u32::from_le_bytes(word) != BINARY_MAGIC {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "not a mesh shape binary state",
            ));
        }

        let mut length = [0; 8];
        stream.read_exact(&mut length)?;
        let length = u64::from_le_bytes(length) as usize;
        if length < NODE_HEADER_SIZE + TRIANGLE_HEADER_SIZE {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "mesh shape tree buffer is truncated",
            ));
        }

        let mut tree = vec![0; length];
        stream.read_exact(&mut tree)?;

        let header = NodeHeader::read(&tree);
        let triangle_header = TriangleHeader::read(&tree, NODE_HEADER_SIZE);
        let blocks_end = header.leaf_blocks_start as usize
            + header.num_leaf_blocks as usize * TRIANGLE_BLOCK_SIZE;
        if blocks_end > tree.len() || triangle_header.vertices_start as usize > tree.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "mesh shape tree buffer is inconsistent",
            ));
        }

        Ok(MeshShape {
            tree,
            header,
            triangle_header,
            materials: Vec::new(),
        })
    }

    /// The ordered material table, for out-of-band persistence.
    pub fn save_material_state(&self) -> Vec<MaterialRef> {
        self.materials.clone()
    }

    /// Reattaches a material table restored out-of-band.
    pub fn restore_material_state(&mut self, materials: &[MaterialRef]) {
        self.materials = materials.to_vec();
    }
}

/// The resumable state of a [`MeshShape::get_triangles_start`] /
/// [`MeshShape::get_triangles_next`] enumeration.
pub struct GetTrianglesContext {
    walk: NodeDecodingContext,
    local_box: OrientedBox,
    mesh_scale: Vector<Real>,
    local_to_world: Isometry<Real>,
    is_inside_out: bool,
}
