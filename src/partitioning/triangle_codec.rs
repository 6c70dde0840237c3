//! The packed triangle-block codec.
//!
//! Triangles are stored in blocks of at most [`MAX_TRIANGLES_PER_LEAF`], as a
//! structure-of-arrays of 8-bit vertex indices relative to a per-block base
//! vertex, plus one flags byte per triangle (material in the low bits,
//! active-edge bits above them). Vertex positions live in a shared pool,
//! quantized to 16 bits per component against the root bounds.
//!
//! Block layout (little-endian, 20 bytes):
//!
//! ```text
//! base_vertex: u32   @ 0   index of the block's first vertex in the pool
//! idx0: [u8; 4]      @ 4   first-vertex offsets of the four triangles
//! idx1: [u8; 4]      @ 8   second-vertex offsets
//! idx2: [u8; 4]      @ 12  third-vertex offsets
//! flags: [u8; 4]     @ 16  per-triangle flags bytes
//! ```
//!
//! Unused tail slots replicate the last stored triangle; the triangle count
//! lives in the node properties word, so the padding is never interpreted.

use crate::bounding_volume::Aabb;
use crate::math::{Point, Real, Vector};
use crate::query::ray_triangle;
use crate::shape::IndexedTriangle;
use crate::utils::byte_buffer::{read_f32, read_u16, read_u32};
use crate::utils::ByteBuffer;
use arrayvec::ArrayVec;

/// The maximum number of triangles a leaf block can hold.
pub const MAX_TRIANGLES_PER_LEAF: usize = 4;

/// The number of sub-shape id bits needed for a triangle index within a block.
pub const NUM_TRIANGLE_BITS: u32 = 2;

/// The encoded size of one triangle block.
pub const TRIANGLE_BLOCK_SIZE: usize = 20;

/// The encoded size of the [`TriangleHeader`].
pub const TRIANGLE_HEADER_SIZE: usize = 28;

/// The encoded size of one pool vertex.
pub(crate) const PACKED_VERTEX_SIZE: usize = 6;

/// The largest quantized vertex component.
const QUANTIZATION_MAX: Real = 65535.0;

/// Decompression parameters for the packed vertex pool.
#[derive(Debug, Clone)]
pub struct TriangleHeader {
    /// Position of the quantization grid's origin.
    pub offset: Vector<Real>,
    /// Extent covered by the quantization grid along each axis.
    pub scale: Vector<Real>,
    /// Byte offset of the vertex pool inside the tree buffer.
    pub vertices_start: u32,
}

impl TriangleHeader {
    /// Quantization parameters covering `root_bounds`.
    pub fn from_root_bounds(root_bounds: &Aabb, vertices_start: u32) -> Self {
        TriangleHeader {
            offset: root_bounds.mins.coords,
            scale: root_bounds.extents(),
            vertices_start,
        }
    }

    /// Appends this header to `buffer`.
    pub fn write(&self, buffer: &mut ByteBuffer) {
        for i in 0..3 {
            buffer.write_f32(self.offset[i]);
        }
        for i in 0..3 {
            buffer.write_f32(self.scale[i]);
        }
        buffer.write_u32(self.vertices_start);
    }

    /// Reads a header at byte offset `at` of `data`.
    pub fn read(data: &[u8], at: usize) -> Self {
        TriangleHeader {
            offset: Vector::new(
                read_f32(data, at),
                read_f32(data, at + 4),
                read_f32(data, at + 8),
            ),
            scale: Vector::new(
                read_f32(data, at + 12),
                read_f32(data, at + 16),
                read_f32(data, at + 20),
            ),
            vertices_start: read_u32(data, at + 24),
        }
    }

    /// Quantizes a vertex onto the 16-bit grid.
    pub fn quantize(&self, point: &Point<Real>) -> [u16; 3] {
        let mut result = [0; 3];
        for i in 0..3 {
            if self.scale[i] > 0.0 {
                let normalized = (point[i] - self.offset[i]) / self.scale[i];
                result[i] = (normalized * QUANTIZATION_MAX).round().clamp(0.0, QUANTIZATION_MAX)
                    as u16;
            }
        }
        result
    }
}

/// One triangle block, in its pre-serialization form.
pub(crate) struct LeafBlock {
    base_vertex: u32,
    idx: [[u8; MAX_TRIANGLES_PER_LEAF]; 3],
    flags: [u8; MAX_TRIANGLES_PER_LEAF],
}

impl LeafBlock {
    /// Packs the given triangles into a block, appending their (deduplicated)
    /// vertices to the pool.
    pub fn encode(
        header: &TriangleHeader,
        vertices: &[Point<Real>],
        triangles: &[IndexedTriangle],
        members: &[u32],
        pool: &mut Vec<[u16; 3]>,
    ) -> LeafBlock {
        debug_assert!(!members.is_empty() && members.len() <= MAX_TRIANGLES_PER_LEAF);

        let base_vertex = pool.len() as u32;
        let mut local: ArrayVec<u32, { MAX_TRIANGLES_PER_LEAF * 3 }> = ArrayVec::new();
        let mut idx = [[0; MAX_TRIANGLES_PER_LEAF]; 3];
        let mut flags = [0; MAX_TRIANGLES_PER_LEAF];

        for (k, triangle_id) in members.iter().enumerate() {
            let triangle = &triangles[*triangle_id as usize];
            for slot in 0..3 {
                let vertex_id = triangle.idx[slot];
                let local_offset = match local.iter().position(|id| *id == vertex_id) {
                    Some(offset) => offset,
                    None => {
                        local.push(vertex_id);
                        pool.push(header.quantize(&vertices[vertex_id as usize]));
                        local.len() - 1
                    }
                };
                idx[slot][k] = local_offset as u8;
            }
            flags[k] = triangle.flags_byte();
        }

        // Replicate the last triangle into the unused tail slots.
        let last = members.len() - 1;
        for k in members.len()..MAX_TRIANGLES_PER_LEAF {
            for slot in 0..3 {
                idx[slot][k] = idx[slot][last];
            }
            flags[k] = flags[last];
        }

        LeafBlock {
            base_vertex,
            idx,
            flags,
        }
    }

    /// Appends this block to `buffer`.
    pub fn write(&self, buffer: &mut ByteBuffer) {
        buffer.write_u32(self.base_vertex);
        for slot in 0..3 {
            for k in 0..MAX_TRIANGLES_PER_LEAF {
                buffer.write_u8(self.idx[slot][k]);
            }
        }
        for k in 0..MAX_TRIANGLES_PER_LEAF {
            buffer.write_u8(self.flags[k]);
        }
    }
}

/// Decodes triangle blocks out of an encoded tree buffer.
pub struct TriangleDecodingContext<'a> {
    offset: Vector<Real>,
    scale: Vector<Real>,
    vertices: &'a [u8],
}

impl<'a> TriangleDecodingContext<'a> {
    /// A decoding context for the given tree buffer.
    pub fn new(header: &TriangleHeader, tree: &'a [u8]) -> Self {
        TriangleDecodingContext {
            offset: header.offset,
            scale: header.scale,
            vertices: &tree[header.vertices_start as usize..],
        }
    }

    #[inline]
    fn decode_vertex(&self, pool_index: u32) -> Point<Real> {
        let at = pool_index as usize * PACKED_VERTEX_SIZE;
        let mut result = Point::origin();
        for i in 0..3 {
            let quantized = read_u16(self.vertices, at + i * 2) as Real;
            result[i] = self.offset[i] + self.scale[i] * (quantized / QUANTIZATION_MAX);
        }
        result
    }

    /// Decodes the vertices of the first `num_triangles` triangles of a block
    /// into `out` (three points per triangle).
    pub fn unpack(&self, block: &[u8], num_triangles: usize, out: &mut [Point<Real>]) {
        let base = read_u32(block, 0);
        for k in 0..num_triangles {
            for slot in 0..3 {
                let local_offset = block[4 + slot * MAX_TRIANGLES_PER_LEAF + k] as u32;
                out[k * 3 + slot] = self.decode_vertex(base + local_offset);
            }
        }
    }

    /// Decodes a single triangle of a block.
    pub fn get_triangle(&self, block: &[u8], triangle_idx: usize) -> [Point<Real>; 3] {
        let base = read_u32(block, 0);
        let mut result = [Point::origin(); 3];
        for slot in 0..3 {
            let local_offset = block[4 + slot * MAX_TRIANGLES_PER_LEAF + triangle_idx] as u32;
            result[slot] = self.decode_vertex(base + local_offset);
        }
        result
    }

    /// Reads the flags bytes of the first `num_triangles` triangles of a block.
    #[inline]
    pub fn get_flags(block: &[u8], num_triangles: usize, out: &mut [u8; MAX_TRIANGLES_PER_LEAF]) {
        out[..num_triangles].copy_from_slice(&block[16..16 + num_triangles]);
    }

    /// Reads the flags byte of a single triangle of a block.
    #[inline]
    pub fn get_flag(block: &[u8], triangle_idx: usize) -> u8 {
        block[16 + triangle_idx]
    }

    /// Finds the closest ray hit among the triangles of a block.
    ///
    /// Only hits with a fraction strictly below `early_out_fraction` are
    /// considered. Returns `(Real::MAX, 0)` if there is none.
    pub fn test_ray(
        &self,
        origin: &Point<Real>,
        dir: &Vector<Real>,
        block: &[u8],
        num_triangles: usize,
        early_out_fraction: Real,
    ) -> (Real, u32) {
        let mut best = early_out_fraction;
        let mut best_idx = 0;
        let mut found = false;

        for k in 0..num_triangles {
            let [v0, v1, v2] = self.get_triangle(block, k);
            let fraction = ray_triangle(origin, dir, &v0, &v1, &v2);
            if fraction < best {
                best = fraction;
                best_idx = k as u32;
                found = true;
            }
        }

        if found {
            (best, best_idx)
        } else {
            (Real::MAX, 0)
        }
    }
}
