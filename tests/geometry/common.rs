//! Shared fixtures for the mesh shape tests.

#![allow(dead_code)]

use rampart::math::{Point, Real};
use rampart::shape::{IndexedTriangle, MaterialRef, MeshShapeSettings, PhysicsMaterial};
use std::sync::Arc;

pub struct NamedMaterial(pub &'static str);

impl PhysicsMaterial for NamedMaterial {
    fn name(&self) -> &str {
        self.0
    }
}

pub fn named_material(name: &'static str) -> MaterialRef {
    Arc::new(NamedMaterial(name))
}

/// The corners of the unit cube `[0, 1]^3`.
pub fn cube_vertices() -> Vec<Point<Real>> {
    vec![
        Point::new(0.0, 0.0, 0.0),
        Point::new(1.0, 0.0, 0.0),
        Point::new(1.0, 1.0, 0.0),
        Point::new(0.0, 1.0, 0.0),
        Point::new(0.0, 0.0, 1.0),
        Point::new(1.0, 0.0, 1.0),
        Point::new(1.0, 1.0, 1.0),
        Point::new(0.0, 1.0, 1.0),
    ]
}

/// The 12 triangles of the unit cube, counter-clockwise seen from outside.
///
/// `per_face_materials` assigns material index `face` (0..6) to both
/// triangles of each face; otherwise every triangle uses material 0.
pub fn cube_triangles(per_face_materials: bool) -> Vec<IndexedTriangle> {
    let faces: [[u32; 4]; 6] = [
        [0, 3, 2, 1], // z = 0
        [4, 5, 6, 7], // z = 1
        [0, 1, 5, 4], // y = 0
        [3, 7, 6, 2], // y = 1
        [0, 4, 7, 3], // x = 0
        [1, 2, 6, 5], // x = 1
    ];

    let mut triangles = Vec::new();
    for (face, [a, b, c, d]) in faces.into_iter().enumerate() {
        let material = if per_face_materials { face as u32 } else { 0 };
        triangles.push(IndexedTriangle::new([a, b, c], material));
        triangles.push(IndexedTriangle::new([a, c, d], material));
    }
    triangles
}

/// One named material per cube face, in face order.
pub fn cube_face_materials() -> Vec<MaterialRef> {
    ["z-neg", "z-pos", "y-neg", "y-pos", "x-neg", "x-pos"]
        .into_iter()
        .map(named_material)
        .collect()
}

pub fn cube_settings_with_materials() -> MeshShapeSettings {
    MeshShapeSettings::with_materials(
        cube_vertices(),
        cube_triangles(true),
        cube_face_materials(),
    )
}

pub fn cube_settings() -> MeshShapeSettings {
    MeshShapeSettings::new(cube_vertices(), cube_triangles(false))
}

/// A deterministic bumpy height for grid cell `(i, j)`.
pub fn terrain_height(i: u32, j: u32) -> Real {
    ((i.wrapping_mul(73_856_093) ^ j.wrapping_mul(19_349_663)) % 7) as Real * 0.1
}

/// A `nx × nz` terrain sheet in the xz plane, triangles facing `+y`.
pub fn terrain_settings(nx: u32, nz: u32) -> MeshShapeSettings {
    let mut vertices = Vec::new();
    for i in 0..=nx {
        for j in 0..=nz {
            vertices.push(Point::new(i as Real, terrain_height(i, j), j as Real));
        }
    }

    let vertex_id = |i: u32, j: u32| i * (nz + 1) + j;
    let mut triangles = Vec::new();
    for i in 0..nx {
        for j in 0..nz {
            let a = vertex_id(i, j);
            let b = vertex_id(i + 1, j);
            let c = vertex_id(i + 1, j + 1);
            let d = vertex_id(i, j + 1);
            triangles.push(IndexedTriangle::new([a, c, b], 0));
            triangles.push(IndexedTriangle::new([a, d, c], 0));
        }
    }

    MeshShapeSettings::new(vertices, triangles)
}
