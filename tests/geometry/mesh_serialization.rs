use crate::common::{cube_face_materials, cube_settings_with_materials, terrain_settings};
use rampart::math::{Point, Real, Vector};
use rampart::query::{Ray, RayCastResult};
use rampart::shape::{MeshShape, SubShapeIdCreator};
use rand::prelude::*;
use std::io::Cursor;

#[test]
fn binary_roundtrip_preserves_the_tree_bit_for_bit() {
    let shape = terrain_settings(9, 11).create().unwrap();

    let mut stream = Vec::new();
    shape.save_binary_state(&mut stream).unwrap();
    let restored = MeshShape::restore_binary_state(&mut Cursor::new(&stream)).unwrap();

    assert_eq!(shape.tree_bytes(), restored.tree_bytes());
    assert_eq!(shape.local_bounds(), restored.local_bounds());
    assert_eq!(shape.sub_shape_id_bits(), restored.sub_shape_id_bits());
    assert_eq!(
        shape.stats().num_triangles,
        restored.stats().num_triangles
    );

    // Saving the restored shape reproduces the identical stream.
    let mut second_stream = Vec::new();
    restored.save_binary_state(&mut second_stream).unwrap();
    assert_eq!(stream, second_stream);
}

#[test]
fn restored_shape_answers_identical_queries() {
    let shape = terrain_settings(13, 7).create().unwrap();

    let mut stream = Vec::new();
    shape.save_binary_state(&mut stream).unwrap();
    let restored = MeshShape::restore_binary_state(&mut Cursor::new(&stream)).unwrap();

    let mut rng = StdRng::seed_from_u64(99);
    for _ in 0..100 {
        let x: Real = rng.gen_range(0.1..12.9);
        let z: Real = rng.gen_range(0.1..6.9);
        let ray = Ray::new(Point::new(x, 4.0, z), Vector::new(0.1, -8.0, -0.05));

        let mut original_hit = RayCastResult::default();
        let original_found = shape.cast_ray(&ray, &SubShapeIdCreator::new(), &mut original_hit);
        let mut restored_hit = RayCastResult::default();
        let restored_found =
            restored.cast_ray(&ray, &SubShapeIdCreator::new(), &mut restored_hit);

        assert_eq!(original_found, restored_found);
        assert_eq!(
            original_hit.fraction.to_bits(),
            restored_hit.fraction.to_bits()
        );
        assert_eq!(original_hit.sub_shape_id, restored_hit.sub_shape_id);
    }
}

#[test]
fn material_state_is_persisted_out_of_band() {
    let shape = cube_settings_with_materials().create().unwrap();

    let mut stream = Vec::new();
    shape.save_binary_state(&mut stream).unwrap();
    let mut restored = MeshShape::restore_binary_state(&mut Cursor::new(&stream)).unwrap();

    // Binary state alone has no materials: hits report the default.
    let ray = Ray::new(Point::new(0.5, 0.5, -1.0), Vector::new(0.0, 0.0, 1.0));
    let mut hit = RayCastResult::default();
    assert!(restored.cast_ray(&ray, &SubShapeIdCreator::new(), &mut hit));
    assert_eq!(restored.get_material(hit.sub_shape_id).name(), "default");

    // Reattaching the saved material table brings the real materials back.
    restored.restore_material_state(&shape.save_material_state());
    assert_eq!(restored.get_material(hit.sub_shape_id).name(), "z-neg");
    assert_eq!(restored.materials().len(), cube_face_materials().len());
}

#[test]
fn corrupted_streams_are_rejected() {
    let shape = terrain_settings(3, 3).create().unwrap();

    let mut stream = Vec::new();
    shape.save_binary_state(&mut stream).unwrap();

    // Wrong magic.
    let mut bad = stream.clone();
    bad[0] ^= 0xff;
    assert!(MeshShape::restore_binary_state(&mut Cursor::new(&bad)).is_err());

    // Truncated payload.
    let truncated = &stream[..stream.len() / 2];
    assert!(MeshShape::restore_binary_state(&mut Cursor::new(truncated)).is_err());
}
