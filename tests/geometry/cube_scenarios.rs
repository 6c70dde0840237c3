use crate::common::{cube_settings, cube_settings_with_materials};
use approx::assert_relative_eq;
use rampart::math::{Point, Real, Vector};
use rampart::query::{
    AllHitsCollector, BackFaceMode, CollidePointResult, Ray, RayCastResult, RayCastSettings,
};
use rampart::shape::{MeshShapeSettings, SubShapeIdCreator};
use rand::prelude::*;

#[test]
fn cube_bounds_and_stats() {
    let shape = cube_settings_with_materials().create().unwrap();

    let bounds = shape.local_bounds();
    assert_eq!(bounds.mins, Point::new(0.0, 0.0, 0.0));
    assert_eq!(bounds.maxs, Point::new(1.0, 1.0, 1.0));

    let stats = shape.stats();
    assert_eq!(stats.num_triangles, 12);
    assert!(stats.size_bytes > 0);

    assert_eq!(shape.mass_properties().mass, 0.0);
}

#[test]
fn cube_nearest_ray_hits_front_face() {
    let shape = cube_settings_with_materials().create().unwrap();

    let ray = Ray::new(Point::new(0.5, 0.5, -1.0), Vector::new(0.0, 0.0, 1.0));
    let mut hit = RayCastResult::default();
    assert!(shape.cast_ray(&ray, &SubShapeIdCreator::new(), &mut hit));
    assert_relative_eq!(hit.fraction, 1.0, epsilon = 1.0e-5);

    // The hit is on the z = 0 face: its material and its outward normal.
    assert_eq!(shape.get_material(hit.sub_shape_id).name(), "z-neg");
    let normal = shape.get_surface_normal(hit.sub_shape_id, &ray.point_at(hit.fraction));
    assert_relative_eq!(normal, Vector::new(0.0, 0.0, -1.0), epsilon = 1.0e-3);

    // A ray pointing away sees nothing.
    let miss = Ray::new(Point::new(0.5, 0.5, -1.0), Vector::new(0.0, 0.0, -1.0));
    let mut hit = RayCastResult::default();
    assert!(!shape.cast_ray(&miss, &SubShapeIdCreator::new(), &mut hit));
}

#[test]
fn cube_ray_respects_incoming_upper_bound() {
    let shape = cube_settings().create().unwrap();

    let ray = Ray::new(Point::new(0.5, 0.5, -1.0), Vector::new(0.0, 0.0, 1.0));
    let mut hit = RayCastResult {
        fraction: 0.5,
        ..Default::default()
    };
    assert!(!shape.cast_ray(&ray, &SubShapeIdCreator::new(), &mut hit));
    assert_eq!(hit.fraction, 0.5);
}

#[test]
fn cube_all_hits_ray_sees_both_faces() {
    let shape = cube_settings().create().unwrap();

    // Straight through the cube, off the face diagonals.
    let ray = Ray::new(Point::new(0.25, 0.4, -1.0), Vector::new(0.0, 0.0, 3.0));
    let settings = RayCastSettings {
        back_face_mode: BackFaceMode::CollideWithBackFaces,
    };
    let mut collector = AllHitsCollector::new();
    shape.cast_ray_with_collector(&ray, &settings, &SubShapeIdCreator::new(), &mut collector);
    assert_eq!(collector.hits.len(), 2);

    let mut fractions: Vec<Real> = collector.hits.iter().map(|h| h.fraction).collect();
    fractions.sort_by(Real::total_cmp);
    assert_relative_eq!(fractions[0], 1.0 / 3.0, epsilon = 1.0e-5);
    assert_relative_eq!(fractions[1], 2.0 / 3.0, epsilon = 1.0e-5);

    // Ignoring back faces leaves only the entry hit.
    let settings = RayCastSettings {
        back_face_mode: BackFaceMode::IgnoreBackFaces,
    };
    let mut collector = AllHitsCollector::new();
    shape.cast_ray_with_collector(&ray, &settings, &SubShapeIdCreator::new(), &mut collector);
    assert_eq!(collector.hits.len(), 1);
    assert_relative_eq!(collector.hits[0].fraction, 1.0 / 3.0, epsilon = 1.0e-5);
}

#[test]
fn cube_point_containment() {
    let shape = cube_settings_with_materials().create().unwrap();

    let mut collector = AllHitsCollector::<CollidePointResult>::new();
    shape.collide_point(
        &Point::new(0.4, 0.5, 0.3),
        &SubShapeIdCreator::new(),
        &mut collector,
    );
    assert_eq!(collector.hits.len(), 1);
    // The reported id decodes to a real triangle of this mesh.
    let _ = shape.get_material(collector.hits[0].sub_shape_id);

    let mut collector = AllHitsCollector::<CollidePointResult>::new();
    shape.collide_point(
        &Point::new(2.0, 0.5, 0.5),
        &SubShapeIdCreator::new(),
        &mut collector,
    );
    assert!(collector.hits.is_empty());
}

#[test]
fn cube_point_containment_randomized() {
    let shape = cube_settings().create().unwrap();
    let mut rng = StdRng::seed_from_u64(0x00c0ffee);

    for _ in 0..100 {
        let x: Real = rng.gen_range(0.05..0.95);
        let y: Real = rng.gen_range(0.05..0.95);
        let z: Real = rng.gen_range(0.05..0.95);
        if (x - z).abs() < 1.0e-2 {
            // The vertical exit ray would graze the top-face diagonal.
            continue;
        }

        let mut collector = AllHitsCollector::<CollidePointResult>::new();
        shape.collide_point(&Point::new(x, y, z), &SubShapeIdCreator::new(), &mut collector);
        assert_eq!(collector.hits.len(), 1, "point ({x}, {y}, {z})");

        // The mirrored point outside the bounds reports nothing.
        let mut collector = AllHitsCollector::<CollidePointResult>::new();
        shape.collide_point(
            &Point::new(x + 2.0, y, z),
            &SubShapeIdCreator::new(),
            &mut collector,
        );
        assert!(collector.hits.is_empty());
    }
}

#[test]
fn single_triangle_mesh_uses_default_material() {
    let settings = MeshShapeSettings::from_triangle_soup([[
        Point::new(0.0, 0.0, 0.0),
        Point::new(1.0, 0.0, 0.0),
        Point::new(0.0, 1.0, 0.0),
    ]]);
    let shape = settings.create().unwrap();
    assert_eq!(shape.stats().num_triangles, 1);

    let ray = Ray::new(Point::new(0.25, 0.25, -1.0), Vector::new(0.0, 0.0, 1.0));
    let mut hit = RayCastResult::default();
    assert!(shape.cast_ray(&ray, &SubShapeIdCreator::new(), &mut hit));
    assert_relative_eq!(hit.fraction, 1.0, epsilon = 1.0e-5);
    assert_eq!(shape.get_material(hit.sub_shape_id).name(), "default");
}
