use crate::common::terrain_settings;
use rampart::math::{Point, Real, Vector};
use rampart::query::{AllHitsCollector, Ray, RayCastResult, RayCastSettings};
use rampart::shape::SubShapeIdCreator;
use rand::prelude::*;

/// The nearest-hit cast and the minimum of the all-hits cast agree.
#[test]
fn nearest_ray_matches_all_hits_minimum() {
    let shape = terrain_settings(16, 16).create().unwrap();
    let mut rng = StdRng::seed_from_u64(42);

    let mut tested = 0;
    for _ in 0..200 {
        let x: Real = rng.gen_range(0.1..15.9);
        let z: Real = rng.gen_range(0.1..15.9);
        let ray = Ray::new(Point::new(x, 5.0, z), Vector::new(0.0, -10.0, 0.0));

        let mut nearest = RayCastResult::default();
        let found = shape.cast_ray(&ray, &SubShapeIdCreator::new(), &mut nearest);

        let mut collector = AllHitsCollector::new();
        shape.cast_ray_with_collector(
            &ray,
            &RayCastSettings::default(),
            &SubShapeIdCreator::new(),
            &mut collector,
        );

        if found {
            tested += 1;
            let min = collector
                .hits
                .iter()
                .map(|h| h.fraction)
                .fold(Real::MAX, Real::min);
            assert_eq!(nearest.fraction, min);
        } else {
            assert!(collector.hits.is_empty());
        }
    }

    // Rays point straight down onto the sheet: almost all of them must hit.
    assert!(tested > 150);
}

/// The same query on the same shape gives bit-identical results.
#[test]
fn ray_casts_are_deterministic() {
    let shape = terrain_settings(12, 9).create().unwrap();
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..50 {
        let x: Real = rng.gen_range(0.1..11.9);
        let z: Real = rng.gen_range(0.1..8.9);
        let ray = Ray::new(Point::new(x, 3.0, z), Vector::new(0.2, -6.0, -0.1));

        let mut first = RayCastResult::default();
        let found_first = shape.cast_ray(&ray, &SubShapeIdCreator::new(), &mut first);
        let mut second = RayCastResult::default();
        let found_second = shape.cast_ray(&ray, &SubShapeIdCreator::new(), &mut second);

        assert_eq!(found_first, found_second);
        assert_eq!(first.fraction.to_bits(), second.fraction.to_bits());
        assert_eq!(first.sub_shape_id, second.sub_shape_id);
    }
}

/// Every hit id decodes to a triangle whose plane actually contains the hit.
#[test]
fn hit_ids_decode_to_matching_normals() {
    let shape = terrain_settings(8, 8).create().unwrap();
    let mut rng = StdRng::seed_from_u64(1234);

    for _ in 0..50 {
        let x: Real = rng.gen_range(0.5..7.5);
        let z: Real = rng.gen_range(0.5..7.5);
        let ray = Ray::new(Point::new(x, 4.0, z), Vector::new(0.0, -8.0, 0.0));

        let mut hit = RayCastResult::default();
        if shape.cast_ray(&ray, &SubShapeIdCreator::new(), &mut hit) {
            let normal = shape.get_surface_normal(hit.sub_shape_id, &ray.point_at(hit.fraction));
            // Terrain triangles always face upward.
            assert!(normal.y > 0.0);
            assert_eq!(shape.get_material(hit.sub_shape_id).name(), "default");
        }
    }
}
