use crate::common::{cube_settings, terrain_settings};
use rampart::bounding_volume::{Aabb, OrientedBox};
use rampart::math::{Isometry, Point, Real, Vector};
use rampart::query::CollideConvexVsTriangles;
use rampart::shape::{SubShapeId, SubShapeIdCreator};

struct RecordingCollider {
    triangles: Vec<([Point<Real>; 3], u8)>,
}

impl RecordingCollider {
    fn new() -> Self {
        RecordingCollider {
            triangles: Vec::new(),
        }
    }
}

impl CollideConvexVsTriangles for RecordingCollider {
    fn collide(
        &mut self,
        v0: Point<Real>,
        v1: Point<Real>,
        v2: Point<Real>,
        active_edges: u8,
        _sub_shape_id2: SubShapeId,
    ) {
        self.triangles.push(([v0, v1, v2], active_edges));
    }

    fn should_early_out(&self) -> bool {
        false
    }
}

fn axis_aligned_box(center: Point<Real>, half_extents: Vector<Real>) -> OrientedBox {
    OrientedBox::from_world_aabb(
        &Isometry::identity(),
        &Aabb::new(center - half_extents, center + half_extents),
    )
}

#[test]
fn overlapping_box_sees_all_triangles() {
    let shape = cube_settings().create().unwrap();

    let mut collider = RecordingCollider::new();
    shape.collide_convex(
        &axis_aligned_box(Point::new(0.5, 0.5, 0.5), Vector::new(1.0, 1.0, 1.0)),
        &Vector::new(1.0, 1.0, 1.0),
        &SubShapeIdCreator::new(),
        &mut collider,
    );

    assert_eq!(collider.triangles.len(), 12);

    // The active-edge bits ride along: cube edges (length 1) are active,
    // coplanar face diagonals (length √2) are not.
    for (vertices, active_edges) in &collider.triangles {
        for edge in 0..3 {
            let length_sq = (vertices[(edge + 1) % 3] - vertices[edge]).norm_squared();
            let is_active = active_edges & (1 << edge) != 0;
            assert_eq!(is_active, (length_sq - 1.0).abs() < 1.0e-3);
        }
    }
}

#[test]
fn corner_box_reports_a_local_subset() {
    let shape = terrain_settings(16, 16).create().unwrap();

    let mut collider = RecordingCollider::new();
    shape.collide_convex(
        &axis_aligned_box(Point::new(1.0, 0.0, 1.0), Vector::new(1.0, 1.0, 1.0)),
        &Vector::new(1.0, 1.0, 1.0),
        &SubShapeIdCreator::new(),
        &mut collider,
    );

    // A 2×2-cell box in a 16×16 sheet: a strict subset of the 512 triangles.
    assert!(!collider.triangles.is_empty());
    assert!(collider.triangles.len() < 512);

    // Every triangle lying fully inside the box must be among the candidates:
    // the four grid cells under it, two triangles each.
    let fully_inside = collider
        .triangles
        .iter()
        .filter(|(vertices, _)| {
            vertices
                .iter()
                .all(|v| v.x <= 2.001 && v.z <= 2.001)
        })
        .count();
    assert_eq!(fully_inside, 8);
}

#[test]
fn disjoint_box_sees_nothing() {
    let shape = cube_settings().create().unwrap();

    let mut collider = RecordingCollider::new();
    shape.collide_convex(
        &axis_aligned_box(Point::new(5.0, 5.0, 5.0), Vector::new(0.5, 0.5, 0.5)),
        &Vector::new(1.0, 1.0, 1.0),
        &SubShapeIdCreator::new(),
        &mut collider,
    );

    assert!(collider.triangles.is_empty());
}

/// A thin plate that overlaps the cube on every world axis but is separated
/// along its own plane normal: only the oriented-box axes can reject it.
#[test]
fn separation_along_the_box_axes_is_detected() {
    let shape = cube_settings().create().unwrap();

    let rotation = Vector::y() * std::f32::consts::FRAC_PI_4;
    let half_extents = Vector::new(0.4, 0.4, 0.05);

    // Just outside the corner: the diagonal plate's normal separates it.
    let mut collider = RecordingCollider::new();
    shape.collide_convex(
        &OrientedBox {
            transform: Isometry::new(Vector::new(-0.1, 0.5, -0.1), rotation),
            half_extents,
        },
        &Vector::new(1.0, 1.0, 1.0),
        &SubShapeIdCreator::new(),
        &mut collider,
    );
    assert!(collider.triangles.is_empty());

    // Shifted inside the corner, the same plate overlaps.
    let mut collider = RecordingCollider::new();
    shape.collide_convex(
        &OrientedBox {
            transform: Isometry::new(Vector::new(0.1, 0.5, 0.1), rotation),
            half_extents,
        },
        &Vector::new(1.0, 1.0, 1.0),
        &SubShapeIdCreator::new(),
        &mut collider,
    );
    assert!(!collider.triangles.is_empty());
}

#[test]
fn collide_convex_early_out_stops_the_walk() {
    let shape = cube_settings().create().unwrap();

    struct OneShotCollider {
        seen: usize,
    }

    impl CollideConvexVsTriangles for OneShotCollider {
        fn collide(
            &mut self,
            _: Point<Real>,
            _: Point<Real>,
            _: Point<Real>,
            _: u8,
            _: SubShapeId,
        ) {
            self.seen += 1;
        }

        fn should_early_out(&self) -> bool {
            self.seen > 0
        }
    }

    let mut collider = OneShotCollider { seen: 0 };
    shape.collide_convex(
        &axis_aligned_box(Point::new(0.5, 0.5, 0.5), Vector::new(1.0, 1.0, 1.0)),
        &Vector::new(1.0, 1.0, 1.0),
        &SubShapeIdCreator::new(),
        &mut collider,
    );

    assert_eq!(collider.seen, 1);
}
